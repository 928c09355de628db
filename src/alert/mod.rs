//! Alerting: an audio cue on every touch, a desktop notification at most
//! once per cooldown window.

mod cooldown;
mod notify;

pub use cooldown::NotificationCooldown;
pub use notify::{DesktopNotifier, LogNotifier};

use anyhow::Result;
use serde::Serialize;
use std::{sync::Arc, time::Instant};

use crate::settings::AlertSettings;

pub trait CuePlayer: Send + Sync {
    /// Requests the cue. `Ok` means the request was accepted, not that the
    /// output device produced sound.
    fn play_cue(&self) -> Result<()>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOutcome {
    /// The cue player accepted the request; playback itself is best-effort.
    pub cue_requested: bool,
    pub notified: bool,
}

pub struct AlertSink {
    cue: Arc<dyn CuePlayer>,
    notifier: Arc<dyn Notifier>,
    cooldown: NotificationCooldown,
    title: String,
    body: String,
}

impl AlertSink {
    pub fn new(cue: Arc<dyn CuePlayer>, notifier: Arc<dyn Notifier>, settings: &AlertSettings) -> Self {
        Self {
            cue,
            notifier,
            cooldown: NotificationCooldown::new(settings.cooldown()),
            title: settings.title.clone(),
            body: settings.body.clone(),
        }
    }

    /// Plays the cue and, cooldown permitting, raises a notification.
    ///
    /// Never fails: backend errors are logged and reported in the outcome.
    pub fn fire(&self) -> AlertOutcome {
        let cue_requested = self.play_cue();

        let notified = if self.cooldown.try_acquire(Instant::now()) {
            match self.notifier.notify(&self.title, &self.body) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("Alert notification failed: {err:#}");
                    false
                }
            }
        } else {
            log::debug!(
                "Alert notification suppressed (cooldown {:?})",
                self.cooldown.window()
            );
            false
        };

        AlertOutcome { cue_requested, notified }
    }

    /// Audio only; skips the notification and its cooldown.
    pub fn play_cue(&self) -> bool {
        match self.cue.play_cue() {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Alert cue failed: {err:#}");
                false
            }
        }
    }
}
