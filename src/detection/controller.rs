use anyhow::{bail, Context, Result};
use log::info;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{alert::AlertSink, context::DetectorContext, settings::DetectionSettings};

use super::loop_worker::{detection_loop, DetectionObserver};

/// Owns the running detection task and the token that stops it.
pub struct DetectionController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl DetectionController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// `cancel_token` is cancelled by `stop`; pass a child token to tie the
    /// loop to a wider shutdown as well.
    pub fn start(
        &mut self,
        ctx: Arc<DetectorContext>,
        alerts: Arc<AlertSink>,
        settings: DetectionSettings,
        observer: Arc<dyn DetectionObserver>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        if self.is_active() {
            bail!("detection already active");
        }

        let handle = tokio::spawn(detection_loop(
            ctx,
            alerts,
            settings,
            observer,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Detection started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("detection loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for DetectionController {
    fn default() -> Self {
        Self::new()
    }
}
