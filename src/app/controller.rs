use std::{
    future::Future,
    sync::{Arc, Mutex as StdMutex, MutexGuard, RwLock},
};

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    alert::AlertSink,
    capture::Frame,
    context::DetectorContext,
    detection::{CycleOutcome, DetectionController, DetectionObserver},
    labels::Label,
    settings::{DetectionSettings, Settings, TrainingSettings},
    training::{TrainingController, TrainingSummary},
};

use super::{
    events::{AppEvent, EventSink, TouchedChangedEvent, TrainingProgressEvent},
    state::{AppError, AppStatus},
};

#[derive(Clone)]
struct RunSettings {
    training: TrainingSettings,
    detection: DetectionSettings,
}

/// The application state machine and the single owner of the detector context.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct AppController {
    status: Arc<StdMutex<AppStatus>>,
    context: Arc<RwLock<Option<Arc<DetectorContext>>>>,
    alerts: Arc<AlertSink>,
    events: Arc<dyn EventSink>,
    detection: Arc<Mutex<DetectionController>>,
    settings: Arc<RwLock<RunSettings>>,
    shutdown: CancellationToken,
}

struct StatusObserver {
    status: Arc<StdMutex<AppStatus>>,
    events: Arc<dyn EventSink>,
}

impl DetectionObserver for StatusObserver {
    fn on_cycle(&self, outcome: &CycleOutcome) {
        let (changed, snapshot) = {
            let mut status = lock(&self.status);
            let changed = status.set_touched(outcome.touched);
            if outcome.alert.is_some() {
                status.record_alert();
            }
            (changed, status.clone())
        };

        if changed {
            self.events.emit(AppEvent::TouchedChanged(TouchedChangedEvent {
                touched: outcome.touched,
                at: Utc::now(),
            }));
            self.events.emit(AppEvent::StatusChanged(snapshot));
        }
    }
}

impl AppController {
    pub fn new(settings: &Settings, alerts: Arc<AlertSink>, events: Arc<dyn EventSink>) -> Self {
        Self {
            status: Arc::new(StdMutex::new(AppStatus::new())),
            context: Arc::new(RwLock::new(None)),
            alerts,
            events,
            detection: Arc::new(Mutex::new(DetectionController::new())),
            settings: Arc::new(RwLock::new(RunSettings {
                training: settings.training.clone(),
                detection: settings.detection.clone(),
            })),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> AppStatus {
        lock(&self.status).clone()
    }

    /// Runs `init` once. On failure the controller stays `Initializing` for good
    /// and the reason is kept in `last_error`.
    pub async fn initialize<F>(&self, init: F) -> Result<(), AppError>
    where
        F: Future<Output = anyhow::Result<DetectorContext>>,
    {
        self.transition(|status| status.begin_initializing())?;
        info!("init...");

        match init.await {
            Ok(ctx) => {
                let counts = ctx.example_counts();
                *self.context.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(ctx));
                self.transition(|status| {
                    status.finish_initializing(counts);
                    Ok(())
                })?;
                info!("setup done; train 'not touching' first");
                Ok(())
            }
            Err(err) => {
                let reason = format!("{err:#}");
                error!("Initialization failed: {reason}");
                self.transition(|status| {
                    status.fail_initializing(reason.clone());
                    Ok(())
                })?;
                Err(AppError::InitializationFailed(reason))
            }
        }
    }

    /// Collects one training run for `label`. Rejected unless the detector is
    /// idle; the phase returns to idle when the run ends.
    pub async fn train(&self, label: Label) -> Result<TrainingSummary, AppError> {
        let ctx = self.context().inspect_err(|err| warn!("Train '{label}' ignored: {err}"))?;
        self.transition(|status| status.begin_training(label))
            .inspect_err(|err| warn!("Train '{label}' ignored: {err}"))?;

        let trainer = TrainingController::from_settings(&self.run_settings().training);
        let status = Arc::clone(&self.status);
        let events = Arc::clone(&self.events);
        let cancel_token = self.shutdown.child_token();

        let summary = trainer
            .run(&ctx, label, &cancel_token, move |percent| {
                lock(&status).record_progress(percent);
                events.emit(AppEvent::TrainingProgress(TrainingProgressEvent { label, percent }));
            })
            .await;

        let counts = ctx.example_counts();
        self.transition(|status| {
            status.finish_training(counts);
            Ok(())
        })?;
        Ok(summary)
    }

    /// Moves to Running and spawns the loop. The detection lock is held across
    /// both steps so a concurrent stop sees either neither or both.
    pub async fn start_detection(&self) -> Result<(), AppError> {
        let ctx = self.context().inspect_err(|err| warn!("Run ignored: {err}"))?;
        let mut detection = self.detection.lock().await;
        self.transition(|status| status.begin_running())
            .inspect_err(|err| warn!("Run ignored: {err}"))?;

        let observer: Arc<dyn DetectionObserver> = Arc::new(StatusObserver {
            status: Arc::clone(&self.status),
            events: Arc::clone(&self.events),
        });
        let started = detection.start(
            ctx,
            Arc::clone(&self.alerts),
            self.run_settings().detection,
            observer,
            self.shutdown.child_token(),
        );

        if let Err(err) = started {
            error!("Failed to start detection: {err:#}");
            self.transition(|status| status.stop_running())?;
            return Err(AppError::Internal(err.to_string()));
        }
        Ok(())
    }

    pub async fn stop_detection(&self) -> Result<(), AppError> {
        let mut detection = self.detection.lock().await;
        if let Err(err) = detection.stop().await {
            error!("Detection loop did not stop cleanly: {err:#}");
        }
        self.transition(|status| status.stop_running())
    }

    /// Plays the alert cue regardless of phase.
    pub fn test_sound(&self) -> bool {
        self.alerts.play_cue()
    }

    pub fn preview_frame(&self) -> Result<Frame, AppError> {
        let ctx = self.context()?;
        ctx.source()
            .current_frame()
            .map_err(|err| AppError::Capture(err.to_string()))
    }

    /// New training and detection parameters apply from the next run.
    pub fn apply_settings(&self, settings: &Settings) {
        let mut guard = self.settings.write().unwrap_or_else(|p| p.into_inner());
        guard.training = settings.training.clone();
        guard.detection = settings.detection.clone();
    }

    /// Cancels any training run and stops detection.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Err(err) = self.detection.lock().await.stop().await {
            error!("Detection loop did not stop cleanly: {err:#}");
        }
    }

    fn context(&self) -> Result<Arc<DetectorContext>, AppError> {
        self.context
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(AppError::NotReady)
    }

    fn run_settings(&self) -> RunSettings {
        self.settings.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Applies `change` under the status lock and broadcasts the new status.
    fn transition<F>(&self, change: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut AppStatus) -> Result<(), AppError>,
    {
        let snapshot = {
            let mut status = lock(&self.status);
            change(&mut status)?;
            status.clone()
        };
        self.events.emit(AppEvent::StatusChanged(snapshot));
        Ok(())
    }
}

fn lock(status: &StdMutex<AppStatus>) -> MutexGuard<'_, AppStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
