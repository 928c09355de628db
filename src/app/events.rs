use chrono::{DateTime, Utc};
use serde::Serialize;
use tauri::{AppHandle, Emitter, Runtime};

use crate::labels::Label;

use super::state::AppStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgressEvent {
    pub label: Label,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchedChangedEvent {
    pub touched: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    StatusChanged(AppStatus),
    TrainingProgress(TrainingProgressEvent),
    TouchedChanged(TouchedChangedEvent),
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::StatusChanged(_) => "app-status-changed",
            AppEvent::TrainingProgress(_) => "training-progress",
            AppEvent::TouchedChanged(_) => "touched-changed",
        }
    }
}

/// Receives state changes for the UI. Emission is best-effort.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AppEvent);
}

impl<R: Runtime> EventSink for AppHandle<R> {
    fn emit(&self, event: AppEvent) {
        let name = event.name();
        let result = match event {
            AppEvent::StatusChanged(payload) => Emitter::emit(self, name, payload),
            AppEvent::TrainingProgress(payload) => Emitter::emit(self, name, payload),
            AppEvent::TouchedChanged(payload) => Emitter::emit(self, name, payload),
        };
        if let Err(err) = result {
            log::debug!("failed to emit {name}: {err}");
        }
    }
}
