use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::labels::Label;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AppPhase {
    Uninitialized,
    Initializing,
    ReadyIdle,
    Training { label: Label },
    Running,
}

impl Default for AppPhase {
    fn default() -> Self {
        AppPhase::Uninitialized
    }
}

impl AppPhase {
    /// Whether train/run actions may be offered to the user.
    pub fn is_ready(&self) -> bool {
        !matches!(self, AppPhase::Uninitialized | AppPhase::Initializing)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AppError {
    #[error("detector is still initializing")]
    NotReady,
    #[error("detector is busy ({0:?})")]
    Busy(AppPhase),
    #[error("detection is not running")]
    NotRunning,
    #[error("initialization already started")]
    AlreadyInitialized,
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    #[error("camera frame unavailable: {0}")]
    Capture(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub phase: AppPhase,
    /// Percentage of the current (or last) training run; reset when a run starts.
    pub progress: f64,
    pub touched: bool,
    pub example_counts: BTreeMap<Label, usize>,
    pub last_error: Option<String>,
    pub alerts_fired: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for AppStatus {
    fn default() -> Self {
        Self {
            phase: AppPhase::Uninitialized,
            progress: 0.0,
            touched: false,
            example_counts: BTreeMap::new(),
            last_error: None,
            alerts_fired: 0,
            updated_at: Utc::now(),
        }
    }
}

impl AppStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_initializing(&mut self) -> Result<(), AppError> {
        if self.phase != AppPhase::Uninitialized {
            return Err(AppError::AlreadyInitialized);
        }
        self.set_phase(AppPhase::Initializing);
        Ok(())
    }

    pub fn finish_initializing(&mut self, example_counts: BTreeMap<Label, usize>) {
        self.example_counts = example_counts;
        self.last_error = None;
        self.set_phase(AppPhase::ReadyIdle);
    }

    /// Initialization failures are terminal: the phase stays `Initializing`.
    pub fn fail_initializing(&mut self, reason: String) {
        self.last_error = Some(reason);
        self.touch();
    }

    pub fn begin_training(&mut self, label: Label) -> Result<(), AppError> {
        self.require_idle()?;
        self.progress = 0.0;
        self.set_phase(AppPhase::Training { label });
        Ok(())
    }

    /// Progress only moves forward within a run.
    pub fn record_progress(&mut self, percent: f64) {
        if matches!(self.phase, AppPhase::Training { .. }) && percent > self.progress {
            self.progress = percent.min(100.0);
            self.touch();
        }
    }

    pub fn finish_training(&mut self, example_counts: BTreeMap<Label, usize>) {
        self.example_counts = example_counts;
        if matches!(self.phase, AppPhase::Training { .. }) {
            self.set_phase(AppPhase::ReadyIdle);
        }
    }

    pub fn begin_running(&mut self) -> Result<(), AppError> {
        self.require_idle()?;
        self.touched = false;
        self.set_phase(AppPhase::Running);
        Ok(())
    }

    pub fn stop_running(&mut self) -> Result<(), AppError> {
        if self.phase != AppPhase::Running {
            return Err(AppError::NotRunning);
        }
        self.touched = false;
        self.set_phase(AppPhase::ReadyIdle);
        Ok(())
    }

    /// Returns true when the flag flipped.
    pub fn set_touched(&mut self, touched: bool) -> bool {
        if self.phase != AppPhase::Running || self.touched == touched {
            return false;
        }
        self.touched = touched;
        self.touch();
        true
    }

    pub fn record_alert(&mut self) {
        self.alerts_fired = self.alerts_fired.saturating_add(1);
        self.touch();
    }

    fn require_idle(&self) -> Result<(), AppError> {
        match self.phase {
            AppPhase::ReadyIdle => Ok(()),
            AppPhase::Uninitialized | AppPhase::Initializing => Err(AppError::NotReady),
            busy => Err(AppError::Busy(busy)),
        }
    }

    fn set_phase(&mut self, phase: AppPhase) {
        self.phase = phase;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> AppStatus {
        let mut status = AppStatus::new();
        status.begin_initializing().unwrap();
        status.finish_initializing(BTreeMap::new());
        status
    }

    #[test]
    fn startup_walks_to_ready_idle() {
        let mut status = AppStatus::new();
        assert_eq!(status.phase, AppPhase::Uninitialized);
        status.begin_initializing().unwrap();
        assert_eq!(status.phase, AppPhase::Initializing);
        assert!(!status.phase.is_ready());
        status.finish_initializing(BTreeMap::new());
        assert_eq!(status.phase, AppPhase::ReadyIdle);
        assert!(status.phase.is_ready());
    }

    #[test]
    fn failed_initialization_stays_initializing() {
        let mut status = AppStatus::new();
        status.begin_initializing().unwrap();
        status.fail_initializing("camera denied".into());

        assert_eq!(status.phase, AppPhase::Initializing);
        assert_eq!(status.last_error.as_deref(), Some("camera denied"));
        assert_eq!(status.begin_training(Label::Touched), Err(AppError::NotReady));
        assert_eq!(status.begin_running(), Err(AppError::NotReady));
        assert_eq!(status.begin_initializing(), Err(AppError::AlreadyInitialized));
    }

    #[test]
    fn training_and_running_exclude_each_other() {
        let mut status = ready();
        status.begin_training(Label::NotTouching).unwrap();
        assert_eq!(
            status.begin_running(),
            Err(AppError::Busy(AppPhase::Training { label: Label::NotTouching }))
        );
        assert!(status.begin_training(Label::Touched).is_err());
        status.finish_training(BTreeMap::new());

        status.begin_running().unwrap();
        assert_eq!(status.begin_training(Label::Touched), Err(AppError::Busy(AppPhase::Running)));
        assert_eq!(status.begin_running(), Err(AppError::Busy(AppPhase::Running)));
    }

    #[test]
    fn progress_resets_per_run_and_never_decreases() {
        let mut status = ready();
        status.begin_training(Label::Touched).unwrap();
        status.record_progress(40.0);
        status.record_progress(20.0);
        assert_eq!(status.progress, 40.0);
        status.record_progress(100.0);
        status.finish_training(BTreeMap::new());
        assert_eq!(status.progress, 100.0);

        status.begin_training(Label::NotTouching).unwrap();
        assert_eq!(status.progress, 0.0);
    }

    #[test]
    fn stop_returns_to_idle_and_clears_touched() {
        let mut status = ready();
        assert_eq!(status.stop_running(), Err(AppError::NotRunning));

        status.begin_running().unwrap();
        assert!(status.set_touched(true));
        assert!(!status.set_touched(true));
        status.stop_running().unwrap();
        assert_eq!(status.phase, AppPhase::ReadyIdle);
        assert!(!status.touched);
    }

    #[test]
    fn touched_only_changes_while_running() {
        let mut status = ready();
        assert!(!status.set_touched(true));
        assert!(!status.touched);
    }

    #[test]
    fn phase_serializes_with_kind_tag() {
        let json = serde_json::to_value(AppPhase::Training { label: Label::Touched }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "training", "label": "touched" }));
        let json = serde_json::to_value(AppPhase::ReadyIdle).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "readyIdle" }));
    }
}
