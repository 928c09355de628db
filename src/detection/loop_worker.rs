use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    alert::{AlertOutcome, AlertSink},
    classifier::{ClassificationResult, ClassifierError},
    context::DetectorContext,
    settings::DetectionSettings,
};

use super::decision::decide;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub touched: bool,
    /// `None` when the cycle could not classify (no frame, no examples, timeout).
    pub result: Option<ClassificationResult>,
    pub alert: Option<AlertOutcome>,
}

pub trait DetectionObserver: Send + Sync {
    fn on_cycle(&self, outcome: &CycleOutcome);
}

/// Classifies the current frame, alerts on touches, then waits the detection
/// interval. Runs until `cancel_token` is cancelled; a failing cycle never ends
/// the loop.
pub async fn detection_loop(
    ctx: Arc<DetectorContext>,
    alerts: Arc<AlertSink>,
    settings: DetectionSettings,
    observer: Arc<dyn DetectionObserver>,
    cancel_token: CancellationToken,
) {
    log_info!(
        "Detection loop running (threshold {}, every {}ms)",
        settings.threshold,
        settings.interval_ms
    );

    let worker_busy = Arc::new(AtomicBool::new(false));

    loop {
        let outcome = tokio::select! {
            outcome = perform_cycle(&ctx, &alerts, &settings, &worker_busy) => outcome,
            _ = cancel_token.cancelled() => break,
        };
        observer.on_cycle(&outcome);

        tokio::select! {
            _ = tokio::time::sleep(settings.interval()) => {}
            _ = cancel_token.cancelled() => break,
        }
    }

    log_info!("Detection loop shutting down");
}

/// Clears the busy flag when the blocking worker finishes, even by panic.
struct WorkerSlot(Arc<AtomicBool>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn untouched() -> CycleOutcome {
    CycleOutcome {
        touched: false,
        result: None,
        alert: None,
    }
}

async fn perform_cycle(
    ctx: &Arc<DetectorContext>,
    alerts: &Arc<AlertSink>,
    settings: &DetectionSettings,
    worker_busy: &Arc<AtomicBool>,
) -> CycleOutcome {
    // A timed-out worker keeps running; never stack another one behind it.
    if worker_busy.swap(true, Ordering::AcqRel) {
        log_debug!("Previous detection worker still running; skipping cycle");
        return untouched();
    }
    let slot = WorkerSlot(Arc::clone(worker_busy));

    let worker_ctx = Arc::clone(ctx);
    let classify = tokio::task::spawn_blocking(move || {
        let _slot = slot;
        worker_ctx.classify_current_frame()
    });

    let result = match tokio::time::timeout(settings.cycle_timeout(), classify).await {
        Ok(Ok(Ok(result))) => Some(result),
        Ok(Ok(Err(err))) => {
            if matches!(err.downcast_ref::<ClassifierError>(), Some(ClassifierError::Empty)) {
                log_debug!("Detection skipped: no training examples yet");
            } else {
                log_warn!("Detection cycle failed: {err:#}");
            }
            None
        }
        Ok(Err(join_err)) => {
            log_warn!("Detection worker failed to join: {join_err}");
            None
        }
        Err(_) => {
            log_warn!(
                "Detection cycle timeout (> {}ms)",
                settings.cycle_timeout_ms
            );
            None
        }
    };

    let Some(result) = result else {
        return untouched();
    };

    log_debug!("Label: {} confidences: {:?}", result.label, result.confidences);

    if decide(&result, settings.threshold) {
        log_info!(
            "Touch detected (confidence {:.2})",
            result.confidence(crate::labels::Label::Touched)
        );
        let alert = alerts.fire();
        CycleOutcome {
            touched: true,
            result: Some(result),
            alert: Some(alert),
        }
    } else {
        CycleOutcome {
            touched: false,
            result: Some(result),
            alert: None,
        }
    }
}
