use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{context::DetectorContext, labels::Label, settings::TrainingSettings};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
    pub label: Label,
    pub iterations: u32,
    pub added: u32,
    pub failed: u32,
    pub completed: bool,
}

/// Samples the camera a fixed number of times and feeds each frame to the
/// classifier under one label.
pub struct TrainingController {
    iterations: u32,
    sample_interval: Duration,
}

impl TrainingController {
    pub fn new(iterations: u32, sample_interval: Duration) -> Self {
        Self {
            iterations: iterations.max(1),
            sample_interval,
        }
    }

    pub fn from_settings(settings: &TrainingSettings) -> Self {
        Self::new(settings.iterations, settings.sample_interval())
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Runs one training pass. `on_progress` receives the completed percentage
    /// after every iteration, failed ones included, ending at exactly 100 unless
    /// `cancel_token` fires first.
    pub async fn run<F>(
        &self,
        ctx: &Arc<DetectorContext>,
        label: Label,
        cancel_token: &CancellationToken,
        mut on_progress: F,
    ) -> TrainingSummary
    where
        F: FnMut(f64) + Send,
    {
        let mut summary = TrainingSummary {
            label,
            iterations: self.iterations,
            added: 0,
            failed: 0,
            completed: false,
        };
        log_info!("Training '{}' for {} iterations", label, self.iterations);

        for i in 0..self.iterations {
            if cancel_token.is_cancelled() {
                log_warn!("Training '{}' cancelled after {} iterations", label, i);
                return summary;
            }

            let worker_ctx = Arc::clone(ctx);
            let outcome = tokio::task::spawn_blocking(move || worker_ctx.learn_current_frame(label)).await;
            match outcome {
                Ok(Ok(())) => summary.added += 1,
                Ok(Err(err)) => {
                    summary.failed += 1;
                    log_warn!("Training sample {} for '{}' failed: {err:#}", i + 1, label);
                }
                Err(join_err) => {
                    summary.failed += 1;
                    log_warn!("Training worker for '{}' failed to join: {join_err}", label);
                }
            }

            let percent = progress_percent(i + 1, self.iterations);
            log_debug!("Training '{}' progress {:.0}%", label, percent);
            on_progress(percent);

            // Spacing the samples out gathers varied frames instead of near-duplicates.
            if i + 1 < self.iterations {
                tokio::select! {
                    _ = tokio::time::sleep(self.sample_interval) => {}
                    _ = cancel_token.cancelled() => {
                        log_warn!("Training '{}' cancelled after {} iterations", label, i + 1);
                        return summary;
                    }
                }
            }
        }

        summary.completed = true;
        log_info!(
            "Training '{}' finished: {} added, {} failed",
            label,
            summary.added,
            summary.failed
        );
        summary
    }
}

pub fn progress_percent(done: u32, total: u32) -> f64 {
    if total == 0 {
        return 100.0;
    }
    done.min(total) as f64 * 100.0 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_exact_at_completion() {
        for total in [1, 3, 7, 50, 101, 333] {
            assert_eq!(progress_percent(total, total), 100.0);
        }
    }

    #[test]
    fn progress_strictly_increases() {
        for total in [3, 50, 250] {
            let values: Vec<f64> = (1..=total).map(|i| progress_percent(i, total)).collect();
            assert!(values.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn fifty_iterations_step_by_two_percent() {
        assert_eq!(progress_percent(1, 50), 2.0);
        assert_eq!(progress_percent(25, 50), 50.0);
    }
}
