use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

/// Minimum spacing between desktop notifications.
pub struct NotificationCooldown {
    window: Duration,
    last_fired: Mutex<Option<Instant>>,
}

impl NotificationCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: Mutex::new(None),
        }
    }

    /// Claims the slot if the window has elapsed since the last successful claim.
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last = self
            .last_fired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let open = last
            .map(|at| now.saturating_duration_since(at) >= self.window)
            .unwrap_or(true);
        if open {
            *last = Some(now);
        }
        open
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_always_succeeds() {
        let cooldown = NotificationCooldown::new(Duration::from_secs(3));
        assert!(cooldown.try_acquire(Instant::now()));
    }

    #[test]
    fn claims_inside_the_window_are_refused() {
        let cooldown = NotificationCooldown::new(Duration::from_millis(3000));
        let start = Instant::now();
        assert!(cooldown.try_acquire(start));
        assert!(!cooldown.try_acquire(start + Duration::from_millis(2999)));
        assert!(cooldown.try_acquire(start + Duration::from_millis(3000)));
    }

    #[test]
    fn refused_claims_do_not_extend_the_window() {
        let cooldown = NotificationCooldown::new(Duration::from_millis(100));
        let start = Instant::now();
        assert!(cooldown.try_acquire(start));
        assert!(!cooldown.try_acquire(start + Duration::from_millis(90)));
        assert!(cooldown.try_acquire(start + Duration::from_millis(100)));
    }
}
