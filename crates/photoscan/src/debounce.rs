//! Deadline-based debounce, polled by the host loop.

use std::time::{Duration, Instant};

/// Default quiet period before a settings burst is acted on.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Collapses bursts of triggers into one firing `window` after the last one.
///
/// Every [`trigger`](Self::trigger) replaces the pending deadline. Nothing is
/// captured at trigger time; whoever polls reads the latest state when
/// [`fire`](Self::fire) returns true.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once per burst, on the first poll at or after the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn burst_fires_once_after_last_trigger() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(100 * MS);

        d.trigger(t0);
        d.trigger(t0 + 40 * MS);
        d.trigger(t0 + 80 * MS);

        assert!(!d.fire(t0 + 120 * MS));
        assert!(!d.fire(t0 + 179 * MS));
        assert!(d.fire(t0 + 180 * MS));
        assert!(!d.fire(t0 + 500 * MS));
    }

    #[test]
    fn cancel_drops_pending_fire() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        d.trigger(t0);
        d.cancel();
        assert!(!d.is_pending());
        assert!(!d.fire(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn idle_never_fires() {
        let mut d = Debouncer::default();
        assert!(!d.fire(Instant::now()));
        assert_eq!(d.deadline(), None);
    }
}
