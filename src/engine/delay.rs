// Adaptive inter-poll delay.
//
// Polling every few seconds is right during active discussion and
// wasteful at 4am. Each empty poll grows the delay geometrically until a
// ceiling; the first poll that finds new comments snaps it back to base.
// Geometric growth converges on the ceiling quickly when a subreddit
// goes quiet, which is the point — most of the saved API pressure comes
// from the long tail of inactivity.

use std::time::Duration;

/// Snapshot of the controller for logging and status output.
#[derive(Debug, Clone, Copy)]
pub struct DelayStatus {
    pub current: Duration,
    pub consecutive_empty: u32,
    pub at_base: bool,
}

pub struct AdaptiveDelay {
    current: Duration,
    base: Duration,
    max: Duration,
    growth_pct: f64,
    consecutive_empty: u32,
}

impl AdaptiveDelay {
    pub fn new(base: Duration, growth_pct: f64, max: Duration) -> Self {
        Self {
            current: base,
            base,
            max: max.max(base),
            growth_pct,
            consecutive_empty: 0,
        }
    }

    /// The delay to sleep before the next poll.
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Feed the controller the result of a poll cycle.
    ///
    /// Zero new comments grows the delay by the configured percentage
    /// (capped); any activity resets it to base.
    pub fn on_activity(&mut self, new_comments: usize) {
        if new_comments > 0 {
            self.consecutive_empty = 0;
            self.current = self.base;
        } else {
            self.consecutive_empty += 1;
            if self.current < self.max {
                let grown =
                    Duration::from_secs_f64(self.current.as_secs_f64() * (1.0 + self.growth_pct / 100.0));
                self.current = grown.min(self.max);
            }
        }
    }

    pub fn is_at_base(&self) -> bool {
        self.current == self.base
    }

    pub fn status(&self) -> DelayStatus {
        DelayStatus {
            current: self.current,
            consecutive_empty: self.consecutive_empty,
            at_base: self.is_at_base(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_base() {
        let delay = AdaptiveDelay::new(Duration::from_secs(3), 20.0, Duration::from_secs(900));
        assert_eq!(delay.current_delay(), Duration::from_secs(3));
        assert!(delay.is_at_base());
    }

    #[test]
    fn empty_cycle_grows_by_percentage() {
        let mut delay = AdaptiveDelay::new(Duration::from_secs(3), 20.0, Duration::from_secs(900));
        delay.on_activity(0);
        let secs = delay.current_delay().as_secs_f64();
        assert!((secs - 3.6).abs() < 1e-9, "expected ~3.6s, got {secs}");
        assert!(!delay.is_at_base());
        assert_eq!(delay.status().consecutive_empty, 1);
    }

    #[test]
    fn ten_empty_cycles_stay_capped_and_non_decreasing() {
        let mut delay = AdaptiveDelay::new(Duration::from_secs(3), 20.0, Duration::from_secs(900));
        let mut previous = delay.current_delay();
        for _ in 0..10 {
            delay.on_activity(0);
            let current = delay.current_delay();
            assert!(current >= previous, "delay must never shrink on empty cycles");
            assert!(current <= Duration::from_secs(900));
            previous = current;
        }
        assert_eq!(delay.status().consecutive_empty, 10);
    }

    #[test]
    fn growth_converges_to_max() {
        let mut delay = AdaptiveDelay::new(Duration::from_secs(3), 20.0, Duration::from_secs(900));
        // 3s * 1.2^n reaches 900s after ~32 empty cycles
        for _ in 0..40 {
            delay.on_activity(0);
        }
        assert_eq!(delay.current_delay(), Duration::from_secs(900));
    }

    #[test]
    fn activity_resets_to_exactly_base() {
        let mut delay = AdaptiveDelay::new(Duration::from_secs(3), 20.0, Duration::from_secs(900));
        for _ in 0..10 {
            delay.on_activity(0);
        }
        delay.on_activity(5);
        assert_eq!(delay.current_delay(), Duration::from_secs(3));
        assert_eq!(delay.status().consecutive_empty, 0);
        assert!(delay.is_at_base());
    }

    #[test]
    fn max_smaller_than_base_is_clamped() {
        let delay = AdaptiveDelay::new(Duration::from_secs(10), 20.0, Duration::from_secs(5));
        assert_eq!(delay.max, Duration::from_secs(10));
    }
}
