use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// default spacing between two progress notifications of one file
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// throttle deciding whether enough time has passed to notify again
#[derive(Clone)]
pub struct RateGate {
    delay: Duration,
    clock: Arc<dyn Clock>,
}

impl RateGate {
    pub fn new(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { delay, clock }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// pure decision: never executed, or at least `delay` since the last run
    ///
    /// the boundary is inclusive. a `now` earlier than `last` counts as no
    /// time elapsed.
    pub fn can_execute(last: Option<Instant>, delay: Duration, now: Instant) -> bool {
        match last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= delay,
        }
    }

    /// sample the clock once and return that sample if the gate is open
    ///
    /// callers store the returned instant as their new last-execution time.
    pub fn poll(&self, last: Option<Instant>) -> Option<Instant> {
        let now = self.clock.now();
        Self::can_execute(last, self.delay, now).then_some(now)
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate").field("delay", &self.delay).finish()
    }
}
