//! Time source for the settle monitor.
//!
//! The settle monitor reads the current time through [`Clock`] instead of a
//! global, so the host decides which time source applies.

use tokio::time::Instant;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by [`tokio::time::Instant`].  Honours
/// `tokio::time::pause`, so tests can run timeouts without real waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock;
        let start = clock.now();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(3));
    }
}
