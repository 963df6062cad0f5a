use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime};
use tokio::time::Instant;

use crate::core::time::now_utc;

/// Start instant captured once per session.
///
/// End instants are derived from the monotonic clock, so they never precede the start
/// even when the wall clock jumps backwards.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionClock {
    started_at: OffsetDateTime,
    started: Instant,
}

impl SessionClock {
    pub(crate) fn start() -> Self {
        Self { started_at: now_utc(), started: Instant::now() }
    }

    pub(crate) fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub(crate) fn elapsed(&self) -> StdDuration {
        self.started.elapsed()
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        let elapsed = Duration::try_from(self.elapsed()).unwrap_or(Duration::ZERO);
        self.started_at + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn now_follows_monotonic_elapsed_time() {
        let clock = SessionClock::start();
        tokio::time::advance(StdDuration::from_secs(90)).await;

        assert_eq!(clock.now() - clock.started_at(), Duration::seconds(90));
    }
}
