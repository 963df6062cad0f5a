use std::time::Duration;

use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CountdownTick {
    Remaining(u64),
    Expired,
}

/// Session countdown driven by tokio's monotonic clock.
///
/// Remaining time is measured against a fixed deadline, so a delayed tick never stretches
/// the session. Expiry is reported exactly once.
#[derive(Debug)]
pub(crate) struct Countdown {
    deadline: Instant,
    ticker: Interval,
    remaining: u64,
    expired: bool,
    cancelled: bool,
}

impl Countdown {
    /// A non-positive duration yields a countdown that expires on its first tick.
    pub(crate) fn start(duration_minutes: i32, tick: Duration) -> Self {
        let total_seconds = u64::try_from(duration_minutes).unwrap_or(0).saturating_mul(60);
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            deadline: Instant::now() + Duration::from_secs(total_seconds),
            ticker,
            remaining: total_seconds,
            expired: false,
            cancelled: false,
        }
    }

    pub(crate) fn remaining_seconds(&self) -> u64 {
        self.remaining
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expired
    }

    /// False once expired or cancelled; callers must not poll `tick` then.
    pub(crate) fn is_active(&self) -> bool {
        !self.expired && !self.cancelled
    }

    pub(crate) async fn tick(&mut self) -> CountdownTick {
        self.ticker.tick().await;
        let left = self.deadline.saturating_duration_since(Instant::now());
        // Round up so the display reads 1 until the deadline is actually reached.
        self.remaining = left.as_secs() + u64::from(left.subsec_nanos() > 0);

        if self.remaining == 0 {
            self.expired = true;
            CountdownTick::Expired
        } else {
            CountdownTick::Remaining(self.remaining)
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second_and_expires_once() {
        let mut countdown = Countdown::start(1, Duration::from_secs(1));

        assert_eq!(countdown.tick().await, CountdownTick::Remaining(60));
        assert_eq!(countdown.tick().await, CountdownTick::Remaining(59));

        let mut last = CountdownTick::Remaining(59);
        while countdown.is_active() {
            last = countdown.tick().await;
        }

        assert_eq!(last, CountdownTick::Expired);
        assert!(countdown.is_expired());
        assert_eq!(countdown.remaining_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_duration_expires_on_first_tick() {
        for minutes in [0, -5] {
            let mut countdown = Countdown::start(minutes, Duration::from_secs(1));
            let started = Instant::now();
            assert_eq!(countdown.tick().await, CountdownTick::Expired);
            assert_eq!(Instant::now(), started);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_tick_uses_deadline_not_tick_count() {
        let mut countdown = Countdown::start(1, Duration::from_secs(1));
        countdown.tick().await;

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(countdown.tick().await, CountdownTick::Remaining(15));
    }

    #[tokio::test]
    async fn cancel_deactivates_without_expiring() {
        let mut countdown = Countdown::start(5, Duration::from_secs(1));
        countdown.cancel();
        assert!(!countdown.is_active());
        assert!(!countdown.is_expired());
        assert_eq!(countdown.remaining_seconds(), 300);
    }
}
