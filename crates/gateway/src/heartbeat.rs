use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// A session's heartbeat timer. At most one schedule is active at a time.
#[derive(Debug, Default)]
pub struct HeartbeatTimer {
    interval: Option<Interval>,
}

impl HeartbeatTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any running schedule with one firing every `period`, first one
    /// full period from now.
    pub fn install(&mut self, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn cancel(&mut self) {
        self.interval = None;
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.interval.as_ref().map(Interval::period)
    }

    /// Wait for the next fire. Never resolves while no schedule is installed.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            },
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, tokio::time::timeout};

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut timer = HeartbeatTimer::new();
        let start = Instant::now();
        timer.install(Duration::from_millis(41_250));
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(41_250));
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(82_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_replaces_previous_schedule() {
        let mut timer = HeartbeatTimer::new();
        let start = Instant::now();
        timer.install(Duration::from_secs(10));
        timer.install(Duration::from_secs(3));
        assert_eq!(timer.period(), Some(Duration::from_secs(3)));
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let mut timer = HeartbeatTimer::new();
        timer.install(Duration::from_millis(100));
        timer.cancel();
        assert!(!timer.is_active());
        assert!(timeout(Duration::from_secs(60), timer.tick()).await.is_err());
    }
}
