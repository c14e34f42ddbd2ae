use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::api::Time;

/// Time source and timer of the client
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Time;

    async fn sleep(&self, d: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Time {
        Utc::now()
    }

    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await
    }
}

/// Clock that only moves when told to
///
/// Sleeping returns immediately, advances the clock by the requested duration
/// and records it, so that timed behavior can be checked without waiting.
pub struct ManualClock {
    now: Mutex<Time>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: Time) -> ManualClock {
        ManualClock {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut now = self.now.lock();
        if let Some(later) = chrono::Duration::from_std(d)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
        {
            *now = later;
        }
    }

    /// Durations requested through `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Time {
        *self.now.lock()
    }

    async fn sleep(&self, d: Duration) {
        self.sleeps.lock().push(d);
        self.advance(d);
    }
}

/// Hands out strictly increasing millisecond ids
#[derive(Clone, Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn next(&mut self, now: Time) -> i64 {
        let id = now.timestamp_millis().max(self.last.saturating_add(1));
        self.last = id;
        id
    }

    /// Makes sure later ids are above an id created elsewhere
    pub fn observe(&mut self, id: i64) {
        self.last = self.last.max(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::time_from_millis;

    #[tokio::test]
    async fn manual_clock_records_sleeps() {
        let clock = ManualClock::new(time_from_millis(0).unwrap());
        clock.sleep(Duration::from_millis(300)).await;
        clock.sleep(Duration::from_millis(600)).await;
        assert_eq!(clock.now().timestamp_millis(), 900);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(300), Duration::from_millis(600)]
        );
    }

    #[test]
    fn ids_never_repeat_within_a_millisecond() {
        let now = time_from_millis(1_000).unwrap();
        let mut ids = IdGenerator::default();
        assert_eq!(ids.next(now), 1_000);
        assert_eq!(ids.next(now), 1_001);
        ids.observe(5_000);
        assert_eq!(ids.next(now), 5_001);
        assert_eq!(ids.next(time_from_millis(9_000).unwrap()), 9_000);
    }
}
