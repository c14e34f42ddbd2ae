use std::{collections::VecDeque, time::Duration};

use crate::api::{Error, Time};

/// Sliding-window throttle over the timestamps of accepted submissions
#[derive(Clone, Debug)]
pub struct SubmissionLimiter {
    max_submissions: usize,
    window: Duration,
    recent: VecDeque<Time>, // oldest first
}

impl SubmissionLimiter {
    pub fn new(max_submissions: usize, window: Duration) -> SubmissionLimiter {
        SubmissionLimiter {
            max_submissions,
            window,
            recent: VecDeque::new(),
        }
    }

    fn age(&self, t: Time, now: Time) -> Duration {
        (now - t).to_std().unwrap_or(Duration::ZERO)
    }

    /// Fails with `RateLimited` if one more submission at `now` would exceed the window
    pub fn check(&mut self, now: Time) -> Result<(), Error> {
        while let Some(oldest) = self.recent.front() {
            if self.age(*oldest, now) < self.window {
                break;
            }
            self.recent.pop_front();
        }
        if self.recent.len() >= self.max_submissions {
            let oldest = self.recent[0];
            return Err(Error::RateLimited {
                retry_after: self.window.saturating_sub(self.age(oldest, now)),
            });
        }
        Ok(())
    }

    pub fn record(&mut self, now: Time) {
        self.recent.push_back(now);
    }
}
