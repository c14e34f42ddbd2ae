//! Bounded exponential backoff, used to wait for uploaded media to become resolvable

use std::{future::Future, time::Duration};

use crate::{api::Error, Clock};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included
    pub attempts: u32,

    #[serde(rename = "initial-delay-ms", with = "crate::config::millis")]
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            attempts: 4,
            initial_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution<T> {
    Pending,
    Resolving {
        attempt: u32,
        delay: Duration,
    },
    Retrying {
        attempt: u32,
        delay: Duration,
        last_error: Error,
    },
    Resolved(T),
    Exhausted {
        attempts: u32,
        last_error: Error,
    },
}

impl<T> Resolution<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Resolution::Resolved(_) | Resolution::Exhausted { .. })
    }

    /// `Pending` becomes `Resolving`, other states stay as they are
    pub fn start(self, policy: &RetryPolicy) -> Resolution<T> {
        match self {
            Resolution::Pending => Resolution::Resolving {
                attempt: 1,
                delay: policy.initial_delay,
            },
            other => other,
        }
    }

    /// Feeds the outcome of the attempt currently `Resolving`
    pub fn on_outcome(self, policy: &RetryPolicy, outcome: Result<T, Error>) -> Resolution<T> {
        match (self, outcome) {
            (Resolution::Resolving { .. }, Ok(v)) => Resolution::Resolved(v),
            (Resolution::Resolving { attempt, delay }, Err(last_error)) => {
                if attempt >= policy.attempts {
                    Resolution::Exhausted {
                        attempts: attempt,
                        last_error,
                    }
                } else {
                    Resolution::Retrying {
                        attempt,
                        delay,
                        last_error,
                    }
                }
            }
            (other, _) => other,
        }
    }

    /// Moves `Retrying` to the next attempt, with a doubled delay
    pub fn after_wait(self) -> Resolution<T> {
        match self {
            Resolution::Retrying { attempt, delay, .. } => Resolution::Resolving {
                attempt: attempt + 1,
                delay: delay.saturating_mul(2),
            },
            other => other,
        }
    }
}

/// Drives a `Resolution` to a terminal state, sleeping on `clock` between attempts
pub async fn resolve_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    mut attempt: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut state = Resolution::Pending;
    loop {
        state = match state {
            Resolution::Pending => state.start(policy),
            Resolution::Resolving { attempt: n, .. } => {
                let outcome = attempt().await;
                if let Err(err) = &outcome {
                    tracing::debug!(attempt = n, %err, "resolution attempt failed");
                }
                state.on_outcome(policy, outcome)
            }
            Resolution::Retrying { delay, .. } => {
                clock.sleep(delay).await;
                state.after_wait()
            }
            Resolution::Resolved(v) => return Ok(v),
            Resolution::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::warn!(attempts, %last_error, "giving up resolution");
                return Err(match last_error {
                    Error::RemoteUnavailable(msg) => Error::RemoteUnavailable(msg),
                    other => Error::RemoteUnavailable(other.to_string()),
                });
            }
        };
    }
}
