//! Bounded retry with backoff

use chrono::{DateTime, Utc};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::{Error, Result};

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay after every failed attempt
    Fixed(Duration),
    /// `initial * multiplier^(n-1)`, capped at `max`
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay after the given failed attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => {
                // never shrinks below `initial`; NaN clamps to 1 as well
                let multiplier = (*multiplier).max(1.0);
                let exponent = attempt.saturating_sub(1).min(32) as i32;
                let secs = initial.as_secs_f64() * multiplier.powi(exponent);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial: Duration::from_secs(1),
            multiplier: 2.0,
            max: Duration::from_secs(10),
        }
    }
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Retryable(String),
    Fatal(String),
}

/// One attempt of a retried operation
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// Successful value plus the attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: Vec<AttemptRecord>,
}

impl<T> Attempted<T> {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Retry policy for session start
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least 1
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            jitter: false,
        }
    }

    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    pub fn from_config(config: &Config) -> Self {
        let initial = Duration::from_millis(config.backoff_initial_ms);
        let backoff = match config.backoff.as_str() {
            "fixed" => Backoff::Fixed(initial),
            _ => Backoff::Exponential {
                initial,
                multiplier: config.backoff_multiplier,
                max: Duration::from_millis(config.backoff_max_ms),
            },
        };
        Self::new(config.max_attempts, backoff).with_jitter(config.backoff_jitter)
    }

    /// Add up to half of each delay as random jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub(crate) fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.backoff.delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=0.5);
        base + base.mul_f64(extra)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. Only retryable errors (see
    /// [`Error::is_retryable`]) trigger another attempt. On exhaustion the
    /// last cause is returned as `Error::SessionStart` carrying the attempt
    /// count.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<Attempted<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = Vec::with_capacity(self.max_attempts as usize);

        for attempt in 1..=self.max_attempts {
            let started_at = Utc::now();
            match op(attempt).await {
                Ok(value) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        started_at,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    if attempt > 1 {
                        info!("Succeeded on attempt {}/{}", attempt, self.max_attempts);
                    }
                    return Ok(Attempted { value, attempts });
                }
                Err(err) if err.is_retryable() => {
                    attempts.push(AttemptRecord {
                        attempt,
                        started_at,
                        outcome: AttemptOutcome::Retryable(err.to_string()),
                    });

                    if attempt == self.max_attempts {
                        warn!("Giving up after {} attempt(s): {}", attempt, err);
                        return Err(with_attempts(err, attempt));
                    }

                    let delay = self.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        started_at,
                        outcome: AttemptOutcome::Fatal(err.to_string()),
                    });
                    debug!("Attempt {} failed fatally: {}", attempt, err);
                    return Err(with_attempts(err, attempt));
                }
            }
        }

        Err(Error::internal("retry loop ran zero attempts"))
    }
}

/// Stamp the attempt count onto a session start error
fn with_attempts(err: Error, attempts: u32) -> Error {
    match err {
        Error::SessionStart { cause, .. } => Error::SessionStart { attempts, cause },
        other => other,
    }
}
