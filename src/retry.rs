//! Retry with exponential backoff for raw upstream calls.
//!
//! Only the network call is wrapped. Cache lookups never reach this code and
//! a payload that fails to parse after a successful call is not retried.
//!
//! # Classification
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → transient, retried
//! - anything else (4xx, transport failure without a status) → permanent
//!
//! # Schedule
//!
//! With the defaults (3 attempts, base 2s, ×2, cap 60s) a call that keeps
//! failing transiently waits 2s, then 4s, then gives up after the third
//! attempt. Longer budgets continue 8s, 16s, 32s, 60s, 60s, …

use std::time::Duration;

use tracing::warn;

/// Errors that know whether a repeat attempt could succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// True for the HTTP statuses worth retrying: 429 and any 5xx.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget with no waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based: the wait after the first failure is `delay(1)`).
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget is spent.
    ///
    /// `label` names the operation in log output.
    pub fn call<T, E, F>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let wait = self.delay(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "transient upstream error, retrying"
                    );
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
