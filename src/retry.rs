use std::{fmt::Display, time::Duration};
use tracing::warn;

use crate::constants::{
    CAPTCHA_ATTEMPTS, OTP_ATTEMPTS, SHEET_WRITE_ATTEMPTS, SHEET_WRITE_BACKOFF_FACTOR,
    SHEET_WRITE_INITIAL_DELAY_SECS, UI_READ_ATTEMPTS,
};

/// Bounded retry shared by every external call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Multiplier applied to the delay after each failed attempt; 1 keeps it fixed.
    pub backoff: u32,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: 1,
            max_delay: delay,
        }
    }

    pub const fn exponential(
        max_attempts: u32,
        initial_delay: Duration,
        backoff: u32,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            delay: initial_delay,
            backoff,
            max_delay,
        }
    }

    pub const fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff
            .max(1)
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay.max(self.delay))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. The last error is returned unchanged.
    pub async fn run<T, E, F, R>(&self, label: &str, is_retryable: R, mut op: F) -> Result<T, E>
    where
        F: AsyncFnMut(u32) -> Result<T, E>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{label} failed on attempt {attempt}/{attempts}: {err}. Retrying in {}ms",
                        delay.as_millis()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Retry policies for each kind of external interaction in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub ui_read: RetryPolicy,
    pub sheet_write: RetryPolicy,
    pub captcha: RetryPolicy,
    pub otp: RetryPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            ui_read: RetryPolicy::fixed(UI_READ_ATTEMPTS, Duration::from_millis(250)),
            sheet_write: RetryPolicy::exponential(
                SHEET_WRITE_ATTEMPTS,
                Duration::from_secs(SHEET_WRITE_INITIAL_DELAY_SECS),
                SHEET_WRITE_BACKOFF_FACTOR,
                Duration::from_secs(60),
            ),
            captcha: RetryPolicy::fixed(CAPTCHA_ATTEMPTS, Duration::from_secs(5)),
            otp: RetryPolicy::fixed(OTP_ATTEMPTS, Duration::from_secs(3)),
        }
    }
}

impl RetrySettings {
    /// Same attempt bounds as the defaults without any sleeping.
    pub fn immediate() -> Self {
        let defaults = Self::default();
        Self {
            ui_read: RetryPolicy::immediate(defaults.ui_read.max_attempts),
            sheet_write: RetryPolicy::immediate(defaults.sheet_write.max_attempts),
            captcha: RetryPolicy::immediate(defaults.captcha.max_attempts),
            otp: RetryPolicy::immediate(defaults.otp.max_attempts),
        }
    }
}
