//! Retry logic with exponential backoff for Telegram API calls
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use vidgrab_types::{Result, VidgrabError};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay in seconds
    pub initial_delay_secs: u64,
    /// Maximum delay in seconds (cap for exponential backoff)
    pub max_delay_secs: u64,
    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_secs: 1,
            max_delay_secs: 30,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_retries: u32, initial_delay_secs: u64, max_delay_secs: u64, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay_secs,
            max_delay_secs,
            multiplier,
        }
    }

    /// Get delay for a specific retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        // initial_delay * (multiplier ^ (attempt - 1))
        let delay_secs = (self.initial_delay_secs as f64) * self.multiplier.powi((attempt - 1) as i32);
        let delay_secs = delay_secs.min(self.max_delay_secs as f64) as u64;

        Duration::from_secs(delay_secs)
    }

    /// Delay before the next attempt after `error`.
    ///
    /// A `retry_after` sent by Telegram is a lower bound; the backoff cap
    /// does not apply to it.
    pub fn delay_after_error(&self, attempt: u32, error: &VidgrabError) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match error.retry_after() {
            Some(secs) => backoff.max(Duration::from_secs(secs)),
            None => backoff,
        }
    }
}

/// Retry an operation with exponential backoff.
///
/// Only errors for which [`VidgrabError::is_retryable`] holds are retried;
/// anything else is returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation,
                        total_attempts = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.delay_after_error(attempt, &e);
                warn!(
                    operation = operation,
                    attempt = attempt,
                    max_retries = config.max_retries,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Operation failed, retrying with exponential backoff"
                );
                sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        operation = operation,
                        attempts = attempt + 1,
                        error = %e,
                        "Operation failed after all retries"
                    );
                }
                return Err(e);
            }
        }
    }
}
