// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bounded exponential-backoff retry for operations whose effect is only
//! visible after a later read.

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Retry schedule: `delay = min(initial * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.cleanup_max_attempts.max(1),
            initial_delay_ms: config.cleanup_initial_delay_ms,
            max_delay_ms: config.cleanup_max_delay_ms,
        }
    }

    /// Delay to wait after the given zero-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let base_delay = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(base_delay.min(self.max_delay_ms))
    }
}

/// Run `op` until `verify` confirms its effect, backing off between tries.
///
/// `op` must be idempotent. A failed `op` or `verify` call counts as an
/// unsuccessful attempt. Returns the number of attempts used, or
/// `DeleteVerificationExhausted` naming `resource` once the policy is spent.
pub async fn retry_until_verified<Op, OpFut, Verify, VerifyFut>(
    policy: &RetryPolicy,
    resource: &str,
    mut op: Op,
    mut verify: Verify,
) -> Result<u32>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<()>>,
    Verify: FnMut() -> VerifyFut,
    VerifyFut: Future<Output = Result<bool>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        match op().await {
            Ok(()) => match verify().await {
                Ok(true) => return Ok(attempt + 1),
                Ok(false) => {
                    tracing::debug!(resource, attempt, "Effect not yet visible");
                }
                Err(e) => {
                    tracing::debug!(resource, attempt, error = %e, "Verification read failed");
                }
            },
            Err(e) => {
                tracing::debug!(resource, attempt, error = %e, "Attempt failed");
            }
        }

        if attempt + 1 < max_attempts {
            tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
        }
    }

    Err(AppError::DeleteVerificationExhausted {
        resource: resource.to_string(),
        attempts: max_attempts,
    })
}
