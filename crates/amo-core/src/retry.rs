//! Bounded retry with a between-attempt hook
//!
//! Only errors that report [`AmoError::is_retryable`] are retried; anything
//! else is returned immediately. The hook runs after a retryable failure and
//! before the next attempt (e.g. reloading the page), and a failing hook
//! aborts the loop.

use std::future::Future;
use tracing::warn;

use crate::{AmoError, Result};

/// How many times an operation may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; values below 1 are treated as 1
    pub max_attempts: usize,
}

impl RetryPolicy {
    pub fn attempts(max_attempts: usize) -> Self {
        Self { max_attempts }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::attempts(3)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts.
///
/// `op` receives the 1-based attempt number. `between` receives the number of
/// the attempt that just failed.
///
/// # Usage
///
/// ```no_run
/// use amo_core::retry::{retry_with_hook, RetryPolicy};
/// use amo_core::Result;
///
/// async fn upload() -> Result<()> {
///     Ok(())
/// }
///
/// async fn reload() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() -> Result<()> {
///     retry_with_hook("upload", RetryPolicy::attempts(3), |_| upload(), |_| reload()).await
/// }
/// ```
pub async fn retry_with_hook<T, Op, OpFut, Hook, HookFut>(
    operation_name: &str,
    policy: RetryPolicy,
    mut op: Op,
    mut between: Hook,
) -> Result<T>
where
    Op: FnMut(usize) -> OpFut,
    OpFut: Future<Output = Result<T>>,
    Hook: FnMut(usize) -> HookFut,
    HookFut: Future<Output = Result<()>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(val) => return Ok(val),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                warn!(
                    "{} failed after {} attempts: {}",
                    operation_name, max_attempts, e
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_attempts, e
                );
                between(attempt).await?;
                attempt += 1;
            }
        }
    }
}
