// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Retry logic for async calls

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;

use crate::{Error, Result};

/// Constant with Max Retry Count is a backoff policy which always returns
/// a constant duration, until it exceeds the maximum retry count.
#[derive(Debug, Clone)]
pub struct ConstantWithMaxRetryCount {
    interval: Duration,
    max_retry_count: usize,
    count: usize,
}

impl ConstantWithMaxRetryCount {
    /// Creates a new Constant backoff with `interval` and `max_retry_count`.
    /// `interval` is the duration to wait between retries, and `max_retry_count` is the maximum
    /// number of retries, after which we return `None` to indicate that we should stop retrying.
    pub fn new(interval: Duration, max_retry_count: usize) -> Self {
        Self {
            interval,
            max_retry_count,
            count: 0,
        }
    }
}

impl Backoff for ConstantWithMaxRetryCount {
    fn next_backoff(&mut self) -> Option<Duration> {
        (self.count < self.max_retry_count).then(|| {
            self.count += 1;
            self.interval
        })
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// How many times, and how far apart, a fallible action is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `max_retries + 1` attempts in total.
    pub max_retries: u32,
    /// Fixed delay between two consecutive attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Creates a new policy.
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// The [`Backoff`] implementation for this policy.
    pub fn to_backoff(&self) -> ConstantWithMaxRetryCount {
        ConstantWithMaxRetryCount::new(self.backoff, self.max_retries as usize)
    }
}

/// Runs `action` until it succeeds or `backoff` gives up.
///
/// Every failed attempt is handed to `on_failure` (with its 1-based attempt
/// number) before the decision to retry is made, including the final one.
/// Errors are not classified, any error is retried.
///
/// Returns [`Error::RetryExhausted`] carrying the last error once the
/// backoff policy stops yielding delays.
pub async fn retry_with_observer<T, B, A, Fut, O>(
    mut backoff: B,
    mut action: A,
    mut on_failure: O,
) -> Result<T>
where
    B: Backoff,
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    O: FnMut(usize, &Error),
{
    let mut attempts = 0usize;
    loop {
        attempts += 1;
        let err = match action().await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        on_failure(attempts, &err);
        match backoff.next_backoff() {
            Some(delay) => {
                tracing::event!(
                    target: crate::probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %crate::probe::Kind::Retry,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                return Err(Error::RetryExhausted {
                    attempts,
                    last_error: Box::new(err),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn constant_backoff_stops_after_max_retry_count() {
        let mut backoff =
            ConstantWithMaxRetryCount::new(Duration::from_millis(10), 2);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_backoff(), None);
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_action_is_attempted_max_retries_plus_one() {
        let policy = RetryPolicy::new(3, Duration::from_millis(250));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observed = Vec::new();
        let started = tokio::time::Instant::now();

        let result: Result<()> = retry_with_observer(
            policy.to_backoff(),
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Mint("execution reverted".into()))
                }
            },
            |attempt, _| observed.push(attempt),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(observed, vec![1, 2, 3, 4]);
        // three waits between four attempts, none after the last one.
        assert_eq!(started.elapsed(), Duration::from_millis(750));
        match result {
            Err(Error::RetryExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last_error, Error::Mint(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_the_action_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut failures = 0;
        let value = retry_with_observer(
            RetryPolicy::new(5, Duration::from_millis(100)).to_backoff(),
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Mint("nonce too low".into()))
                    } else {
                        Ok(42u32)
                    }
                }
            },
            |_, _| failures += 1,
        )
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(failures, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_a_single_attempt() {
        let mut attempts = 0;
        let result: Result<()> = retry_with_observer(
            RetryPolicy::new(0, Duration::from_secs(60)).to_backoff(),
            || async { Err(Error::Generic("boom")) },
            |attempt, _| attempts = attempt,
        )
        .await;
        assert_eq!(attempts, 1);
        assert!(matches!(
            result,
            Err(Error::RetryExhausted { attempts: 1, .. })
        ));
    }
}
