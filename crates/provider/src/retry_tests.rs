// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::cloud::{ProviderError, ProviderErrorKind};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn delays_double_and_cap() {
    let policy = BackoffPolicy::default();
    assert_eq!(policy.delay(1), Duration::from_secs(1));
    assert_eq!(policy.delay(2), Duration::from_secs(2));
    assert_eq!(policy.delay(3), Duration::from_secs(4));
    assert_eq!(policy.delay(4), Duration::from_secs(8));
    assert_eq!(policy.delay(5), Duration::from_secs(16));
    assert_eq!(policy.delay(6), Duration::from_secs(30), "capped at 30 s");
}

#[tokio::test(start_paused = true)]
async fn transient_errors_retry_until_success() {
    let attempts = Arc::new(Mutex::new(0u32));
    let counter = attempts.clone();

    let result = with_backoff(BackoffPolicy::default(), "describe", move || {
        let counter = counter.clone();
        async move {
            let mut n = counter.lock();
            *n += 1;
            if *n < 3 {
                Err(ProviderError::transient("flaky"))
            } else {
                Ok(*n)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(*attempts.lock(), 3);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_after_max_attempts() {
    let attempts = Arc::new(Mutex::new(0u32));
    let counter = attempts.clone();

    let result: Result<(), _> = with_backoff(BackoffPolicy::default(), "start", move || {
        let counter = counter.clone();
        async move {
            *counter.lock() += 1;
            Err(ProviderError::new(ProviderErrorKind::Throttled, "slow down"))
        }
    })
    .await;

    assert_eq!(result.unwrap_err().kind, ProviderErrorKind::Throttled);
    assert_eq!(*attempts.lock(), 5);
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_do_not_retry() {
    let attempts = Arc::new(Mutex::new(0u32));
    let counter = attempts.clone();

    let result: Result<(), _> = with_backoff(BackoffPolicy::default(), "launch", move || {
        let counter = counter.clone();
        async move {
            *counter.lock() += 1;
            Err(ProviderError::new(ProviderErrorKind::Permanent, "bad template"))
        }
    })
    .await;

    assert_eq!(result.unwrap_err().kind, ProviderErrorKind::Permanent);
    assert_eq!(*attempts.lock(), 1);
}

#[tokio::test(start_paused = true)]
async fn capacity_errors_surface_immediately() {
    let result: Result<(), _> = with_backoff(BackoffPolicy::default(), "start", || async {
        Err(ProviderError::new(ProviderErrorKind::CapacityUnavailable, "no capacity"))
    })
    .await;

    assert_eq!(result.unwrap_err().kind, ProviderErrorKind::CapacityUnavailable);
}
