//! Bounded polling for page state.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::{sleep, Instant};

use crate::error::ScrapeError;

/// Backoff schedule for `poll_until`.
///
/// Intervals double from `initial_interval` up to `max_interval`; polling
/// gives up once `timeout` has elapsed since the first probe.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaitPolicy {
    #[serde(with = "millis")]
    pub initial_interval: Duration,
    #[serde(with = "millis")]
    pub max_interval: Duration,
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(15),
        }
    }
}

impl WaitPolicy {
    pub fn new(initial_interval: Duration, max_interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_interval,
            max_interval,
            timeout,
        }
    }

    /// A policy that probes every `interval` until `timeout`.
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self::new(interval, interval, timeout)
    }
}

/// Poll `probe` until it yields `Some`, or fail with `RenderTimeout`.
///
/// The probe runs at least once even with a zero timeout.
pub async fn poll_until<T, F, Fut>(
    policy: &WaitPolicy,
    what: &'static str,
    mut probe: F,
) -> Result<T, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = Instant::now();
    let mut interval = policy.initial_interval;

    loop {
        if let Some(value) = probe().await {
            return Ok(value);
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            tracing::debug!(what, waited_ms = waited.as_millis() as u64, "Wait timed out");
            return Err(ScrapeError::RenderTimeout { what, waited });
        }

        sleep(interval.min(policy.timeout - waited)).await;
        interval = (interval * 2).min(policy.max_interval);
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_succeeds_after_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = WaitPolicy::fixed(Duration::from_millis(100), Duration::from_secs(5));

        let counter = calls.clone();
        let value = poll_until(&policy, "counter", move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                (n >= 3).then_some(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let policy = WaitPolicy::new(
            Duration::from_millis(100),
            Duration::from_millis(400),
            Duration::from_secs(2),
        );

        let result: Result<(), _> = poll_until(&policy, "never", || async { None }).await;

        match result {
            Err(ScrapeError::RenderTimeout { what, waited }) => {
                assert_eq!(what, "never");
                assert!(waited >= Duration::from_secs(2));
            }
            other => panic!("expected render timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_timeout_probes_once() {
        let policy = WaitPolicy::fixed(Duration::ZERO, Duration::ZERO);
        let value = poll_until(&policy, "immediate", || async { Some(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_policy_from_toml_millis() {
        let policy: WaitPolicy = toml::from_str("timeout = 500").unwrap();
        assert_eq!(policy.timeout, Duration::from_millis(500));
        assert_eq!(policy.initial_interval, WaitPolicy::default().initial_interval);
    }
}
