use std::future::Future;
use std::time::Duration;

use serde::Serialize;

/// Bounded retry schedule: `max_retries` re-attempts after the first try,
/// with the delay doubling from `initial_backoff` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

/// Runs `op` up to `max_retries + 1` times. The delay doubles after every
/// failed attempt; the last error propagates once the budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempts_left = policy.max_retries;
    let mut delay = policy.initial_backoff;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempts_left == 0 => return Err(err),
            Err(err) => {
                tracing::warn!(
                    attempts_left,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "request failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempts_left -= 1;
                delay *= 2;
            }
        }
    }
}

/// POSTs `body` as JSON, treating network errors and non-2xx statuses as
/// retryable failures under `policy`.
pub async fn post_json<B>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    policy: &RetryPolicy,
) -> anyhow::Result<reqwest::Response>
where
    B: Serialize + ?Sized,
{
    retry_with_backoff(policy, || async {
        let response = client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("request to {url} failed with status {status}");
        }
        Ok(response)
    })
    .await
}
