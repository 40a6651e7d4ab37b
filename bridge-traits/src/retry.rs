//! Retry/Backoff Policy
//!
//! Every network adapter funnels its requests through [`RetryPolicy::run`]. Transient
//! failures (timeouts, connection errors, 5xx, 429) are retried with bounded
//! exponential backoff, never shorter than the source's pacing delay. Anything
//! else is returned immediately. Running out of attempts yields
//! [`FetchError::Exhausted`], which callers treat as fatal for that one request.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::http::{HttpClient, HttpRequest};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
    /// Minimum gap between consecutive requests to the same source. Retries
    /// wait at least this long.
    pub pacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
            pacing: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            use_exponential_backoff: true,
            pacing: Duration::ZERO,
        }
    }

    /// Keep retries at least `pacing` apart.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = if self.use_exponential_backoff {
            let exponent = attempt.saturating_sub(1).min(16);
            self.base_delay
                .saturating_mul(2u32.pow(exponent))
                .min(self.max_delay)
        } else {
            self.base_delay.min(self.max_delay)
        };
        backoff.max(self.pacing)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts, what, "Executing request");

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        what,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed with retryable error"
                    );
                    sleep(delay).await;
                }
                Err(err) if err.is_retryable() => {
                    warn!(attempt, what, error = %err, "Retry attempts exhausted");
                    return Err(FetchError::Exhausted {
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    debug!(attempt, what, error = %err, "Request failed with fatal error");
                    return Err(err);
                }
            }
        }
    }
}

/// Execute `request` under `policy` and decode a JSON body.
///
/// Non-2xx statuses are classified with [`FetchError::from_status`]; a body that
/// does not decode as `T` is fatal.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &dyn HttpClient,
    request: HttpRequest,
    policy: &RetryPolicy,
) -> Result<T, FetchError> {
    let url = request.display_url();

    policy
        .run(&url, || {
            let request = request.clone();
            let url = &url;
            async move {
                let response = client.execute(request).await?;
                if !response.is_success() {
                    return Err(FetchError::from_status(
                        response.status,
                        format!("HTTP {} from {}", response.status, url),
                    ));
                }
                response
                    .json::<T>()
                    .map_err(|e| FetchError::fatal(format!("malformed response body: {}", e)))
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BridgeError, Result as BridgeResult};
    use crate::http::HttpResponse;
    use async_trait::async_trait;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Client {}

        #[async_trait]
        impl HttpClient for Client {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_delay_is_exponential_and_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_pacing_is_a_floor_for_backoff() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_secs(5))
            .with_pacing(Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(4), Duration::from_secs(1));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_out_pacing() {
        let mut client = MockClient::new();
        let mut calls = 0;
        client.expect_execute().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(response(503, ""))
            } else {
                Ok(response(200, "[]"))
            }
        });

        let policy = RetryPolicy::default().with_pacing(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        let value: Vec<u64> =
            fetch_json(&client, HttpRequest::get("https://example.test/demos"), &policy)
                .await
                .unwrap();

        assert!(value.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_status_classification() {
        assert!(FetchError::from_status(429, "slow down").is_retryable());
        assert!(FetchError::from_status(503, "unavailable").is_retryable());
        assert!(!FetchError::from_status(404, "missing").is_retryable());
        assert!(!FetchError::from_status(400, "bad").is_retryable());
        assert!(FetchError::from(BridgeError::Timeout("30s".into())).is_retryable());
        assert!(!FetchError::from(BridgeError::NotAvailable("x".into())).is_retryable());

        let exhausted = FetchError::Exhausted {
            attempts: 4,
            message: "HTTP 429".into(),
        };
        assert!(!exhausted.is_retryable());
        assert!(exhausted.is_temporary());
        assert!(FetchError::from_status(502, "bad gateway").is_temporary());
        assert!(!FetchError::from_status(404, "missing").is_temporary());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_request_is_retried_until_success() {
        let mut client = MockClient::new();
        let mut calls = 0;
        client.expect_execute().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Ok(response(429, ""))
            } else {
                Ok(response(200, r#"{"success": true}"#))
            }
        });

        let value: serde_json::Value = fetch_json(
            &client,
            HttpRequest::get("https://example.test/list"),
            &RetryPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(value["success"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_request_stops_at_ceiling() {
        let mut client = MockClient::new();
        client
            .expect_execute()
            .times(4)
            .returning(|_| Ok(response(429, "")));

        let result: std::result::Result<serde_json::Value, _> = fetch_json(
            &client,
            HttpRequest::get("https://example.test/list"),
            &RetryPolicy::default(),
        )
        .await;

        match result {
            Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected exhausted error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let mut client = MockClient::new();
        client
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, "")));

        let result: std::result::Result<serde_json::Value, _> = fetch_json(
            &client,
            HttpRequest::get("https://example.test/log/1"),
            &RetryPolicy::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(FetchError::Fatal {
                status: Some(404),
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried() {
        let mut client = MockClient::new();
        let mut calls = 0;
        client.expect_execute().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(BridgeError::Timeout("request timed out".into()))
            } else {
                Ok(response(200, "[]"))
            }
        });

        let value: Vec<u64> = fetch_json(
            &client,
            HttpRequest::get("https://example.test/demos"),
            &RetryPolicy::default(),
        )
        .await
        .unwrap();

        assert!(value.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_is_fatal() {
        let mut client = MockClient::new();
        client
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "<html>")));

        let result: std::result::Result<serde_json::Value, _> = fetch_json(
            &client,
            HttpRequest::get("https://example.test/list"),
            &RetryPolicy::default(),
        )
        .await;

        assert!(matches!(result, Err(FetchError::Fatal { status: None, .. })));
    }
}
