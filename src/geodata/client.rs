//! Shared HTTP plumbing for the geodata resolvers

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use serde::de::DeserializeOwned;

use super::{FetchFailure, FetchResult};
use crate::config::ServicesConfig;

/// Build the HTTP client used by every resolver
///
/// Transient failures (connection errors, 5xx, 429) are retried with
/// exponential backoff up to `max_retries` times.
pub fn build_client(services: &ServicesConfig) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .user_agent(services.user_agent.clone())
        .build()
        .context("Failed to create HTTP client")?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(services.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Run `request` under an overall deadline, retries included
pub async fn with_timeout<T, F>(service: &'static str, limit: Duration, request: F) -> FetchResult<T>
where
    F: Future<Output = FetchResult<T>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(FetchFailure::new(
            service,
            format!("timed out after {}s", limit.as_secs()),
        )),
    }
}

/// Check the status and decode a JSON body
pub async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> FetchResult<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(FetchFailure::new(
            service,
            format!("HTTP {status}: {}", truncate(&error_text, 200)),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchFailure::new(service, format!("failed to read body: {e}")))?;

    serde_json::from_slice(&body)
        .map_err(|e| FetchFailure::new(service, format!("malformed payload: {e}")))
}

/// Map a transport error into a resolver failure
pub fn transport_failure(service: &'static str, error: reqwest_middleware::Error) -> FetchFailure {
    FetchFailure::new(service, format!("request failed: {error}"))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_defaults() {
        assert!(build_client(&ServicesConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: FetchResult<()> = with_timeout("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.service, "slow");
        assert!(failure.reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout("fast", Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("São Paulo", 2), "Sã");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
