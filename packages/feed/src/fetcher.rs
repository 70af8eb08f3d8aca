//! HTTP retrieval of raw feed bytes.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use url::Url;

/// Client token sent with every feed request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; JobImporter/1.0)";

/// Whole-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest feed body accepted.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Why a feed could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid feed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request failed with status code {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Bodies larger than this are rejected.
    pub max_body_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Retrieves feed documents. No retries happen here; the task queue owns retry policy.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl FeedFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// GET the feed at `url` and return its body.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        tracing::info!("Fetching jobs from: {}", url);

        let mut response = self.client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| body_error(url, e))? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(bytes = body.len(), "Fetched feed from {}", url);

        Ok(body)
    }
}

fn body_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Body {
            url: url.to_string(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> FeedFetcher {
        FeedFetcher::new(&FetcherConfig::default()).expect("client builds")
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_client_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/feed")
            .match_header("user-agent", DEFAULT_USER_AGENT)
            .with_status(200)
            .with_body("<rss><channel></channel></rss>")
            .create_async()
            .await;

        let body = fetcher()
            .fetch(&format!("{}/feed", server.url()))
            .await
            .unwrap();

        assert_eq!(body, b"<rss><channel></channel></rss>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/feed")
            .with_status(503)
            .create_async()
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/feed")
            .with_status(200)
            .with_body("x".repeat(64))
            .create_async()
            .await;

        let config = FetcherConfig {
            max_body_bytes: 16,
            ..Default::default()
        };
        let err = FeedFetcher::new(&config)
            .expect("client builds")
            .fetch(&format!("{}/feed", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn test_invalid_urls_are_rejected_before_any_request() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));

        let err = fetcher().fetch("ftp://example.com/feed").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
