//! HTTP transport shared by the adapters: one thin reqwest wrapper that
//! retries connection-level failures and retryable status codes with
//! exponential backoff, and exposes status, headers and body to the caller.
//! This retry is orthogonal to the page-level retry in the orchestrator.

use crate::Result;
use crate::fetch::error::FetchError;
use bytes::Bytes;
use core::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};

const LOG_TARGET: &str = "  transport";

/// Status codes retried at the transport level before the adapter ever sees them.
pub const RETRY_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// One HTTP exchange as the adapters see it.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Read a numeric header, e.g. rate-limit quota feedback.
    #[must_use]
    pub fn header_u64(&self, name: &str) -> Option<u64> {
        self.headers.get(name)?.to_str().ok()?.parse().ok()
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    retries: u32,
    backoff: Duration,
}

impl HttpTransport {
    pub fn new(user_agent: &str, access_token: Option<&str>, timeout: Duration, retries: u32, backoff: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = access_token {
            let mut auth_val = HeaderValue::from_str(&format!("Bearer {token}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(reqwest::header::AUTHORIZATION, auth_val);
        }

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, retries, backoff })
    }

    /// Issue a GET request. Connection failures and `RETRY_CODES` responses
    /// are retried up to the configured count with exponential backoff; an
    /// exhausted budget surfaces as `FetchError::Transient`. All other
    /// responses are returned as-is for the adapter to classify.
    pub async fn get(&self, url: &str, query: &[(&str, String)], headers: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        let mut attempt = 0u32;
        loop {
            let retryable = match self.try_get(url, query, headers).await {
                Ok(response) if !RETRY_CODES.contains(&response.status.as_u16()) => return Ok(response),
                Ok(response) => Ok(response),
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => Err(e),
                Err(e) => {
                    return Err(FetchError::Transient {
                        status: None,
                        message: format!("request to '{url}' failed: {e}"),
                    });
                }
            };

            if attempt >= self.retries {
                return Err(match retryable {
                    Ok(response) => FetchError::Transient {
                        status: Some(response.status.as_u16()),
                        message: format!("'{url}' still answers HTTP {} after {} retries", response.status, self.retries),
                    },
                    Err(e) => FetchError::Transient {
                        status: None,
                        message: format!("request to '{url}' failed after {} retries: {e}", self.retries),
                    },
                });
            }

            let wait = self.backoff * 2u32.pow(attempt);
            log::debug!(
                target: LOG_TARGET,
                "request to '{url}' must be retried ({}), waiting {:.1} seconds...",
                match &retryable {
                    Ok(response) => format!("HTTP {}", response.status),
                    Err(e) => e.to_string(),
                },
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    async fn try_get(&self, url: &str, query: &[(&str, String)], headers: &[(&str, &str)]) -> reqwest::Result<HttpResponse> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_u64_parses_quota_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("29"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("not a number"));
        let response = HttpResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
        };

        assert_eq!(response.header_u64("x-ratelimit-remaining"), Some(29));
        assert_eq!(response.header_u64("x-ratelimit-reset"), None);
        assert_eq!(response.header_u64("absent"), None);
    }

    #[test]
    fn test_body_text_is_lossy() {
        let response = HttpResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"rate limit exceeded"),
        };
        assert_eq!(response.body_text(), "rate limit exceeded");
    }
}
