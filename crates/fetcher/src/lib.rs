//! Polite, retrying HTTPS GET (spec §4.3).

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use realtor_core::FetchResult;

const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after {attempts} attempts: {source}")]
    Network {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("permanent HTTP status {status}")]
    PermanentStatus { status: u16 },
    #[error("exhausted {attempts} attempts with retryable status {status}")]
    RetriesExhausted { attempts: u32, status: u16 },
    #[error("invalid proxy url: {0}")]
    InvalidProxy(String),
}

/// Builds and caches one `reqwest::Client` per distinct proxy configuration
/// so every worker reuses pooled connections (spec §5's "shared HTTP
/// client"), while still letting the proxy pool vary which gateway a given
/// fetch goes through.
pub struct Fetcher {
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client_for(&self, proxy: Option<&str>) -> Result<Client, FetchError> {
        let key = proxy.map(str::to_string);
        let mut clients = self.clients.lock().await;
        if let Some(c) = clients.get(&key) {
            return Ok(c.clone());
        }
        let mut builder = Client::builder().use_rustls_tls();
        if let Some(p) = proxy {
            let proxy = reqwest::Proxy::all(p).map_err(|e| FetchError::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| FetchError::Network {
            attempts: 0,
            source: e,
        })?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Issues the GET, retrying up to `retry_limit` total attempts on
    /// retryable statuses or transport errors, with linear backoff
    /// `0.5 * (attempt + 1)` seconds (spec §4.3). Proxy health feedback is
    /// the caller's responsibility based on the final `Result` — a fully
    /// successful fetch means success, a final failure means failure; no
    /// per-attempt adjustment.
    pub async fn fetch(
        &self,
        url: &str,
        proxy: Option<&str>,
        headers: HeaderMap,
        timeout: Duration,
        retry_limit: u32,
    ) -> Result<FetchResult, FetchError> {
        let client = self.client_for(proxy).await?;
        let retry_limit = retry_limit.max(1);

        for attempt in 0..retry_limit {
            let result = client
                .get(url)
                .headers(headers.clone())
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let final_url = resp.url().to_string();
                    if RETRYABLE_STATUSES.contains(&status) {
                        if attempt + 1 == retry_limit {
                            return Err(FetchError::RetriesExhausted {
                                attempts: retry_limit,
                                status,
                            });
                        }
                        warn!(url, status, attempt, "retryable status, backing off");
                        sleep_backoff(attempt).await;
                        continue;
                    }
                    if !(200..300).contains(&status) {
                        return Err(FetchError::PermanentStatus { status });
                    }
                    let body = resp.text().await.map_err(|e| FetchError::Network {
                        attempts: attempt + 1,
                        source: e,
                    })?;
                    debug!(url, status, attempt, "fetch succeeded");
                    return Ok(FetchResult {
                        status,
                        body,
                        final_url,
                    });
                }
                Err(e) => {
                    if attempt + 1 == retry_limit {
                        return Err(FetchError::Network {
                            attempts: retry_limit,
                            source: e,
                        });
                    }
                    warn!(url, attempt, error = %e, "transport error, backing off");
                    sleep_backoff(attempt).await;
                }
            }
        }
        unreachable!("loop always returns before exhausting retry_limit iterations")
    }
}

async fn sleep_backoff(attempt: u32) {
    let secs = 0.5 * (attempt as f64 + 1.0);
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use realtor_fingerprint::{build_headers, CuratedUserAgents};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn retries_503_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/listing", server.uri());
        let headers = build_headers(&CuratedUserAgents);
        let result = fetcher
            .fetch(&url, None, headers, Duration::from_secs(5), 5)
            .await
            .expect("should eventually succeed");
        assert_eq!(result.status, 200);
        assert_eq!(result.body, "ok");
    }

    #[tokio::test]
    async fn exhausts_retry_limit_on_persistent_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .respond_with(ResponseTemplate::new(503))
            .expect(5)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/listing", server.uri());
        let headers = build_headers(&CuratedUserAgents);
        let err = fetcher
            .fetch(&url, None, headers, Duration::from_secs(5), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::RetriesExhausted { attempts: 5, status: 503 }
        ));
    }

    #[tokio::test]
    async fn permanent_4xx_fails_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/listing", server.uri());
        let headers = build_headers(&CuratedUserAgents);
        let err = fetcher
            .fetch(&url, None, headers, Duration::from_secs(5), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::PermanentStatus { status: 404 }));
    }
}
