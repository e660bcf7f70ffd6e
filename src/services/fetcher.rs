// src/services/fetcher.rs

//! Fetch controller: paced, retried HTTP fetches with typed failures.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::Result;
use crate::models::{CrawlerConfig, FetchFailure, FetchFailureReason, ProfileRequest, RawPage};
use crate::services::pacing::HostPacer;
use crate::utils::http::{create_async_client, retry_after_secs};

/// Body fragments of bot-check and access-denied interstitials.
const BLOCK_MARKERS: [&str; 6] = [
    "px-captcha",
    "/cdn-cgi/challenge-platform",
    "please verify you are a human",
    "are you a robot",
    "access to this page has been denied",
    "unusual activity from your computer network",
];

/// Source of raw profile pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page, counting every attempt on `request`.
    async fn fetch(&self, request: &mut ProfileRequest)
    -> std::result::Result<RawPage, FetchFailure>;
}

/// Outcome of a single HTTP attempt that did not produce a page.
#[derive(Debug)]
enum AttemptError {
    Retryable {
        reason: FetchFailureReason,
        detail: String,
        retry_after: Option<Duration>,
    },
    Fatal {
        reason: FetchFailureReason,
        detail: String,
    },
}

impl AttemptError {
    fn retryable(reason: FetchFailureReason, detail: impl Into<String>) -> Self {
        AttemptError::Retryable {
            reason,
            detail: detail.into(),
            retry_after: None,
        }
    }

    fn fatal(reason: FetchFailureReason, detail: impl Into<String>) -> Self {
        AttemptError::Fatal {
            reason,
            detail: detail.into(),
        }
    }
}

fn classify_transport(err: &reqwest::Error) -> AttemptError {
    if err.is_timeout() {
        AttemptError::retryable(FetchFailureReason::Timeout, err.to_string())
    } else if err.is_decode() || err.is_builder() || err.is_redirect() {
        AttemptError::fatal(FetchFailureReason::NetworkError, err.to_string())
    } else {
        AttemptError::retryable(FetchFailureReason::NetworkError, err.to_string())
    }
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> AttemptError {
    let detail = format!("HTTP {status}");
    match status.as_u16() {
        429 => AttemptError::Retryable {
            reason: FetchFailureReason::Blocked,
            detail,
            retry_after,
        },
        500..=599 => AttemptError::Retryable {
            reason: FetchFailureReason::NetworkError,
            detail,
            retry_after,
        },
        404 | 410 => AttemptError::fatal(FetchFailureReason::NotFound, detail),
        401 | 403 => AttemptError::fatal(FetchFailureReason::Blocked, detail),
        _ => AttemptError::fatal(FetchFailureReason::NetworkError, detail),
    }
}

fn is_block_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    BLOCK_MARKERS.iter().any(|m| lower.contains(m))
}

/// [`PageFetcher`] over HTTP with per-host pacing and bounded retries.
pub struct HttpFetcher {
    client: Client,
    pacer: HostPacer,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        Ok(Self::with_client(client, config))
    }

    /// Use a pre-built client, e.g. one with a short test timeout.
    pub fn with_client(client: Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            pacer: HostPacer::from_config(config),
            max_attempts: config.max_retries.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Wait after failed attempt number `attempt` (1-based).
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }

    /// One GET. On success returns the status, the URL the body was served
    /// from, and the body.
    async fn attempt(
        &self,
        url: &Url,
    ) -> std::result::Result<(u16, String, String), AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers()).map(Duration::from_secs);
            return Err(classify_status(status, retry_after));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&e))?;

        if is_block_page(&body) {
            return Err(AttemptError::fatal(
                FetchFailureReason::Blocked,
                "bot-check interstitial served instead of the page",
            ));
        }

        Ok((status.as_u16(), final_url, body))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &mut ProfileRequest,
    ) -> std::result::Result<RawPage, FetchFailure> {
        let url = match Url::parse(request.url()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
                url
            }
            _ => {
                return Err(FetchFailure {
                    reason: FetchFailureReason::NetworkError,
                    attempts: request.attempt_count(),
                    detail: format!("invalid URL '{}'", request.url()),
                });
            }
        };
        let host = url.host_str().unwrap_or_default().to_string();

        loop {
            self.pacer.wait_turn(&host).await;
            let attempt = request.record_attempt();
            log::debug!("GET {url} (attempt {attempt}/{})", self.max_attempts);

            match self.attempt(&url).await {
                Ok((status, final_url, html_content)) => {
                    if final_url != url.as_str() {
                        log::debug!("{} redirected to {}", request.url(), final_url);
                    }
                    return Ok(RawPage {
                        url: request.url().to_string(),
                        final_url,
                        html_content,
                        status,
                        fetched_at: Utc::now(),
                        attempts: attempt,
                    });
                }
                Err(AttemptError::Fatal { reason, detail }) => {
                    return Err(FetchFailure {
                        reason,
                        attempts: attempt,
                        detail,
                    });
                }
                Err(AttemptError::Retryable {
                    reason,
                    detail,
                    retry_after,
                }) => {
                    if attempt >= self.max_attempts {
                        return Err(FetchFailure {
                            reason,
                            attempts: attempt,
                            detail,
                        });
                    }

                    let backoff = self.backoff(attempt);
                    let wait = retry_after
                        .map_or(backoff, |ra| ra.max(backoff))
                        .min(self.backoff_max);
                    log::warn!(
                        "{} failed: {} (attempt {}/{}), retrying in {:.1}s",
                        request.url(),
                        detail,
                        attempt,
                        self.max_attempts,
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROFILE_PATH: &str = "/c/acme/1";

    fn test_config(max_retries: u32) -> CrawlerConfig {
        CrawlerConfig {
            request_delay_ms: 0,
            request_jitter_ms: 0,
            max_retries,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            ..CrawlerConfig::default()
        }
    }

    fn fetcher(max_retries: u32) -> HttpFetcher {
        HttpFetcher::new(&test_config(max_retries)).unwrap()
    }

    fn request(server: &MockServer) -> ProfileRequest {
        ProfileRequest::new(format!("{}{}", server.uri(), PROFILE_PATH))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = CrawlerConfig {
            backoff_base_ms: 100,
            backoff_max_ms: 500,
            ..CrawlerConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.backoff(1), Duration::from_millis(100));
        assert_eq!(fetcher.backoff(2), Duration::from_millis(200));
        assert_eq!(fetcher.backoff(3), Duration::from_millis(400));
        assert_eq!(fetcher.backoff(4), Duration::from_millis(500));
        assert_eq!(fetcher.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_block_page_detection() {
        assert!(is_block_page("<div id=\"px-captcha\"></div>"));
        assert!(is_block_page("Please verify you are a human"));
        assert!(!is_block_page("<h1>Immersed Games</h1>"));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Acme</h1>"))
            .mount(&server)
            .await;

        let mut req = request(&server);
        let page = fetcher(3).fetch(&mut req).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.attempts, 1);
        assert_eq!(page.html_content, "<h1>Acme</h1>");
        assert!(!page.was_redirected());
        assert_eq!(req.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_redirect_target_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", format!("{}/", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Welcome</h1>"))
            .mount(&server)
            .await;

        let mut req = request(&server);
        let page = fetcher(3).fetch(&mut req).await.unwrap();

        assert_eq!(page.url, req.url());
        assert_eq!(page.final_url, format!("{}/", server.uri()));
        assert!(page.was_redirected());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_paced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(4)
            .mount(&server)
            .await;

        let config = CrawlerConfig {
            request_delay_ms: 100,
            ..test_config(1)
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let mut requests: Vec<ProfileRequest> = (0..4)
            .map(|i| ProfileRequest::new(format!("{}/c/acme-{i}/{i}", server.uri())))
            .collect();

        let start = std::time::Instant::now();
        let pages = futures::future::join_all(requests.iter_mut().map(|r| fetcher.fetch(r))).await;

        assert!(pages.iter().all(|p| p.is_ok()));
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_retries_until_recovered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let mut req = request(&server);
        let page = fetcher(3).fetch(&mut req).await.unwrap();

        assert_eq!(page.attempts, 3);
        assert_eq!(req.attempt_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let mut req = request(&server);
        let failure = fetcher(3).fetch(&mut req).await.unwrap_err();

        assert_eq!(failure.reason, FetchFailureReason::NetworkError);
        assert_eq!(failure.attempts, 3);
    }

    #[tokio::test]
    async fn test_rate_limited_until_exhausted_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .mount(&server)
            .await;

        let mut req = request(&server);
        let failure = fetcher(2).fetch(&mut req).await.unwrap_err();

        assert_eq!(failure.reason, FetchFailureReason::Blocked);
        assert_eq!(failure.attempts, 2);
    }

    #[tokio::test]
    async fn test_not_found_fails_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(&server);
        let failure = fetcher(3).fetch(&mut req).await.unwrap_err();

        assert_eq!(failure.reason, FetchFailureReason::NotFound);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_forbidden_and_captcha_are_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c/captcha/2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<div id=\"px-captcha\"></div>"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher(3);

        let mut req = request(&server);
        let failure = fetcher.fetch(&mut req).await.unwrap_err();
        assert_eq!(failure.reason, FetchFailureReason::Blocked);
        assert_eq!(failure.attempts, 1);

        let mut req = ProfileRequest::new(format!("{}/c/captcha/2", server.uri()));
        let failure = fetcher.fetch(&mut req).await.unwrap_err();
        assert_eq!(failure.reason, FetchFailureReason::Blocked);
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let fetcher = HttpFetcher::with_client(client, &test_config(2));

        let mut req = request(&server);
        let failure = fetcher.fetch(&mut req).await.unwrap_err();

        assert_eq!(failure.reason, FetchFailureReason::Timeout);
        assert_eq!(failure.attempts, 2);
    }

    #[tokio::test]
    async fn test_invalid_url_is_network_error() {
        let mut req = ProfileRequest::new("not a url");
        let failure = fetcher(3).fetch(&mut req).await.unwrap_err();
        assert_eq!(failure.reason, FetchFailureReason::NetworkError);
        assert_eq!(failure.attempts, 0);
    }
}
