// src/pipeline/orchestrator.rs

//! Pipeline orchestrator.
//!
//! Drives every request through fetch, parse and normalize under a
//! concurrency limit and hands back one result per request, in input order.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{
    CircuitBreakerConfig, Config, ExtractionResult, Failure, FailureKind, ProfileRequest, RawPage,
};
use crate::pipeline::circuit_breaker::CircuitBreaker;
use crate::pipeline::state::{RequestState, RequestTracker};
use crate::services::{Normalizer, PageFetcher, ProfileParser};

/// Parse and normalize one fetched page.
pub fn extract_page(
    parser: &ProfileParser,
    normalizer: &Normalizer,
    page: &RawPage,
) -> ExtractionResult {
    let mut tracker = RequestTracker::new(&page.url);
    tracker.advance(RequestState::Fetching);
    tracker.advance(RequestState::Fetched);
    extract_tracked(parser, normalizer, page, &mut tracker)
}

fn extract_tracked(
    parser: &ProfileParser,
    normalizer: &Normalizer,
    page: &RawPage,
    tracker: &mut RequestTracker,
) -> ExtractionResult {
    let failed = |kind| {
        ExtractionResult::Failed(Failure {
            url: page.url.clone(),
            kind,
        })
    };

    tracker.advance(RequestState::Parsing);
    let fields = match parser.parse(page) {
        Ok(fields) => fields,
        Err(failure) => {
            tracker.advance(RequestState::ParseFailed);
            return failed(FailureKind::Parse(failure));
        }
    };
    tracker.advance(RequestState::Parsed);

    tracker.advance(RequestState::Normalizing);
    match normalizer.normalize(&fields) {
        Ok(record) => {
            tracker.advance(RequestState::Completed);
            ExtractionResult::Completed(Box::new(record))
        }
        Err(failure) => {
            tracker.advance(RequestState::NormalizeFailed);
            failed(FailureKind::Normalize(failure))
        }
    }
}

/// Runs profile requests through the fetch, parse and normalize stages.
pub struct ProfilePipeline<F: PageFetcher> {
    fetcher: F,
    parser: ProfileParser,
    normalizer: Normalizer,
    breaker: CircuitBreakerConfig,
}

impl<F: PageFetcher> ProfilePipeline<F> {
    pub fn new(fetcher: F, config: &Config) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser: ProfileParser::new()?,
            normalizer: Normalizer::from_config(&config.normalize),
            breaker: config.circuit_breaker.clone(),
        })
    }

    async fn process(&self, mut request: ProfileRequest) -> ExtractionResult {
        let url = request.url().to_string();
        let mut tracker = RequestTracker::new(&url);

        tracker.advance(RequestState::Fetching);
        let page = match self.fetcher.fetch(&mut request).await {
            Ok(page) => page,
            Err(failure) => {
                tracker.advance(RequestState::FetchFailed);
                return ExtractionResult::Failed(Failure {
                    url: url.clone(),
                    kind: FailureKind::Fetch(failure),
                });
            }
        };
        tracker.advance(RequestState::Fetched);

        extract_tracked(&self.parser, &self.normalizer, &page, &mut tracker)
    }

    /// Process all requests and return their results in input order.
    ///
    /// Cancelling `cancel` stops new work; requests that had not finished
    /// come back as [`ExtractionResult::Cancelled`]. Returns
    /// `AppError::NetworkUnavailable` when the circuit breaker trips.
    pub async fn run(
        &self,
        requests: Vec<ProfileRequest>,
        concurrency_limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExtractionResult>> {
        let total = requests.len();
        let concurrency = concurrency_limit.max(1);
        let run_token = cancel.child_token();
        let mut breaker = CircuitBreaker::with_config(self.breaker.clone());

        log::info!("Processing {total} profile(s) with concurrency {concurrency}");

        let mut slots: Vec<Option<ExtractionResult>> = (0..total).map(|_| None).collect();
        let mut results = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| {
                let token = run_token.clone();
                async move {
                    let url = request.url().to_string();
                    let result = tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            log::debug!("{url}: cancelled");
                            ExtractionResult::Cancelled { url }
                        }
                        result = self.process(request) => result,
                    };
                    (index, result)
                }
            })
            .buffer_unordered(concurrency);

        let mut done = 0;
        while let Some((index, result)) = results.next().await {
            done += 1;
            match &result {
                ExtractionResult::Completed(_) => {
                    log::info!("[{done}/{total}] {}: completed", result.url());
                }
                ExtractionResult::Failed(failure) => {
                    log::warn!(
                        "[{done}/{total}] {}: {} failed ({}): {}",
                        failure.url,
                        failure.stage().as_str(),
                        failure.reason(),
                        failure.detail()
                    );
                }
                ExtractionResult::Cancelled { .. } => {}
            }

            if let Err(err) = breaker.validate(&result) {
                run_token.cancel();
                return Err(err);
            }
            slots[index] = Some(result);
        }

        if cancel.is_cancelled() {
            let finished = slots
                .iter()
                .flatten()
                .filter(|r| !matches!(r, ExtractionResult::Cancelled { .. }))
                .count();
            log::warn!("Run cancelled after {finished}/{total} request(s) finished");
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::AppError;
    use crate::models::{FetchFailure, FetchFailureReason, ParseFailureReason};

    fn profile_url(i: usize) -> String {
        format!("https://www.zoominfo.com/c/company-{i}/{}", 1000 + i)
    }

    fn profile_html(url: &str, name: &str) -> String {
        format!(
            r#"<html><head><link rel="canonical" href="{url}"></head>
            <body><h1>{name}</h1>
            <div data-qa="employees"><span class="value">51-200 employees</span></div>
            <div data-qa="revenue"><span class="value">$12M</span></div>
            </body></html>"#
        )
    }

    #[derive(Clone)]
    enum Reply {
        Page(String),
        Fail(FetchFailureReason),
        Hang,
    }

    /// Serves canned replies, finishing later requests first.
    struct StubFetcher {
        replies: HashMap<String, Reply>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl StubFetcher {
        fn new(replies: impl IntoIterator<Item = (String, Reply)>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(
            &self,
            request: &mut ProfileRequest,
        ) -> std::result::Result<RawPage, FetchFailure> {
            let attempts = request.record_attempt();
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let reply = self.replies.get(request.url()).cloned();
            let id: u64 = request
                .url()
                .rsplit('/')
                .next()
                .and_then(|tail| tail.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(100 - id % 50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match reply {
                Some(Reply::Page(html)) => Ok(RawPage {
                    attempts,
                    ..RawPage::from_html(request.url(), html)
                }),
                Some(Reply::Fail(reason)) => Err(FetchFailure {
                    reason,
                    attempts,
                    detail: "stubbed".into(),
                }),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hung fetch should be cancelled")
                }
                None => Err(FetchFailure {
                    reason: FetchFailureReason::NotFound,
                    attempts,
                    detail: "no stub".into(),
                }),
            }
        }
    }

    fn pipeline(fetcher: StubFetcher, threshold: usize) -> ProfilePipeline<StubFetcher> {
        let mut config = Config::default();
        config.circuit_breaker.failure_threshold = threshold;
        ProfilePipeline::new(fetcher, &config).unwrap()
    }

    fn mixed_replies(n: usize) -> Vec<(String, Reply)> {
        (0..n)
            .map(|i| {
                let url = profile_url(i);
                let reply = match i % 4 {
                    1 => Reply::Fail(FetchFailureReason::NotFound),
                    2 => Reply::Page("<html><body><h1>Welcome</h1></body></html>".into()),
                    _ => Reply::Page(profile_html(&url, &format!("Company {i}"))),
                };
                (url, reply)
            })
            .collect()
    }

    fn requests(n: usize) -> Vec<ProfileRequest> {
        (0..n).map(|i| ProfileRequest::new(profile_url(i))).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_input_order() {
        let pipeline = pipeline(StubFetcher::new(mixed_replies(12)), 5);
        let results = pipeline
            .run(requests(12), 4, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 12);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.url(), profile_url(i));
        }

        let record = results[0].record().unwrap();
        assert_eq!(record.name.as_deref(), Some("Company 0"));
        assert_eq!(record.employees, Some(51));
        assert_eq!(record.revenue, Some(12_000_000.0));
        assert_eq!(record.revenue_currency.as_deref(), Some("USD"));

        let failure = results[2].failure().unwrap();
        assert!(matches!(
            &failure.kind,
            FailureKind::Parse(p) if p.reason == ParseFailureReason::NotAProfile
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_does_not_change_results() {
        let serial = pipeline(StubFetcher::new(mixed_replies(10)), 5)
            .run(requests(10), 1, &CancellationToken::new())
            .await
            .unwrap();
        let parallel = pipeline(StubFetcher::new(mixed_replies(10)), 5)
            .run(requests(10), 16, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(serial, parallel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_is_respected() {
        let fetcher = StubFetcher::new(mixed_replies(20));
        let peak = Arc::clone(&fetcher.peak);
        let pipeline = pipeline(fetcher, 5);

        pipeline
            .run(requests(20), 3, &CancellationToken::new())
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_finished_results() {
        let mut replies = mixed_replies(3);
        replies.push((profile_url(3), Reply::Hang));
        let pipeline = pipeline(StubFetcher::new(replies), 5);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            trigger.cancel();
        });

        let results = pipeline.run(requests(4), 4, &token).await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(results[0].is_completed());
        assert!(matches!(
            &results[3],
            ExtractionResult::Cancelled { url } if *url == profile_url(3)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let pipeline = pipeline(StubFetcher::new(mixed_replies(3)), 5);
        let token = CancellationToken::new();
        token.cancel();

        let results = pipeline.run(requests(3), 2, &token).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(
            results
                .iter()
                .all(|r| matches!(r, ExtractionResult::Cancelled { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_outage_trips_breaker() {
        let replies = (0..6).map(|i| (profile_url(i), Reply::Fail(FetchFailureReason::Timeout)));
        let pipeline = pipeline(StubFetcher::new(replies), 3);

        let err = pipeline
            .run(requests(6), 1, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NetworkUnavailable { consecutive: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_failures_do_not_trip_breaker() {
        let replies = (0..6).map(|i| (profile_url(i), Reply::Fail(FetchFailureReason::NotFound)));
        let pipeline = pipeline(StubFetcher::new(replies), 3);

        let results = pipeline
            .run(requests(6), 2, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.failure().is_some()));
    }

    #[test]
    fn test_extract_page_offline() {
        let parser = ProfileParser::new().unwrap();
        let normalizer = Normalizer::default();
        let url = profile_url(7);
        let page = RawPage::from_html(&url, profile_html(&url, "Immersed Games"));

        let result = extract_page(&parser, &normalizer, &page);
        let record = result.record().unwrap();
        assert_eq!(record.name.as_deref(), Some("Immersed Games"));
        assert_eq!(record.id.as_deref(), Some("1007"));
        assert_eq!(record.total_employees, Some(51));
    }
}
