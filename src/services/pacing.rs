// src/services/pacing.rs

//! Per-host request pacing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::CrawlerConfig;

type Clock = Arc<Mutex<Option<Instant>>>;

/// Keeps a minimum gap between request starts to the same host.
///
/// Each host has its own clock; requests to different hosts never wait on
/// each other.
#[derive(Debug, Default)]
pub struct HostPacer {
    delay: Duration,
    jitter_ms: u64,
    clocks: Mutex<HashMap<String, Clock>>,
}

impl HostPacer {
    pub fn new(delay: Duration, jitter_ms: u64) -> Self {
        Self {
            delay,
            jitter_ms,
            clocks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.request_delay(), config.request_jitter_ms)
    }

    fn gap(&self) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            fastrand::u64(0..=self.jitter_ms)
        } else {
            0
        };
        self.delay + Duration::from_millis(jitter)
    }

    /// Wait until `host` may be contacted again, then claim the slot.
    pub async fn wait_turn(&self, host: &str) {
        if self.delay.is_zero() && self.jitter_ms == 0 {
            return;
        }

        let clock = {
            let mut clocks = self.clocks.lock().await;
            clocks.entry(host.to_string()).or_default().clone()
        };

        let mut last = clock.lock().await;
        if let Some(previous) = *last {
            let ready = previous + self.gap();
            if ready > Instant::now() {
                log::trace!("Pacing {host}: waiting {:?}", ready - Instant::now());
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_same_host_is_spaced() {
        let pacer = HostPacer::new(Duration::from_millis(500), 0);
        let start = Instant::now();

        pacer.wait_turn("www.zoominfo.com").await;
        pacer.wait_turn("www.zoominfo.com").await;
        pacer.wait_turn("www.zoominfo.com").await;

        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_clock() {
        let pacer = Arc::new(HostPacer::new(Duration::from_millis(500), 0));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                let starts = Arc::clone(&starts);
                tokio::spawn(async move {
                    pacer.wait_turn("same.host").await;
                    starts.lock().await.push(Instant::now());
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut starts = starts.lock().await.clone();
        starts.sort();
        assert_eq!(starts.len(), 5);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_are_independent() {
        let pacer = HostPacer::new(Duration::from_millis(500), 0);
        let start = Instant::now();

        pacer.wait_turn("a.example").await;
        pacer.wait_turn("b.example").await;

        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_stays_in_range() {
        let pacer = HostPacer::new(Duration::from_millis(100), 50);
        let start = Instant::now();

        pacer.wait_turn("a.example").await;
        pacer.wait_turn("a.example").await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed <= Duration::from_millis(151));
    }

    #[tokio::test]
    async fn test_zero_delay_never_waits() {
        let pacer = HostPacer::default();
        let start = Instant::now();
        for _ in 0..10 {
            pacer.wait_turn("a.example").await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
