//! Health-scored egress endpoint pool (spec §4.2).
//!
//! A single small shared struct behind a `tokio::sync::Mutex`, in the same
//! spirit as the teacher's `CrawlFrontier` — no thread is ever blocked on it
//! for long, mutation is brief.

use std::time::{Duration, Instant};

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub url: String,
    pub score: f64,
    pub cooldown_until: Instant,
}

impl ProxyEndpoint {
    fn new(url: String) -> Self {
        Self {
            url,
            score: 1.0,
            cooldown_until: Instant::now(),
        }
    }
}

/// Constructed from an optional base proxy URL. Empty when none is
/// configured, in which case the fetcher makes direct requests.
pub struct ProxyPool {
    base_proxy_url: Option<String>,
    endpoints: Mutex<Vec<ProxyEndpoint>>,
}

impl ProxyPool {
    pub fn new(base_proxy_url: Option<String>) -> Self {
        let endpoints = base_proxy_url
            .clone()
            .map(|u| vec![ProxyEndpoint::new(u)])
            .unwrap_or_default();
        Self {
            base_proxy_url,
            endpoints: Mutex::new(endpoints),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.base_proxy_url.is_none()
    }

    /// Among endpoints off cooldown and above the health floor, weighted
    /// random sample by `max(0.01, score)`. With no such endpoint, fall back
    /// unconditionally to the base proxy URL (spec §4.2: a cooling endpoint
    /// is still preferred over a direct request once a pool exists).
    pub async fn select(&self) -> Option<String> {
        let endpoints = self.endpoints.lock().await;
        if endpoints.is_empty() {
            return None;
        }
        let now = Instant::now();
        let available: Vec<&ProxyEndpoint> = endpoints
            .iter()
            .filter(|e| e.cooldown_until <= now && e.score > 0.05)
            .collect();
        if available.is_empty() {
            return self.base_proxy_url.clone();
        }
        let weights: Vec<f64> = available.iter().map(|e| e.score.max(0.01)).collect();
        let dist = match WeightedIndex::new(&weights) {
            Ok(d) => d,
            Err(_) => return self.base_proxy_url.clone(),
        };
        let idx = dist.sample(&mut rand::thread_rng());
        Some(available[idx].url.clone())
    }

    pub async fn mark_success(&self, endpoint_url: &str) {
        let mut endpoints = self.endpoints.lock().await;
        if let Some(e) = endpoints.iter_mut().find(|e| e.url == endpoint_url) {
            e.score = (e.score + 0.05).min(1.0);
            debug!(url = %endpoint_url, score = e.score, "proxy marked success");
        }
    }

    pub async fn mark_failure(&self, endpoint_url: &str) {
        let mut endpoints = self.endpoints.lock().await;
        if let Some(e) = endpoints.iter_mut().find(|e| e.url == endpoint_url) {
            e.score = (e.score - 0.2).max(0.0);
            let cooldown_s = rand::thread_rng().gen_range(5.0..20.0);
            e.cooldown_until = Instant::now() + Duration::from_secs_f64(cooldown_s);
            debug!(url = %endpoint_url, score = e.score, cooldown_s, "proxy marked failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_pool_selects_nothing() {
        let pool = ProxyPool::new(None);
        assert!(pool.is_empty());
        assert_eq!(pool.select().await, None);
    }

    #[tokio::test]
    async fn single_endpoint_pool_always_selects_it() {
        let pool = ProxyPool::new(Some("http://proxy.example:8080".to_string()));
        assert_eq!(
            pool.select().await,
            Some("http://proxy.example:8080".to_string())
        );
    }

    #[tokio::test]
    async fn score_stays_in_unit_interval_and_cooldown_is_bounded() {
        let url = "http://proxy.example:8080".to_string();
        let pool = ProxyPool::new(Some(url.clone()));
        for _ in 0..50 {
            pool.mark_failure(&url).await;
        }
        let endpoints = pool.endpoints.lock().await;
        let e = &endpoints[0];
        assert!((0.0..=1.0).contains(&e.score));
        let until_next = e.cooldown_until.saturating_duration_since(Instant::now());
        assert!(until_next <= Duration::from_secs(20));
        drop(endpoints);

        for _ in 0..50 {
            pool.mark_success(&url).await;
        }
        let endpoints = pool.endpoints.lock().await;
        assert_eq!(endpoints[0].score, 1.0);
    }

    #[tokio::test]
    async fn failure_marks_cooldown_at_least_five_seconds_out() {
        let url = "http://proxy.example:8080".to_string();
        let pool = ProxyPool::new(Some(url.clone()));
        pool.mark_failure(&url).await;
        let endpoints = pool.endpoints.lock().await;
        let remaining = endpoints[0].cooldown_until.saturating_duration_since(Instant::now());
        assert!(remaining >= Duration::from_secs(4)); // allow scheduling jitter
        assert!(remaining <= Duration::from_secs(20));
    }
}
