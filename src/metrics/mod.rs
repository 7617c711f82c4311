//! Platform performance metrics.
//!
//! Cumulative per-platform counters fed by the registry: one detection event
//! per detection-cascade hit, one fill event per fill attempt. The counters
//! feed adaptive routing and the administrative adapter listing. Updates are
//! applied only after a result is fully constructed, never incrementally
//! during field-filling, so cancellation between suspension points can not
//! leave a platform half-updated.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Point-in-time view of one platform's lifetime counters.
#[derive(Debug, Clone)]
pub struct PlatformStats {
    pub platform: String,
    pub detections: u64,
    pub successes: u64,
    pub failures: u64,
    pub confidence_sum: f64,
    pub observed_urls: usize,
}

impl PlatformStats {
    /// Total fill attempts recorded against this platform.
    pub fn attempts(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn success_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            0.0
        } else {
            self.successes as f64 / attempts as f64
        }
    }

    pub fn average_confidence(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            0.0
        } else {
            self.confidence_sum / attempts as f64
        }
    }
}

/// Snapshot across all platforms.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub platforms: Vec<PlatformStats>,
}

#[derive(Debug, Default)]
struct PlatformAccumulator {
    detections: u64,
    successes: u64,
    failures: u64,
    confidence_sum: f64,
    urls: HashSet<String>,
}

impl PlatformAccumulator {
    fn stats(&self, platform: &str) -> PlatformStats {
        PlatformStats {
            platform: platform.to_string(),
            detections: self.detections,
            successes: self.successes,
            failures: self.failures,
            confidence_sum: self.confidence_sum,
            observed_urls: self.urls.len(),
        }
    }
}

#[derive(Debug)]
struct MetricsState {
    started_at: DateTime<Utc>,
    platforms: HashMap<String, PlatformAccumulator>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            platforms: HashMap::new(),
        }
    }

    fn accumulator_mut(&mut self, platform: &str) -> &mut PlatformAccumulator {
        self.platforms.entry(platform.to_string()).or_default()
    }
}

/// Thread-safe collector shared across worker tasks.
///
/// A single mutex guards all platforms, which is fine at the expected worker
/// count (tens at most).
#[derive(Clone, Debug)]
pub struct PlatformMetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

impl PlatformMetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState::new())),
        }
    }

    /// Record one detection-cascade hit, deduplicating the URL by exact string.
    pub fn record_detection(&self, platform: &str, url: &str) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        let acc = guard.accumulator_mut(platform);
        acc.detections += 1;
        acc.urls.insert(url.to_string());
    }

    /// Record the outcome of one fill attempt.
    pub fn record_fill(&self, platform: &str, success: bool, confidence: f32) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        let acc = guard.accumulator_mut(platform);
        if success {
            acc.successes += 1;
        } else {
            acc.failures += 1;
        }
        acc.confidence_sum += f64::from(confidence);
    }

    /// Counters for one platform, if any event was ever recorded for it.
    pub fn stats(&self, platform: &str) -> Option<PlatformStats> {
        let guard = self.inner.lock().expect("metrics lock poisoned");
        guard
            .platforms
            .get(platform)
            .map(|acc| acc.stats(platform))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let guard = self.inner.lock().expect("metrics lock poisoned");
        let mut platforms: Vec<_> = guard
            .platforms
            .iter()
            .map(|(platform, acc)| acc.stats(platform))
            .collect();
        platforms.sort_by(|a, b| a.platform.cmp(&b.platform));
        MetricsSnapshot {
            started_at: guard.started_at,
            platforms,
        }
    }

    /// Platform whose observed URLs prefix-match `url` and whose lifetime
    /// performance clears both thresholds. Used for adaptive routing.
    pub fn best_platform_for_url(
        &self,
        url: &str,
        min_success_rate: f64,
        min_confidence: f64,
    ) -> Option<String> {
        let guard = self.inner.lock().expect("metrics lock poisoned");
        for (platform, acc) in &guard.platforms {
            if !acc.urls.iter().any(|known| url.starts_with(known.as_str())) {
                continue;
            }
            let stats = acc.stats(platform);
            if stats.attempts() > 0
                && stats.success_rate() > min_success_rate
                && stats.average_confidence() > min_confidence
            {
                return Some(platform.clone());
            }
        }
        None
    }

    /// Administrative reset; the only way counters ever go backwards.
    pub fn reset(&self) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        *guard = MetricsState::new();
    }
}

impl Default for PlatformMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_events_are_conserved() {
        let metrics = PlatformMetricsCollector::new();
        let confidences = [0.9_f32, 0.4, 0.7, 0.0, 1.0];
        for (i, confidence) in confidences.iter().enumerate() {
            metrics.record_fill("greenhouse", i % 2 == 0, *confidence);
        }

        let stats = metrics.stats("greenhouse").unwrap();
        assert_eq!(stats.attempts(), confidences.len() as u64);
        assert_eq!(stats.successes + stats.failures, confidences.len() as u64);

        let mean: f64 = confidences.iter().map(|c| f64::from(*c)).sum::<f64>()
            / confidences.len() as f64;
        assert!((stats.average_confidence() - mean).abs() < 1e-9);
    }

    #[test]
    fn detection_urls_deduplicate_exact_strings() {
        let metrics = PlatformMetricsCollector::new();
        metrics.record_detection("lever", "https://jobs.lever.co/acme/1");
        metrics.record_detection("lever", "https://jobs.lever.co/acme/1");
        metrics.record_detection("lever", "https://jobs.lever.co/acme/2");

        let stats = metrics.stats("lever").unwrap();
        assert_eq!(stats.detections, 3);
        assert_eq!(stats.observed_urls, 2);
    }

    #[test]
    fn routing_suggestion_requires_both_thresholds() {
        let metrics = PlatformMetricsCollector::new();
        metrics.record_detection("workable", "https://apply.workable.com/acme");
        for _ in 0..8 {
            metrics.record_fill("workable", true, 0.75);
        }
        for _ in 0..2 {
            metrics.record_fill("workable", false, 0.75);
        }

        // 0.8 success rate, 0.75 average confidence.
        assert_eq!(
            metrics.best_platform_for_url("https://apply.workable.com/acme/jobs/7", 0.7, 0.7),
            Some("workable".to_string())
        );
        // Tighter gate filters it out again.
        assert_eq!(
            metrics.best_platform_for_url("https://apply.workable.com/acme/jobs/7", 0.85, 0.7),
            None
        );
        // Unrelated URL family never matches.
        assert_eq!(
            metrics.best_platform_for_url("https://boards.greenhouse.io/acme", 0.7, 0.7),
            None
        );
    }

    #[test]
    fn reset_clears_all_counters() {
        let metrics = PlatformMetricsCollector::new();
        metrics.record_fill("generic", true, 0.9);
        metrics.reset();
        assert!(metrics.stats("generic").is_none());
        assert!(metrics.snapshot().platforms.is_empty());
    }
}
