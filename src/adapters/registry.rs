//! Adapter registry and fill cascade.
//!
//! The registry owns every platform adapter, runs the priority-ordered
//! detection cascade, dispatches fill attempts, and drives the single-shot
//! fallback to the generic adapter when a specific adapter underperforms.
//! All lifetime counters flow through one [`PlatformMetricsCollector`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;

use crate::adapters::platforms::{
    GenericAiAdapter, GreenhouseAdapter, LeverAdapter, WorkableAdapter,
};
use crate::adapters::support::FillSettings;
use crate::adapters::types::{AdapterResult, CandidateData, JobData};
use crate::adapters::PlatformAdapter;
use crate::automation::page::PageHandle;
use crate::external_deps::context::ContextRetriever;
use crate::external_deps::field_mapper::FieldMapper;
use crate::metrics::PlatformMetricsCollector;

/// Name under which the AI-assisted fallback is registered.
pub const GENERIC_PLATFORM: &str = "generic";

/// A specific adapter scoring below this triggers one fallback attempt.
const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Thresholds a platform must clear before adaptive routing will suggest it.
const ROUTING_MIN_SUCCESS_RATE: f64 = 0.7;
const ROUTING_MIN_CONFIDENCE: f64 = 0.7;

type AdapterFactory = Arc<dyn Fn() -> Arc<dyn PlatformAdapter> + Send + Sync>;

struct RegistryEntry {
    priority: u8,
    enabled: bool,
    factory: AdapterFactory,
    /// Built on first use and reused for the registry's lifetime.
    instance: Option<Arc<dyn PlatformAdapter>>,
}

/// One row of [`AdapterRegistry::list_adapters`].
#[derive(Debug, Clone)]
pub struct AdapterStatus {
    pub name: String,
    pub priority: u8,
    pub enabled: bool,
    pub detections: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub average_confidence: f64,
}

pub struct AdapterRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
    metrics: PlatformMetricsCollector,
}

impl AdapterRegistry {
    /// Empty registry; callers register adapters themselves.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            metrics: PlatformMetricsCollector::new(),
        }
    }

    /// Registry pre-loaded with the built-in adapters: the specific platforms
    /// at low priorities and the generic fallback last.
    pub fn with_default_adapters(
        mapper: Arc<dyn FieldMapper>,
        context: Option<Arc<dyn ContextRetriever>>,
        settings: FillSettings,
    ) -> Self {
        let registry = Self::new();
        {
            let s = settings.clone();
            registry.register("greenhouse", 1, move || {
                Arc::new(GreenhouseAdapter::with_settings(s.clone()))
            });
        }
        {
            let s = settings.clone();
            registry.register("lever", 2, move || {
                Arc::new(LeverAdapter::with_settings(s.clone()))
            });
        }
        {
            let s = settings.clone();
            registry.register("workable", 3, move || {
                Arc::new(WorkableAdapter::with_settings(s.clone()))
            });
        }
        registry.register(GENERIC_PLATFORM, 99, move || {
            Arc::new(GenericAiAdapter::with_settings(
                Arc::clone(&mapper),
                context.clone(),
                settings.clone(),
            ))
        });
        registry
    }

    /// Register (or replace) an adapter under `name`. Lower priority runs
    /// earlier in the detection cascade.
    pub fn register<F>(&self, name: &str, priority: u8, factory: F)
    where
        F: Fn() -> Arc<dyn PlatformAdapter> + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.insert(
            name.to_string(),
            RegistryEntry {
                priority,
                enabled: true,
                factory: Arc::new(factory),
                instance: None,
            },
        );
        log::info!("registered adapter '{name}' at priority {priority}");
    }

    /// Fetch an adapter by name, building it on first use. Disabled and
    /// unknown adapters both come back as `None`.
    pub fn adapter(&self, name: &str) -> Option<Arc<dyn PlatformAdapter>> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let entry = entries.get_mut(name)?;
        if !entry.enabled {
            return None;
        }
        if entry.instance.is_none() {
            entry.instance = Some((entry.factory)());
        }
        entry.instance.clone()
    }

    /// Reassign an adapter's cascade priority. Returns `false` for unknown
    /// names.
    pub fn set_priority(&self, name: &str, priority: u8) -> bool {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        match entries.get_mut(name) {
            Some(entry) => {
                entry.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn enable_adapter(&self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    pub fn disable_adapter(&self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        match entries.get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Enabled non-generic adapters in cascade order.
    fn detection_order(&self) -> Vec<(String, Arc<dyn PlatformAdapter>)> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let mut ordered: Vec<(String, u8)> = entries
            .iter()
            .filter(|(name, entry)| entry.enabled && name.as_str() != GENERIC_PLATFORM)
            .map(|(name, entry)| (name.clone(), entry.priority))
            .collect();
        ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        ordered
            .into_iter()
            .filter_map(|(name, _)| {
                let entry = entries.get_mut(&name)?;
                if entry.instance.is_none() {
                    entry.instance = Some((entry.factory)());
                }
                entry.instance.clone().map(|adapter| (name, adapter))
            })
            .collect()
    }

    /// Run the detection cascade and return the matched platform name.
    ///
    /// The first adapter (in priority order) that claims the page wins and a
    /// detection event is recorded for it. When nothing claims the page the
    /// result is [`GENERIC_PLATFORM`] with no detection event, since the
    /// fallback claims everything by construction.
    pub async fn detect_platform(&self, page: &dyn PageHandle, url: &Url) -> String {
        for (name, adapter) in self.detection_order() {
            if adapter.detect_platform(page, url).await {
                log::info!("detected platform '{name}' for {url}");
                self.metrics.record_detection(&name, url.as_str());
                return name;
            }
        }
        log::info!("no specific platform detected for {url}, using fallback");
        GENERIC_PLATFORM.to_string()
    }

    /// Detect the platform, fill the form, and fall back if warranted.
    pub async fn fill_application(
        &self,
        page: &dyn PageHandle,
        url: &Url,
        candidate: &CandidateData,
        job: &JobData,
    ) -> AdapterResult {
        let platform = self.detect_platform(page, url).await;
        self.fill_with_platform(&platform, page, candidate, job).await
    }

    /// Fill with a pre-resolved platform, bypassing detection. Used by
    /// adaptive routing; no detection event is recorded.
    pub async fn fill_application_as(
        &self,
        platform: &str,
        page: &dyn PageHandle,
        candidate: &CandidateData,
        job: &JobData,
    ) -> AdapterResult {
        self.fill_with_platform(platform, page, candidate, job).await
    }

    async fn fill_with_platform(
        &self,
        platform: &str,
        page: &dyn PageHandle,
        candidate: &CandidateData,
        job: &JobData,
    ) -> AdapterResult {
        let Some(adapter) = self.adapter(platform) else {
            // No fill attempt happened, so no fill event is recorded.
            return AdapterResult::failure(
                platform,
                format!("no adapter available for '{platform}'"),
            );
        };

        let result = adapter.fill_form(page, candidate, job).await;
        self.metrics
            .record_fill(platform, result.success, result.confidence);
        log::info!(
            "fill on '{platform}': success={} confidence={:.2} filled={} failed={}",
            result.success,
            result.confidence,
            result.fields_filled.len(),
            result.fields_failed.len(),
        );

        if !Self::should_fall_back(&result, platform) {
            return result;
        }

        log::info!(
            "confidence {:.2} below fallback threshold, trying generic adapter",
            result.confidence
        );
        let Some(generic) = self.adapter(GENERIC_PLATFORM) else {
            return result;
        };
        let fallback = generic.fill_form(page, candidate, job).await;
        self.metrics
            .record_fill(GENERIC_PLATFORM, fallback.success, fallback.confidence);

        // The fallback result is adopted only when it strictly improves on
        // the original attempt.
        if fallback.confidence > result.confidence {
            fallback
        } else {
            result
        }
    }

    /// A failed, low-confidence attempt by a specific adapter earns one
    /// generic retry. CAPTCHA blocks never fall back; the page would stop the
    /// generic adapter just the same.
    fn should_fall_back(result: &AdapterResult, platform: &str) -> bool {
        !result.success
            && result.confidence < FALLBACK_CONFIDENCE
            && platform != GENERIC_PLATFORM
            && !result.captcha_detected
    }

    /// Adaptive routing hint: a platform whose recorded history covers this
    /// URL and clears the routing thresholds, if any.
    pub fn suggest_adapter_for_url(&self, url: &Url) -> Option<String> {
        self.metrics
            .best_platform_for_url(url.as_str(), ROUTING_MIN_SUCCESS_RATE, ROUTING_MIN_CONFIDENCE)
    }

    /// Registered adapters with their live counters, ordered by priority.
    pub fn list_adapters(&self) -> Vec<AdapterStatus> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        let mut statuses: Vec<AdapterStatus> = entries
            .iter()
            .map(|(name, entry)| {
                let stats = self.metrics.stats(name);
                let (detections, successes, failures, success_rate, average_confidence) =
                    match &stats {
                        Some(s) => (
                            s.detections,
                            s.successes,
                            s.failures,
                            s.success_rate(),
                            s.average_confidence(),
                        ),
                        None => (0, 0, 0, 0.0, 0.0),
                    };
                AdapterStatus {
                    name: name.clone(),
                    priority: entry.priority,
                    enabled: entry.enabled,
                    detections,
                    successes,
                    failures,
                    success_rate,
                    average_confidence,
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        statuses
    }

    pub fn metrics(&self) -> &PlatformMetricsCollector {
        &self.metrics
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
