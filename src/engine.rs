//! Application engine: the public entry point of the crate.
//!
//! Owns the adapter registry, enforces the concurrency bound, and applies
//! adaptive routing before falling back to the normal detection cascade.
//! Built through [`EngineBuilder`], since a field mapper is mandatory and
//! everything else has sensible defaults.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

use crate::adapters::registry::AdapterRegistry;
use crate::adapters::types::{AdapterResult, CandidateData, JobData};
use crate::automation::captcha::CaptchaDetector;
use crate::automation::page::PageHandle;
use crate::config::EngineConfig;
use crate::external_deps::context::ContextRetriever;
use crate::external_deps::field_mapper::FieldMapper;
use crate::metrics::MetricsSnapshot;

/// Errors raised while building or driving the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("a field mapper is required to build the engine")]
    MissingFieldMapper,
    #[error("engine semaphore closed")]
    Closed,
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    mapper: Option<Arc<dyn FieldMapper>>,
    context: Option<Arc<dyn ContextRetriever>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_field_mapper(mut self, mapper: Arc<dyn FieldMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn with_context_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.context = Some(retriever);
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let config = self.config.unwrap_or_default();
        let mapper = self.mapper.ok_or(EngineError::MissingFieldMapper)?;

        let registry = AdapterRegistry::with_default_adapters(
            mapper,
            self.context,
            config.fill_settings(),
        );
        // The config reorders and toggles the built-in adapters; unknown
        // names are reported and skipped.
        for adapter in &config.adapters {
            if !registry.set_priority(&adapter.name, adapter.priority) {
                log::warn!("config names unknown adapter '{}'", adapter.name);
                continue;
            }
            if !adapter.enabled {
                registry.disable_adapter(&adapter.name);
            }
        }

        Ok(Engine {
            registry: Arc::new(registry),
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            captcha: CaptchaDetector::new(),
            config,
        })
    }
}

pub struct Engine {
    registry: Arc<AdapterRegistry>,
    semaphore: Arc<Semaphore>,
    captcha: CaptchaDetector,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Submit one application attempt on an already-navigated page.
    ///
    /// Holds a concurrency permit for the whole attempt. With adaptive
    /// routing on, a platform with a strong recorded history for this URL is
    /// used directly and detection is skipped.
    pub async fn submit_application(
        &self,
        page: &dyn PageHandle,
        url: &Url,
        candidate: &CandidateData,
        job: &JobData,
    ) -> Result<AdapterResult, EngineError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EngineError::Closed)?;

        let result = if self.config.use_adaptive_routing
            && let Some(platform) = self.registry.suggest_adapter_for_url(url)
        {
            log::info!("adaptive routing picked '{platform}' for {url}");
            self.registry
                .fill_application_as(&platform, page, candidate, job)
                .await
        } else {
            self.registry
                .fill_application(page, url, candidate, job)
                .await
        };

        log::info!(
            "application on '{}': success={} confidence={:.2} captcha={}",
            result.platform,
            result.success,
            result.confidence,
            result.captcha_detected,
        );
        Ok(result)
    }

    /// Block until a detected CAPTCHA clears, up to the configured timeout.
    /// Returns `true` when the page is clean again.
    pub async fn wait_for_captcha(&self, page: &dyn PageHandle) -> bool {
        self.captcha
            .wait_for_resolution(page, self.config.captcha_wait(), self.config.captcha_poll())
            .await
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.registry.metrics().snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::page::testing::{FakeElement, FakePage};
    use crate::config::AdapterConfig;
    use crate::external_deps::field_mapper::{FieldMapperResult, FieldMappingRequest};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct EmptyMapper;

    #[async_trait]
    impl FieldMapper for EmptyMapper {
        fn name(&self) -> &'static str {
            "empty"
        }

        async fn map_fields(&self, _request: &FieldMappingRequest) -> FieldMapperResult {
            Ok(BTreeMap::new())
        }
    }

    fn quick_config() -> EngineConfig {
        EngineConfig {
            field_wait_secs: 0,
            settle_secs: 0,
            input_pause_millis: 0,
            retry_wait_secs: 0,
            max_fill_retries: 1,
            ..Default::default()
        }
    }

    #[test]
    fn build_requires_a_field_mapper() {
        let err = Engine::builder().build().unwrap_err();
        assert!(matches!(err, EngineError::MissingFieldMapper));
    }

    #[tokio::test]
    async fn configured_priorities_reorder_the_cascade() {
        let mut config = quick_config();
        config.adapters = vec![
            AdapterConfig {
                name: "workable".to_string(),
                priority: 1,
                enabled: true,
            },
            AdapterConfig {
                name: "greenhouse".to_string(),
                priority: 5,
                enabled: true,
            },
        ];
        let engine = Engine::builder()
            .with_config(config)
            .with_field_mapper(Arc::new(EmptyMapper))
            .build()
            .unwrap();

        // A page whose structure matches both vendors' probes: the
        // configured order, not the built-in one, decides the winner.
        let mut page = FakePage::new("https://careers.acme.test/apply");
        for _ in 0..3 {
            page = page
                .with_element("input[name^='job_application']", FakeElement::new("input"))
                .with_element("input[id^='candidate_']", FakeElement::new("input"));
        }
        let url = Url::parse("https://careers.acme.test/apply").unwrap();
        assert_eq!(
            engine.registry().detect_platform(&page, &url).await,
            "workable"
        );
    }

    #[test]
    fn disabled_adapters_from_config_are_honored() {
        let mut config = quick_config();
        config.adapters[0].enabled = false; // greenhouse
        let engine = Engine::builder()
            .with_config(config)
            .with_field_mapper(Arc::new(EmptyMapper))
            .build()
            .unwrap();

        let statuses = engine.registry().list_adapters();
        let greenhouse = statuses.iter().find(|s| s.name == "greenhouse").unwrap();
        assert!(!greenhouse.enabled);
    }

    #[tokio::test]
    async fn unknown_page_routes_to_the_generic_adapter() {
        let engine = Engine::builder()
            .with_config(quick_config())
            .with_field_mapper(Arc::new(EmptyMapper))
            .build()
            .unwrap();

        let page = FakePage::new("https://careers.unknown.test/apply");
        let url = Url::parse("https://careers.unknown.test/apply").unwrap();
        let result = engine
            .submit_application(&page, &url, &CandidateData::default(), &JobData::default())
            .await
            .unwrap();

        assert_eq!(result.platform, "generic");
    }

    #[tokio::test]
    async fn adaptive_routing_bypasses_detection_when_history_is_strong() {
        let engine = Engine::builder()
            .with_config(quick_config())
            .with_field_mapper(Arc::new(EmptyMapper))
            .build()
            .unwrap();

        let url = Url::parse("https://boards.greenhouse.io/acme/jobs/1").unwrap();
        let metrics = engine.registry().metrics();
        metrics.record_detection("workable", url.as_str());
        for _ in 0..5 {
            metrics.record_fill("workable", true, 0.9);
        }

        // The page would normally detect as greenhouse by URL; history wins.
        let page = FakePage::new(url.as_str())
            .with_element("input[id='candidate_email']", FakeElement::new("input"));
        let candidate = CandidateData {
            email: "mel@example.test".into(),
            ..Default::default()
        };
        let result = engine
            .submit_application(&page, &url, &candidate, &JobData::default())
            .await
            .unwrap();

        assert_eq!(result.platform, "workable");
    }
}
