//! # applyflow
//!
//! Orchestration core for automated job-application form filling across
//! applicant-tracking systems.
//!
//! Platform-specific adapters (Greenhouse, Lever, Workable) handle the ATS
//! layouts they know; an AI-assisted generic adapter catches everything else
//! and steps in as a fallback when a specific adapter underperforms. The
//! registry runs detection in priority order, scores every attempt, and feeds
//! per-platform metrics back into adaptive routing.
//!
//! Browser automation and the language-model field mapper are capability
//! traits ([`PageHandle`], [`FieldMapper`]); the host application supplies
//! the implementations.
//!
//! ## Example
//!
//! ```no_run
//! use applyflow::{CandidateData, Engine, EngineConfig, JobData};
//! use std::sync::Arc;
//! # use applyflow::{FieldMapper, FieldMapperResult, FieldMappingRequest, PageHandle};
//! # use async_trait::async_trait;
//! # struct MyMapper;
//! # #[async_trait]
//! # impl FieldMapper for MyMapper {
//! #     fn name(&self) -> &'static str { "my-mapper" }
//! #     async fn map_fields(&self, _r: &FieldMappingRequest) -> FieldMapperResult {
//! #         Ok(Default::default())
//! #     }
//! # }
//! # async fn run(page: &dyn PageHandle) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::builder()
//!     .with_config(EngineConfig::default())
//!     .with_field_mapper(Arc::new(MyMapper))
//!     .build()?;
//!
//! let url = url::Url::parse("https://boards.greenhouse.io/acme/jobs/123")?;
//! let result = engine
//!     .submit_application(page, &url, &CandidateData::default(), &JobData::default())
//!     .await?;
//! println!("filled {} fields on {}", result.fields_filled.len(), result.platform);
//! # Ok(())
//! # }
//! ```

mod engine;

pub mod adapters;
pub mod automation;
pub mod config;
pub mod external_deps;
pub mod metrics;

pub use crate::engine::{Engine, EngineBuilder, EngineError};

pub use crate::adapters::{
    AdapterRegistry,
    AdapterStatus,
    FillSettings,
    GENERIC_PLATFORM,
    PlatformAdapter,
    confidence_score,
};

pub use crate::adapters::platforms::{
    GenericAiAdapter,
    GreenhouseAdapter,
    LeverAdapter,
    WorkableAdapter,
};

pub use crate::adapters::types::{
    AdapterResult,
    CandidateData,
    EducationEntry,
    ExperienceEntry,
    FieldKind,
    FormField,
    JobData,
};

pub use crate::automation::captcha::{CaptchaDetectionResult, CaptchaDetector, CaptchaKind};
pub use crate::automation::page::{
    ElementHandle,
    PageError,
    PageHandle,
    PageResult,
    ScreenshotRef,
};

pub use crate::config::{AdapterConfig, ConfigError, EngineConfig};

pub use crate::external_deps::{
    ContextError,
    ContextRetriever,
    ContextSnippet,
    FieldMapper,
    FieldMapperError,
    FieldMapperResult,
    FieldMapping,
    FieldMappingRequest,
    FieldMappings,
    JobSummary,
    NEEDS_REVIEW,
};

pub use crate::metrics::{MetricsSnapshot, PlatformMetricsCollector, PlatformStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
