//! Platform adapter contract and registry.
//!
//! One adapter per known ATS family plus a generic AI-mapping fallback. The
//! registry owns the ordered adapter set and runs the detection and fill
//! cascades.

pub mod platforms;
pub mod registry;
pub mod support;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::automation::page::PageHandle;

pub use registry::{AdapterRegistry, AdapterStatus, GENERIC_PLATFORM};
pub use support::{FillSettings, confidence_score};
pub use types::{
    AdapterResult,
    CandidateData,
    EducationEntry,
    ExperienceEntry,
    FieldKind,
    FormField,
    JobData,
};

/// Strategy contract implemented by every platform adapter.
///
/// `fill_form` is the only operation with side effects. Adapters absorb
/// their internal faults into the returned [`AdapterResult`] (error text
/// preserved) so the registry's fallback cascade stays a plain conditional
/// over returned values.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Stable name used for registration, metrics, and routing.
    fn platform_name(&self) -> &'static str;

    /// Cheap, side-effect-free membership check. Must not mutate the page
    /// and must return `false` on any internal error.
    async fn detect_platform(&self, page: &dyn PageHandle, url: &Url) -> bool;

    /// Enumerate all fillable fields currently in the DOM, including fields
    /// nested in custom question widgets.
    async fn get_form_fields(&self, page: &dyn PageHandle) -> HashMap<String, FormField>;

    /// Attempt to fill the application form with candidate data.
    async fn fill_form(
        &self,
        page: &dyn PageHandle,
        candidate: &CandidateData,
        job: &JobData,
    ) -> AdapterResult;
}
