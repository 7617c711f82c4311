//! Field-mapping capability contract.
//!
//! The generic adapter hands every discovered field, plus candidate and job
//! context, to an external language-model collaborator that proposes a value,
//! an inferred kind, and a confidence per field. The core stays agnostic of
//! the provider; it only consumes the structured mapping.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::types::{CandidateData, FieldKind, FormField};

/// Sentinel a mapper returns when it deliberately defers a field to a human.
pub const NEEDS_REVIEW: &str = "NEEDS_REVIEW";

/// Job context forwarded to the mapper; deliberately smaller than [`crate::JobData`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSummary {
    pub title: String,
    pub company: String,
    pub requirements: String,
}

/// Structured description of the fields to classify.
///
/// Fields are keyed the same way the adapter keys them (name, id, or a
/// positional fallback). A `BTreeMap` keeps the serialized form stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMappingRequest {
    pub fields: BTreeMap<String, FormField>,
    pub candidate: CandidateData,
    pub job: JobSummary,
    /// Ranked snippets from prior successful applications; may be empty.
    pub context: Vec<String>,
}

/// Proposed value for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub value: String,
    pub kind: FieldKind,
    pub confidence: f32,
}

/// Per-field mappings keyed like the request.
pub type FieldMappings = BTreeMap<String, FieldMapping>;

/// Common result type returned by field mappers.
pub type FieldMapperResult = Result<FieldMappings, FieldMapperError>;

/// Shared interface implemented by field-mapping providers.
#[async_trait]
pub trait FieldMapper: Send + Sync {
    fn name(&self) -> &'static str;
    async fn map_fields(&self, request: &FieldMappingRequest) -> FieldMapperResult;
}

/// Errors surfaced by field-mapping providers.
#[derive(Debug, Error)]
pub enum FieldMapperError {
    #[error("field mapper misconfigured: {0}")]
    Configuration(String),
    #[error("field mapper request failed: {0}")]
    Provider(String),
    #[error("field mapper returned a malformed mapping: {0}")]
    Malformed(String),
    #[error("field mapping timed out after {0:?}")]
    Timeout(Duration),
}
