//! Consumed capability contracts.
//!
//! These traits let the orchestration core delegate to external
//! collaborators (LLM field mapping, embedding retrieval) while staying
//! agnostic of vendor-specific details.

pub mod context;
pub mod field_mapper;

pub use context::{ContextError, ContextRetriever, ContextSnippet, snippets_or_empty};
pub use field_mapper::{
    FieldMapper,
    FieldMapperError,
    FieldMapperResult,
    FieldMapping,
    FieldMappingRequest,
    FieldMappings,
    JobSummary,
    NEEDS_REVIEW,
};
