//! Context-retrieval capability contract.
//!
//! Optional collaborator that returns ranked text snippets (prior successful
//! applications, similar postings) used only to enrich field-mapping
//! requests. Absence of a retriever degrades to an empty context and never
//! blocks a fill attempt.

use async_trait::async_trait;
use thiserror::Error;

/// One ranked snippet returned by the retriever.
#[derive(Debug, Clone)]
pub struct ContextSnippet {
    pub content: String,
    pub score: f32,
}

/// Shared interface implemented by retrieval backends.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ContextSnippet>, ContextError>;
}

/// Errors surfaced by retrieval backends.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context retrieval failed: {0}")]
    Provider(String),
    #[error("context retriever unavailable")]
    Unavailable,
}

/// Best-effort search helper: provider errors and missing retrievers both
/// collapse to an empty snippet list.
pub async fn snippets_or_empty(
    retriever: Option<&dyn ContextRetriever>,
    query: &str,
    limit: usize,
) -> Vec<String> {
    let Some(retriever) = retriever else {
        return Vec::new();
    };
    match retriever.search(query, limit).await {
        Ok(snippets) => snippets.into_iter().map(|snippet| snippet.content).collect(),
        Err(err) => {
            log::debug!("context retrieval degraded to empty: {err}");
            Vec::new()
        }
    }
}
