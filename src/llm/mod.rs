//! Language-model and embedding collaborators
//!
//! The engine depends only on the `LanguageModel` and `EmbeddingProvider`
//! traits. `Collaborators` bundles one of each with the retry budget and
//! records every failure in the degradation counters.

pub mod client;
pub mod collaborator;
pub mod http;
pub mod models;
pub mod offline;
pub mod parser;
pub mod prompts;
pub mod retry;

use std::sync::Arc;

use crate::core::config::CollaboratorConfig;
use crate::core::error::CollaboratorError;
use crate::simulation::stats::DegradationStats;

pub use client::LlmClient;
pub use collaborator::{
    CollaboratorKind, EmbeddingProvider, EmbeddingUnavailable, LanguageModel, PlanMode, Request, Response,
};
pub use http::HttpCollaborator;
pub use models::{ModelConfig, ModelPreset};
pub use offline::{HashingEmbedder, OfflineCollaborator};
pub use retry::RetryPolicy;

#[derive(Clone)]
pub struct Collaborators {
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl Collaborators {
    pub fn new(model: Arc<dyn LanguageModel>, embedder: Arc<dyn EmbeddingProvider>, retry: RetryPolicy) -> Self {
        Self {
            model,
            embedder,
            retry,
        }
    }

    /// Deterministic rule-based model and hashing embedder
    pub fn offline(config: &CollaboratorConfig) -> Self {
        Self::new(
            Arc::new(OfflineCollaborator::new()),
            Arc::new(HashingEmbedder::new(config.embedding_dim)),
            RetryPolicy::from_config(config),
        )
    }

    /// One hosted service for both capabilities
    pub fn hosted(http: HttpCollaborator, config: &CollaboratorConfig) -> Self {
        let shared = Arc::new(http);
        Self::new(shared.clone(), shared, RetryPolicy::from_config(config))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Complete a request within the retry budget
    pub fn complete(&self, request: &Request, stats: &mut DegradationStats) -> Result<Response, CollaboratorError> {
        let kind = request.kind();
        stats.collaborator_calls += 1;

        let outcome = self.retry.run(kind.as_str(), || self.model.complete(request));
        stats.retries += u64::from(outcome.attempts.saturating_sub(1));

        if let Err(e) = &outcome.result {
            stats.record_failure(kind, e);
        }
        outcome.result
    }

    /// Embed within the retry budget; `None` means callers must fall back
    ///
    /// A vector of the wrong length or with non-finite components counts as
    /// unavailable, so it never reaches memory or retrieval.
    pub fn embed(&self, text: &str, dim: usize, stats: &mut DegradationStats) -> Option<Vec<f32>> {
        let outcome = self
            .retry
            .run("embed", || self.embedder.embed(text).and_then(|e| check_embedding(e, dim)));
        stats.retries += u64::from(outcome.attempts.saturating_sub(1));

        match outcome.result {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                stats.embedding_fallbacks += 1;
                tracing::warn!("Embedding fallback for '{}': {}", text, e);
                None
            }
        }
    }
}

fn check_embedding(embedding: Vec<f32>, dim: usize) -> Result<Vec<f32>, EmbeddingUnavailable> {
    if embedding.len() != dim {
        return Err(EmbeddingUnavailable(format!(
            "provider returned {} dimensions, expected {}",
            embedding.len(),
            dim
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingUnavailable("provider returned non-finite components".into()));
    }
    Ok(embedding)
}
