//! Collaborator backed by a hosted language model and embedding API
//!
//! The engine is synchronous, so calls block on a runtime owned by the
//! collaborator. Never call these from inside another tokio runtime.

use std::time::Duration;
use tokio::runtime::Runtime;

use crate::core::config::CollaboratorConfig;
use crate::core::error::{CollaboratorError, Result};
use crate::llm::client::LlmClient;
use crate::llm::collaborator::{
    CollaboratorKind, EmbeddingProvider, EmbeddingUnavailable, LanguageModel, PlanMode, Request, Response,
};
use crate::llm::models::ModelConfig;
use crate::llm::parser::parse_reply;
use crate::llm::prompts::system_prompt;

pub struct HttpCollaborator {
    client: LlmClient,
    runtime: Runtime,
    models: ModelConfig,
    timeout: Duration,
    embedding_dim: usize,
}

impl HttpCollaborator {
    pub fn new(client: LlmClient, models: ModelConfig, config: &CollaboratorConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        Ok(Self {
            client,
            runtime,
            models,
            timeout: Duration::from_secs(config.timeout_secs),
            embedding_dim: config.embedding_dim,
        })
    }

    /// Client and model selection both from the environment
    pub fn from_env(config: &CollaboratorConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = LlmClient::from_env(timeout)?;
        let models = ModelConfig::from_env()?;
        tracing::info!(
            "Using hosted collaborator (plan: {}, converse: {}, embedding: {})",
            models.plan,
            models.converse,
            models.embedding
        );
        Self::new(client, models, config)
    }

    fn model_for(&self, request: &Request) -> &str {
        match request {
            Request::Plan(plan) if plan.mode == PlanMode::NextAction => &self.models.execute,
            other => self.models.model_for(other.kind()),
        }
    }

    fn user_prompt(request: &Request) -> std::result::Result<String, CollaboratorError> {
        let context = match request {
            Request::Plan(c) => serde_json::to_string_pretty(c),
            Request::Reflect(c) => serde_json::to_string_pretty(c),
            Request::ConverseTurn(c) => serde_json::to_string_pretty(c),
            Request::PerceiveFilter(c) => serde_json::to_string_pretty(c),
        }
        .map_err(|e| CollaboratorError::Transport(format!("cannot encode request: {}", e)))?;
        Ok(format!("CONTEXT:\n{}\n\nRespond with JSON:", context))
    }
}

impl LanguageModel for HttpCollaborator {
    fn complete(&self, request: &Request) -> std::result::Result<Response, CollaboratorError> {
        let kind = request.kind();
        let model = self.model_for(request);
        let user = Self::user_prompt(request)?;

        let reply = self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, self.client.complete(model, system_prompt(kind), &user))
                .await
                .map_err(|_| CollaboratorError::Timeout)
                .and_then(|reply| reply)
        })?;
        tracing::debug!("{} reply from {}: {} chars", kind.as_str(), model, reply.len());

        let response = match kind {
            CollaboratorKind::Plan => Response::Plan(parse_reply(&reply)?),
            CollaboratorKind::Reflect => Response::Reflect(parse_reply(&reply)?),
            CollaboratorKind::ConverseTurn => Response::ConverseTurn(parse_reply(&reply)?),
            CollaboratorKind::PerceiveFilter => Response::PerceiveFilter(parse_reply(&reply)?),
        };
        Ok(response)
    }
}

impl EmbeddingProvider for HttpCollaborator {
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingUnavailable> {
        self.runtime
            .block_on(async {
                tokio::time::timeout(
                    self.timeout,
                    self.client.embed(&self.models.embedding, text, self.embedding_dim),
                )
                .await
                .map_err(|_| CollaboratorError::Timeout)
                .and_then(|embedding| embedding)
            })
            .map_err(|e| EmbeddingUnavailable(e.to_string()))
    }
}
