//! Everything a cognitive phase needs besides the agent itself

use crate::core::clock::SimClock;
use crate::core::config::EngineConfig;
use crate::core::error::CollaboratorError;
use crate::core::types::Step;
use crate::llm::collaborator::{Request, Response};
use crate::llm::Collaborators;
use crate::retrieval::{FocalPoint, RetrievalParams};
use crate::simulation::stats::DegradationStats;

pub struct CycleContext<'a> {
    pub config: &'a EngineConfig,
    pub collaborators: &'a Collaborators,
    pub stats: &'a mut DegradationStats,
    pub clock: &'a SimClock,
}

impl<'a> CycleContext<'a> {
    pub fn new(
        config: &'a EngineConfig,
        collaborators: &'a Collaborators,
        stats: &'a mut DegradationStats,
        clock: &'a SimClock,
    ) -> Self {
        Self {
            config,
            collaborators,
            stats,
            clock,
        }
    }

    pub fn now(&self) -> Step {
        self.clock.current_step()
    }

    pub fn retrieval_params(&self) -> RetrievalParams {
        RetrievalParams::from(&self.config.retrieval)
    }

    pub fn complete(&mut self, request: &Request) -> Result<Response, CollaboratorError> {
        self.collaborators.complete(request, self.stats)
    }

    pub fn embed(&mut self, text: &str) -> Option<Vec<f32>> {
        self.collaborators.embed(text, self.config.collaborator.embedding_dim, self.stats)
    }

    /// Embedding for a new node. A zero vector has cosine 0 against everything,
    /// so the node still ranks on recency and importance.
    pub fn embed_or_zero(&mut self, text: &str) -> Vec<f32> {
        self.embed(text)
            .unwrap_or_else(|| vec![0.0; self.config.collaborator.embedding_dim])
    }

    pub fn focal_point(&mut self, text: impl Into<String>) -> FocalPoint {
        let text = text.into();
        let embedding = self.embed(&text);
        FocalPoint::new(text, embedding)
    }
}
