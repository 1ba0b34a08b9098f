use thiserror::Error;

use crate::core::types::{AgentId, TileCoord};

/// Failures surfaced by the language-model collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("collaborator timed out")]
    Timeout,

    #[error("malformed collaborator response: {0}")]
    MalformedResponse(String),

    #[error("collaborator rate limited")]
    RateLimited,

    #[error("collaborator transport error: {0}")]
    Transport(String),
}

impl CollaboratorError {
    /// Short label used as a counter key
    pub fn class(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::MalformedResponse(_) => "malformed_response",
            Self::RateLimited => "rate_limited",
            Self::Transport(_) => "transport",
        }
    }
}

#[derive(Error, Debug)]
pub enum ReverieError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No path from {start:?} to {goal:?}")]
    NoPath { start: TileCoord, goal: TileCoord },

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Corrupted state for agent {agent}: {reason}")]
    Corruption { agent: String, reason: String },

    #[error("Unknown agent: {0:?}")]
    UnknownAgent(AgentId),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl ReverieError {
    /// Fatal errors halt the affected agent for the current step
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReverieError>;
