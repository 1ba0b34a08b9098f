//! Engine configuration with documented constants
//!
//! Every tunable is collected here with an explanation of its purpose.
//! The configuration is passed explicitly into the orchestrator at
//! construction; nothing reads tunables from global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{ReverieError, Result};

/// What counts as "already perceived" when filtering by retention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMatch {
    /// Same subject, predicate and object
    #[default]
    Triple,
    /// Same subject only
    Subject,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub perception: PerceptionConfig,
    pub retrieval: RetrievalConfig,
    pub reflection: ReflectionConfig,
    pub conversation: ConversationConfig,
    pub collaborator: CollaboratorConfig,
    pub clock: ClockConfig,
    /// Seed for deterministic target-tile sampling
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// How far (in tiles, square box) an agent can see
    pub vision_radius: u32,

    /// Maximum number of new events an agent processes per step
    ///
    /// Events are ranked by proximity first, then importance.
    pub attention_bandwidth: usize,

    /// Steps a perceived event stays "active" before it may be re-perceived
    ///
    /// At 10 seconds per step, 360 steps is one simulated hour.
    pub retention_steps: u64,

    /// Match granularity for the retention filter
    pub retention_match: RetentionMatch,

    /// Only perceive events in the agent's current arena
    pub same_arena_only: bool,

    /// Poignancy given to "is idle" events without asking the collaborator
    pub idle_poignancy: f32,

    /// Poignancy used when the collaborator cannot score an event
    pub fallback_poignancy: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            vision_radius: 4,
            attention_bandwidth: 3,
            retention_steps: 360,
            retention_match: RetentionMatch::Triple,
            same_arena_only: true,
            idle_poignancy: 1.0,
            fallback_poignancy: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub relevance_weight: f32,
    pub recency_weight: f32,
    pub importance_weight: f32,

    /// Base of the exponential recency decay, strictly between 0 and 1
    ///
    /// recency = recency_decay ^ (steps since last access)
    pub recency_decay: f32,

    /// Composite score a node must reach when no explicit limit is given
    pub min_score: f32,

    /// Number of nodes returned when none reach `min_score`
    pub fallback_count: usize,

    /// Default top-k; `None` means "all above min_score"
    pub default_limit: Option<usize>,

    /// Relevance assigned to every candidate when the focal embedding is missing
    pub neutral_relevance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 1.0,
            recency_weight: 1.0,
            importance_weight: 1.0,
            recency_decay: 0.99,
            min_score: 1.5,
            fallback_count: 5,
            default_limit: None,
            neutral_relevance: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    /// Accumulated poignancy at which reflection triggers
    pub threshold: f32,

    /// Number of salient recent nodes used as focal points
    pub focal_points: usize,

    /// Evidence nodes retrieved per focal point
    pub evidence_per_focal: usize,

    /// How many recent nodes are considered when choosing focal points
    pub recent_window: usize,

    /// Poignancy of an insight when the collaborator gives none
    pub fallback_poignancy: f32,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            threshold: 150.0,
            focal_points: 3,
            evidence_per_focal: 10,
            recent_window: 100,
            fallback_poignancy: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Utterances after which a conversation ends regardless of the collaborator
    pub max_turns: usize,

    /// Steps before the same pair may start another conversation
    pub cooldown_steps: u64,

    /// Poignancy of the chat memory recorded at the end of a conversation
    pub chat_poignancy: f32,

    /// Memories retrieved per speaker per turn
    pub context_limit: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 8,
            cooldown_steps: 60,
            chat_poignancy: 4.0,
            context_limit: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Attempts per call before degrading to the deterministic default
    pub max_attempts: u32,

    /// First backoff delay; doubles after every failed attempt
    pub backoff_base_ms: u64,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// Length of every embedding vector stored in memory
    pub embedding_dim: usize,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 250,
            timeout_secs: 30,
            embedding_dim: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub seconds_per_step: u64,
    pub start_minute_of_day: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            seconds_per_step: 10,
            start_minute_of_day: 7 * 60,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(r.recency_decay > 0.0 && r.recency_decay < 1.0) {
            return Err(ReverieError::Config(format!(
                "recency_decay ({}) must be strictly between 0 and 1",
                r.recency_decay
            )));
        }
        if r.relevance_weight < 0.0 || r.recency_weight < 0.0 || r.importance_weight < 0.0 {
            return Err(ReverieError::Config("retrieval weights must be non-negative".into()));
        }
        if self.reflection.threshold <= 0.0 {
            return Err(ReverieError::Config("reflection threshold must be positive".into()));
        }
        if self.collaborator.max_attempts == 0 {
            return Err(ReverieError::Config("max_attempts must be at least 1".into()));
        }
        if self.collaborator.embedding_dim == 0 {
            return Err(ReverieError::Config("embedding_dim must be at least 1".into()));
        }
        if self.conversation.max_turns == 0 {
            return Err(ReverieError::Config("max_turns must be at least 1".into()));
        }
        if self.clock.seconds_per_step == 0 {
            return Err(ReverieError::Config("seconds_per_step must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reflection.threshold, 150.0);
        assert_eq!(config.collaborator.max_attempts, 3);
        assert_eq!(config.retrieval.relevance_weight, 1.0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            seed = 7

            [perception]
            vision_radius = 6
            retention_match = "subject"

            [retrieval]
            recency_decay = 0.995
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.perception.vision_radius, 6);
        assert_eq!(config.perception.retention_match, RetentionMatch::Subject);
        assert_eq!(config.perception.attention_bandwidth, 3);
        assert!((config.retrieval.recency_decay - 0.995).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_decay_rejected() {
        let result = EngineConfig::from_toml_str("[retrieval]\nrecency_decay = 1.5\n");
        assert!(matches!(result, Err(ReverieError::Config(_))));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = EngineConfig::from_toml_str("[retrieval\n");
        assert!(matches!(result, Err(ReverieError::TomlError(_))));
    }

    #[test]
    fn test_demo_tuning_parses() {
        let config = EngineConfig::from_toml_str(include_str!("../../demos/tuning.toml")).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.clock.start_minute_of_day, 420);
    }
}
