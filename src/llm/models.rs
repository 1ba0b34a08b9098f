//! Model selection per cognitive function
//!
//! Three presets trade quality for cost. `MODEL_PRESET` picks one and
//! `MODEL_<FUNCTION>` overrides a single slot.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, ReverieError};
use crate::llm::collaborator::CollaboratorKind;

const LARGE: &str = "gpt-5";
const MEDIUM: &str = "gpt-5-mini";
const SMALL: &str = "gpt-5-nano";
const EMBEDDING: &str = "text-embedding-3-large";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPreset {
    Performance,
    Balanced,
    Economy,
}

impl std::str::FromStr for ModelPreset {
    type Err = ReverieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "performance" => Ok(Self::Performance),
            "balanced" => Ok(Self::Balanced),
            "economy" => Ok(Self::Economy),
            other => Err(ReverieError::Config(format!(
                "unknown model preset '{}' (expected performance, balanced or economy)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub perceive: String,
    pub plan: String,
    pub reflect: String,
    pub execute: String,
    pub converse: String,
    pub embedding: String,
}

impl ModelConfig {
    pub fn preset(preset: ModelPreset) -> Self {
        let (perceive, plan, reflect, execute, converse) = match preset {
            ModelPreset::Performance => (LARGE, LARGE, LARGE, LARGE, LARGE),
            ModelPreset::Balanced => (MEDIUM, LARGE, LARGE, MEDIUM, LARGE),
            ModelPreset::Economy => (SMALL, MEDIUM, MEDIUM, SMALL, MEDIUM),
        };
        Self {
            perceive: perceive.into(),
            plan: plan.into(),
            reflect: reflect.into(),
            execute: execute.into(),
            converse: converse.into(),
            embedding: EMBEDDING.into(),
        }
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let preset = match lookup("MODEL_PRESET") {
            Some(name) => name.parse()?,
            None => ModelPreset::Balanced,
        };
        let mut config = Self::preset(preset);

        let slots: [(&str, &mut String); 6] = [
            ("MODEL_PERCEIVE", &mut config.perceive),
            ("MODEL_PLAN", &mut config.plan),
            ("MODEL_REFLECT", &mut config.reflect),
            ("MODEL_EXECUTE", &mut config.execute),
            ("MODEL_CONVERSE", &mut config.converse),
            ("MODEL_RETRIEVE_EMBEDDING", &mut config.embedding),
        ];
        for (key, slot) in slots {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
        Ok(config)
    }

    pub fn model_for(&self, kind: CollaboratorKind) -> &str {
        match kind {
            CollaboratorKind::Plan => &self.plan,
            CollaboratorKind::Reflect => &self.reflect,
            CollaboratorKind::ConverseTurn => &self.converse,
            CollaboratorKind::PerceiveFilter => &self.perceive,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::preset(ModelPreset::Balanced)
    }
}
