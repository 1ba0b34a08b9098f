//! An agent: one associative memory, one spatial memory, one scratch
//!
//! The three are owned exclusively by the agent. Other agents only ever see
//! them through the orchestrator.

pub mod context;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{AgentId, NodeId, Step, TileCoord};
use crate::maze::address::Address;
use crate::memory::associative::AssociativeMemory;
use crate::memory::keywords::normalize_keyword;
use crate::memory::node::{MemorySource, NewMemory};
use crate::memory::scratch::Scratch;
use crate::memory::spatial::SpatialMemory;
use crate::retrieval::{self, Query, RetrievalParams, Retrieved};

pub use context::CycleContext;

/// Starting description of an agent, as found in an agents file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    #[serde(default)]
    pub identity: String,
    pub tile: TileCoord,
    /// Places the agent knows before perceiving anything
    #[serde(default)]
    pub known_places: Vec<String>,
    /// Background facts loaded as thoughts
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub memory: AssociativeMemory,
    pub spatial: SpatialMemory,
    pub scratch: Scratch,
}

impl Agent {
    pub fn new(id: AgentId, name: impl Into<String>, tile: TileCoord, embedding_dim: usize) -> Self {
        Self {
            id,
            memory: AssociativeMemory::new(embedding_dim),
            spatial: SpatialMemory::new(),
            scratch: Scratch::new(name, tile),
        }
    }

    /// Build from a profile; history is loaded separately since it needs embeddings
    pub fn from_profile(id: AgentId, profile: &AgentProfile, embedding_dim: usize) -> Result<Self> {
        let mut agent = Self::new(id, profile.name.clone(), profile.tile, embedding_dim);
        agent.scratch.identity = profile.identity.clone();
        for place in &profile.known_places {
            let address: Address = place.parse()?;
            agent.spatial.discover(&address);
        }
        Ok(agent)
    }

    pub fn name(&self) -> &str {
        &self.scratch.name
    }

    pub fn tile(&self) -> TileCoord {
        self.scratch.current_tile
    }

    pub fn is_chatting(&self) -> bool {
        self.scratch.chat_state.is_some()
    }

    /// Write a memory and feed the reflection trigger
    ///
    /// Reflection output is excluded so insights never re-trigger reflection.
    pub fn record(&mut self, entry: NewMemory, now: Step) -> Result<NodeId> {
        let counts = entry.counts_toward_reflection();
        let poignancy = entry.poignancy;
        let id = self.memory.record(entry, now)?;
        if counts {
            self.scratch.add_importance(poignancy);
        }
        Ok(id)
    }

    pub fn retrieve(&mut self, query: &Query, now: Step, params: &RetrievalParams) -> Retrieved {
        retrieval::retrieve(&mut self.memory, query, now, params)
    }

    /// Load background statements as `History` thoughts
    pub fn load_history<I, S>(&mut self, whispers: I, ctx: &mut CycleContext) -> Result<Vec<NodeId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = ctx.now();
        let poignancy = ctx.config.reflection.fallback_poignancy;
        let mut ids = Vec::new();
        for whisper in whispers {
            let text = whisper.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            let entry = NewMemory::thought(MemorySource::History, self.name(), "knows", text, text)
                .with_poignancy(poignancy)
                .with_keywords(content_keywords(text))
                .with_embedding(ctx.embed_or_zero(text));
            ids.push(self.record(entry, now)?);
        }
        tracing::debug!("{} loaded {} history statements", self.name(), ids.len());
        Ok(ids)
    }
}

/// Index keys for free text: normalized words longer than three characters
pub fn content_keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter_map(normalize_keyword)
        .filter(|k| k.chars().count() > 3)
        .collect()
}
