//! Per-step input from and output to the environment

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{AgentId, Step, TileCoord};
use crate::maze::tile::TileEvent;
use crate::memory::node::Utterance;

/// An event placed on a tile from outside the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectedEvent {
    pub tile: TileCoord,
    pub event: TileEvent,
}

/// What the environment reports before a step
///
/// Agents missing from `positions` keep the tile the engine last moved them to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    #[serde(default)]
    pub positions: BTreeMap<AgentId, TileCoord>,
    #[serde(default)]
    pub events: Vec<InjectedEvent>,
}

impl EnvironmentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, agent: AgentId, tile: TileCoord) -> Self {
        self.positions.insert(agent, tile);
        self
    }

    pub fn with_event(mut self, tile: TileCoord, event: TileEvent) -> Self {
        self.events.push(InjectedEvent { tile, event });
        self
    }
}

/// One agent's movement decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub tile: TileCoord,
    pub description: String,
    /// Short visual tag
    pub emoji: String,
    /// Transcript so far while in a conversation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat: Vec<Utterance>,
}

/// What the engine reports after a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub step: Step,
    pub time_label: String,
    pub movements: BTreeMap<AgentId, Movement>,
}

/// Where another agent stands, as seen mid-step
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    pub id: AgentId,
    pub name: String,
    pub tile: TileCoord,
    pub chatting: bool,
}
