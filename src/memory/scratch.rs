//! Scratch: an agent's transient working memory

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::types::{AgentId, NodeId, Step, TileCoord};
use crate::maze::address::Address;
use crate::maze::tile::TileEvent;
use crate::memory::node::Utterance;

/// Where an action takes place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    Place(Address),
    /// Seek out another agent to talk with
    Agent(AgentId),
    Stay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentAction {
    pub description: String,
    pub target: ActionTarget,
    pub start_step: Step,
    pub duration_steps: Step,
    /// Short visual tag shown by the renderer
    pub emoji: String,
    /// The event this action broadcasts on the agent's tile
    pub event: TileEvent,
}

impl CurrentAction {
    pub fn is_completed(&self, now: Step) -> bool {
        now >= self.start_step + self.duration_steps
    }

    pub fn wants_to_talk_to(&self) -> Option<AgentId> {
        match self.target {
            ActionTarget::Agent(id) => Some(id),
            _ => None,
        }
    }
}

/// One entry of the decomposed daily plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub activity: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub address: Option<Address>,
}

/// Conversation lock shared (by value) between both participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    pub partner: AgentId,
    pub partner_name: String,
    pub transcript: Vec<Utterance>,
    /// Who speaks next
    pub turn_owner: AgentId,
    pub started_at: Step,
    pub last_turn_at: Option<Step>,
    /// Memories this agent retrieved while talking
    pub context: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scratch {
    pub name: String,
    /// Free-text identity used as planning context
    #[serde(default)]
    pub identity: String,
    pub current_tile: TileCoord,
    pub current_action: Option<CurrentAction>,
    pub planned_path: VecDeque<TileCoord>,
    /// Tile the queued path leads to
    pub path_target: Option<TileCoord>,
    pub daily_schedule: VecDeque<ScheduleItem>,
    pub chat_state: Option<ChatState>,
    /// Partner -> first step a new conversation with them is allowed
    #[serde(default)]
    pub chat_cooldowns: BTreeMap<AgentId, Step>,
    pub importance_trigger_accum: f32,
    pub long_term_plan_valid_until: Option<Step>,
    /// Question raised by planning that the next retrieval should address
    #[serde(default)]
    pub pending_question: Option<String>,
}

impl Scratch {
    pub fn new(name: impl Into<String>, current_tile: TileCoord) -> Self {
        Self {
            name: name.into(),
            identity: String::new(),
            current_tile,
            current_action: None,
            planned_path: VecDeque::new(),
            path_target: None,
            daily_schedule: VecDeque::new(),
            chat_state: None,
            chat_cooldowns: BTreeMap::new(),
            importance_trigger_accum: 0.0,
            long_term_plan_valid_until: None,
            pending_question: None,
        }
    }

    pub fn add_importance(&mut self, poignancy: f32) {
        self.importance_trigger_accum += poignancy;
    }

    pub fn reset_importance(&mut self) {
        self.importance_trigger_accum = 0.0;
    }

    /// The daily schedule must be regenerated
    pub fn schedule_is_stale(&self, now: Step) -> bool {
        self.long_term_plan_valid_until.map_or(true, |until| now >= until)
    }

    pub fn action_completed(&self, now: Step) -> bool {
        self.current_action.as_ref().map_or(true, |a| a.is_completed(now))
    }

    pub fn clear_path(&mut self) {
        self.planned_path.clear();
        self.path_target = None;
    }

    pub fn can_chat_with(&self, partner: AgentId, now: Step) -> bool {
        self.chat_state.is_none()
            && self.chat_cooldowns.get(&partner).map_or(true, |until| now >= *until)
    }

    pub fn action_description(&self) -> &str {
        self.current_action
            .as_ref()
            .map(|a| a.description.as_str())
            .unwrap_or("idle")
    }
}
