//! Capability interfaces for the language model and embedding provider
//!
//! The engine only talks to these traits. Requests and responses are typed;
//! a response of the wrong kind is a `MalformedResponse`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::error::CollaboratorError;
use crate::core::types::NodeId;
use crate::maze::tile::TileEvent;
use crate::memory::node::Utterance;
use crate::memory::scratch::ScheduleItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorKind {
    Plan,
    Reflect,
    ConverseTurn,
    PerceiveFilter,
}

impl CollaboratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Reflect => "reflect",
            Self::ConverseTurn => "converse_turn",
            Self::PerceiveFilter => "perceive_filter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Decompose the day into a schedule
    Schedule,
    /// Resolve one activity into a concrete action
    NextAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub agent: String,
    pub identity: String,
    pub time: String,
    pub mode: PlanMode,
    pub current_place: String,
    /// Arenas the agent knows about; targets must come from this list
    pub known_places: Vec<String>,
    /// Agents currently visible
    pub nearby_agents: Vec<String>,
    /// Activity being resolved in `NextAction` mode
    pub activity: Option<String>,
    pub memories: Vec<String>,
}

/// A concrete action chosen by the planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub description: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub converse_with: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Something the agent wants to think about next step
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    #[serde(default)]
    pub schedule: Vec<ScheduleItem>,
    #[serde(default)]
    pub action: Option<PlannedAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: NodeId,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectRequest {
    pub agent: String,
    pub focal_points: Vec<String>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightDraft {
    pub statement: String,
    pub evidence: Vec<NodeId>,
    #[serde(default)]
    pub poignancy: Option<f32>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectResponse {
    #[serde(default)]
    pub insights: Vec<InsightDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub speaker: String,
    pub listener: String,
    pub speaker_action: String,
    pub listener_action: String,
    pub transcript: Vec<Utterance>,
    pub memories: Vec<String>,
    pub max_turns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub utterance: String,
    #[serde(default)]
    pub end: bool,
}

/// Score freshly perceived events for importance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub agent: String,
    pub identity: String,
    pub events: Vec<TileEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResponse {
    /// One score per requested event, same order
    pub poignancy: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "context", rename_all = "snake_case")]
pub enum Request {
    Plan(PlanRequest),
    Reflect(ReflectRequest),
    ConverseTurn(TurnRequest),
    PerceiveFilter(FilterRequest),
}

impl Request {
    pub fn kind(&self) -> CollaboratorKind {
        match self {
            Self::Plan(_) => CollaboratorKind::Plan,
            Self::Reflect(_) => CollaboratorKind::Reflect,
            Self::ConverseTurn(_) => CollaboratorKind::ConverseTurn,
            Self::PerceiveFilter(_) => CollaboratorKind::PerceiveFilter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum Response {
    Plan(PlanResponse),
    Reflect(ReflectResponse),
    ConverseTurn(TurnResponse),
    PerceiveFilter(FilterResponse),
}

fn mismatch(expected: CollaboratorKind, got: &Response) -> CollaboratorError {
    CollaboratorError::MalformedResponse(format!(
        "expected {} response, got {}",
        expected.as_str(),
        got.kind().as_str()
    ))
}

impl Response {
    pub fn kind(&self) -> CollaboratorKind {
        match self {
            Self::Plan(_) => CollaboratorKind::Plan,
            Self::Reflect(_) => CollaboratorKind::Reflect,
            Self::ConverseTurn(_) => CollaboratorKind::ConverseTurn,
            Self::PerceiveFilter(_) => CollaboratorKind::PerceiveFilter,
        }
    }

    pub fn into_plan(self) -> Result<PlanResponse, CollaboratorError> {
        match self {
            Self::Plan(r) => Ok(r),
            other => Err(mismatch(CollaboratorKind::Plan, &other)),
        }
    }

    pub fn into_reflect(self) -> Result<ReflectResponse, CollaboratorError> {
        match self {
            Self::Reflect(r) => Ok(r),
            other => Err(mismatch(CollaboratorKind::Reflect, &other)),
        }
    }

    pub fn into_turn(self) -> Result<TurnResponse, CollaboratorError> {
        match self {
            Self::ConverseTurn(r) => Ok(r),
            other => Err(mismatch(CollaboratorKind::ConverseTurn, &other)),
        }
    }

    pub fn into_filter(self) -> Result<FilterResponse, CollaboratorError> {
        match self {
            Self::PerceiveFilter(r) => Ok(r),
            other => Err(mismatch(CollaboratorKind::PerceiveFilter, &other)),
        }
    }
}

/// The embedding provider could not produce a vector
#[derive(Error, Debug, Clone, PartialEq)]
#[error("embedding unavailable: {0}")]
pub struct EmbeddingUnavailable(pub String);

/// Structured request in, structured response out
pub trait LanguageModel: Send + Sync {
    fn complete(&self, request: &Request) -> Result<Response, CollaboratorError>;
}

pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable>;
}
