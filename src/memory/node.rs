use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::types::{NodeId, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Event,
    Thought,
    Chat,
}

/// How a node came to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Perceived event
    Observation,
    /// Insight synthesized by reflection; never feeds the reflection trigger
    Reflection,
    /// Summary of a finished conversation
    Conversation,
    /// Seeded from a history file at initialization
    History,
}

/// One line of a conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// An entry in an agent's associative memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: NodeId,
    pub kind: MemoryKind,
    pub source: MemorySource,
    pub created_at: Step,
    /// The only field that changes after creation
    pub last_accessed_at: Step,
    pub expires_at: Option<Step>,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub description: String,
    pub embedding: Vec<f32>,
    pub poignancy: f32,
    pub keywords: BTreeSet<String>,
    /// Ids this node was derived from, all strictly smaller than `id`
    pub filling: Vec<NodeId>,
    /// Conversation transcript; empty unless `kind` is `Chat`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<Utterance>,
}

impl MemoryNode {
    /// Visible to perception and retrieval at `now`
    pub fn is_active(&self, now: Step) -> bool {
        self.expires_at.map_or(true, |expiry| now < expiry)
    }

    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.subject, &self.predicate, &self.object)
    }

    pub fn summary(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Write request for `AssociativeMemory::record`
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub kind: MemoryKind,
    pub source: MemorySource,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub description: String,
    pub poignancy: f32,
    pub keywords: Vec<String>,
    pub embedding: Vec<f32>,
    pub filling: Vec<NodeId>,
    pub expires_at: Option<Step>,
    pub transcript: Vec<Utterance>,
}

impl NewMemory {
    fn base(
        kind: MemoryKind,
        source: MemorySource,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source,
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            description: description.into(),
            poignancy: 0.0,
            keywords: Vec::new(),
            embedding: Vec::new(),
            filling: Vec::new(),
            expires_at: None,
            transcript: Vec::new(),
        }
    }

    pub fn event(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::base(MemoryKind::Event, MemorySource::Observation, subject, predicate, object, description)
    }

    pub fn thought(
        source: MemorySource,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::base(MemoryKind::Thought, source, subject, predicate, object, description)
    }

    pub fn chat(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        description: impl Into<String>,
        transcript: Vec<Utterance>,
    ) -> Self {
        let mut memory = Self::base(
            MemoryKind::Chat,
            MemorySource::Conversation,
            subject,
            predicate,
            object,
            description,
        );
        memory.transcript = transcript;
        memory
    }

    pub fn with_poignancy(mut self, poignancy: f32) -> Self {
        self.poignancy = poignancy;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_filling(mut self, filling: Vec<NodeId>) -> Self {
        self.filling = filling;
        self
    }

    pub fn expiring_at(mut self, step: Step) -> Self {
        self.expires_at = Some(step);
        self
    }

    /// Whether writing this node feeds the reflection trigger
    pub fn counts_toward_reflection(&self) -> bool {
        self.source != MemorySource::Reflection
    }
}
