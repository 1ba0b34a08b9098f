use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::{Result, ReverieError};
use crate::maze::address::Address;

/// An event currently happening at a tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEvent {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub description: String,
}

impl TileEvent {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            description: description.into(),
        }
    }

    /// Placeholder event for an object nobody is using
    pub fn idle(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        let description = format!("{} is idle", subject);
        Self::new(subject, "is", "idle", description)
    }

    pub fn is_idle(&self) -> bool {
        self.description.contains("is idle")
    }

    /// Subject, predicate and description must be non-blank to become a memory
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("subject", &self.subject),
            ("predicate", &self.predicate),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(ReverieError::Validation(format!("event {} is blank", field)));
            }
        }
        Ok(())
    }

    pub fn same_triple(&self, other: &TileEvent) -> bool {
        self.subject == other.subject && self.predicate == other.predicate && self.object == other.object
    }
}

/// Ground-truth grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub address: Address,
    pub collision: bool,
    /// Keyed by event subject; one event per subject per tile
    pub events: BTreeMap<String, TileEvent>,
}

impl Tile {
    pub fn new(address: Address, collision: bool) -> Self {
        Self {
            address,
            collision,
            events: BTreeMap::new(),
        }
    }

    pub fn add_event(&mut self, event: TileEvent) {
        self.events.insert(event.subject.clone(), event);
    }

    pub fn remove_event(&mut self, subject: &str) -> Option<TileEvent> {
        self.events.remove(subject)
    }
}
