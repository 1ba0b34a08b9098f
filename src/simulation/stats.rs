//! Counters for recoverable degradations
//!
//! Nothing here stops a step. The counters make persistent degraded
//! behavior visible (repeated timeouts, agents that never find a path).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::error::CollaboratorError;
use crate::llm::collaborator::CollaboratorKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegradationStats {
    pub collaborator_calls: u64,
    pub retries: u64,
    /// "<kind>/<error class>" -> count, after the retry budget was spent
    pub collaborator_failures: BTreeMap<String, u64>,
    pub embedding_fallbacks: u64,
    pub no_path_holds: u64,
    pub unknown_addresses: u64,
    pub discarded_insights: u64,
    /// Tile events or memory writes skipped as invalid
    #[serde(default)]
    pub rejected_events: u64,
    pub halted_agents: u64,
}

impl DegradationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, kind: CollaboratorKind, error: &CollaboratorError) {
        let key = format!("{}/{}", kind.as_str(), error.class());
        *self.collaborator_failures.entry(key).or_insert(0) += 1;
    }

    pub fn total_failures(&self) -> u64 {
        self.collaborator_failures.values().sum()
    }

    pub fn failures_for(&self, kind: CollaboratorKind) -> u64 {
        let prefix = format!("{}/", kind.as_str());
        self.collaborator_failures
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, count)| count)
            .sum()
    }

    /// No degradation of any kind so far
    pub fn is_clean(&self) -> bool {
        self.total_failures() == 0
            && self.embedding_fallbacks == 0
            && self.no_path_holds == 0
            && self.unknown_addresses == 0
            && self.discarded_insights == 0
            && self.rejected_events == 0
            && self.halted_agents == 0
    }
}

impl fmt::Display for DegradationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "calls={} retries={} failures={} embedding_fallbacks={} no_path={} unknown_addresses={} discarded_insights={} rejected_events={} halted={}",
            self.collaborator_calls,
            self.retries,
            self.total_failures(),
            self.embedding_fallbacks,
            self.no_path_holds,
            self.unknown_addresses,
            self.discarded_insights,
            self.rejected_events,
            self.halted_agents
        )
    }
}
