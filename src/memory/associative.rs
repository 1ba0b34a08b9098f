//! Append-only associative memory with an incremental keyword index

use ahash::AHashMap;
use std::collections::BTreeSet;

use crate::core::config::RetentionMatch;
use crate::core::error::{ReverieError, Result};
use crate::core::types::{NodeId, Step};
use crate::maze::tile::TileEvent;
use crate::memory::keywords::{normalize_all, normalize_keyword};
use crate::memory::node::{MemoryKind, MemoryNode, NewMemory};

/// One agent's memory stream
///
/// Node ids start at 1 and equal `index + 1` in the log, so lookups are O(1)
/// and ids double as insertion order.
#[derive(Debug, Clone)]
pub struct AssociativeMemory {
    nodes: Vec<MemoryNode>,
    keyword_index: AHashMap<String, BTreeSet<NodeId>>,
    /// Event subject -> event ids, used by the retention filter
    event_subjects: AHashMap<String, Vec<NodeId>>,
    embedding_dim: usize,
}

impl AssociativeMemory {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            nodes: Vec::new(),
            keyword_index: AHashMap::new(),
            event_subjects: AHashMap::new(),
            embedding_dim,
        }
    }

    /// Rebuild from a persisted log, checking id order and filling references
    pub fn from_nodes(nodes: Vec<MemoryNode>, embedding_dim: usize) -> std::result::Result<Self, String> {
        let mut memory = Self::new(embedding_dim);
        for (index, node) in nodes.into_iter().enumerate() {
            let expected = NodeId(index as u64 + 1);
            if node.id != expected {
                return Err(format!("expected {} at position {}, found {}", expected, index, node.id));
            }
            if let Some(bad) = node.filling.iter().find(|f| **f >= node.id || f.0 == 0) {
                return Err(format!("{} references {} which is not earlier", node.id, bad));
            }
            if node.embedding.len() != embedding_dim {
                return Err(format!(
                    "{} has embedding of length {}, expected {}",
                    node.id,
                    node.embedding.len(),
                    embedding_dim
                ));
            }
            memory.index(&node);
            memory.nodes.push(node);
        }
        Ok(memory)
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u64 + 1)
    }

    fn slot(id: NodeId) -> Option<usize> {
        (id.0 as usize).checked_sub(1)
    }

    pub fn get(&self, id: NodeId) -> Option<&MemoryNode> {
        Self::slot(id).and_then(|i| self.nodes.get(i))
    }

    /// The full log in id order
    pub fn nodes(&self) -> &[MemoryNode] {
        &self.nodes
    }

    fn validate(&self, entry: &NewMemory) -> Result<()> {
        if entry.description.trim().is_empty() {
            return Err(ReverieError::Validation("memory description is empty".into()));
        }
        if !entry.poignancy.is_finite() || entry.poignancy < 0.0 {
            return Err(ReverieError::Validation(format!(
                "poignancy must be a finite value >= 0, got {}",
                entry.poignancy
            )));
        }
        if entry.embedding.len() != self.embedding_dim {
            return Err(ReverieError::Validation(format!(
                "embedding has length {}, expected {}",
                entry.embedding.len(),
                self.embedding_dim
            )));
        }
        if entry.embedding.iter().any(|v| !v.is_finite()) {
            return Err(ReverieError::Validation("embedding contains non-finite values".into()));
        }
        let next = self.next_id();
        if let Some(bad) = entry.filling.iter().find(|f| f.0 == 0 || **f >= next) {
            return Err(ReverieError::Validation(format!(
                "filling references {} which does not exist before {}",
                bad, next
            )));
        }
        if entry.kind != MemoryKind::Chat && !entry.transcript.is_empty() {
            return Err(ReverieError::Validation("only chat memories carry a transcript".into()));
        }
        Ok(())
    }

    /// Append a node. Fails with `Validation` on malformed input and leaves
    /// the memory untouched.
    pub fn record(&mut self, entry: NewMemory, now: Step) -> Result<NodeId> {
        self.validate(&entry)?;

        let id = self.next_id();
        let node = MemoryNode {
            id,
            kind: entry.kind,
            source: entry.source,
            created_at: now,
            last_accessed_at: now,
            expires_at: entry.expires_at,
            subject: entry.subject,
            predicate: entry.predicate,
            object: entry.object,
            description: entry.description,
            embedding: entry.embedding,
            poignancy: entry.poignancy,
            keywords: normalize_all(&entry.keywords),
            filling: entry.filling,
            transcript: entry.transcript,
        };

        self.index(&node);
        self.nodes.push(node);
        Ok(id)
    }

    fn index(&mut self, node: &MemoryNode) {
        for keyword in &node.keywords {
            self.keyword_index.entry(keyword.clone()).or_default().insert(node.id);
        }
        if node.kind == MemoryKind::Event {
            self.event_subjects.entry(node.subject.clone()).or_default().push(node.id);
        }
    }

    /// Ids of nodes carrying any of the given keywords
    pub fn get_by_keyword<I, S>(&self, tokens: I) -> BTreeSet<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter_map(|t| normalize_keyword(t.as_ref()))
            .filter_map(|k| self.keyword_index.get(&k))
            .flat_map(|ids| ids.iter().copied())
            .collect()
    }

    /// Most recent nodes of a kind, newest first
    pub fn get_recent(&self, kind: MemoryKind, limit: usize) -> Vec<&MemoryNode> {
        // created_at is non-decreasing in id order, so reverse id order is newest first
        self.nodes
            .iter()
            .rev()
            .filter(|n| n.kind == kind)
            .take(limit)
            .collect()
    }

    /// Whether an unexpired event matching `event` is already remembered
    pub fn has_active_event(&self, event: &TileEvent, now: Step, policy: RetentionMatch) -> bool {
        let Some(ids) = self.event_subjects.get(&event.subject) else {
            return false;
        };
        ids.iter()
            .rev()
            .filter_map(|id| self.get(*id))
            .filter(|n| n.is_active(now))
            .any(|n| match policy {
                RetentionMatch::Subject => true,
                RetentionMatch::Triple => n.predicate == event.predicate && n.object == event.object,
            })
    }

    /// Active nodes of the given kinds at `now`, in id order
    pub fn active_nodes<'a>(
        &'a self,
        kinds: &'a [MemoryKind],
        now: Step,
    ) -> impl Iterator<Item = &'a MemoryNode> + 'a {
        self.nodes
            .iter()
            .filter(move |n| kinds.contains(&n.kind) && n.is_active(now))
    }

    /// Mark a node as accessed by retrieval
    pub fn touch(&mut self, id: NodeId, now: Step) {
        if let Some(node) = Self::slot(id).and_then(|i| self.nodes.get_mut(i)) {
            node.last_accessed_at = node.last_accessed_at.max(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::node::{MemorySource, Utterance};

    const DIM: usize = 3;

    fn event(subject: &str, object: &str, poignancy: f32) -> NewMemory {
        NewMemory::event(subject, "is", object, format!("{} is {}", subject, object))
            .with_poignancy(poignancy)
            .with_keywords([subject, object])
            .with_embedding(vec![1.0, 0.0, 0.0])
    }

    #[test]
    fn test_ids_are_monotonic_from_one() {
        let mut memory = AssociativeMemory::new(DIM);
        let a = memory.record(event("Klaus", "reading", 2.0), 0).unwrap();
        let b = memory.record(event("Maria", "painting", 3.0), 1).unwrap();
        assert_eq!(a, NodeId(1));
        assert_eq!(b, NodeId(2));
        assert_eq!(memory.get(b).unwrap().subject, "Maria");
        assert!(memory.get(NodeId(0)).is_none());
        assert!(memory.get(NodeId(3)).is_none());
    }

    #[test]
    fn test_filling_must_reference_earlier_nodes() {
        let mut memory = AssociativeMemory::new(DIM);
        memory.record(event("Klaus", "reading", 2.0), 0).unwrap();

        let forward = NewMemory::thought(MemorySource::Reflection, "Klaus", "is", "studious", "Klaus is studious")
            .with_embedding(vec![0.0; DIM])
            .with_filling(vec![NodeId(2)]);
        assert!(matches!(memory.record(forward, 1), Err(ReverieError::Validation(_))));
        assert_eq!(memory.len(), 1);

        let valid = NewMemory::thought(MemorySource::Reflection, "Klaus", "is", "studious", "Klaus is studious")
            .with_embedding(vec![0.0; DIM])
            .with_filling(vec![NodeId(1)]);
        assert_eq!(memory.record(valid, 1).unwrap(), NodeId(2));
    }

    #[test]
    fn test_validation_rejects_malformed_writes() {
        let mut memory = AssociativeMemory::new(DIM);
        let wrong_dim = event("Klaus", "reading", 1.0).with_embedding(vec![1.0]);
        assert!(memory.record(wrong_dim, 0).is_err());

        let negative = event("Klaus", "reading", -1.0);
        assert!(memory.record(negative, 0).is_err());

        let empty = NewMemory::event("a", "b", "c", "  ").with_embedding(vec![0.0; DIM]);
        assert!(memory.record(empty, 0).is_err());

        let mut bad_transcript = event("Klaus", "reading", 1.0);
        bad_transcript.transcript.push(Utterance::new("Klaus", "hi"));
        assert!(memory.record(bad_transcript, 0).is_err());

        assert!(memory.is_empty());
    }

    #[test]
    fn test_keyword_index_is_normalized() {
        let mut memory = AssociativeMemory::new(DIM);
        let id = memory.record(event("Klaus", "Parties", 2.0), 0).unwrap();
        memory.record(event("Maria", "painting", 2.0), 0).unwrap();

        let hits = memory.get_by_keyword(["party"]);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![id]);
        assert_eq!(memory.get_by_keyword(["KLAUS", "maria"]).len(), 2);
        assert!(memory.get_by_keyword(["nobody"]).is_empty());
    }

    #[test]
    fn test_get_recent_newest_first() {
        let mut memory = AssociativeMemory::new(DIM);
        for step in 0..5 {
            memory.record(event("Klaus", &format!("task{}", step), 1.0), step).unwrap();
        }
        let thought = NewMemory::thought(MemorySource::History, "Klaus", "likes", "tea", "Klaus likes tea")
            .with_embedding(vec![0.0; DIM]);
        memory.record(thought, 5).unwrap();

        let recent = memory.get_recent(MemoryKind::Event, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].object, "task4");
        assert_eq!(recent[1].object, "task3");
        assert_eq!(memory.get_recent(MemoryKind::Thought, 10).len(), 1);
    }

    #[test]
    fn test_retention_match_policies() {
        let mut memory = AssociativeMemory::new(DIM);
        memory
            .record(event("Klaus", "reading", 1.0).expiring_at(10), 0)
            .unwrap();

        let same = TileEvent::new("Klaus", "is", "reading", "Klaus is reading");
        let other = TileEvent::new("Klaus", "is", "eating", "Klaus is eating");

        assert!(memory.has_active_event(&same, 5, RetentionMatch::Triple));
        assert!(!memory.has_active_event(&other, 5, RetentionMatch::Triple));
        assert!(memory.has_active_event(&other, 5, RetentionMatch::Subject));
        // Expired at step 10
        assert!(!memory.has_active_event(&same, 10, RetentionMatch::Triple));
    }

    #[test]
    fn test_touch_updates_only_last_accessed() {
        let mut memory = AssociativeMemory::new(DIM);
        let id = memory.record(event("Klaus", "reading", 1.0), 3).unwrap();
        memory.touch(id, 9);
        let node = memory.get(id).unwrap();
        assert_eq!(node.created_at, 3);
        assert_eq!(node.last_accessed_at, 9);
    }

    #[test]
    fn test_from_nodes_rejects_id_gaps() {
        let mut memory = AssociativeMemory::new(DIM);
        memory.record(event("Klaus", "reading", 1.0), 0).unwrap();
        memory.record(event("Maria", "painting", 1.0), 0).unwrap();

        let mut nodes = memory.nodes().to_vec();
        assert!(AssociativeMemory::from_nodes(nodes.clone(), DIM).is_ok());

        nodes.remove(0);
        assert!(AssociativeMemory::from_nodes(nodes, DIM).is_err());
    }
}
