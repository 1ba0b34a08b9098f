//! Retrieval engine: rank memories by relevance, recency and importance
//!
//! Each focal point is scored independently. Candidates are the active nodes
//! of the requested kinds; every component is min-max normalized across the
//! candidate set before weighting.
//!
//! Embedding fallback: a focal point without an embedding (the embedding
//! provider failed) gives every candidate `neutral_relevance`, so ranking
//! falls back to recency and importance alone.

pub mod scoring;

use ordered_float::OrderedFloat;
use std::cmp::Reverse;

use crate::core::types::{NodeId, Step};
use crate::memory::associative::AssociativeMemory;
use crate::memory::node::MemoryKind;

pub use scoring::{composite_score, cosine_similarity, min_max_normalize, RetrievalParams};

/// A topic the caller wants memories about
#[derive(Debug, Clone, PartialEq)]
pub struct FocalPoint {
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

impl FocalPoint {
    pub fn new(text: impl Into<String>, embedding: Option<Vec<f32>>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    pub focal_points: Vec<FocalPoint>,
    pub kinds: Vec<MemoryKind>,
    /// Top-k; `None` uses the configured default
    pub limit: Option<usize>,
}

impl Query {
    /// Events and thoughts, the default retrieval scope
    pub fn new(focal_points: Vec<FocalPoint>) -> Self {
        Self {
            focal_points,
            kinds: vec![MemoryKind::Event, MemoryKind::Thought],
            limit: None,
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<MemoryKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNode {
    pub id: NodeId,
    pub score: f32,
    pub relevance: f32,
    pub recency: f32,
    pub importance: f32,
}

/// Ranked results, one list per distinct focal text in query order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieved {
    entries: Vec<(String, Vec<ScoredNode>)>,
}

impl Retrieved {
    pub fn get(&self, focal: &str) -> Option<&[ScoredNode]> {
        self.entries
            .iter()
            .find(|(text, _)| text == focal)
            .map(|(_, nodes)| nodes.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ScoredNode])> {
        self.entries.iter().map(|(t, n)| (t.as_str(), n.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct ids across all focal points, first-seen order
    pub fn all_ids(&self) -> Vec<NodeId> {
        let mut seen = std::collections::BTreeSet::new();
        self.entries
            .iter()
            .flat_map(|(_, nodes)| nodes.iter().map(|n| n.id))
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Rank memories for every focal point and mark the returned nodes as accessed
///
/// A focal point repeating an earlier one's text is skipped, so every list
/// is reachable through `Retrieved::get`.
pub fn retrieve(
    memory: &mut AssociativeMemory,
    query: &Query,
    now: Step,
    params: &RetrievalParams,
) -> Retrieved {
    let mut retrieved = Retrieved::default();

    for focal in &query.focal_points {
        if retrieved.get(&focal.text).is_some() {
            continue;
        }
        let ranked = rank(memory, focal, &query.kinds, query.limit, now, params);
        for node in &ranked {
            memory.touch(node.id, now);
        }
        retrieved.entries.push((focal.text.clone(), ranked));
    }

    retrieved
}

fn rank(
    memory: &AssociativeMemory,
    focal: &FocalPoint,
    kinds: &[MemoryKind],
    limit: Option<usize>,
    now: Step,
    params: &RetrievalParams,
) -> Vec<ScoredNode> {
    let candidates: Vec<_> = memory.active_nodes(kinds, now).collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let relevance = match &focal.embedding {
        Some(embedding) => {
            let raw: Vec<f32> = candidates
                .iter()
                .map(|n| cosine_similarity(&n.embedding, embedding))
                .collect();
            min_max_normalize(&raw)
        }
        None => vec![params.neutral_relevance; candidates.len()],
    };
    let recency = min_max_normalize(
        &candidates
            .iter()
            .map(|n| scoring::recency(params.recency_decay, now.saturating_sub(n.last_accessed_at)))
            .collect::<Vec<_>>(),
    );
    let importance = min_max_normalize(&candidates.iter().map(|n| n.poignancy).collect::<Vec<_>>());

    let mut scored: Vec<ScoredNode> = candidates
        .iter()
        .enumerate()
        .map(|(i, node)| ScoredNode {
            id: node.id,
            score: composite_score(relevance[i], recency[i], importance[i], params),
            relevance: relevance[i],
            recency: recency[i],
            importance: importance[i],
        })
        .collect();

    // Highest score first; ties go to the more recent (higher) id
    scored.sort_by_key(|n| Reverse((OrderedFloat(n.score), n.id)));

    match limit.or(params.default_limit) {
        Some(k) => {
            scored.truncate(k);
            scored
        }
        None => {
            let above: Vec<ScoredNode> = scored
                .iter()
                .filter(|n| n.score >= params.min_score)
                .cloned()
                .collect();
            if above.is_empty() {
                scored.truncate(params.fallback_count);
                scored
            } else {
                above
            }
        }
    }
}
