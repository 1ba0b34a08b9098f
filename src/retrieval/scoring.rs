//! Score components for memory retrieval

use crate::core::config::RetrievalConfig;

/// Weights and tunables for one retrieval call
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    pub relevance_weight: f32,
    pub recency_weight: f32,
    pub importance_weight: f32,
    pub recency_decay: f32,
    pub min_score: f32,
    pub fallback_count: usize,
    pub default_limit: Option<usize>,
    pub neutral_relevance: f32,
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            relevance_weight: config.relevance_weight,
            recency_weight: config.recency_weight,
            importance_weight: config.importance_weight,
            recency_decay: config.recency_decay,
            min_score: config.min_score,
            fallback_count: config.fallback_count,
            default_limit: config.default_limit,
            neutral_relevance: config.neutral_relevance,
        }
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Rescale to [0, 1]. A flat input maps every value to the 0.5 midpoint.
pub fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    let Some(min) = values.iter().copied().reduce(f32::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().fold(min, f32::max);
    let range = max - min;
    if range <= f32::EPSILON {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// decay ^ steps_since_access
pub fn recency(decay: f32, steps_since_access: u64) -> f32 {
    decay.powf(steps_since_access as f32)
}

/// Weighted sum of the normalized components
pub fn composite_score(relevance: f32, recency: f32, importance: f32, params: &RetrievalParams) -> f32 {
    params.relevance_weight * relevance
        + params.recency_weight * recency
        + params.importance_weight * importance
}
