//! Reflection: turn accumulated experience into higher-level thoughts
//!
//! Idle until the importance accumulator reaches the threshold. Then the most
//! poignant recent memories become focal points, evidence is retrieved for
//! each, and the language model proposes insights citing that evidence.
//! Each valid insight is committed as a thought whose filling is its
//! evidence. The accumulator resets afterwards, even when nothing was
//! committed, so a failing model does not re-trigger every step.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::agent::{content_keywords, Agent, CycleContext};
use crate::core::error::Result;
use crate::core::types::{NodeId, Step};
use crate::llm::collaborator::{InsightDraft, ReflectRequest, Request, Statement};
use crate::memory::associative::AssociativeMemory;
use crate::memory::node::{MemoryKind, MemorySource, NewMemory};
use crate::retrieval::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionPhase {
    Idle,
    Triggered,
    Synthesizing,
    Committed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionOutcome {
    /// Phases visited this step, in order
    pub phase_trace: Vec<ReflectionPhase>,
    pub committed: Vec<NodeId>,
    pub discarded: usize,
}

impl ReflectionOutcome {
    fn idle() -> Self {
        Self {
            phase_trace: vec![ReflectionPhase::Idle],
            committed: Vec::new(),
            discarded: 0,
        }
    }

    pub fn triggered(&self) -> bool {
        self.phase_trace.contains(&ReflectionPhase::Triggered)
    }
}

/// A validated insight ready to commit
#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    pub statement: String,
    /// Sorted, deduplicated, all visible at synthesis time
    pub evidence: Vec<NodeId>,
    pub poignancy: f32,
    pub keywords: Vec<String>,
}

/// Check a drafted insight against the memory it cites
pub fn validate_insight(
    draft: &InsightDraft,
    memory: &AssociativeMemory,
    now: Step,
    fallback_poignancy: f32,
) -> std::result::Result<Insight, String> {
    let statement = draft.statement.trim();
    if statement.is_empty() {
        return Err("empty statement".into());
    }
    if draft.evidence.is_empty() {
        return Err(format!("'{}' cites no evidence", statement));
    }
    let evidence: BTreeSet<NodeId> = draft.evidence.iter().copied().collect();
    for id in &evidence {
        match memory.get(*id) {
            None => return Err(format!("'{}' cites unknown {}", statement, id)),
            Some(node) if !node.is_active(now) => {
                return Err(format!("'{}' cites expired {}", statement, id))
            }
            Some(_) => {}
        }
    }

    let poignancy = draft
        .poignancy
        .filter(|p| p.is_finite() && *p >= 0.0)
        .unwrap_or(fallback_poignancy);
    let keywords = if draft.keywords.is_empty() {
        content_keywords(statement)
    } else {
        draft.keywords.clone()
    };

    Ok(Insight {
        statement: statement.to_string(),
        evidence: evidence.into_iter().collect(),
        poignancy,
        keywords,
    })
}

/// Descriptions of the most poignant recent events and thoughts
fn focal_points(memory: &AssociativeMemory, now: Step, window: usize, count: usize) -> Vec<String> {
    let mut recent: Vec<_> = memory
        .nodes()
        .iter()
        .rev()
        .filter(|n| matches!(n.kind, MemoryKind::Event | MemoryKind::Thought))
        .filter(|n| n.is_active(now) && !n.description.contains("is idle"))
        .take(window)
        .collect();
    recent.sort_by_key(|n| Reverse((OrderedFloat(n.poignancy), n.id)));
    recent.into_iter().take(count).map(|n| n.description.clone()).collect()
}

/// Run the reflection state machine once for this step
pub fn reflect(agent: &mut Agent, ctx: &mut CycleContext) -> Result<ReflectionOutcome> {
    let config = &ctx.config.reflection;
    if agent.is_chatting() || agent.scratch.importance_trigger_accum < config.threshold {
        return Ok(ReflectionOutcome::idle());
    }

    let now = ctx.now();
    let (focal_count, evidence_limit, window, fallback_poignancy) = (
        config.focal_points,
        config.evidence_per_focal,
        config.recent_window,
        config.fallback_poignancy,
    );
    let mut outcome = ReflectionOutcome {
        phase_trace: vec![ReflectionPhase::Triggered],
        committed: Vec::new(),
        discarded: 0,
    };
    tracing::info!(
        "{} reflecting (accumulated importance {:.1})",
        agent.name(),
        agent.scratch.importance_trigger_accum
    );

    outcome.phase_trace.push(ReflectionPhase::Synthesizing);
    let topics = focal_points(&agent.memory, now, window, focal_count);
    let focal: Vec<_> = topics.iter().map(|t| ctx.focal_point(t.clone())).collect();
    let query = Query::new(focal).with_limit(evidence_limit);
    let params = ctx.retrieval_params();
    let retrieved = agent.retrieve(&query, now, &params);

    let statements: Vec<Statement> = retrieved
        .all_ids()
        .into_iter()
        .filter_map(|id| agent.memory.get(id))
        .map(|n| Statement {
            id: n.id,
            description: n.description.clone(),
        })
        .collect();

    let drafts = if statements.is_empty() {
        Vec::new()
    } else {
        let request = Request::Reflect(ReflectRequest {
            agent: agent.name().to_string(),
            focal_points: topics,
            statements,
        });
        match ctx.complete(&request).and_then(|r| r.into_reflect()) {
            Ok(response) => response.insights,
            Err(e) => {
                tracing::warn!("{} reflection degraded to no insights: {}", agent.name(), e);
                Vec::new()
            }
        }
    };

    // Validate everything against the pre-commit memory so new insights
    // cannot cite each other
    let mut insights = Vec::new();
    for draft in &drafts {
        match validate_insight(draft, &agent.memory, now, fallback_poignancy) {
            Ok(insight) => insights.push(insight),
            Err(reason) => {
                outcome.discarded += 1;
                ctx.stats.discarded_insights += 1;
                tracing::warn!("{} discarded insight: {}", agent.name(), reason);
            }
        }
    }

    for insight in insights {
        let embedding = ctx.embed_or_zero(&insight.statement);
        let entry = NewMemory::thought(
            MemorySource::Reflection,
            agent.name(),
            "realizes",
            insight.statement.clone(),
            insight.statement,
        )
        .with_poignancy(insight.poignancy)
        .with_keywords(insight.keywords)
        .with_embedding(embedding)
        .with_filling(insight.evidence);
        outcome.committed.push(agent.record(entry, now)?);
    }

    outcome.phase_trace.push(ReflectionPhase::Committed);
    agent.scratch.reset_importance();
    outcome.phase_trace.push(ReflectionPhase::Idle);
    tracing::debug!(
        "{} committed {} insights, discarded {}",
        agent.name(),
        outcome.committed.len(),
        outcome.discarded
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SimClock;
    use crate::core::config::EngineConfig;
    use crate::core::error::CollaboratorError;
    use crate::core::types::{AgentId, TileCoord};
    use crate::llm::collaborator::{LanguageModel, ReflectResponse, Response};
    use crate::llm::{Collaborators, HashingEmbedder, RetryPolicy};
    use crate::simulation::stats::DegradationStats;
    use std::sync::Arc;

    fn klaus(config: &EngineConfig) -> Agent {
        Agent::new(AgentId(1), "Klaus", TileCoord::new(0, 0), config.collaborator.embedding_dim)
    }

    fn perceive(agent: &mut Agent, ctx: &mut CycleContext, what: &str, poignancy: f32) -> NodeId {
        let description = format!("Klaus saw {}", what);
        let embedding = ctx.embed_or_zero(&description);
        agent
            .record(
                NewMemory::event("Klaus", "saw", what, description)
                    .with_poignancy(poignancy)
                    .with_embedding(embedding),
                ctx.now(),
            )
            .unwrap()
    }

    #[test]
    fn test_triggers_on_threshold_crossing_only() {
        let config = EngineConfig::default();
        let collaborators = Collaborators::offline(&config.collaborator);
        let mut stats = DegradationStats::new();
        let clock = SimClock::default();
        let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
        let mut agent = klaus(&config);

        perceive(&mut agent, &mut ctx, "a fire", 60.0);
        assert!(!reflect(&mut agent, &mut ctx).unwrap().triggered());
        perceive(&mut agent, &mut ctx, "a flood", 50.0);
        assert!(!reflect(&mut agent, &mut ctx).unwrap().triggered());
        assert_eq!(agent.scratch.importance_trigger_accum, 110.0);

        perceive(&mut agent, &mut ctx, "a parade", 45.0);
        let outcome = reflect(&mut agent, &mut ctx).unwrap();
        assert!(outcome.triggered());
        assert_eq!(
            outcome.phase_trace,
            vec![
                ReflectionPhase::Triggered,
                ReflectionPhase::Synthesizing,
                ReflectionPhase::Committed,
                ReflectionPhase::Idle
            ]
        );
        assert_eq!(outcome.committed.len(), 1);
        assert_eq!(agent.scratch.importance_trigger_accum, 0.0);

        // Committed insight neither re-triggers nor feeds the accumulator
        assert!(!reflect(&mut agent, &mut ctx).unwrap().triggered());

        let insight = agent.memory.get(outcome.committed[0]).unwrap();
        assert_eq!(insight.source, MemorySource::Reflection);
        assert!(!insight.filling.is_empty());
        assert!(insight.filling.iter().all(|f| *f < insight.id));
    }

    #[test]
    fn test_skipped_while_chatting() {
        let config = EngineConfig::default();
        let collaborators = Collaborators::offline(&config.collaborator);
        let mut stats = DegradationStats::new();
        let clock = SimClock::default();
        let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
        let mut agent = klaus(&config);

        perceive(&mut agent, &mut ctx, "a fire", 200.0);
        agent.scratch.chat_state = Some(crate::memory::scratch::ChatState {
            partner: AgentId(2),
            partner_name: "Maria".into(),
            transcript: vec![],
            turn_owner: AgentId(1),
            started_at: 0,
            last_turn_at: None,
            context: BTreeSet::new(),
        });
        assert!(!reflect(&mut agent, &mut ctx).unwrap().triggered());
        assert_eq!(agent.scratch.importance_trigger_accum, 200.0);
    }

    struct Scripted(Vec<InsightDraft>);

    impl LanguageModel for Scripted {
        fn complete(&self, _request: &Request) -> std::result::Result<Response, CollaboratorError> {
            Ok(Response::Reflect(ReflectResponse {
                insights: self.0.clone(),
            }))
        }
    }

    fn draft(statement: &str, evidence: Vec<NodeId>) -> InsightDraft {
        InsightDraft {
            statement: statement.into(),
            evidence,
            poignancy: Some(6.0),
            keywords: vec![],
        }
    }

    #[test]
    fn test_invalid_insights_discarded_individually() {
        let config = EngineConfig::default();
        let collaborators = Collaborators::new(
            Arc::new(Scripted(vec![
                draft("Klaus loves research", vec![NodeId(1)]),
                draft("Klaus cites the future", vec![NodeId(99)]),
                draft("Klaus cites an old memory", vec![NodeId(2)]),
                draft("Klaus cites nothing", vec![]),
            ])),
            Arc::new(HashingEmbedder::new(config.collaborator.embedding_dim)),
            RetryPolicy::immediate(1),
        );
        let mut stats = DegradationStats::new();
        let mut agent = klaus(&config);

        {
            let clock = SimClock::default();
            let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
            perceive(&mut agent, &mut ctx, "a library", 100.0);
        }
        // Node 2 expires at step 5
        let dim = config.collaborator.embedding_dim;
        agent
            .record(
                NewMemory::event("Klaus", "saw", "a rumor", "Klaus saw a rumor")
                    .with_poignancy(60.0)
                    .with_embedding(vec![0.0; dim])
                    .expiring_at(5),
                0,
            )
            .unwrap();

        let clock = SimClock::at_step(10, 0, 10);
        let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
        let outcome = reflect(&mut agent, &mut ctx).unwrap();

        assert_eq!(outcome.committed.len(), 1);
        assert_eq!(outcome.discarded, 3);
        assert_eq!(ctx.stats.discarded_insights, 3);
        assert_eq!(agent.memory.get(outcome.committed[0]).unwrap().filling, vec![NodeId(1)]);
        assert_eq!(agent.scratch.importance_trigger_accum, 0.0);
    }

    struct Down;

    impl LanguageModel for Down {
        fn complete(&self, _request: &Request) -> std::result::Result<Response, CollaboratorError> {
            Err(CollaboratorError::RateLimited)
        }
    }

    #[test]
    fn test_collaborator_failure_resets_accumulator() {
        let config = EngineConfig::default();
        let collaborators = Collaborators::new(
            Arc::new(Down),
            Arc::new(HashingEmbedder::new(config.collaborator.embedding_dim)),
            RetryPolicy::immediate(3),
        );
        let mut stats = DegradationStats::new();
        let clock = SimClock::default();
        let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
        let mut agent = klaus(&config);

        perceive(&mut agent, &mut ctx, "an earthquake", 151.0);
        let outcome = reflect(&mut agent, &mut ctx).unwrap();

        assert!(outcome.triggered());
        assert!(outcome.committed.is_empty());
        assert_eq!(agent.scratch.importance_trigger_accum, 0.0);
        assert_eq!(ctx.stats.collaborator_failures["reflect/rate_limited"], 1);
        assert_eq!(ctx.stats.retries, 2);
    }
}
