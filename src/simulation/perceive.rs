//! Perceive: turn nearby tile events into event memories
//!
//! Vision is a square of `vision_radius` around the agent. Every tile seen is
//! discovered in spatial memory. Events are taken from the agent's own arena
//! (when `same_arena_only`), minus those still retained in memory, scored for
//! poignancy, then capped to `attention_bandwidth` nearest first.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;

use crate::agent::{Agent, CycleContext};
use crate::core::error::{CollaboratorError, Result, ReverieError};
use crate::core::types::{NodeId, TileCoord};
use crate::llm::collaborator::{CollaboratorKind, FilterRequest, Request};
use crate::maze::address::AddressLevel;
use crate::maze::grid::Maze;
use crate::maze::tile::TileEvent;
use crate::memory::node::NewMemory;

struct Candidate {
    tile: TileCoord,
    distance: f32,
    event: TileEvent,
    poignancy: f32,
}

pub fn perceive(agent: &mut Agent, maze: &Maze, ctx: &mut CycleContext) -> Result<Vec<NodeId>> {
    let now = ctx.now();
    let config = ctx.config.perception.clone();
    let center = agent.tile();
    let own_arena = maze.tile(center).and_then(|t| t.address.truncated(AddressLevel::Arena));

    let mut candidates = Vec::new();
    for coord in maze.tiles_within(center, config.vision_radius) {
        let Some(tile) = maze.tile(coord) else {
            continue;
        };
        agent.spatial.discover(&tile.address);

        if config.same_arena_only && tile.address.truncated(AddressLevel::Arena) != own_arena {
            continue;
        }
        for event in tile.events.values() {
            if event.subject == agent.name() {
                continue;
            }
            if let Err(e) = event.validate() {
                tracing::warn!("{} ignored event at {}: {}", agent.name(), coord, e);
                ctx.stats.rejected_events += 1;
                continue;
            }
            if agent.memory.has_active_event(event, now, config.retention_match) {
                continue;
            }
            candidates.push(Candidate {
                tile: coord,
                distance: center.euclidean(&coord),
                event: event.clone(),
                poignancy: config.fallback_poignancy,
            });
        }
    }
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    score(agent, &mut candidates, ctx);

    candidates.sort_by(|a, b| {
        (OrderedFloat(a.distance), Reverse(OrderedFloat(a.poignancy)), a.tile, &a.event.subject).cmp(&(
            OrderedFloat(b.distance),
            Reverse(OrderedFloat(b.poignancy)),
            b.tile,
            &b.event.subject,
        ))
    });
    candidates.truncate(config.attention_bandwidth);

    let mut ids = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let event = candidate.event;
        let embedding = ctx.embed_or_zero(&event.description);
        let entry = NewMemory::event(
            event.subject.clone(),
            event.predicate,
            event.object.clone(),
            event.description,
        )
        .with_poignancy(candidate.poignancy)
        .with_keywords([event.subject, event.object])
        .with_embedding(embedding)
        .expiring_at(now + config.retention_steps);
        match agent.record(entry, now) {
            Ok(id) => ids.push(id),
            Err(ReverieError::Validation(reason)) => {
                tracing::warn!("{} could not remember an event: {}", agent.name(), reason);
                ctx.stats.rejected_events += 1;
            }
            Err(e) => return Err(e),
        }
    }
    tracing::debug!("{} perceived {} new events", agent.name(), ids.len());
    Ok(ids)
}

/// Fill in poignancy: idle events get the idle score, the rest are scored in
/// one batch by the collaborator, falling back on failure
fn score(agent: &Agent, candidates: &mut [Candidate], ctx: &mut CycleContext) {
    let config = &ctx.config.perception;
    let idle_poignancy = config.idle_poignancy;
    let fallback = config.fallback_poignancy;

    let mut pending = Vec::new();
    for (i, candidate) in candidates.iter_mut().enumerate() {
        if candidate.event.is_idle() {
            candidate.poignancy = idle_poignancy;
        } else {
            pending.push(i);
        }
    }
    if pending.is_empty() {
        return;
    }

    let request = Request::PerceiveFilter(FilterRequest {
        agent: agent.name().to_string(),
        identity: agent.scratch.identity.clone(),
        events: pending.iter().map(|i| candidates[*i].event.clone()).collect(),
    });
    let scores = ctx
        .complete(&request)
        .and_then(|r| r.into_filter())
        .and_then(|r| {
            if r.poignancy.len() == pending.len() {
                Ok(r.poignancy)
            } else {
                let e = CollaboratorError::MalformedResponse(format!(
                    "{} scores for {} events",
                    r.poignancy.len(),
                    pending.len()
                ));
                ctx.stats.record_failure(CollaboratorKind::PerceiveFilter, &e);
                Err(e)
            }
        });

    match scores {
        Ok(scores) => {
            for (i, score) in pending.into_iter().zip(scores) {
                candidates[i].poignancy = if score.is_finite() && score >= 0.0 { score } else { fallback };
            }
        }
        Err(e) => {
            tracing::warn!("{} event scoring degraded to defaults: {}", agent.name(), e);
            for i in pending {
                candidates[i].poignancy = fallback;
            }
        }
    }
}
