//! Plan: keep a daily schedule and pick the next concrete action
//!
//! The schedule is regenerated when stale (once per simulated day). When
//! the current action completes, the next schedule item is resolved into an
//! action by the collaborator. Any collaborator failure degrades to an idle
//! action in place.

use crate::agent::{Agent, CycleContext};
use crate::core::error::{CollaboratorError, Result};
use crate::core::types::AgentId;
use crate::llm::collaborator::{CollaboratorKind, PlanMode, PlanRequest, PlannedAction, Request};
use crate::maze::address::{Address, AddressLevel};
use crate::maze::grid::Maze;
use crate::maze::tile::TileEvent;
use crate::memory::scratch::{ActionTarget, CurrentAction, ScheduleItem};
use crate::retrieval::Retrieved;
use crate::simulation::environment::Presence;

const IDLE_MINUTES: u32 = 15;
const IDLE_EMOJI: &str = "💤";

pub fn plan(
    agent: &mut Agent,
    maze: &Maze,
    retrieved: &Retrieved,
    nearby: &[Presence],
    ctx: &mut CycleContext,
) -> Result<()> {
    if agent.is_chatting() {
        return Ok(());
    }
    let now = ctx.now();

    if agent.scratch.schedule_is_stale(now) {
        refresh_schedule(agent, maze, retrieved, nearby, ctx);
    }

    if agent.scratch.action_completed(now) {
        let item = agent.scratch.daily_schedule.pop_front();
        let action = match &item {
            Some(item) => next_action(agent, maze, retrieved, nearby, item, ctx),
            None => idle_action(agent, IDLE_MINUTES, ctx),
        };
        tracing::debug!("{} now {} ({} steps)", agent.name(), action.description, action.duration_steps);
        if agent.scratch.current_action.as_ref().map(|a| &a.target) != Some(&action.target) {
            agent.scratch.clear_path();
        }
        agent.scratch.current_action = Some(action);
    }
    Ok(())
}

fn request(
    agent: &Agent,
    maze: &Maze,
    retrieved: &Retrieved,
    nearby: &[Presence],
    mode: PlanMode,
    activity: Option<String>,
    ctx: &CycleContext,
) -> Request {
    let current_place = maze
        .tile(agent.tile())
        .map(|t| t.address.to_string())
        .unwrap_or_default();
    let memories = retrieved
        .all_ids()
        .into_iter()
        .filter_map(|id| agent.memory.get(id))
        .take(ctx.config.conversation.context_limit)
        .map(|n| n.description.clone())
        .collect();

    Request::Plan(PlanRequest {
        agent: agent.name().to_string(),
        identity: agent.scratch.identity.clone(),
        time: ctx.clock.time_label(),
        mode,
        current_place,
        known_places: agent.spatial.known_arenas().iter().map(Address::to_string).collect(),
        nearby_agents: nearby.iter().filter(|p| !p.chatting).map(|p| p.name.clone()).collect(),
        activity,
        memories,
    })
}

fn refresh_schedule(
    agent: &mut Agent,
    maze: &Maze,
    retrieved: &Retrieved,
    nearby: &[Presence],
    ctx: &mut CycleContext,
) {
    let request = request(agent, maze, retrieved, nearby, PlanMode::Schedule, None, ctx);
    match ctx.complete(&request).and_then(|r| r.into_plan()) {
        Ok(response) => {
            let schedule: Vec<ScheduleItem> = response
                .schedule
                .into_iter()
                .filter(|item| item.duration_minutes > 0 && !item.activity.trim().is_empty())
                .collect();
            tracing::info!("{} planned {} activities for {}", agent.name(), schedule.len(), ctx.clock.time_label());
            agent.scratch.daily_schedule = schedule.into();
            agent.scratch.long_term_plan_valid_until = Some(ctx.clock.next_day_start());
        }
        Err(e) => {
            // Stays stale, so the next step tries again
            tracing::warn!("{} could not plan the day: {}", agent.name(), e);
        }
    }
}

fn next_action(
    agent: &mut Agent,
    maze: &Maze,
    retrieved: &Retrieved,
    nearby: &[Presence],
    item: &ScheduleItem,
    ctx: &mut CycleContext,
) -> CurrentAction {
    let request = request(
        agent,
        maze,
        retrieved,
        nearby,
        PlanMode::NextAction,
        Some(item.activity.clone()),
        ctx,
    );
    let planned = ctx.complete(&request).and_then(|r| r.into_plan()).and_then(|r| {
        r.action.ok_or_else(|| {
            let e = CollaboratorError::MalformedResponse("plan response has no action".into());
            ctx.stats.record_failure(CollaboratorKind::Plan, &e);
            e
        })
    });

    match planned {
        Ok(planned) if !planned.description.trim().is_empty() => {
            build_action(agent, maze, nearby, item, planned, ctx)
        }
        Ok(_) => idle_action(agent, item.duration_minutes, ctx),
        Err(e) => {
            tracing::warn!("{} falls back to idle for '{}': {}", agent.name(), item.activity, e);
            idle_action(agent, item.duration_minutes, ctx)
        }
    }
}

fn build_action(
    agent: &mut Agent,
    maze: &Maze,
    nearby: &[Presence],
    item: &ScheduleItem,
    mut planned: PlannedAction,
    ctx: &mut CycleContext,
) -> CurrentAction {
    agent.scratch.pending_question = planned.question.take().filter(|q| !q.trim().is_empty());
    let target = match partner(agent, nearby, planned.converse_with.as_deref()) {
        Some(id) => ActionTarget::Agent(id),
        None => resolve_place(agent, maze, &planned, item, ctx),
    };
    let minutes = planned.duration_minutes.filter(|m| *m > 0).unwrap_or(item.duration_minutes);
    let description = planned.description.trim().to_string();
    let event = TileEvent::new(
        agent.name(),
        planned.predicate.unwrap_or_else(|| "is".to_string()),
        planned.object.unwrap_or_else(|| description.clone()),
        format!("{} is {}", agent.name(), description),
    );

    CurrentAction {
        description,
        target,
        start_step: ctx.now(),
        duration_steps: ctx.clock.minutes_to_steps(minutes),
        emoji: planned.emoji.unwrap_or_else(|| "🙂".to_string()),
        event,
    }
}

fn partner(agent: &Agent, nearby: &[Presence], name: Option<&str>) -> Option<AgentId> {
    let name = name?.trim();
    nearby
        .iter()
        .find(|p| p.id != agent.id && !p.chatting && p.name.eq_ignore_ascii_case(name))
        .map(|p| p.id)
}

/// First known address among the action's and the schedule item's. An
/// address the agent does not know is replaced by its current arena.
fn resolve_place(
    agent: &Agent,
    maze: &Maze,
    planned: &PlannedAction,
    item: &ScheduleItem,
    ctx: &mut CycleContext,
) -> ActionTarget {
    let mut proposed = Vec::new();
    if let Some(text) = &planned.address {
        match text.parse::<Address>() {
            Ok(address) => proposed.push(address),
            Err(_) => proposed.push(Address::world(text.clone())),
        }
    }
    if let Some(address) = &item.address {
        proposed.push(address.clone());
    }
    if proposed.is_empty() {
        return ActionTarget::Stay;
    }

    if let Some(address) = proposed
        .iter()
        .find(|a| agent.spatial.is_known(a) && maze.tiles_for(a).is_some())
    {
        return ActionTarget::Place(address.clone());
    }

    ctx.stats.unknown_addresses += 1;
    tracing::warn!(
        "{} planned unknown place '{}', staying in current arena",
        agent.name(),
        proposed[0]
    );
    match maze
        .tile(agent.tile())
        .and_then(|t| t.address.truncated(AddressLevel::Arena))
    {
        Some(arena) => ActionTarget::Place(arena),
        None => ActionTarget::Stay,
    }
}

fn idle_action(agent: &Agent, minutes: u32, ctx: &CycleContext) -> CurrentAction {
    CurrentAction {
        description: "idle".to_string(),
        target: ActionTarget::Stay,
        start_step: ctx.now(),
        duration_steps: ctx.clock.minutes_to_steps(minutes.max(1)),
        emoji: IDLE_EMOJI.to_string(),
        event: TileEvent::idle(agent.name()),
    }
}
