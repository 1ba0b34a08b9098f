//! Execute: turn the current action into one tile of movement

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::agent::{Agent, CycleContext};
use crate::core::error::ReverieError;
use crate::core::types::{AgentId, TileCoord};
use crate::maze::address::Address;
use crate::maze::grid::Maze;
use crate::maze::pathfinding::find_path;
use crate::memory::scratch::ActionTarget;
use crate::simulation::environment::{Movement, Presence};

/// How many tiles of a target place are tried as path goals
const GOAL_SAMPLES: usize = 4;

/// Position held while in a conversation
pub fn chat_movement(agent: &Agent) -> Option<Movement> {
    agent.scratch.chat_state.as_ref().map(|chat| Movement {
        tile: agent.tile(),
        description: format!("chatting with {}", chat.partner_name),
        emoji: "💬".to_string(),
        chat: chat.transcript.clone(),
    })
}

pub fn execute(agent: &mut Agent, maze: &Maze, roster: &[Presence], ctx: &mut CycleContext) -> Movement {
    if let Some(movement) = chat_movement(agent) {
        return movement;
    }

    let (description, emoji, target) = match &agent.scratch.current_action {
        Some(action) => (action.description.clone(), action.emoji.clone(), action.target.clone()),
        None => ("idle".to_string(), "💤".to_string(), ActionTarget::Stay),
    };

    let routed = match &target {
        ActionTarget::Stay => Ok(false),
        ActionTarget::Place(address) => route_to_place(agent, maze, address, ctx),
        ActionTarget::Agent(partner) => route_to_agent(agent, maze, roster, *partner),
    };
    match routed {
        Ok(true) => advance(agent, maze),
        Ok(false) => agent.scratch.clear_path(),
        Err(e) => {
            ctx.stats.no_path_holds += 1;
            tracing::debug!("{} holds position: {}", agent.name(), e);
            agent.scratch.clear_path();
        }
    }

    Movement {
        tile: agent.tile(),
        description,
        emoji,
        chat: Vec::new(),
    }
}

/// Ensure a path toward `address` is queued. `Ok(false)` once inside it.
fn route_to_place(
    agent: &mut Agent,
    maze: &Maze,
    address: &Address,
    ctx: &CycleContext,
) -> Result<bool, ReverieError> {
    let here = agent.tile();
    if maze.tile(here).is_some_and(|t| t.address.starts_with(address)) {
        return Ok(false);
    }
    let tiles = maze.tiles_for(address);
    if let Some(goal) = agent.scratch.path_target {
        if !agent.scratch.planned_path.is_empty() && tiles.is_some_and(|t| t.contains(&goal)) {
            return Ok(true);
        }
    }

    let walkable: Vec<TileCoord> = tiles
        .into_iter()
        .flatten()
        .copied()
        .filter(|t| maze.is_walkable(*t))
        .collect();
    if walkable.is_empty() {
        return Err(ReverieError::Validation(format!("no walkable tile in {}", address)));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(route_seed(ctx.config.seed, agent.id, ctx.now()));
    let mut goals: Vec<TileCoord> = walkable.choose_multiple(&mut rng, GOAL_SAMPLES).copied().collect();
    goals.sort();

    let best = goals
        .into_iter()
        .filter_map(|goal| find_path(maze, here, goal).ok())
        .min_by_key(|path| path.len());
    match best {
        Some(path) => {
            queue(agent, path);
            Ok(true)
        }
        None => Err(ReverieError::NoPath {
            start: here,
            goal: walkable[0],
        }),
    }
}

/// Walk to a free tile next to the partner. `Ok(false)` once adjacent.
fn route_to_agent(
    agent: &mut Agent,
    maze: &Maze,
    roster: &[Presence],
    partner: AgentId,
) -> Result<bool, ReverieError> {
    let here = agent.tile();
    let Some(there) = roster.iter().find(|p| p.id == partner).map(|p| p.tile) else {
        return Ok(false);
    };
    if here.is_adjacent_or_same(&there) {
        return Ok(false);
    }

    let mut goals: Vec<TileCoord> = there.neighbors4().filter(|t| maze.is_walkable(*t)).collect();
    goals.sort_by_key(|t| (t.manhattan(&here), *t));
    if agent.scratch.path_target.is_some_and(|t| goals.contains(&t)) && !agent.scratch.planned_path.is_empty() {
        return Ok(true);
    }

    for goal in &goals {
        if let Ok(path) = find_path(maze, here, *goal) {
            queue(agent, path);
            return Ok(true);
        }
    }
    Err(ReverieError::NoPath { start: here, goal: there })
}

fn queue(agent: &mut Agent, path: Vec<TileCoord>) {
    agent.scratch.path_target = path.last().copied();
    agent.scratch.planned_path = path.into_iter().skip(1).collect();
}

/// Take one tile off the queued path
fn advance(agent: &mut Agent, maze: &Maze) {
    match agent.scratch.planned_path.pop_front() {
        Some(next) if maze.is_walkable(next) => agent.scratch.current_tile = next,
        Some(next) => {
            tracing::debug!("{} found {} blocked, replanning", agent.name(), next);
            agent.scratch.clear_path();
        }
        None => {}
    }
}

fn route_seed(seed: u64, agent: AgentId, step: u64) -> u64 {
    seed ^ (u64::from(agent.0) << 32) ^ step.wrapping_mul(0x9e37_79b9_7f4a_7c15)
}
