//! The simulation: agent registry, grid world, clock and the step loop

use ahash::AHashMap;

use crate::agent::{Agent, AgentProfile, CycleContext};
use crate::core::clock::SimClock;
use crate::core::config::EngineConfig;
use crate::core::error::{ReverieError, Result};
use crate::core::types::AgentId;
use crate::llm::Collaborators;
use crate::maze::grid::Maze;
use crate::maze::tile::TileEvent;
use crate::reflection::reflect;
use crate::retrieval::{Query, Retrieved};
use crate::simulation::converse::converse;
use crate::simulation::environment::{EnvironmentSnapshot, Movement, MovementRecord, Presence};
use crate::simulation::execute::{chat_movement, execute};
use crate::simulation::perceive::perceive;
use crate::simulation::plan::plan;
use crate::simulation::stats::DegradationStats;

pub struct Simulation {
    config: EngineConfig,
    maze: Maze,
    clock: SimClock,
    /// Registry order is processing order
    agents: Vec<Agent>,
    index: AHashMap<AgentId, usize>,
    collaborators: Collaborators,
    stats: DegradationStats,
}

impl Simulation {
    pub fn new(config: EngineConfig, maze: Maze, collaborators: Collaborators) -> Result<Self> {
        let clock = SimClock::new(config.clock.seconds_per_step, config.clock.start_minute_of_day);
        Self::from_parts(config, maze, clock, Vec::new(), collaborators)
    }

    /// Reassemble a simulation from saved state
    pub fn from_parts(
        config: EngineConfig,
        maze: Maze,
        clock: SimClock,
        agents: Vec<Agent>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        let mut index = AHashMap::new();
        for (i, agent) in agents.iter().enumerate() {
            if index.insert(agent.id, i).is_some() {
                return Err(ReverieError::Validation(format!("duplicate agent id {}", agent.id)));
            }
            if !maze.in_bounds(agent.tile()) {
                return Err(ReverieError::Validation(format!(
                    "{} stands outside the maze at {}",
                    agent.name(),
                    agent.tile()
                )));
            }
        }
        let mut simulation = Self {
            config,
            maze,
            clock,
            agents,
            index,
            collaborators,
            stats: DegradationStats::new(),
        };
        simulation.refresh_tile_events();
        Ok(simulation)
    }

    /// Register an agent at the end of the processing order
    pub fn add_agent(&mut self, profile: &AgentProfile) -> Result<AgentId> {
        if self.agents.iter().any(|a| a.name() == profile.name) {
            return Err(ReverieError::Validation(format!("agent '{}' already exists", profile.name)));
        }
        if !self.maze.is_walkable(profile.tile) {
            return Err(ReverieError::Validation(format!(
                "{} cannot start on {}",
                profile.name, profile.tile
            )));
        }

        let id = AgentId(self.agents.iter().map(|a| a.id.0).max().unwrap_or(0) + 1);
        let mut agent = Agent::from_profile(id, profile, self.config.collaborator.embedding_dim)?;
        let mut ctx = CycleContext::new(&self.config, &self.collaborators, &mut self.stats, &self.clock);
        agent.load_history(&profile.history, &mut ctx)?;

        self.maze.add_event(agent.tile(), tile_event(&agent));
        self.index.insert(id, self.agents.len());
        self.agents.push(agent);
        tracing::info!("Added agent {} ({})", profile.name, id);
        Ok(id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.index.get(&id).map(|i| &self.agents[*i])
    }

    pub fn agent_by_name(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name().eq_ignore_ascii_case(name))
    }

    pub fn stats(&self) -> &DegradationStats {
        &self.stats
    }

    /// Carry counters over from a saved run
    pub fn restore_stats(&mut self, stats: DegradationStats) {
        self.stats = stats;
    }

    /// Run one cognitive cycle for every agent, in registry order
    pub fn step(&mut self, snapshot: &EnvironmentSnapshot) -> Result<MovementRecord> {
        for (id, tile) in &snapshot.positions {
            if !self.index.contains_key(id) {
                return Err(ReverieError::UnknownAgent(*id));
            }
            if !self.maze.in_bounds(*tile) {
                return Err(ReverieError::Validation(format!("{} placed outside the maze at {}", id, tile)));
            }
        }
        for injected in &snapshot.events {
            if !self.maze.in_bounds(injected.tile) {
                return Err(ReverieError::Validation(format!("event injected outside the maze at {}", injected.tile)));
            }
            injected.event.validate()?;
        }
        for (id, tile) in &snapshot.positions {
            let agent = &mut self.agents[self.index[id]];
            if agent.tile() != *tile {
                agent.scratch.current_tile = *tile;
                agent.scratch.clear_path();
            }
        }
        for injected in &snapshot.events {
            self.maze.add_event(injected.tile, injected.event.clone());
        }
        self.refresh_tile_events();

        let step = self.clock.current_step();
        let mut movements = std::collections::BTreeMap::new();
        for i in 0..self.agents.len() {
            let movement = match self.cycle(i) {
                Ok(movement) => movement,
                Err(e) => {
                    let agent = &self.agents[i];
                    tracing::error!("{} halted for step {}: {}", agent.name(), step, e);
                    self.stats.halted_agents += 1;
                    Movement {
                        tile: agent.tile(),
                        description: agent.scratch.action_description().to_string(),
                        emoji: "⚠️".to_string(),
                        chat: Vec::new(),
                    }
                }
            };

            let agent = &self.agents[i];
            self.maze.clear_events_of(agent.name());
            self.maze.add_event(agent.tile(), tile_event(agent));
            movements.insert(agent.id, movement);
        }

        let record = MovementRecord {
            step,
            time_label: self.clock.time_label(),
            movements,
        };
        self.clock.advance();
        tracing::debug!("Step {} done ({})", step, self.stats);
        Ok(record)
    }

    /// perceive, retrieve, plan, execute, converse, reflect
    fn cycle(&mut self, i: usize) -> Result<Movement> {
        let Self {
            config,
            maze,
            clock,
            agents,
            index,
            collaborators,
            stats,
        } = self;
        let mut ctx = CycleContext::new(config, collaborators, stats, clock);
        let now = ctx.now();

        let roster: Vec<Presence> = agents
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, a)| Presence {
                id: a.id,
                name: a.name().to_string(),
                tile: a.tile(),
                chatting: a.is_chatting(),
            })
            .collect();

        let agent = &mut agents[i];
        let perceived = perceive(agent, maze, &mut ctx)?;

        let mut topics: Vec<String> = perceived
            .iter()
            .filter_map(|id| agent.memory.get(*id))
            .map(|n| n.description.clone())
            .collect();
        topics.extend(agent.scratch.pending_question.take());
        let retrieved = if topics.is_empty() {
            Retrieved::default()
        } else {
            let focal_points = topics.into_iter().map(|t| ctx.focal_point(t)).collect();
            let params = ctx.retrieval_params();
            agent.retrieve(&Query::new(focal_points), now, &params)
        };

        let radius = config.perception.vision_radius;
        let here = agent.tile();
        let nearby: Vec<Presence> = roster
            .iter()
            .filter(|p| p.tile.x.abs_diff(here.x) <= radius && p.tile.y.abs_diff(here.y) <= radius)
            .cloned()
            .collect();

        plan(agent, maze, &retrieved, &nearby, &mut ctx)?;
        let movement = execute(agent, maze, &roster, &mut ctx);
        converse(agents, index, i, &mut ctx)?;

        let agent = &mut agents[i];
        let outcome = reflect(agent, &mut ctx)?;
        if outcome.triggered() {
            tracing::info!(
                "{} reflected: {} insights kept, {} discarded",
                agent.name(),
                outcome.committed.len(),
                outcome.discarded
            );
        }

        Ok(chat_movement(agent).unwrap_or(movement))
    }

    fn refresh_tile_events(&mut self) {
        for agent in &self.agents {
            self.maze.clear_events_of(agent.name());
            self.maze.add_event(agent.tile(), tile_event(agent));
        }
    }
}

/// What an agent broadcasts on its own tile
fn tile_event(agent: &Agent) -> TileEvent {
    if let Some(chat) = &agent.scratch.chat_state {
        return TileEvent::new(
            agent.name(),
            "chat with",
            chat.partner_name.clone(),
            format!("{} is chatting with {}", agent.name(), chat.partner_name),
        );
    }
    agent
        .scratch
        .current_action
        .as_ref()
        .map(|a| a.event.clone())
        .unwrap_or_else(|| TileEvent::idle(agent.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TileCoord;
    use crate::maze::grid::{MazeLayout, Region};

    fn town() -> Maze {
        Maze::from_layout(&MazeLayout {
            world: "town".into(),
            width: 12,
            height: 4,
            collisions: vec![],
            regions: vec![
                Region {
                    path: "cafe:counter".into(),
                    x: 0,
                    y: 0,
                    width: 6,
                    height: 4,
                },
                Region {
                    path: "park:lawn".into(),
                    x: 6,
                    y: 0,
                    width: 6,
                    height: 4,
                },
            ],
        })
        .unwrap()
    }

    fn profile(name: &str, x: u32) -> AgentProfile {
        AgentProfile {
            name: name.into(),
            identity: format!("{} lives in town", name),
            tile: TileCoord::new(x, 1),
            known_places: vec!["town:cafe:counter".into(), "town:park:lawn".into()],
            history: vec![format!("{} likes coffee", name)],
        }
    }

    fn simulation() -> Simulation {
        let config = EngineConfig::default();
        let collaborators = Collaborators::offline(&config.collaborator);
        let mut sim = Simulation::new(config, town(), collaborators).unwrap();
        sim.add_agent(&profile("Isabella", 1)).unwrap();
        sim.add_agent(&profile("Klaus", 4)).unwrap();
        sim
    }

    #[test]
    fn test_step_reports_every_agent_and_advances_clock() {
        let mut sim = simulation();
        let record = sim.step(&EnvironmentSnapshot::new()).unwrap();

        assert_eq!(record.step, 0);
        assert_eq!(record.movements.len(), 2);
        assert_eq!(sim.clock().current_step(), 1);
        for agent in sim.agents() {
            assert!(agent.scratch.current_action.is_some());
            assert!(!agent.scratch.schedule_is_stale(1));
        }
    }

    #[test]
    fn test_unknown_agent_in_snapshot_rejected() {
        let mut sim = simulation();
        let snapshot = EnvironmentSnapshot::new().with_position(AgentId(99), TileCoord::new(0, 0));
        assert!(matches!(sim.step(&snapshot), Err(ReverieError::UnknownAgent(AgentId(99)))));
        assert_eq!(sim.clock().current_step(), 0);
    }

    #[test]
    fn test_snapshot_moves_agent_and_injected_event_is_perceived() {
        let mut sim = simulation();
        let isabella = sim.agent_by_name("Isabella").unwrap().id;
        let snapshot = EnvironmentSnapshot::new()
            .with_position(isabella, TileCoord::new(2, 2))
            .with_event(
                TileCoord::new(3, 2),
                TileEvent::new("espresso machine", "is", "broken", "the espresso machine is broken"),
            );
        sim.step(&snapshot).unwrap();

        let agent = sim.agent(isabella).unwrap();
        assert!(agent
            .memory
            .nodes()
            .iter()
            .any(|n| n.description == "the espresso machine is broken"));
    }

    #[test]
    fn test_blank_injected_event_rejects_snapshot() {
        let mut sim = simulation();
        let snapshot =
            EnvironmentSnapshot::new().with_event(TileCoord::new(3, 1), TileEvent::new("bell", "is", "ringing", ""));
        assert!(matches!(sim.step(&snapshot), Err(ReverieError::Validation(_))));
        assert_eq!(sim.clock().current_step(), 0);
        assert!(!sim.maze().tile(TileCoord::new(3, 1)).unwrap().events.contains_key("bell"));

        // The run carries on with a valid snapshot
        for _ in 0..10 {
            sim.step(&EnvironmentSnapshot::new()).unwrap();
        }
        assert_eq!(sim.stats().halted_agents, 0);
        assert!(!sim.agent_by_name("Klaus").unwrap().memory.is_empty());
    }

    #[test]
    fn test_blank_event_on_tile_does_not_halt_agents() {
        let mut sim = simulation();
        sim.maze.add_event(TileCoord::new(3, 1), TileEvent::new("bell", "is", "ringing", ""));
        for _ in 0..10 {
            sim.step(&EnvironmentSnapshot::new()).unwrap();
        }
        assert_eq!(sim.stats().halted_agents, 0);
        assert!(sim.stats().rejected_events > 0);
    }

    #[test]
    fn test_event_injected_outside_maze_rejected() {
        let mut sim = simulation();
        let snapshot = EnvironmentSnapshot::new().with_event(
            TileCoord::new(40, 40),
            TileEvent::new("bell", "is", "ringing", "the bell is ringing"),
        );
        assert!(matches!(sim.step(&snapshot), Err(ReverieError::Validation(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut sim = simulation();
        assert!(sim.add_agent(&profile("Klaus", 5)).is_err());
    }

    #[test]
    fn test_agents_broadcast_their_action() {
        let mut sim = simulation();
        sim.step(&EnvironmentSnapshot::new()).unwrap();
        for agent in sim.agents() {
            let tile = sim.maze().tile(agent.tile()).unwrap();
            assert!(tile.events.contains_key(agent.name()));
        }
    }
}
