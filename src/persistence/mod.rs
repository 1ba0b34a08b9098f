//! Save and restore a simulation at a step boundary
//!
//! Layout of a save directory:
//!
//! ```text
//! meta.json                      step, clock, agent order, config, counters
//! maze.json                      maze layout (tile events are rebuilt)
//! agents/<id>/associative_memory.json
//! agents/<id>/spatial_memory.json
//! agents/<id>/scratch.json
//! ```
//!
//! Every file is written to a temporary name and renamed into place, and
//! `meta.json` goes last, so an interrupted save leaves the previous one
//! loadable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::Agent;
use crate::core::clock::SimClock;
use crate::core::config::EngineConfig;
use crate::core::error::{ReverieError, Result};
use crate::core::types::{AgentId, Step};
use crate::llm::Collaborators;
use crate::maze::grid::{Maze, MazeLayout};
use crate::memory::associative::AssociativeMemory;
use crate::memory::node::MemoryNode;
use crate::memory::scratch::Scratch;
use crate::memory::spatial::SpatialMemory;
use crate::simulation::{DegradationStats, Simulation};

const META_FILE: &str = "meta.json";
const MAZE_FILE: &str = "maze.json";
const MEMORY_FILE: &str = "associative_memory.json";
const SPATIAL_FILE: &str = "spatial_memory.json";
const SCRATCH_FILE: &str = "scratch.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMeta {
    pub step: Step,
    pub clock: SimClock,
    /// Registry order
    pub agents: Vec<AgentId>,
    pub config: EngineConfig,
    #[serde(default)]
    pub stats: DegradationStats,
}

pub fn save(simulation: &Simulation, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir.join("agents"))?;
    write_json(&dir.join(MAZE_FILE), &simulation.maze().to_layout())?;
    for agent in simulation.agents() {
        save_agent(agent, &agent_dir(dir, agent.id))?;
    }

    let meta = SaveMeta {
        step: simulation.clock().current_step(),
        clock: simulation.clock().clone(),
        agents: simulation.agents().iter().map(|a| a.id).collect(),
        config: simulation.config().clone(),
        stats: simulation.stats().clone(),
    };
    write_json(&dir.join(META_FILE), &meta)?;
    tracing::info!(
        "Saved {} agents at step {} to {}",
        meta.agents.len(),
        meta.step,
        dir.display()
    );
    Ok(())
}

pub fn load(dir: &Path, collaborators: Collaborators) -> Result<Simulation> {
    let meta = load_meta(dir)?;
    let layout: MazeLayout = serde_json::from_str(&fs::read_to_string(dir.join(MAZE_FILE))?)?;
    let maze = Maze::from_layout(&layout)?;

    let dim = meta.config.collaborator.embedding_dim;
    let agents = meta
        .agents
        .iter()
        .map(|id| load_agent(&agent_dir(dir, *id), *id, dim))
        .collect::<Result<Vec<_>>>()?;

    let mut simulation = Simulation::from_parts(meta.config, maze, meta.clock, agents, collaborators)?;
    simulation.restore_stats(meta.stats);
    tracing::info!("Loaded save from {} at step {}", dir.display(), meta.step);
    Ok(simulation)
}

pub fn load_meta(dir: &Path) -> Result<SaveMeta> {
    let content = fs::read_to_string(dir.join(META_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

/// Write one agent's memory, spatial memory and scratch
pub fn save_agent(agent: &Agent, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_json(&dir.join(MEMORY_FILE), agent.memory.nodes())?;
    write_json(&dir.join(SPATIAL_FILE), &agent.spatial)?;
    write_json(&dir.join(SCRATCH_FILE), &agent.scratch)?;
    Ok(())
}

/// Read one agent back. An unreadable or out-of-order memory log is
/// reported as corruption.
pub fn load_agent(dir: &Path, id: AgentId, embedding_dim: usize) -> Result<Agent> {
    let scratch: Scratch = serde_json::from_str(&fs::read_to_string(dir.join(SCRATCH_FILE))?)?;
    let spatial: SpatialMemory = serde_json::from_str(&fs::read_to_string(dir.join(SPATIAL_FILE))?)?;

    let corruption = |reason: String| ReverieError::Corruption {
        agent: scratch.name.clone(),
        reason,
    };
    let log = fs::read_to_string(dir.join(MEMORY_FILE))?;
    let nodes: Vec<MemoryNode> =
        serde_json::from_str(&log).map_err(|e| corruption(format!("unreadable memory log: {}", e)))?;
    let memory = AssociativeMemory::from_nodes(nodes, embedding_dim).map_err(corruption)?;

    Ok(Agent {
        id,
        memory,
        spatial,
        scratch,
    })
}

fn agent_dir(dir: &Path, id: AgentId) -> PathBuf {
    dir.join("agents").join(id.0.to_string())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TileCoord;
    use crate::memory::node::NewMemory;

    fn agent() -> Agent {
        let mut agent = Agent::new(AgentId(3), "Maria", TileCoord::new(1, 2), 4);
        agent
            .record(
                NewMemory::event("Klaus", "is", "reading", "Klaus is reading")
                    .with_poignancy(3.0)
                    .with_keywords(["Klaus", "reading"])
                    .with_embedding(vec![1.0, 0.0, 0.0, 0.0]),
                5,
            )
            .unwrap();
        agent.spatial.discover(&"town:library:stacks".parse().unwrap());
        agent
    }

    #[test]
    fn test_agent_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let original = agent();
        save_agent(&original, dir.path()).unwrap();

        let loaded = load_agent(dir.path(), AgentId(3), 4).unwrap();
        assert_eq!(loaded.memory.nodes(), original.memory.nodes());
        assert_eq!(loaded.spatial, original.spatial);
        assert_eq!(loaded.scratch, original.scratch);
        assert_eq!(loaded.memory.get_by_keyword(["klaus"]).len(), 1);
    }

    #[test]
    fn test_garbled_log_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        save_agent(&agent(), dir.path()).unwrap();
        fs::write(dir.path().join(MEMORY_FILE), "[{\"id\": ").unwrap();

        let err = load_agent(dir.path(), AgentId(3), 4).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ReverieError::Corruption { ref agent, .. } if agent == "Maria"));
    }

    #[test]
    fn test_out_of_order_ids_are_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let original = agent();
        save_agent(&original, dir.path()).unwrap();

        let mut nodes = original.memory.nodes().to_vec();
        nodes[0].id = crate::core::types::NodeId(7);
        fs::write(dir.path().join(MEMORY_FILE), serde_json::to_string(&nodes).unwrap()).unwrap();

        assert!(matches!(
            load_agent(dir.path(), AgentId(3), 4),
            Err(ReverieError::Corruption { .. })
        ));
    }
}
