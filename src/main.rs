//! Reverie - Entry Point
//!
//! Runs a town of agents step by step, resumes a saved run, or prints the
//! state of one agent from a save directory. Movement records go to stdout
//! as one JSON object per line.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;

use reverie::agent::AgentProfile;
use reverie::core::config::EngineConfig;
use reverie::core::error::{ReverieError, Result};
use reverie::core::types::TileCoord;
use reverie::inspect;
use reverie::llm::{Collaborators, HttpCollaborator};
use reverie::maze::grid::Maze;
use reverie::memory::node::MemoryKind;
use reverie::persistence;
use reverie::simulation::{EnvironmentSnapshot, Simulation};

#[derive(Parser, Debug)]
#[command(name = "reverie")]
#[command(about = "Step a town of generative agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new run from a maze and an agents file
    Run {
        /// Maze layout (JSON)
        #[arg(long)]
        maze: PathBuf,

        /// Agent profiles (JSON array)
        #[arg(long)]
        agents: PathBuf,

        /// Engine tuning (TOML); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 100)]
        steps: u64,

        /// Directory to save into after the last step
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Continue a saved run
    Resume {
        #[arg(long)]
        save: PathBuf,

        #[arg(long, default_value_t = 100)]
        steps: u64,
    },
    /// Print one agent's state from a save
    Inspect {
        #[arg(long)]
        save: PathBuf,

        #[arg(long)]
        agent: String,

        /// Only list memories of this kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Also describe this tile, as "x,y"
        #[arg(long)]
        tile: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Event,
    Thought,
    Chat,
}

impl From<KindArg> for MemoryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Event => MemoryKind::Event,
            KindArg::Thought => MemoryKind::Thought,
            KindArg::Chat => MemoryKind::Chat,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("reverie=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            maze,
            agents,
            config,
            steps,
            save,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path)?,
                None => EngineConfig::default(),
            };
            let collaborators = collaborators(&config)?;
            let mut simulation = Simulation::new(config, Maze::load(&maze)?, collaborators)?;
            for profile in load_profiles(&agents)? {
                simulation.add_agent(&profile)?;
            }
            run(&mut simulation, steps, save.as_deref())
        }
        Command::Resume { save, steps } => {
            let meta = persistence::load_meta(&save)?;
            let collaborators = collaborators(&meta.config)?;
            let mut simulation = persistence::load(&save, collaborators)?;
            run(&mut simulation, steps, Some(&save))
        }
        Command::Inspect {
            save,
            agent,
            kind,
            tile,
        } => {
            let meta = persistence::load_meta(&save)?;
            let simulation = persistence::load(&save, Collaborators::offline(&meta.config.collaborator))?;
            let Some(found) = simulation.agent_by_name(&agent) else {
                return Err(ReverieError::Validation(format!("no agent named '{}' in save", agent)));
            };

            println!("{}", inspect::time_line(simulation.clock()));
            println!();
            print!("{}", inspect::schedule_summary(found, simulation.clock()));
            println!();
            print!("{}", inspect::spatial_tree(found));
            println!();
            print!("{}", inspect::memory_log(found, kind.map(MemoryKind::from)));
            if let Some(tile) = tile {
                println!();
                print!("{}", inspect::tile_details(simulation.maze(), parse_tile(&tile)?));
            }
            Ok(())
        }
    }
}

/// Hosted collaborators when an API key is configured, offline otherwise
fn collaborators(config: &EngineConfig) -> Result<Collaborators> {
    if std::env::var("LLM_API_KEY").is_ok() {
        let http = HttpCollaborator::from_env(&config.collaborator)?;
        Ok(Collaborators::hosted(http, &config.collaborator))
    } else {
        tracing::warn!("LLM_API_KEY not set - running with the offline collaborator");
        Ok(Collaborators::offline(&config.collaborator))
    }
}

fn load_profiles(path: &Path) -> Result<Vec<AgentProfile>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn parse_tile(text: &str) -> Result<TileCoord> {
    let parsed = text
        .split_once(',')
        .and_then(|(x, y)| Some(TileCoord::new(x.trim().parse().ok()?, y.trim().parse().ok()?)));
    parsed.ok_or_else(|| ReverieError::Validation(format!("tile must look like 'x,y', got '{}'", text)))
}

/// Step until done or interrupted, then save at the step boundary
fn run(simulation: &mut Simulation, steps: u64, save: Option<&Path>) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let rt = Runtime::new()?;
    let flag = shutdown.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    tracing::info!(
        "Running {} agents for {} steps from {}",
        simulation.agents().len(),
        steps,
        inspect::time_line(simulation.clock())
    );
    let snapshot = EnvironmentSnapshot::new();
    for _ in 0..steps {
        if shutdown.load(Ordering::SeqCst) {
            tracing::warn!("Interrupted, stopping at step {}", simulation.clock().current_step());
            break;
        }
        let record = simulation.step(&snapshot)?;
        println!("{}", serde_json::to_string(&record)?);
    }

    tracing::info!("Finished at {} ({})", inspect::time_line(simulation.clock()), simulation.stats());
    if let Some(dir) = save {
        persistence::save(simulation, dir)?;
    }
    Ok(())
}
