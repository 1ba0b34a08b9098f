//! Cognitive cycle orchestrator
//!
//! Each step runs, for every agent in registry order:
//! perceive -> retrieve -> plan -> execute -> converse -> reflect
//!
//! Agents are processed one after another so that a conversation started by
//! one agent is already visible to its partner later in the same step.

pub mod converse;
pub mod environment;
pub mod execute;
pub mod perceive;
pub mod plan;
pub mod stats;
pub mod step;

pub use converse::pair_mut;
pub use environment::{EnvironmentSnapshot, InjectedEvent, Movement, MovementRecord, Presence};
pub use stats::DegradationStats;
pub use step::Simulation;
