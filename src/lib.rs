//! Reverie - memory, retrieval, reflection and navigation for generative agents

pub mod agent;
pub mod core;
pub mod inspect;
pub mod llm;
pub mod maze;
pub mod memory;
pub mod persistence;
pub mod reflection;
pub mod retrieval;
pub mod simulation;
