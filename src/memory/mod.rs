//! Agent memory structures: associative stream, spatial tree, scratch

pub mod associative;
pub mod keywords;
pub mod node;
pub mod scratch;
pub mod spatial;

pub use associative::AssociativeMemory;
pub use node::{MemoryKind, MemoryNode, MemorySource, NewMemory, Utterance};
pub use scratch::{ActionTarget, ChatState, CurrentAction, Scratch, ScheduleItem};
pub use spatial::SpatialMemory;
