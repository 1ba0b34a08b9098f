pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::SimClock;
pub use config::{EngineConfig, RetentionMatch};
pub use error::{CollaboratorError, Result, ReverieError};
pub use types::{AgentId, NodeId, Step, TileCoord};
