//! Grid world: tiles, hierarchical addresses and path planning

pub mod address;
pub mod grid;
pub mod pathfinding;
pub mod tile;

pub use address::{Address, AddressLevel};
pub use grid::{Maze, MazeLayout, Region};
pub use pathfinding::find_path;
pub use tile::{Tile, TileEvent};
