//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for an agent in the simulation registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Memory node identifier; monotonic, starting at 1, encodes insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Simulation step counter (simulation time unit)
pub type Step = u64;

/// Grid cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn euclidean(&self, other: &Self) -> f32 {
        let dx = self.x as f32 - other.x as f32;
        let dy = self.y as f32 - other.y as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Up, down, left, right; coordinates below zero are skipped
    pub fn neighbors4(&self) -> impl Iterator<Item = TileCoord> {
        let (x, y) = (self.x, self.y);
        [
            y.checked_sub(1).map(|y| TileCoord::new(x, y)),
            Some(TileCoord::new(x, y + 1)),
            x.checked_sub(1).map(|x| TileCoord::new(x, y)),
            Some(TileCoord::new(x + 1, y)),
        ]
        .into_iter()
        .flatten()
    }

    pub fn is_adjacent_or_same(&self, other: &Self) -> bool {
        self.manhattan(other) <= 1
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_distance() {
        let a = TileCoord::new(0, 0);
        let b = TileCoord::new(4, 4);
        assert_eq!(a.manhattan(&b), 8);
        assert_eq!(b.manhattan(&a), 8);
    }

    #[test]
    fn test_neighbors_at_origin_skip_negative() {
        let origin = TileCoord::new(0, 0);
        let neighbors: Vec<_> = origin.neighbors4().collect();
        assert_eq!(neighbors, vec![TileCoord::new(0, 1), TileCoord::new(1, 0)]);
    }

    #[test]
    fn test_neighbors_interior() {
        let c = TileCoord::new(2, 2);
        assert_eq!(c.neighbors4().count(), 4);
        assert!(c.neighbors4().all(|n| n.manhattan(&c) == 1));
    }

    #[test]
    fn test_adjacency() {
        let a = TileCoord::new(3, 3);
        assert!(a.is_adjacent_or_same(&TileCoord::new(3, 4)));
        assert!(a.is_adjacent_or_same(&a));
        assert!(!a.is_adjacent_or_same(&TileCoord::new(4, 4)));
    }

    #[test]
    fn test_ids_order_and_display() {
        assert!(NodeId(1) < NodeId(2));
        assert_eq!(AgentId(7).to_string(), "agent-7");
        assert_eq!(TileCoord::new(1, 2).to_string(), "(1, 2)");
    }
}
