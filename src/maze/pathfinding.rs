//! A* pathfinding over the tile grid
//!
//! Manhattan heuristic, 4-directional moves, unit cost per step.
//! Collision tiles never enter the frontier.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::core::error::{ReverieError, Result};
use crate::core::types::TileCoord;
use crate::maze::grid::Maze;

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    coord: TileCoord,
    f_cost: u32, // g_cost + heuristic
    /// Insertion sequence; equal f_costs pop in FIFO order
    seq: u64,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.f_cost == other.f_cost && self.seq == other.seq
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a shortest path from `start` to `goal`, both ends included.
///
/// Returns `NoPath` when the goal is out of bounds, a collision tile, or
/// unreachable. `start == goal` yields `[start]`.
pub fn find_path(maze: &Maze, start: TileCoord, goal: TileCoord) -> Result<Vec<TileCoord>> {
    if !maze.in_bounds(start) || !maze.is_walkable(goal) {
        return Err(ReverieError::NoPath { start, goal });
    }
    if start == goal {
        return Ok(vec![start]);
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<TileCoord, TileCoord> = HashMap::new();
    let mut g_scores: HashMap<TileCoord, u32> = HashMap::new();
    let mut seq = 0u64;

    g_scores.insert(start, 0);
    open_set.push(PathNode {
        coord: start,
        f_cost: start.manhattan(&goal),
        seq,
    });

    while let Some(current) = open_set.pop() {
        if current.coord == goal {
            return Ok(reconstruct_path(&came_from, current.coord));
        }

        let current_g = *g_scores.get(&current.coord).unwrap_or(&u32::MAX);
        // Stale heap entry superseded by a cheaper one
        if current.f_cost > current_g.saturating_add(current.coord.manhattan(&goal)) {
            continue;
        }

        for neighbor in current.coord.neighbors4() {
            if !maze.is_walkable(neighbor) {
                continue;
            }

            let tentative_g = current_g + 1;
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.coord);
                g_scores.insert(neighbor, tentative_g);

                seq += 1;
                open_set.push(PathNode {
                    coord: neighbor,
                    f_cost: tentative_g + neighbor.manhattan(&goal),
                    seq,
                });
            }
        }
    }

    Err(ReverieError::NoPath { start, goal })
}

/// Reconstruct path from came_from map
fn reconstruct_path(
    came_from: &HashMap<TileCoord, TileCoord>,
    mut current: TileCoord,
) -> Vec<TileCoord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
