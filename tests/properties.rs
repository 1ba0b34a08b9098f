//! Property tests for memory, retrieval and path planning

use proptest::prelude::*;

use reverie::core::error::ReverieError;
use reverie::core::types::{NodeId, TileCoord};
use reverie::maze::grid::{Maze, MazeLayout};
use reverie::maze::pathfinding::find_path;
use reverie::memory::associative::AssociativeMemory;
use reverie::memory::node::NewMemory;
use reverie::retrieval::{composite_score, retrieve, FocalPoint, Query, RetrievalParams};

const DIM: usize = 4;

fn entry(i: usize, filling: Vec<NodeId>) -> NewMemory {
    NewMemory::event("Klaus", "is", format!("busy {}", i), format!("Klaus is busy {}", i))
        .with_poignancy((i % 10) as f32)
        .with_embedding(vec![1.0, 0.0, i as f32, 0.0])
        .with_filling(filling)
}

proptest! {
    /// Whatever references a writer asks for, accepted nodes only point backwards
    #[test]
    fn test_filling_always_points_to_earlier_nodes(
        requests in prop::collection::vec(prop::collection::vec(0u64..40, 0..4), 1..40)
    ) {
        let mut memory = AssociativeMemory::new(DIM);
        for (i, wanted) in requests.into_iter().enumerate() {
            let next = memory.next_id();
            let filling: Vec<NodeId> = wanted.into_iter().map(NodeId).collect();
            let valid = filling.iter().all(|f| f.0 >= 1 && *f < next);
            let result = memory.record(entry(i, filling), i as u64);
            match result {
                Ok(id) => {
                    prop_assert!(valid);
                    prop_assert_eq!(id, next);
                }
                Err(ReverieError::Validation(_)) => prop_assert!(!valid),
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }
        }
        for node in memory.nodes() {
            for f in &node.filling {
                prop_assert!(*f < node.id);
            }
        }
    }

    #[test]
    fn test_composite_score_monotonic(
        relevance in 0.0f32..1.0,
        recency in 0.0f32..1.0,
        importance in 0.0f32..1.0,
        bump in 0.0f32..1.0,
    ) {
        let params = RetrievalParams::default();
        let base = composite_score(relevance, recency, importance, &params);
        prop_assert!(composite_score(relevance + bump, recency, importance, &params) >= base);
        prop_assert!(composite_score(relevance, recency + bump, importance, &params) >= base);
        prop_assert!(composite_score(relevance, recency, importance + bump, &params) >= base);
    }

    #[test]
    fn test_open_grid_paths_are_manhattan_optimal(
        sx in 0u32..8, sy in 0u32..8, gx in 0u32..8, gy in 0u32..8,
    ) {
        let maze = Maze::open("w", 8, 8);
        let start = TileCoord::new(sx, sy);
        let goal = TileCoord::new(gx, gy);
        let path = find_path(&maze, start, goal).unwrap();
        prop_assert_eq!(path.len() as u32, start.manhattan(&goal) + 1);
        prop_assert_eq!(path[0], start);
        prop_assert_eq!(*path.last().unwrap(), goal);
    }
}

#[test]
fn test_empty_memory_retrieves_empty_lists() {
    let mut memory = AssociativeMemory::new(DIM);
    let query = Query::new(vec![
        FocalPoint::new("coffee", Some(vec![1.0, 0.0, 0.0, 0.0])),
        FocalPoint::new("no embedding", None),
    ]);
    let retrieved = retrieve(&mut memory, &query, 10, &RetrievalParams::default());
    assert_eq!(retrieved.len(), 2);
    for (_, nodes) in retrieved.iter() {
        assert!(nodes.is_empty());
    }
}

#[test]
fn test_five_by_five_path_and_walled_goal() {
    let maze = Maze::open("w", 5, 5);
    let path = find_path(&maze, TileCoord::new(0, 0), TileCoord::new(4, 4)).unwrap();
    assert_eq!(path.len(), 9);

    let walled = Maze::from_layout(&MazeLayout {
        world: "w".into(),
        width: 5,
        height: 5,
        collisions: vec![
            ".....".into(),
            ".....".into(),
            ".....".into(),
            "...##".into(),
            "...#.".into(),
        ],
        regions: vec![],
    })
    .unwrap();
    assert!(matches!(
        find_path(&walled, TileCoord::new(0, 0), TileCoord::new(4, 4)),
        Err(ReverieError::NoPath { .. })
    ));
}
