//! Tile grid holding the ground truth of the world

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::core::error::{ReverieError, Result};
use crate::core::types::TileCoord;
use crate::maze::address::Address;
use crate::maze::tile::{Tile, TileEvent};

/// Rectangle of tiles sharing an address below the world level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    /// "sector", "sector:arena" or "sector:arena:game_object"
    pub path: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// On-disk description of a maze
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MazeLayout {
    pub world: String,
    pub width: u32,
    pub height: u32,
    /// One string per row; '#' marks a collision tile
    #[serde(default)]
    pub collisions: Vec<String>,
    /// Applied in order; later regions override earlier ones
    #[serde(default)]
    pub regions: Vec<Region>,
}

/// The grid world
#[derive(Debug, Clone)]
pub struct Maze {
    world: String,
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    address_tiles: AHashMap<Address, BTreeSet<TileCoord>>,
}

impl Maze {
    /// Open grid with every tile addressed to the world only
    pub fn open(world: impl Into<String>, width: u32, height: u32) -> Self {
        let world = world.into();
        let root = Address::world(world.clone());
        let tiles = vec![Tile::new(root, false); (width * height) as usize];
        let mut maze = Self {
            world,
            width,
            height,
            tiles,
            address_tiles: AHashMap::new(),
        };
        maze.rebuild_index();
        maze
    }

    pub fn from_layout(layout: &MazeLayout) -> Result<Self> {
        if layout.width == 0 || layout.height == 0 {
            return Err(ReverieError::Validation("maze must be at least 1x1".into()));
        }
        let mut maze = Self::open(layout.world.clone(), layout.width, layout.height);

        if !layout.collisions.is_empty() {
            if layout.collisions.len() != layout.height as usize {
                return Err(ReverieError::Validation(format!(
                    "expected {} collision rows, got {}",
                    layout.height,
                    layout.collisions.len()
                )));
            }
            for (y, row) in layout.collisions.iter().enumerate() {
                if row.chars().count() != layout.width as usize {
                    return Err(ReverieError::Validation(format!(
                        "collision row {} has {} columns, expected {}",
                        y,
                        row.chars().count(),
                        layout.width
                    )));
                }
                for (x, c) in row.chars().enumerate() {
                    if c == '#' {
                        maze.set_collision(TileCoord::new(x as u32, y as u32), true);
                    }
                }
            }
        }

        for region in &layout.regions {
            let address: Address = format!("{}:{}", layout.world, region.path).parse()?;
            for y in region.y..region.y.saturating_add(region.height).min(layout.height) {
                for x in region.x..region.x.saturating_add(region.width).min(layout.width) {
                    if let Some(tile) = maze.tile_mut(TileCoord::new(x, y)) {
                        tile.address = address.clone();
                    }
                }
            }
        }

        maze.rebuild_index();
        Ok(maze)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let layout: MazeLayout = serde_json::from_str(json)?;
        Self::from_layout(&layout)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Layout that rebuilds this maze, one region per run of equal addresses
    /// along a row. Tile events are not part of it.
    pub fn to_layout(&self) -> MazeLayout {
        let mut collisions = Vec::with_capacity(self.height as usize);
        let mut regions = Vec::new();
        for y in 0..self.height {
            let row = &self.tiles[(y * self.width) as usize..((y + 1) * self.width) as usize];
            collisions.push(row.iter().map(|t| if t.collision { '#' } else { '.' }).collect());

            let mut x = 0;
            while x < self.width {
                let address = &row[x as usize].address;
                let run = row[x as usize..]
                    .iter()
                    .take_while(|t| &t.address == address)
                    .count() as u32;
                if address.depth() > 1 {
                    regions.push(Region {
                        path: address.parts()[1..].join(":"),
                        x,
                        y,
                        width: run,
                        height: 1,
                    });
                }
                x += run;
            }
        }
        MazeLayout {
            world: self.world.clone(),
            width: self.width,
            height: self.height,
            collisions,
            regions,
        }
    }

    fn rebuild_index(&mut self) {
        self.address_tiles.clear();
        for y in 0..self.height {
            for x in 0..self.width {
                let coord = TileCoord::new(x, y);
                let tile = &self.tiles[(y * self.width + x) as usize];
                for prefix in tile.address.prefixes() {
                    self.address_tiles.entry(prefix).or_default().insert(coord);
                }
            }
        }
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, coord: TileCoord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    #[inline]
    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        if self.in_bounds(coord) {
            Some(&self.tiles[(coord.y * self.width + coord.x) as usize])
        } else {
            None
        }
    }

    #[inline]
    pub fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        if self.in_bounds(coord) {
            Some(&mut self.tiles[(coord.y * self.width + coord.x) as usize])
        } else {
            None
        }
    }

    pub fn is_walkable(&self, coord: TileCoord) -> bool {
        self.tile(coord).is_some_and(|t| !t.collision)
    }

    pub fn set_collision(&mut self, coord: TileCoord, collision: bool) {
        if let Some(tile) = self.tile_mut(coord) {
            tile.collision = collision;
        }
    }

    /// Tiles in the square box of `radius` around `center`, clipped to the grid,
    /// in row-major order
    pub fn tiles_within(&self, center: TileCoord, radius: u32) -> Vec<TileCoord> {
        let x0 = center.x.saturating_sub(radius);
        let y0 = center.y.saturating_sub(radius);
        let x1 = center.x.saturating_add(radius).min(self.width.saturating_sub(1));
        let y1 = center.y.saturating_add(radius).min(self.height.saturating_sub(1));

        let mut coords = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                coords.push(TileCoord::new(x, y));
            }
        }
        coords
    }

    /// Every tile whose address starts with `address`
    pub fn tiles_for(&self, address: &Address) -> Option<&BTreeSet<TileCoord>> {
        self.address_tiles.get(address)
    }

    pub fn add_event(&mut self, coord: TileCoord, event: TileEvent) -> bool {
        match self.tile_mut(coord) {
            Some(tile) => {
                tile.add_event(event);
                true
            }
            None => false,
        }
    }

    pub fn remove_event(&mut self, coord: TileCoord, subject: &str) -> Option<TileEvent> {
        self.tile_mut(coord).and_then(|t| t.remove_event(subject))
    }

    /// Remove every event with this subject anywhere on the grid
    pub fn clear_events_of(&mut self, subject: &str) {
        for tile in &mut self.tiles {
            tile.events.remove(subject);
        }
    }
}
