//! Per-agent subjective map of discovered places
//!
//! A four-level tree world -> sector -> arena -> game_object. It only grows
//! through perception or an explicit history load, so it can lag behind the
//! ground-truth maze.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::maze::address::Address;

type Arenas = BTreeMap<String, BTreeSet<String>>;
type Sectors = BTreeMap<String, Arenas>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialMemory {
    tree: BTreeMap<String, Sectors>,
}

impl SpatialMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every level of `address`; inserting twice is a no-op
    pub fn discover(&mut self, address: &Address) {
        let parts = address.parts();
        let sectors = self.tree.entry(parts[0].clone()).or_default();
        let Some(sector) = parts.get(1) else { return };
        let arenas = sectors.entry(sector.clone()).or_default();
        let Some(arena) = parts.get(2) else { return };
        let objects = arenas.entry(arena.clone()).or_default();
        if let Some(object) = parts.get(3) {
            objects.insert(object.clone());
        }
    }

    /// Child names known directly below `prefix`; an empty prefix lists worlds
    pub fn known_addresses(&self, prefix: &[&str]) -> BTreeSet<String> {
        match prefix {
            [] => self.tree.keys().cloned().collect(),
            [world] => self
                .tree
                .get(*world)
                .map(|s| s.keys().cloned().collect())
                .unwrap_or_default(),
            [world, sector] => self
                .tree
                .get(*world)
                .and_then(|s| s.get(*sector))
                .map(|a| a.keys().cloned().collect())
                .unwrap_or_default(),
            [world, sector, arena] => self
                .tree
                .get(*world)
                .and_then(|s| s.get(*sector))
                .and_then(|a| a.get(*arena))
                .cloned()
                .unwrap_or_default(),
            _ => BTreeSet::new(),
        }
    }

    pub fn is_known(&self, address: &Address) -> bool {
        let parts = address.parts();
        let Some(sectors) = self.tree.get(&parts[0]) else {
            return false;
        };
        let Some(sector) = parts.get(1) else { return true };
        let Some(arenas) = sectors.get(sector) else {
            return false;
        };
        let Some(arena) = parts.get(2) else { return true };
        let Some(objects) = arenas.get(arena) else {
            return false;
        };
        match parts.get(3) {
            Some(object) => objects.contains(object),
            None => true,
        }
    }

    /// Every known arena as a full address, in sorted order
    pub fn known_arenas(&self) -> Vec<Address> {
        let mut arenas = Vec::new();
        for (world, sectors) in &self.tree {
            for (sector, sector_arenas) in sectors {
                for arena in sector_arenas.keys() {
                    if let Ok(address) = Address::from_parts([world.as_str(), sector.as_str(), arena.as_str()]) {
                        arenas.push(address);
                    }
                }
            }
        }
        arenas
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Indented rendering of the tree
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (world, sectors) in &self.tree {
            out.push_str(&format!("{}\n", world));
            for (sector, arenas) in sectors {
                out.push_str(&format!("  {}\n", sector));
                for (arena, objects) in arenas {
                    out.push_str(&format!("    {}\n", arena));
                    for object in objects {
                        out.push_str(&format!("      {}\n", object));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_discover_is_idempotent() {
        let mut memory = SpatialMemory::new();
        memory.discover(&addr("ville:cafe:kitchen:stove"));
        let snapshot = memory.clone();
        memory.discover(&addr("ville:cafe:kitchen:stove"));
        assert_eq!(memory, snapshot);
    }

    #[test]
    fn test_known_addresses_by_level() {
        let mut memory = SpatialMemory::new();
        memory.discover(&addr("ville:cafe:kitchen:stove"));
        memory.discover(&addr("ville:cafe:kitchen:sink"));
        memory.discover(&addr("ville:park"));

        assert_eq!(memory.known_addresses(&[]), BTreeSet::from(["ville".to_string()]));
        assert_eq!(
            memory.known_addresses(&["ville"]),
            BTreeSet::from(["cafe".to_string(), "park".to_string()])
        );
        assert_eq!(
            memory.known_addresses(&["ville", "cafe", "kitchen"]),
            BTreeSet::from(["sink".to_string(), "stove".to_string()])
        );
        assert!(memory.known_addresses(&["ville", "library"]).is_empty());
    }

    #[test]
    fn test_is_known_partial_paths() {
        let mut memory = SpatialMemory::new();
        memory.discover(&addr("ville:cafe:kitchen"));

        assert!(memory.is_known(&addr("ville")));
        assert!(memory.is_known(&addr("ville:cafe")));
        assert!(memory.is_known(&addr("ville:cafe:kitchen")));
        assert!(!memory.is_known(&addr("ville:cafe:kitchen:stove")));
        assert!(!memory.is_known(&addr("ville:library")));
    }

    #[test]
    fn test_known_arenas_and_render() {
        let mut memory = SpatialMemory::new();
        memory.discover(&addr("ville:cafe:kitchen:stove"));
        memory.discover(&addr("ville:home:bedroom"));
        let arenas: Vec<String> = memory.known_arenas().iter().map(|a| a.to_string()).collect();
        assert_eq!(arenas, vec!["ville:cafe:kitchen", "ville:home:bedroom"]);
        assert!(memory.render().contains("      stove"));
    }
}
