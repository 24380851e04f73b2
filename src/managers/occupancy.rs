//! Read-only occupancy view shared with spawn and respawn calls.
//!
//! Coin, sinkhole, and trap cells must stay pairwise disjoint. Managers
//! never reach sideways into each other; the room runtime collects every
//! spawnable cell into an [`OccupiedSet`] and passes it down.

use crate::protocol::GridPos;
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct OccupiedSet {
    cells: HashSet<GridPos>,
}

impl OccupiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, cell: &GridPos) -> bool {
        self.cells.contains(cell)
    }

    pub fn insert(&mut self, cell: GridPos) {
        self.cells.insert(cell);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Extend<GridPos> for OccupiedSet {
    fn extend<T: IntoIterator<Item = GridPos>>(&mut self, iter: T) {
        self.cells.extend(iter);
    }
}

impl FromIterator<GridPos> for OccupiedSet {
    fn from_iter<T: IntoIterator<Item = GridPos>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}
