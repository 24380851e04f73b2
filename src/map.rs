//! Static maze map configuration.
//!
//! The wall layout is a fixed grid: road cells run along every `block`-th
//! row and column, everything else is wall. Spawn and coin slots are static
//! tables over the road intersections. The maze does not wrap.

use crate::protocol::GridPos;

/// Static per-map configuration shared by all rooms.
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Grid height in cells.
    pub rows: i32,
    /// Grid width in cells.
    pub cols: i32,
    /// Side length of one cell in pixels.
    pub cell_size: f64,
    /// Road spacing: cells where `row % block == 0` or `col % block == 0`
    /// are walkable.
    pub block: i32,
    /// Preferred player spawn cells, consumed in order.
    pub spawn_slots: Vec<GridPos>,
    /// Candidate coin cells.
    pub coin_slots: Vec<GridPos>,
    /// Candidate sinkhole cells.
    pub sinkhole_slots: Vec<GridPos>,
}

impl MapConfig {
    pub fn in_bounds(&self, cell: &GridPos) -> bool {
        cell.row >= 0 && cell.row < self.rows && cell.col >= 0 && cell.col < self.cols
    }

    /// Whether a cell is wall. Out-of-bounds cells count as wall.
    pub fn is_wall(&self, cell: &GridPos) -> bool {
        if !self.in_bounds(cell) {
            return true;
        }
        cell.row % self.block != 0 && cell.col % self.block != 0
    }

    /// Road intersections are cells on both a horizontal and a vertical road.
    pub fn is_intersection(&self, cell: &GridPos) -> bool {
        self.in_bounds(cell) && cell.row % self.block == 0 && cell.col % self.block == 0
    }

    /// All road intersections in row-major order.
    pub fn intersections(&self) -> Vec<GridPos> {
        let mut cells = Vec::new();
        let mut row = 0;
        while row < self.rows {
            let mut col = 0;
            while col < self.cols {
                cells.push(GridPos::new(row, col));
                col += self.block;
            }
            row += self.block;
        }
        cells
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        let rows = 45;
        let cols = 45;
        let block = 5;

        // Spawn slots: the outer ring of intersections, corners first.
        let edge = 40;
        let mid = 20;
        let spawn_slots = vec![
            GridPos::new(0, 0),
            GridPos::new(0, edge),
            GridPos::new(edge, 0),
            GridPos::new(edge, edge),
            GridPos::new(0, mid),
            GridPos::new(mid, 0),
            GridPos::new(edge, mid),
            GridPos::new(mid, edge),
            GridPos::new(0, 10),
            GridPos::new(10, 0),
            GridPos::new(edge, 30),
            GridPos::new(30, edge),
        ];

        let template = Self {
            rows,
            cols,
            cell_size: 40.0,
            block,
            spawn_slots: spawn_slots.clone(),
            coin_slots: Vec::new(),
            sinkhole_slots: Vec::new(),
        };

        // Coins may land on any interior intersection that is not a spawn
        // slot; sinkholes prefer the deeper interior.
        let coin_slots: Vec<GridPos> = template
            .intersections()
            .into_iter()
            .filter(|c| !spawn_slots.contains(c))
            .collect();
        let sinkhole_slots: Vec<GridPos> = coin_slots
            .iter()
            .copied()
            .filter(|c| c.row >= block && c.row <= rows - 1 - block && c.col >= block && c.col <= cols - 1 - block)
            .collect();

        Self {
            coin_slots,
            sinkhole_slots,
            ..template
        }
    }
}
