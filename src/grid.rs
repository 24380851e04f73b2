//! Grid geometry helpers: grid <-> pixel conversions and path cells.

use crate::map::MapConfig;
use crate::protocol::{GridPos, PixelPos};
use smallvec::SmallVec;

/// Path cells are short at game update rates; inline storage covers the
/// common case.
pub type PathCells = SmallVec<[GridPos; 8]>;

/// Pixel coordinate of a cell's center.
pub fn cell_center(map: &MapConfig, cell: &GridPos) -> PixelPos {
    PixelPos::new(
        (f64::from(cell.col) + 0.5) * map.cell_size,
        (f64::from(cell.row) + 0.5) * map.cell_size,
    )
}

/// Cell containing a pixel position. Out-of-range pixels clamp to the edge.
pub fn cell_of(map: &MapConfig, pixel: &PixelPos) -> GridPos {
    let col = (pixel.x / map.cell_size).floor() as i32;
    let row = (pixel.y / map.cell_size).floor() as i32;
    GridPos::new(row.clamp(0, map.rows - 1), col.clamp(0, map.cols - 1))
}

/// Ordered cells visited walking from `from` to `to`, inclusive of both
/// endpoints, using Bresenham's line algorithm. At 30 Hz a player can cross
/// several cells between two samples; endpoint sampling alone misses
/// collisions on the cells in between.
pub fn path_cells(from: &GridPos, to: &GridPos) -> PathCells {
    let mut cells = PathCells::new();

    let dx = (to.col - from.col).abs();
    let dy = (to.row - from.row).abs();
    let sx = if from.col < to.col { 1 } else { -1 };
    let sy = if from.row < to.row { 1 } else { -1 };
    let mut err = dx - dy;
    let mut cur = *from;

    loop {
        cells.push(cur);
        if cur == *to {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            cur.col += sx;
        }
        if e2 < dx {
            err += dx;
            cur.row += sy;
        }
    }
    cells
}

/// Whether two cells are within `radius` king moves of each other.
pub fn within_radius(a: &GridPos, b: &GridPos, radius: i32) -> bool {
    a.chebyshev(b) <= radius
}
