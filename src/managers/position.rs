//! Authoritative per-player positions with throttling and path
//! reconstruction.
//!
//! This is the hottest path in the server (~30 Hz per player); every
//! operation fails silently by returning `None` or `false` instead of
//! erroring.

use crate::config::GameConfig;
use crate::grid::{self, PathCells};
use crate::map::MapConfig;
use crate::protocol::{GridPos, PixelPos, PlayerId, PositionPayload};
use std::collections::HashMap;
use std::time::Instant;

/// Stored position state for one player.
#[derive(Debug, Clone)]
pub struct PlayerPosition {
    pub grid: GridPos,
    pub pixel: PixelPos,
    pub updated_at: Instant,
    /// Set when the last displacement was a teleport; the next move's path
    /// collapses to the destination cell so combat skips the line between
    /// the portals.
    last_move_teleport: bool,
    respawned_at: Option<Instant>,
}

/// Result of an accepted position update.
#[derive(Debug, Clone, Copy)]
pub struct MoveRecord {
    pub old_grid: GridPos,
    pub new_grid: GridPos,
    pub pixel: PixelPos,
    /// Path collision must be skipped for this move.
    pub skip_path: bool,
}

#[derive(Debug, Default)]
pub struct PositionMgr {
    positions: HashMap<PlayerId, PlayerPosition>,
}

impl PositionMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give each player a unique cell from the configured spawn list; once
    /// the list is exhausted, walk the road intersections for unused cells.
    pub fn assign_spawn_positions(
        &mut self,
        map: &MapConfig,
        players: &[PlayerId],
        now: Instant,
    ) -> Vec<(PlayerId, GridPos)> {
        let mut used: Vec<GridPos> = Vec::with_capacity(players.len());
        let mut assigned = Vec::with_capacity(players.len());

        let mut slots = map.spawn_slots.iter();
        let mut fallback = map.intersections().into_iter();

        for &player_id in players {
            let cell = slots
                .by_ref()
                .find(|c| !used.contains(c))
                .copied()
                .or_else(|| fallback.by_ref().find(|c| !used.contains(c)));
            let Some(cell) = cell else {
                tracing::warn!(%player_id, "No free spawn cell left on the map");
                continue;
            };
            used.push(cell);
            self.place(map, player_id, cell, now, false);
            assigned.push((player_id, cell));
        }
        assigned
    }

    /// True when the player updated within the minimum interval or within
    /// the post-respawn grace window.
    pub fn is_throttled(&self, cfg: &GameConfig, player_id: &PlayerId, now: Instant) -> bool {
        let Some(pos) = self.positions.get(player_id) else {
            return false;
        };
        if now.duration_since(pos.updated_at) < cfg.position_update_interval() {
            return true;
        }
        if let Some(respawned) = pos.respawned_at {
            if now.duration_since(respawned) < cfg.respawn_grace() {
                return true;
            }
        }
        false
    }

    /// Validate and store a client-reported position. The vertical axis is
    /// clamped into the grid; the horizontal axis is preserved as reported
    /// (clients legitimately report out-of-range columns during
    /// transitions). Returns `None` on invalid payloads or unknown players.
    pub fn update_position(
        &mut self,
        map: &MapConfig,
        player_id: &PlayerId,
        proposed: PositionPayload,
        now: Instant,
    ) -> Option<MoveRecord> {
        if !proposed.x.is_finite() || !proposed.y.is_finite() {
            return None;
        }
        let pos = self.positions.get_mut(player_id)?;

        let row = proposed.row.clamp(0, map.rows - 1);
        let col = proposed.col;
        let y = proposed.y.clamp(0.0, f64::from(map.rows) * map.cell_size);
        let x = proposed.x;

        let old_grid = pos.grid;
        let skip_path = pos.last_move_teleport;

        pos.grid = GridPos::new(row, col);
        pos.pixel = PixelPos::new(x, y);
        pos.updated_at = now;
        pos.last_move_teleport = false;

        Some(MoveRecord {
            old_grid,
            new_grid: pos.grid,
            pixel: pos.pixel,
            skip_path,
        })
    }

    /// Ordered cells visited by a move. A teleported move contributes only
    /// its destination cell.
    pub fn path_for(record: &MoveRecord) -> PathCells {
        if record.skip_path {
            let mut cells = PathCells::new();
            cells.push(record.new_grid);
            cells
        } else {
            grid::path_cells(&record.old_grid, &record.new_grid)
        }
    }

    /// Authoritative placement for respawns and teleports: snaps grid and
    /// pixel together, stamps the respawn clock, and sets the teleport flag
    /// for teleports.
    pub fn set_player_position(
        &mut self,
        map: &MapConfig,
        player_id: PlayerId,
        cell: GridPos,
        now: Instant,
        teleport: bool,
    ) {
        self.place(map, player_id, cell, now, teleport);
    }

    fn place(
        &mut self,
        map: &MapConfig,
        player_id: PlayerId,
        cell: GridPos,
        now: Instant,
        teleport: bool,
    ) {
        let pixel = grid::cell_center(map, &cell);
        let entry = self
            .positions
            .entry(player_id)
            .or_insert_with(|| PlayerPosition {
                grid: cell,
                pixel,
                updated_at: now,
                last_move_teleport: false,
                respawned_at: None,
            });
        entry.grid = cell;
        entry.pixel = pixel;
        entry.updated_at = now;
        entry.last_move_teleport = teleport;
        entry.respawned_at = Some(now);
    }

    pub fn grid_of(&self, player_id: &PlayerId) -> Option<GridPos> {
        self.positions.get(player_id).map(|p| p.grid)
    }

    pub fn payload_of(&self, player_id: &PlayerId) -> Option<PositionPayload> {
        self.positions.get(player_id).map(|p| PositionPayload {
            x: p.pixel.x,
            y: p.pixel.y,
            row: p.grid.row,
            col: p.grid.col,
        })
    }

    pub fn remove_player(&mut self, player_id: &PlayerId) {
        self.positions.remove(player_id);
    }
}
