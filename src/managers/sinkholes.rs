//! Teleport portals.
//!
//! Sinkholes always exist in pairs or more; a player stepping into one is
//! teleported to a uniformly random other sinkhole. A scheduled spawner
//! adds portals up to the configured maximum while the room is in Hunt.

use crate::config::GameConfig;
use crate::map::MapConfig;
use crate::protocol::{GridPos, PlayerId, SinkholeView};
use rand::RngExt;
use std::collections::HashMap;
use std::time::Instant;

use super::occupancy::OccupiedSet;

const COLORS: &[&str] = &["purple", "teal", "orange", "magenta", "lime", "cyan"];

#[derive(Debug, Clone)]
pub struct Sinkhole {
    pub id: String,
    pub cell: GridPos,
    pub color: String,
}

impl Sinkhole {
    pub fn view(&self) -> SinkholeView {
        SinkholeView {
            sinkhole_id: self.id.clone(),
            row: self.cell.row,
            col: self.cell.col,
            color: self.color.clone(),
        }
    }
}

/// A resolved teleport, ready for the runtime to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teleport {
    pub from: GridPos,
    pub to: GridPos,
    pub dest_id: String,
}

/// Why a teleport request produced no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleportReject {
    UnknownSinkhole,
    OutOfRange,
    OnCooldown,
    NoDestination,
}

#[derive(Debug, Default)]
pub struct SinkholeMgr {
    sinkholes: HashMap<String, Sinkhole>,
    last_teleport: HashMap<PlayerId, Instant>,
    next_id: u32,
}

impl SinkholeMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the initial portal set.
    pub fn spawn_initial(
        &mut self,
        map: &MapConfig,
        cfg: &GameConfig,
        occupied: &mut OccupiedSet,
    ) -> Vec<SinkholeView> {
        let mut views = Vec::with_capacity(cfg.sinkhole_initial_count);
        for _ in 0..cfg.sinkhole_initial_count {
            match self.spawn_one(map, cfg, occupied) {
                Some(view) => views.push(view),
                None => break,
            }
        }
        views
    }

    /// Spawn one additional portal, or `None` at the maximum or when no
    /// free slot remains. The chosen cell is added to `occupied` so
    /// sequential spawns stay disjoint.
    pub fn spawn_one(
        &mut self,
        map: &MapConfig,
        cfg: &GameConfig,
        occupied: &mut OccupiedSet,
    ) -> Option<SinkholeView> {
        if self.sinkholes.len() >= cfg.sinkhole_max_count {
            return None;
        }

        let candidates: Vec<GridPos> = map
            .sinkhole_slots
            .iter()
            .filter(|c| map.in_bounds(c) && !occupied.contains(c))
            .copied()
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let mut rng = rand::rng();
        let idx = rng.random_range(0..candidates.len());
        // SAFETY: `idx` is produced by `random_range(0..len)`.
        #[allow(clippy::indexing_slicing)]
        let cell = candidates[idx];

        self.next_id += 1;
        let color = COLORS[self.next_id as usize % COLORS.len()].to_string();
        let id = format!("sinkhole_{}", self.next_id);
        let hole = Sinkhole {
            id: id.clone(),
            cell,
            color,
        };
        let view = hole.view();
        occupied.insert(cell);
        self.sinkholes.insert(id, hole);
        Some(view)
    }

    /// Resolve a teleport request: the player must be within the
    /// collection radius of a known sinkhole, off cooldown, and another
    /// live sinkhole must exist as a destination.
    pub fn try_teleport(
        &mut self,
        cfg: &GameConfig,
        player_id: PlayerId,
        sinkhole_id: &str,
        player_cell: GridPos,
        now: Instant,
    ) -> Result<Teleport, TeleportReject> {
        let source = self
            .sinkholes
            .get(sinkhole_id)
            .ok_or(TeleportReject::UnknownSinkhole)?;

        if !crate::grid::within_radius(&player_cell, &source.cell, cfg.sinkhole_collection_radius)
        {
            return Err(TeleportReject::OutOfRange);
        }

        if let Some(last) = self.last_teleport.get(&player_id) {
            if now.duration_since(*last) < cfg.teleport_cooldown() {
                return Err(TeleportReject::OnCooldown);
            }
        }

        let others: Vec<&Sinkhole> = self
            .sinkholes
            .values()
            .filter(|s| s.id != sinkhole_id)
            .collect();
        if others.is_empty() {
            return Err(TeleportReject::NoDestination);
        }
        let mut rng = rand::rng();
        let idx = rng.random_range(0..others.len());
        // SAFETY: `idx` is produced by `random_range(0..len)`.
        #[allow(clippy::indexing_slicing)]
        let dest = others[idx];

        let teleport = Teleport {
            from: source.cell,
            to: dest.cell,
            dest_id: dest.id.clone(),
        };
        self.last_teleport.insert(player_id, now);
        Ok(teleport)
    }

    pub fn count(&self) -> usize {
        self.sinkholes.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.sinkholes.values().map(|s| s.cell)
    }

    pub fn views(&self) -> Vec<SinkholeView> {
        self.sinkholes.values().map(Sinkhole::view).collect()
    }

    pub fn remove_player(&mut self, player_id: &PlayerId) {
        self.last_teleport.remove(player_id);
    }
}
