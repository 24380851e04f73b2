//! Trap collectibles and deployed traps.
//!
//! Collectibles mirror the coin lifecycle (single-flight pickup, timed
//! respawn). A survivor carrying a trap can deploy it onto a cell; a
//! hunter whose path crosses a deployed trap is frozen and the trap is
//! consumed.

use crate::config::GameConfig;
use crate::map::MapConfig;
use crate::protocol::{GridPos, PlayerId, TrapView};
use rand::RngExt;
use std::collections::{HashMap, HashSet};

use super::occupancy::OccupiedSet;

#[derive(Debug, Clone)]
pub struct Trap {
    pub id: String,
    pub cell: GridPos,
    pub collected: bool,
}

impl Trap {
    pub fn view(&self) -> TrapView {
        TrapView {
            trap_id: self.id.clone(),
            row: self.cell.row,
            col: self.cell.col,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployedTrap {
    pub id: String,
    pub cell: GridPos,
    pub owner: PlayerId,
}

impl DeployedTrap {
    pub fn view(&self) -> TrapView {
        TrapView {
            trap_id: self.id.clone(),
            row: self.cell.row,
            col: self.cell.col,
        }
    }
}

/// Why a trap pickup produced no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCollectReject {
    UnknownTrap,
    LockHeld,
    AlreadyCollected,
}

/// Why a deploy request produced no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployReject {
    CellOccupied,
    OnWall,
    OutOfBounds,
}

#[derive(Debug, Default)]
pub struct TrapMgr {
    collectibles: HashMap<String, Trap>,
    deployed: HashMap<GridPos, DeployedTrap>,
    locks: HashSet<String>,
    next_id: u32,
}

impl TrapMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the initial trap collectibles on free coin slots.
    pub fn spawn_initial(
        &mut self,
        map: &MapConfig,
        cfg: &GameConfig,
        occupied: &mut OccupiedSet,
    ) -> Vec<TrapView> {
        let mut views = Vec::with_capacity(cfg.trap_initial_count);
        for _ in 0..cfg.trap_initial_count {
            match self.spawn_one(map, occupied) {
                Some(view) => views.push(view),
                None => break,
            }
        }
        views
    }

    fn spawn_one(&mut self, map: &MapConfig, occupied: &mut OccupiedSet) -> Option<TrapView> {
        let candidates: Vec<GridPos> = map
            .coin_slots
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
        let id = format!("trap_{}", self.next_id);
        let trap = Trap {
            id: id.clone(),
            cell,
            collected: false,
        };
        let view = trap.view();
        occupied.insert(cell);
        self.collectibles.insert(id, trap);
        Some(view)
    }

    /// Single-flight pickup, mirroring the coin protocol.
    pub fn begin_collect(&mut self, trap_id: &str) -> Result<(), TrapCollectReject> {
        if !self.collectibles.contains_key(trap_id) {
            return Err(TrapCollectReject::UnknownTrap);
        }
        if !self.locks.insert(trap_id.to_string()) {
            return Err(TrapCollectReject::LockHeld);
        }
        let collected = self.collectibles.get(trap_id).map(|t| t.collected);
        if collected != Some(false) {
            self.locks.remove(trap_id);
            return Err(TrapCollectReject::AlreadyCollected);
        }
        Ok(())
    }

    pub fn finish_collect(&mut self, trap_id: &str) {
        if let Some(trap) = self.collectibles.get_mut(trap_id) {
            trap.collected = true;
        }
        self.locks.remove(trap_id);
    }

    /// Respawn a collected trap collectible at a free cell.
    pub fn respawn(
        &mut self,
        trap_id: &str,
        map: &MapConfig,
        occupied: &OccupiedSet,
    ) -> Option<TrapView> {
        let candidates: Vec<GridPos> = map
            .coin_slots
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

        let trap = self.collectibles.get_mut(trap_id)?;
        trap.cell = cell;
        trap.collected = false;
        Some(trap.view())
    }

    /// Place a deployed trap at a cell. The cell must be a walkable,
    /// unoccupied maze cell.
    pub fn deploy(
        &mut self,
        map: &MapConfig,
        owner: PlayerId,
        cell: GridPos,
        occupied: &OccupiedSet,
    ) -> Result<TrapView, DeployReject> {
        if !map.in_bounds(&cell) {
            return Err(DeployReject::OutOfBounds);
        }
        if map.is_wall(&cell) {
            return Err(DeployReject::OnWall);
        }
        if occupied.contains(&cell) || self.deployed.contains_key(&cell) {
            return Err(DeployReject::CellOccupied);
        }

        self.next_id += 1;
        let trap = DeployedTrap {
            id: format!("deployed_{}", self.next_id),
            cell,
            owner,
        };
        let view = trap.view();
        self.deployed.insert(cell, trap);
        Ok(view)
    }

    /// Fire the first deployed trap on a hunter's path, if any. The trap is
    /// removed; the caller freezes the hunter and emits the event.
    pub fn trigger_on_path(&mut self, path: &[GridPos]) -> Option<DeployedTrap> {
        let cell = path.iter().find(|c| self.deployed.contains_key(c))?;
        self.deployed.remove(cell)
    }

    pub fn collectible_cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.collectibles
            .values()
            .filter(|t| !t.collected)
            .map(|t| t.cell)
    }

    pub fn deployed_cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.deployed.keys().copied()
    }

    pub fn collectible_views(&self) -> Vec<TrapView> {
        self.collectibles
            .values()
            .filter(|t| !t.collected)
            .map(Trap::view)
            .collect()
    }

    pub fn deployed_views(&self) -> Vec<TrapView> {
        self.deployed.values().map(DeployedTrap::view).collect()
    }

    /// Remove deployed traps owned by a permanently removed player.
    pub fn remove_player(&mut self, player_id: &PlayerId) {
        self.deployed.retain(|_, t| t.owner != *player_id);
    }
}
