//! Grid-bound coin lifecycle with per-coin pickup locks.
//!
//! Collection is single-flight: between a spawn and the next spawn of a
//! coin, at most one collector is admitted. Multiple players reporting the
//! same pickup in the same tick race on the per-coin lock; losers observe
//! nothing.

use crate::config::GameConfig;
use crate::map::MapConfig;
use crate::protocol::{CoinView, GridPos};
use rand::RngExt;
use std::collections::{HashMap, HashSet};

use super::occupancy::OccupiedSet;

#[derive(Debug, Clone)]
pub struct Coin {
    pub id: String,
    pub cell: GridPos,
    pub collected: bool,
}

impl Coin {
    pub fn view(&self) -> CoinView {
        CoinView {
            coin_id: self.id.clone(),
            row: self.cell.row,
            col: self.cell.col,
        }
    }
}

/// Why a collection attempt produced no effect. Callers emit nothing for
/// any of these; race rejections are silent by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectReject {
    UnknownCoin,
    LockHeld,
    AlreadyCollected,
}

#[derive(Debug, Default)]
pub struct CoinMgr {
    coins: HashMap<String, Coin>,
    /// Per-coin pickup locks, keyed by coin id (the room scoping lives in
    /// the owning runtime).
    locks: HashSet<String>,
    next_id: u32,
}

impl CoinMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the initial coin set: up to `coin_initial_count` cells drawn
    /// from the map's coin slots, in bounds, free of other spawnables, and
    /// pairwise at least `coin_min_spawn_distance` apart.
    pub fn spawn_initial(
        &mut self,
        map: &MapConfig,
        cfg: &GameConfig,
        occupied: &OccupiedSet,
    ) -> Vec<CoinView> {
        let mut candidates = map.coin_slots.clone();
        shuffle_cells(&mut candidates);

        let mut placed: Vec<GridPos> = Vec::with_capacity(cfg.coin_initial_count);
        for cell in candidates {
            if placed.len() >= cfg.coin_initial_count {
                break;
            }
            if !map.in_bounds(&cell) || occupied.contains(&cell) {
                continue;
            }
            if placed
                .iter()
                .any(|p| p.chebyshev(&cell) < cfg.coin_min_spawn_distance)
            {
                continue;
            }
            placed.push(cell);
        }

        let mut views = Vec::with_capacity(placed.len());
        for cell in placed {
            let id = self.fresh_id();
            let coin = Coin {
                id: id.clone(),
                cell,
                collected: false,
            };
            views.push(coin.view());
            self.coins.insert(id, coin);
        }
        views
    }

    /// Step 1 of the collection protocol: acquire the per-coin lock.
    /// Returns the reject reason when the coin is unknown, the lock is
    /// already held, or the coin was already collected.
    pub fn begin_collect(&mut self, coin_id: &str) -> Result<(), CollectReject> {
        if !self.coins.contains_key(coin_id) {
            return Err(CollectReject::UnknownCoin);
        }
        if !self.locks.insert(coin_id.to_string()) {
            return Err(CollectReject::LockHeld);
        }
        // Re-check under the lock.
        let collected = self.coins.get(coin_id).map(|c| c.collected);
        if collected != Some(false) {
            self.locks.remove(coin_id);
            return Err(CollectReject::AlreadyCollected);
        }
        Ok(())
    }

    /// Step 3: mark collected and release the lock. Must follow a
    /// successful [`begin_collect`](Self::begin_collect).
    pub fn finish_collect(&mut self, coin_id: &str) {
        if let Some(coin) = self.coins.get_mut(coin_id) {
            coin.collected = true;
        }
        self.locks.remove(coin_id);
    }

    /// Respawn a collected coin at a new cell satisfying the spawn
    /// constraints; when no slot keeps the distance to every live coin,
    /// the distance constraint is relaxed. Returns the coin's new view, or
    /// `None` when no free slot exists at all.
    pub fn respawn(
        &mut self,
        coin_id: &str,
        map: &MapConfig,
        cfg: &GameConfig,
        occupied: &OccupiedSet,
    ) -> Option<CoinView> {
        let live: Vec<GridPos> = self.live_cells().collect();

        let mut candidates: Vec<GridPos> = map
            .coin_slots
            .iter()
            .filter(|c| map.in_bounds(c) && !occupied.contains(c))
            .copied()
            .collect();
        shuffle_cells(&mut candidates);

        let spaced = candidates
            .iter()
            .find(|c| {
                live.iter()
                    .all(|l| l.chebyshev(c) >= cfg.coin_min_spawn_distance)
            })
            .copied();
        // Relaxed to the non-occupied constraint only.
        let cell = spaced.or_else(|| candidates.first().copied())?;

        let coin = self.coins.get_mut(coin_id)?;
        coin.cell = cell;
        coin.collected = false;
        Some(coin.view())
    }

    pub fn coin(&self, coin_id: &str) -> Option<&Coin> {
        self.coins.get(coin_id)
    }

    /// Cells of live (uncollected) coins.
    pub fn live_cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.coins
            .values()
            .filter(|c| !c.collected)
            .map(|c| c.cell)
    }

    pub fn live_views(&self) -> Vec<CoinView> {
        self.coins
            .values()
            .filter(|c| !c.collected)
            .map(Coin::view)
            .collect()
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("coin_{}", self.next_id)
    }
}

fn shuffle_cells(cells: &mut [GridPos]) {
    let mut rng = rand::rng();
    for i in (1..cells.len()).rev() {
        let j = rng.random_range(0..=i);
        cells.swap(i, j);
    }
}
