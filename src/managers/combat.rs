//! Tag adjudication between hunters and survivors.
//!
//! Detection is path-based: at 30 Hz a hunter can cross a survivor's cell
//! between two samples, so every cell of the mover's path is tested, not
//! just the endpoints. The manager computes outcomes; the room runtime
//! applies them to player state, timers, and the wire.

use crate::config::GameConfig;
use crate::map::MapConfig;
use crate::protocol::{GridPos, PlayerId, PlayerState};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// A potential victim as seen at adjudication time, in deterministic room
/// player order.
#[derive(Debug, Clone, Copy)]
pub struct TagCandidate {
    pub id: PlayerId,
    pub cell: GridPos,
    pub state: PlayerState,
    pub coins: u32,
    pub health: u32,
}

/// One successful tag, ready to be applied by the runtime.
#[derive(Debug, Clone, Copy)]
pub struct TagOutcome {
    pub attacker: PlayerId,
    pub victim: PlayerId,
    pub damage: u32,
    pub coins_stolen: u32,
    /// Victim health after the tag.
    pub victim_health: u32,
    /// Health reached zero; the victim freezes and the unfreeze quiz flow
    /// takes over.
    pub froze: bool,
    pub knockback_to: Option<GridPos>,
}

#[derive(Debug, Default)]
pub struct CombatMgr {
    /// Last successful tag per (attacker, victim) pair.
    cooldowns: HashMap<(PlayerId, PlayerId), Instant>,
    /// Players currently being displaced by knockback; their own position
    /// reports are ignored until expiry.
    knockback_until: HashMap<PlayerId, Instant>,
}

impl CombatMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// A victim can be hit unless frozen or inside the i-frame window.
    pub fn can_hit_player(state: PlayerState) -> bool {
        state == PlayerState::Active
    }

    /// Adjudicate a hunter's move against every survivor on the path.
    ///
    /// Tie-breaks are deterministic: cells in path order, candidates within
    /// a cell in the order supplied (room player order). A victim is hit at
    /// most once per move.
    pub fn adjudicate(
        &mut self,
        cfg: &GameConfig,
        map: &MapConfig,
        attacker: PlayerId,
        path: &[GridPos],
        candidates: &[TagCandidate],
        now: Instant,
    ) -> Vec<TagOutcome> {
        let mut outcomes = Vec::new();
        let mut hit_this_move: HashSet<PlayerId> = HashSet::new();
        let Some(attacker_cell) = path.last().copied() else {
            return outcomes;
        };

        for cell in path {
            for candidate in candidates {
                if candidate.cell != *cell || hit_this_move.contains(&candidate.id) {
                    continue;
                }
                if let Some(outcome) =
                    self.try_tag(cfg, map, attacker, &attacker_cell, candidate, now)
                {
                    hit_this_move.insert(candidate.id);
                    outcomes.push(outcome);
                }
            }
        }
        outcomes
    }

    fn try_tag(
        &mut self,
        cfg: &GameConfig,
        map: &MapConfig,
        attacker: PlayerId,
        attacker_cell: &GridPos,
        victim: &TagCandidate,
        now: Instant,
    ) -> Option<TagOutcome> {
        // 1. Same-pair collision cooldown.
        if let Some(last) = self.cooldowns.get(&(attacker, victim.id)) {
            if now.duration_since(*last) < cfg.collision_cooldown() {
                return None;
            }
        }

        // 2. Frozen and i-framed victims are untouchable.
        if !Self::can_hit_player(victim.state) {
            return None;
        }

        // 3. Damage and score steal.
        let victim_health = victim.health.saturating_sub(cfg.tag_damage);
        let coins_stolen = cfg.tag_score_steal.min(victim.coins);
        let froze = victim_health == 0;

        // 4. Knockback, pointing away from the attacker.
        let knockback_to = if cfg.knockback_enabled && !froze {
            let to = knockback_cell(map, attacker_cell, &victim.cell, cfg.knockback_distance);
            self.knockback_until
                .insert(victim.id, now + cfg.knockback_duration());
            Some(to)
        } else {
            None
        };

        // 7. Record the pair cooldown last.
        self.cooldowns.insert((attacker, victim.id), now);

        Some(TagOutcome {
            attacker,
            victim: victim.id,
            damage: cfg.tag_damage,
            coins_stolen,
            victim_health,
            froze,
            knockback_to,
        })
    }

    /// The mirror case: a survivor's own move crosses a stationary
    /// hunter's cell. The hunter is the attacker; the mover is tagged at
    /// most once, at the first path cell where they meet.
    pub fn adjudicate_mover(
        &mut self,
        cfg: &GameConfig,
        map: &MapConfig,
        mover: &TagCandidate,
        path: &[GridPos],
        hunters: &[(PlayerId, GridPos)],
        now: Instant,
    ) -> Vec<TagOutcome> {
        for cell in path {
            for (hunter_id, hunter_cell) in hunters {
                if hunter_cell != cell {
                    continue;
                }
                let victim = TagCandidate {
                    cell: *cell,
                    ..*mover
                };
                if let Some(outcome) =
                    self.try_tag(cfg, map, *hunter_id, hunter_cell, &victim, now)
                {
                    return vec![outcome];
                }
            }
        }
        Vec::new()
    }

    /// Whether a player is mid-knockback; their position reports are
    /// dropped until the entry expires.
    pub fn in_knockback(&self, player_id: &PlayerId, now: Instant) -> bool {
        self.knockback_until
            .get(player_id)
            .is_some_and(|until| now < *until)
    }

    pub fn clear_knockback(&mut self, player_id: &PlayerId) {
        self.knockback_until.remove(player_id);
    }

    /// Drop cooldown entries older than the GC horizon once the table
    /// exceeds its size threshold.
    pub fn gc_cooldowns(&mut self, cfg: &GameConfig, now: Instant) {
        if self.cooldowns.len() <= cfg.collision_gc_threshold {
            return;
        }
        let horizon = std::time::Duration::from_millis(cfg.collision_gc_after_ms);
        let before = self.cooldowns.len();
        self.cooldowns
            .retain(|_, last| now.duration_since(*last) < horizon);
        tracing::debug!(
            removed = before - self.cooldowns.len(),
            remaining = self.cooldowns.len(),
            "Collision cooldown GC"
        );
    }

    /// Purge all per-player combat state on permanent removal.
    pub fn remove_player(&mut self, player_id: &PlayerId) {
        self.knockback_until.remove(player_id);
        self.cooldowns
            .retain(|(a, v), _| a != player_id && v != player_id);
    }

    #[cfg(test)]
    fn cooldown_len(&self) -> usize {
        self.cooldowns.len()
    }
}

/// Cell the victim lands on after knockback. Direction is the unit vector
/// away from the attacker; when both share a cell it defaults to +col. The
/// result clamps to the grid.
fn knockback_cell(
    map: &MapConfig,
    attacker_cell: &GridPos,
    victim_cell: &GridPos,
    distance: i32,
) -> GridPos {
    let dr = (victim_cell.row - attacker_cell.row).signum();
    let mut dc = (victim_cell.col - attacker_cell.col).signum();
    if dr == 0 && dc == 0 {
        dc = 1;
    }
    GridPos::new(
        (victim_cell.row + dr * distance).clamp(0, map.rows - 1),
        (victim_cell.col + dc * distance).clamp(0, map.cols - 1),
    )
}
