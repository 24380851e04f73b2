//! Game tuning configuration.
//!
//! All gameplay constants live here so tests and deployments can tighten or
//! stretch the pacing without code changes.

use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the phased game loop, combat, and grid spawnables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GameConfig {
    // Health & combat
    #[serde(default = "default_starting_health")]
    pub starting_health: u32,
    #[serde(default = "default_tag_damage")]
    pub tag_damage: u32,
    /// Coins transferred from victim to attacker on a tag (capped by the
    /// victim's balance).
    #[serde(default = "default_tag_score_steal")]
    pub tag_score_steal: u32,
    #[serde(default = "default_iframe_duration_ms")]
    pub iframe_duration_ms: u64,
    #[serde(default = "default_knockback_enabled")]
    pub knockback_enabled: bool,
    #[serde(default = "default_knockback_distance")]
    pub knockback_distance: i32,
    #[serde(default = "default_knockback_duration_ms")]
    pub knockback_duration_ms: u64,
    #[serde(default = "default_collision_cooldown_ms")]
    pub collision_cooldown_ms: u64,
    #[serde(default = "default_collision_gc_after_ms")]
    pub collision_gc_after_ms: u64,
    #[serde(default = "default_collision_gc_threshold")]
    pub collision_gc_threshold: usize,

    // Roles
    #[serde(default = "default_hunter_percentage")]
    pub hunter_percentage: f64,
    #[serde(default = "default_min_hunters")]
    pub min_hunters: usize,
    #[serde(default = "default_max_hunters")]
    pub max_hunters: usize,
    #[serde(default = "default_enforcer_chance")]
    pub enforcer_chance: f64,

    // Phase durations
    #[serde(default = "default_hunt_duration_ms")]
    pub hunt_duration_ms: u64,
    #[serde(default = "default_blitz_duration_ms")]
    pub blitz_duration_ms: u64,
    #[serde(default = "default_round_end_duration_ms")]
    pub round_end_duration_ms: u64,
    #[serde(default = "default_game_total_duration_ms")]
    pub game_total_duration_ms: u64,
    #[serde(default = "default_reconnect_grace_ms")]
    pub reconnect_grace_ms: u64,

    // Position pipeline
    #[serde(default = "default_position_update_interval_ms")]
    pub position_update_interval_ms: u64,
    #[serde(default = "default_respawn_grace_ms")]
    pub respawn_grace_ms: u64,

    // Blitz quiz
    #[serde(default = "default_blitz_question_count")]
    pub blitz_question_count: usize,
    #[serde(default = "default_blitz_winner_bonus")]
    pub blitz_winner_bonus: u32,

    // Coins
    #[serde(default = "default_coin_value")]
    pub coin_value: u32,
    #[serde(default = "default_coin_respawn_ms")]
    pub coin_respawn_ms: u64,
    #[serde(default = "default_coin_initial_count")]
    pub coin_initial_count: usize,
    /// Minimum Chebyshev distance between live coins.
    #[serde(default = "default_coin_min_spawn_distance")]
    pub coin_min_spawn_distance: i32,

    // Sinkholes
    #[serde(default = "default_sinkhole_initial_count")]
    pub sinkhole_initial_count: usize,
    #[serde(default = "default_sinkhole_max_count")]
    pub sinkhole_max_count: usize,
    #[serde(default = "default_sinkhole_min_interval_ms")]
    pub sinkhole_min_interval_ms: u64,
    #[serde(default = "default_sinkhole_max_interval_ms")]
    pub sinkhole_max_interval_ms: u64,
    #[serde(default = "default_sinkhole_collection_radius")]
    pub sinkhole_collection_radius: i32,
    #[serde(default = "default_teleport_cooldown_ms")]
    pub teleport_cooldown_ms: u64,

    // Traps
    #[serde(default = "default_trap_initial_count")]
    pub trap_initial_count: usize,
    #[serde(default = "default_trap_respawn_ms")]
    pub trap_respawn_ms: u64,
    #[serde(default = "default_max_carried_traps")]
    pub max_carried_traps: u32,
}

impl GameConfig {
    pub fn iframe_duration(&self) -> Duration {
        Duration::from_millis(self.iframe_duration_ms)
    }

    pub fn knockback_duration(&self) -> Duration {
        Duration::from_millis(self.knockback_duration_ms)
    }

    pub fn collision_cooldown(&self) -> Duration {
        Duration::from_millis(self.collision_cooldown_ms)
    }

    pub fn hunt_duration(&self) -> Duration {
        Duration::from_millis(self.hunt_duration_ms)
    }

    pub fn blitz_duration(&self) -> Duration {
        Duration::from_millis(self.blitz_duration_ms)
    }

    pub fn round_end_duration(&self) -> Duration {
        Duration::from_millis(self.round_end_duration_ms)
    }

    pub fn game_total_duration(&self) -> Duration {
        Duration::from_millis(self.game_total_duration_ms)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_millis(self.reconnect_grace_ms)
    }

    pub fn position_update_interval(&self) -> Duration {
        Duration::from_millis(self.position_update_interval_ms)
    }

    pub fn respawn_grace(&self) -> Duration {
        Duration::from_millis(self.respawn_grace_ms)
    }

    pub fn coin_respawn(&self) -> Duration {
        Duration::from_millis(self.coin_respawn_ms)
    }

    pub fn trap_respawn(&self) -> Duration {
        Duration::from_millis(self.trap_respawn_ms)
    }

    pub fn teleport_cooldown(&self) -> Duration {
        Duration::from_millis(self.teleport_cooldown_ms)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        // Deserializing an empty object applies every serde default.
        #[allow(clippy::expect_used)]
        serde_json::from_value(serde_json::Value::Object(serde_json::Map::new()))
            .expect("empty object deserializes via field defaults")
    }
}
