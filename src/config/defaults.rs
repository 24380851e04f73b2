//! Default value functions for configuration fields.
//!
//! One function per field, wired into serde's `#[serde(default = ...)]`
//! attributes. Grouped by configuration area.

use super::logging::LogFormat;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3590
}

// =============================================================================
// Server Defaults
// =============================================================================

pub const fn default_max_players() -> u8 {
    8
}

pub const fn default_max_players_limit() -> u8 {
    30
}

pub const fn default_max_player_name_length() -> usize {
    32
}

pub const fn default_room_cleanup_interval_secs() -> u64 {
    60
}

pub const fn default_empty_room_timeout_secs() -> u64 {
    300 // 5 minutes
}

pub const fn default_max_message_size() -> usize {
    65536 // 64KB
}

pub const fn default_room_code_attempts() -> u32 {
    32
}

// =============================================================================
// Game Tuning Defaults
// =============================================================================

pub const fn default_starting_health() -> u32 {
    100
}

pub const fn default_tag_damage() -> u32 {
    50
}

pub const fn default_tag_score_steal() -> u32 {
    10
}

pub const fn default_iframe_duration_ms() -> u64 {
    3_000
}

pub const fn default_knockback_enabled() -> bool {
    true
}

pub const fn default_knockback_distance() -> i32 {
    2
}

pub const fn default_knockback_duration_ms() -> u64 {
    300
}

pub const fn default_hunter_percentage() -> f64 {
    0.3
}

pub const fn default_min_hunters() -> usize {
    1
}

pub const fn default_max_hunters() -> usize {
    30
}

/// Chance that a player re-entering Hunt after their personal blitz becomes
/// a hunter.
pub const fn default_enforcer_chance() -> f64 {
    0.3
}

pub const fn default_hunt_duration_ms() -> u64 {
    30_000
}

pub const fn default_blitz_duration_ms() -> u64 {
    15_000
}

pub const fn default_round_end_duration_ms() -> u64 {
    3_000
}

pub const fn default_game_total_duration_ms() -> u64 {
    300_000 // 5 minutes
}

pub const fn default_reconnect_grace_ms() -> u64 {
    10_000
}

pub const fn default_position_update_interval_ms() -> u64 {
    30
}

pub const fn default_respawn_grace_ms() -> u64 {
    100
}

pub const fn default_blitz_question_count() -> usize {
    3
}

pub const fn default_blitz_winner_bonus() -> u32 {
    10
}

pub const fn default_collision_cooldown_ms() -> u64 {
    500
}

pub const fn default_collision_gc_after_ms() -> u64 {
    5_000
}

pub const fn default_collision_gc_threshold() -> usize {
    256
}

// =============================================================================
// Coin Defaults
// =============================================================================

pub const fn default_coin_value() -> u32 {
    10
}

pub const fn default_coin_respawn_ms() -> u64 {
    2_000
}

pub const fn default_coin_initial_count() -> usize {
    20
}

pub const fn default_coin_min_spawn_distance() -> i32 {
    3
}

// =============================================================================
// Sinkhole Defaults
// =============================================================================

pub const fn default_sinkhole_initial_count() -> usize {
    2
}

pub const fn default_sinkhole_max_count() -> usize {
    6
}

pub const fn default_sinkhole_min_interval_ms() -> u64 {
    15_000
}

pub const fn default_sinkhole_max_interval_ms() -> u64 {
    25_000
}

pub const fn default_sinkhole_collection_radius() -> i32 {
    1
}

pub const fn default_teleport_cooldown_ms() -> u64 {
    2_000
}

// =============================================================================
// Trap Defaults
// =============================================================================

pub const fn default_trap_initial_count() -> usize {
    4
}

pub const fn default_trap_respawn_ms() -> u64 {
    2_000
}

pub const fn default_max_carried_traps() -> u32 {
    3
}

// =============================================================================
// Quiz Defaults
// =============================================================================

pub fn default_quiz_base_url() -> String {
    "https://quizizz.com/api/main/quiz".to_string()
}

pub const fn default_quiz_fetch_timeout_secs() -> u64 {
    5
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}

// =============================================================================
// Security Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:5173".to_string()
}

pub fn default_cors_methods() -> String {
    "GET,POST".to_string()
}
