//! Server behavior configuration types.

use super::defaults::{
    default_empty_room_timeout_secs, default_max_message_size, default_max_player_name_length,
    default_max_players, default_max_players_limit, default_room_cleanup_interval_secs,
    default_room_code_attempts,
};
use serde::{Deserialize, Serialize};

/// Server configuration for room and connection management.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Default maximum players per room when a creator does not ask for one
    #[serde(default = "default_max_players")]
    pub default_max_players: u8,
    /// Hard ceiling a creator may request
    #[serde(default = "default_max_players_limit")]
    pub max_players_limit: u8,
    /// Maximum accepted player name length (characters)
    #[serde(default = "default_max_player_name_length")]
    pub max_player_name_length: usize,
    /// Interval for the empty-room sweeper (seconds)
    #[serde(default = "default_room_cleanup_interval_secs")]
    pub room_cleanup_interval_secs: u64,
    /// Time after which a room with no connected players is destroyed (seconds)
    #[serde(default = "default_empty_room_timeout_secs")]
    pub empty_room_timeout_secs: u64,
    /// Maximum inbound websocket frame size (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Attempts at generating a unique room code before failing the create
    #[serde(default = "default_room_code_attempts")]
    pub room_code_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_max_players: default_max_players(),
            max_players_limit: default_max_players_limit(),
            max_player_name_length: default_max_player_name_length(),
            room_cleanup_interval_secs: default_room_cleanup_interval_secs(),
            empty_room_timeout_secs: default_empty_room_timeout_secs(),
            max_message_size: default_max_message_size(),
            room_code_attempts: default_room_code_attempts(),
        }
    }
}
