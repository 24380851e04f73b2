//! Root configuration types.

use super::defaults::default_port;
use super::game::GameConfig;
use super::logging::LoggingConfig;
use super::quiz::QuizConfig;
use super::security::SecurityConfig;
use super::server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct for the maze hunt server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            game: GameConfig::default(),
            quiz: QuizConfig::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}
