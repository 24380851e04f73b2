//! Configuration module.
//!
//! Supports JSON configuration files, environment variable overrides (both
//! the flat deployment envelope and `MAZE_HUNT__`-prefixed nested keys), and
//! sensible compiled-in defaults.
//!
//! # Module Structure
//!
//! - [`types`]: Root `Config` struct
//! - [`server`]: Room and connection management settings
//! - [`game`]: Gameplay tuning (health, phases, spawnables)
//! - [`quiz`]: External question provider settings
//! - [`logging`]: Logging configuration
//! - [`security`]: CORS and deployment mode
//! - [`loader`]: Configuration loading functions
//! - [`validation`]: Cross-field validation
//! - [`defaults`]: Default value functions

pub mod defaults;
pub mod game;
pub mod loader;
pub mod logging;
pub mod quiz;
pub mod security;
pub mod server;
pub mod types;
pub mod validation;

pub use game::GameConfig;
pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use quiz::QuizConfig;
pub use security::SecurityConfig;
pub use server::ServerConfig;
pub use types::Config;
pub use validation::{is_production_mode, validate_config, ConfigError};
