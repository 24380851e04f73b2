//! Configuration validation.

use super::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("security.cors_origins must not be `*` in production")]
    PermissiveCorsInProduction,
    #[error("game.{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("game.sinkhole_min_interval_ms must not exceed game.sinkhole_max_interval_ms")]
    SinkholeIntervalInverted,
    #[error("game.min_hunters must not exceed game.max_hunters")]
    HunterBoundsInverted,
    #[error("game.hunter_percentage must be within (0, 1]")]
    HunterPercentageOutOfRange,
    #[error("server.default_max_players must not exceed server.max_players_limit")]
    MaxPlayersInverted,
}

/// Whether the process runs with production hardening.
pub fn is_production_mode(config: &Config) -> bool {
    config.security.production
}

/// Validate cross-field constraints. Individual field defaults are already
/// enforced by serde.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.security.production && config.security.cors_origins.trim() == "*" {
        return Err(ConfigError::PermissiveCorsInProduction);
    }

    for (field, value) in [
        ("hunt_duration_ms", config.game.hunt_duration_ms),
        ("blitz_duration_ms", config.game.blitz_duration_ms),
        ("game_total_duration_ms", config.game.game_total_duration_ms),
        ("reconnect_grace_ms", config.game.reconnect_grace_ms),
        ("coin_respawn_ms", config.game.coin_respawn_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::ZeroDuration { field });
        }
    }

    if config.game.sinkhole_min_interval_ms > config.game.sinkhole_max_interval_ms {
        return Err(ConfigError::SinkholeIntervalInverted);
    }
    if config.game.min_hunters > config.game.max_hunters {
        return Err(ConfigError::HunterBoundsInverted);
    }
    if !(config.game.hunter_percentage > 0.0 && config.game.hunter_percentage <= 1.0) {
        return Err(ConfigError::HunterPercentageOutOfRange);
    }
    if config.server.default_max_players > config.server.max_players_limit {
        return Err(ConfigError::MaxPlayersInverted);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn production_rejects_wildcard_cors() {
        let mut cfg = Config::default();
        cfg.security.production = true;
        cfg.security.cors_origins = "*".into();
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::PermissiveCorsInProduction)
        ));
    }

    #[test]
    fn inverted_sinkhole_interval_rejected() {
        let mut cfg = Config::default();
        cfg.game.sinkhole_min_interval_ms = 30_000;
        cfg.game.sinkhole_max_interval_ms = 20_000;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::SinkholeIntervalInverted)
        ));
    }

    #[test]
    fn zero_hunt_duration_rejected() {
        let mut cfg = Config::default();
        cfg.game.hunt_duration_ms = 0;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ZeroDuration { .. })
        ));
    }
}
