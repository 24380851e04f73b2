//! Transport-edge configuration: CORS and deployment mode.

use super::defaults::{default_cors_methods, default_cors_origins};
use serde::{Deserialize, Serialize};

/// CORS and deployment-mode settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Comma-separated list of allowed origins, or `*` for permissive CORS.
    /// Overridable with the `CORS_ORIGIN` env var.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Comma-separated list of allowed methods.
    /// Overridable with the `CORS_METHODS` env var.
    #[serde(default = "default_cors_methods")]
    pub cors_methods: String,
    /// Set when `NODE_ENV=production`; tightens validation.
    #[serde(default)]
    pub production: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            cors_methods: default_cors_methods(),
            production: false,
        }
    }
}
