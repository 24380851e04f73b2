//! External question provider configuration.

use super::defaults::{default_quiz_base_url, default_quiz_fetch_timeout_secs};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to fetch externally sourced question sets.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QuizConfig {
    /// Base URL of the quiz document endpoint; the quiz id is appended as a
    /// path segment. Overridable with the `QUIZIZZ_BASE_URL` env var.
    #[serde(default = "default_quiz_base_url")]
    pub base_url: String,
    /// Bound on the outbound fetch; on expiry the room falls back to the
    /// bundled local pool.
    #[serde(default = "default_quiz_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl QuizConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            base_url: default_quiz_base_url(),
            fetch_timeout_secs: default_quiz_fetch_timeout_secs(),
        }
    }
}
