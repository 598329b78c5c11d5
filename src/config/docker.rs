// ABOUTME: Docker-compatible engine connection settings.
// ABOUTME: Optional explicit socket path and API timeout.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    /// Explicit engine socket; autodetected when unset.
    #[serde(default)]
    pub socket: Option<String>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}
