// ABOUTME: Backend identifiers for Docker and OSTree storage.
// ABOUTME: Parses and prints the short names used on the command line and in config.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The storage backend an image or container lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Docker-compatible engine (Docker or Podman API).
    #[default]
    Docker,
    /// OSTree-based system containers.
    Ostree,
}

impl BackendKind {
    /// Fixed priority order used for lookups.
    pub const ALL: [BackendKind; 2] = [BackendKind::Docker, BackendKind::Ostree];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Docker => "docker",
            BackendKind::Ostree => "ostree",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::error::Error::UnknownBackend(s.to_string()))
    }
}
