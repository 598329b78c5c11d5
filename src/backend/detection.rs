// ABOUTME: Engine socket detection for the Docker-compatible backend.
// ABOUTME: Checks Podman sockets first, then Docker, unless a socket is configured.

use crate::config::DockerConfig;
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// A Docker-API socket found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSocket {
    pub path: String,
    /// Whether the socket belongs to Podman's Docker-compatible service.
    pub podman: bool,
}

/// Find the engine socket to talk to.
///
/// Detection order (when not explicitly configured):
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_engine_socket(config: &DockerConfig) -> Option<EngineSocket> {
    if let Some(ref socket) = config.socket {
        return Some(EngineSocket {
            path: socket.clone(),
            podman: socket.contains("podman"),
        });
    }

    if let Some(uid) = current_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Some(EngineSocket {
                path: rootless_socket,
                podman: true,
            });
        }
    }

    if Path::new(ROOTFUL_PODMAN).exists() {
        return Some(EngineSocket {
            path: ROOTFUL_PODMAN.to_string(),
            podman: true,
        });
    }

    if Path::new(DOCKER_SOCKET).exists() {
        return Some(EngineSocket {
            path: DOCKER_SOCKET.to_string(),
            podman: false,
        });
    }

    None
}

/// Real UID of the current process, from `/proc/self/status`.
pub fn current_uid() -> Option<u32> {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| parse_uid(&s))
}

fn parse_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find(|l| l.starts_with("Uid:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}
