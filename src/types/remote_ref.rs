// ABOUTME: Normalization of user-supplied remote image references.
// ABOUTME: Maps plain/http/https/oci schemes onto the registry transport.

use std::fmt;

const SCHEMES: [&str; 4] = ["oci:", "http:", "https:", "docker:"];

/// Remove a leading transport scheme (`oci:`, `http:`, `https:`, `docker:`,
/// `docker://`) from an image reference.
pub(crate) fn strip_transport(input: &str) -> &str {
    for scheme in SCHEMES {
        if let Some(rest) = input.strip_prefix(scheme) {
            return rest.strip_prefix("//").unwrap_or(rest);
        }
    }
    input
}

/// A remote image reference, normalized for the registry transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReference {
    insecure: bool,
    image: String,
}

impl RemoteReference {
    /// Normalize `target`.
    ///
    /// An explicit `http:` scheme marks the registry as insecure; every other
    /// scheme, or none at all, is secure.
    pub fn parse(target: &str) -> Self {
        let target = target.trim();
        Self {
            insecure: target.starts_with("http:"),
            image: strip_transport(target).to_string(),
        }
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }

    /// The image name without any scheme.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// The reference as understood by the registry tooling (`docker://...`).
    pub fn transport_ref(&self) -> String {
        format!("docker://{}", self.image)
    }

    /// Extra arguments the registry tooling needs for this reference.
    pub fn tool_args(&self) -> Vec<String> {
        if self.insecure {
            vec!["--insecure".to_string()]
        } else {
            Vec::new()
        }
    }
}

impl fmt::Display for RemoteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.transport_ref())
    }
}
