// ABOUTME: Image name parsing for system-container storage.
// ABOUTME: Splits registry/repository/tag and encodes names as OSTree ref components.

use super::remote_ref::strip_transport;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseImageNameError {
    #[error("image name cannot be empty")]
    Empty,

    #[error("invalid image name: {0}")]
    InvalidFormat(String),
}

/// A `[registry/]repository[:tag][@digest]` image name.
///
/// The first path component is only treated as a registry when it looks like a
/// domain (contains a `.`), so `library/busybox` keeps `library` in the
/// repository. A missing tag defaults to `latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    registry: Option<String>,
    repository: String,
    tag: String,
    digest: Option<String>,
}

impl ImageName {
    pub fn parse(input: &str) -> Result<Self, ParseImageNameError> {
        let input = strip_transport(input.trim());
        if input.is_empty() {
            return Err(ParseImageNameError::Empty);
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        let (registry, rest) = match without_digest.split_once('/') {
            Some((first, rest)) if first.contains('.') => (Some(first.to_string()), rest),
            _ => (None, without_digest),
        };

        let (repository, tag) = match rest.find(':') {
            Some(idx) if idx > 0 => (&rest[..idx], &rest[idx + 1..]),
            _ => (rest, "latest"),
        };

        if repository.is_empty() || tag.is_empty() {
            return Err(ParseImageNameError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag: tag.to_string(),
            digest,
        })
    }

    /// Whether `name` names an image (registry-qualified or tagged) rather than
    /// an installed container.
    pub fn is_image_reference(name: &str) -> bool {
        if name.contains(':') {
            return true;
        }
        matches!(name.split_once('/'), Some((first, _)) if first.contains('.') || first == "localhost")
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// `registry/repository:tag`, without any digest.
    pub fn tagged(&self) -> String {
        match self.registry {
            Some(ref registry) => format!("{}/{}:{}", registry, self.repository, self.tag),
            None => format!("{}:{}", self.repository, self.tag),
        }
    }

    /// Encode the tagged name as a single OSTree ref component.
    ///
    /// ASCII alphanumerics, `.` and `-` pass through; every other byte becomes
    /// `_XX` (uppercase hex).
    pub fn to_ostree_ref(&self) -> String {
        encode_ref_component(&self.tagged())
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tagged())?;
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

pub(crate) fn encode_ref_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }
    out
}

/// Reverse [`encode_ref_component`]. Malformed escapes yield the input unchanged.
pub(crate) fn decode_ref_component(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let decoded = encoded
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            match decoded {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => return encoded.to_string(),
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| encoded.to_string())
}
