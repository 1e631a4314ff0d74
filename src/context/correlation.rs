//! Request-scoped correlation metadata.
//!
//! A [`CorrelationContext`] is created once at the boundary of an inbound
//! request and shared read-only by every call and log line spawned while
//! serving it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rendered in place of any field that is not known.
pub const PLACEHOLDER: &str = "N/A";

/// Opaque per-request identifier: 8 random bytes, hex-encoded when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId([u8; 8]);

impl CorrelationId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Error returned when parsing a [`CorrelationId`] from text.
#[derive(Debug, Error)]
#[error("correlation id must be 16 hex characters: {0}")]
pub struct ParseCorrelationIdError(#[from] hex::FromHexError);

impl FromStr for CorrelationId {
    type Err = ParseCorrelationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Immutable bag of request metadata propagated to every downstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    id: CorrelationId,
    method_path: String,
    client_ip: String,
}

impl CorrelationContext {
    /// Build a context with an explicit identifier.
    ///
    /// Blank fields are replaced by [`PLACEHOLDER`].
    pub fn new(id: CorrelationId, method: &str, path: &str, client_ip: &str) -> Self {
        let method_path = match (method.trim(), path.trim()) {
            ("", "") => PLACEHOLDER.to_string(),
            (m, p) => format!("{m} {p}").trim().to_string(),
        };
        let client_ip = match client_ip.trim() {
            "" => PLACEHOLDER.to_string(),
            ip => ip.to_string(),
        };
        Self {
            id,
            method_path,
            client_ip,
        }
    }

    /// Build a context for a fresh inbound request, generating its identifier.
    pub fn for_request(method: &str, path: &str, client_ip: &str) -> Self {
        Self::new(CorrelationId::generate(), method, path, client_ip)
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// "METHOD path" of the originating inbound request.
    pub fn method_path(&self) -> &str {
        &self.method_path
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]-[{}]-[{}]", self.method_path, self.id, self.client_ip)
    }
}
