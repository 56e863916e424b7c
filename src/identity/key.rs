//! Catalog keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;

/// Stable identity of one physical part across sources and runs.
///
/// All parts are normalized, hyphen-joined lowercase identifiers. The
/// variant distinguishes parts sold under one model name (memory size,
/// mobile parts, OEM-only parts) and is empty for the base part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogKey {
    pub vendor: String,
    pub kind: ComponentKind,
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
}

impl CatalogKey {
    #[must_use]
    pub fn new(
        vendor: impl Into<String>,
        kind: ComponentKind,
        model: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            kind,
            model: model.into(),
            variant: variant.into(),
        }
    }

    /// A BLAKE3 digest of the key's display form.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(self.to_string().as_bytes()).as_bytes()
    }

    /// Stable shard index in `0..shards`.
    #[must_use]
    pub fn shard(&self, shards: usize) -> usize {
        let digest = self.digest();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let shards = shards.max(1) as u64;
        // The remainder is below `shards`, which came from a usize.
        #[allow(clippy::cast_possible_truncation)]
        let idx = (u64::from_le_bytes(head) % shards) as usize;
        idx
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vendor, self.kind, self.model)?;
        if !self.variant.is_empty() {
            write!(f, "/{}", self.variant)?;
        }
        Ok(())
    }
}

/// Error returned when parsing a malformed key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed catalog key '{0}'")]
pub struct ParseKeyError(pub String);

impl FromStr for CatalogKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKeyError(s.to_string());
        let mut parts = s.split('/');
        let vendor = parts.next().filter(|p| !p.is_empty()).ok_or_else(err)?;
        let kind = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let model = parts.next().filter(|p| !p.is_empty()).ok_or_else(err)?;
        let variant = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self::new(vendor, kind, model, variant))
    }
}
