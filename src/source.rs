//! Source identity and reliability tiers.
//!
//! Every raw, canonical and merged value carries the [`SourceId`] it came
//! from. Knowing where a clock speed came from is what lets the merge engine
//! rank disagreeing sources and keep an audit trail of superseded values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one external data source.
///
/// The three built-in sources have constructors; additional sources (for
/// example a vendor's own GPU spec pages) are plain identifiers and rank
/// below every configured source unless added to a priority list.
///
/// # Examples
///
/// ```
/// use hwcatalog::SourceId;
///
/// let wiki = SourceId::gpu_encyclopedia();
/// assert_eq!(wiki.as_str(), "gpu-encyclopedia");
/// assert_eq!(SourceId::new("  Vendor-GPU-Specs "), SourceId::new("vendor-gpu-specs"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// Encyclopedia GPU specification tables.
    pub const GPU_ENCYCLOPEDIA: &'static str = "gpu-encyclopedia";
    /// CPU vendor's product listing site.
    pub const CPU_VENDOR_LISTING: &'static str = "cpu-vendor-listing";
    /// Third-party community CPU dataset.
    pub const CPU_DATASET: &'static str = "cpu-dataset";

    /// Creates a source identifier, trimmed and lower-cased.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_lowercase())
    }

    /// The encyclopedia GPU tables source.
    #[must_use]
    pub fn gpu_encyclopedia() -> Self {
        Self(Self::GPU_ENCYCLOPEDIA.to_string())
    }

    /// The CPU vendor listing source.
    #[must_use]
    pub fn cpu_vendor_listing() -> Self {
        Self(Self::CPU_VENDOR_LISTING.to_string())
    }

    /// The community CPU dataset source.
    #[must_use]
    pub fn cpu_dataset() -> Self {
        Self(Self::CPU_DATASET.to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Default reliability tier for this source.
    ///
    /// Configuration may override this per source.
    #[must_use]
    pub fn default_tier(&self) -> ConfidenceTier {
        match self.0.as_str() {
            Self::CPU_VENDOR_LISTING => ConfidenceTier::Authoritative,
            Self::GPU_ENCYCLOPEDIA => ConfidenceTier::Curated,
            Self::CPU_DATASET => ConfidenceTier::Community,
            _ => ConfidenceTier::Unverified,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<SourceId> for String {
    fn from(value: SourceId) -> Self {
        value.0
    }
}

/// Reliability tier of a source, carried on canonical records and
/// provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Unknown or ad-hoc source.
    Unverified,
    /// Community-maintained dump of another site.
    Community,
    /// Edited reference work.
    Curated,
    /// The manufacturer's own listing.
    Authoritative,
}

impl Default for ConfidenceTier {
    fn default() -> Self {
        Self::Unverified
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unverified => write!(f, "unverified"),
            Self::Community => write!(f, "community"),
            Self::Curated => write!(f, "curated"),
            Self::Authoritative => write!(f, "authoritative"),
        }
    }
}
