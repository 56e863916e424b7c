//! Component kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of hardware component a record describes.
///
/// GPU and CPU records share the pipeline but have separate canonical
/// schemas, field registries and source priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Graphics processor.
    Gpu,
    /// Central processor.
    Cpu,
}

impl ComponentKind {
    /// All kinds, in a stable order.
    pub const ALL: [Self; 2] = [Self::Gpu, Self::Cpu];

    /// Short lowercase name used in keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gpu => "gpu",
            Self::Cpu => "cpu",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            other => Err(format!("unknown component kind: {other}")),
        }
    }
}
