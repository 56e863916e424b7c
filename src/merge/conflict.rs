//! Conflict records.
//!
//! A conflict is two different sources disagreeing on one field of one
//! entry. Conflicts are resolved on the spot and reported, never left open:
//! the losing value is kept in the field's provenance.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::CatalogKey;
use crate::schema::CanonicalField;
use crate::source::SourceId;
use crate::value::FieldValue;

/// How an equal-priority conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The more recently fetched value won.
    MostRecent,
    /// Equal fetch times; the value already in the catalog was kept.
    KeptExisting,
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MostRecent => write!(f, "most_recent"),
            Self::KeptExisting => write!(f, "kept_existing"),
        }
    }
}

/// How a conflict was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Resolution {
    /// The winner's source ranks higher for this field.
    SourcePriority {
        /// Rank of the winning source (0 is highest).
        winner_rank: usize,
        /// Rank of the losing source.
        loser_rank: usize,
    },
    /// Both sources rank equally.
    Tie {
        /// The tie-break that applied.
        tie_break: TieBreak,
    },
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourcePriority {
                winner_rank,
                loser_rank,
            } => write!(f, "source_priority({winner_rank} over {loser_rank})"),
            Self::Tie { tie_break } => write!(f, "tie({tie_break})"),
        }
    }
}

/// One side of a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: FieldValue,
    pub source: SourceId,
    pub fetched_at: DateTime<Utc>,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} @ {}", self.value, self.source, self.fetched_at.to_rfc3339())
    }
}

/// Informational report of a resolved disagreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolved {
    pub key: CatalogKey,
    pub field: CanonicalField,
    pub winner: Observation,
    pub loser: Observation,
    pub resolution: Resolution,
}

impl ConflictResolved {
    /// True when `source` took part on either side.
    #[must_use]
    pub fn involves(&self, source: &SourceId) -> bool {
        &self.winner.source == source || &self.loser.source == source
    }
}

impl fmt::Display for ConflictResolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: kept {} over {} ({})",
            self.key, self.field, self.winner, self.loser, self.resolution
        )
    }
}
