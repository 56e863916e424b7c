//! Error types for hwcatalog.
//!
//! Errors are strongly typed using thiserror so callers can match on the
//! specific failure. Per-record problems are *not* errors: they are
//! warnings collected into the run report (see [`crate::pipeline::report`]).
//! Only a whole-source structural failure escalates, and even that is
//! scoped to the source that raised it.

use thiserror::Error;

use crate::catalog::StorageError;
use crate::source::SourceId;

/// A source's page shape is unrecognized beyond a tolerable threshold.
///
/// Fatal for the source that raised it; other sources in the same run
/// continue.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceStructureError {
    /// The page arrived without a single row.
    #[error("{source_id}: page has no rows")]
    EmptyPage {
        /// Source of the page.
        source_id: SourceId,
    },

    /// A column the adapter cannot work without is absent.
    #[error("{source_id}: required column '{column}' not found in any row")]
    MissingColumn {
        /// Source of the page.
        source_id: SourceId,
        /// Raw label of the column the adapter needs.
        column: String,
    },

    /// Not one row looked like a component entry.
    #[error("{source_id}: none of {rows} rows could be recognized as a component")]
    NoRecognizedRows {
        /// Source of the page.
        source_id: SourceId,
        /// Rows on the page.
        rows: usize,
    },

    /// The share of skipped rows exceeded the adapter's tolerance.
    #[error(
        "{source_id}: {skipped} of {total} rows unrecognized (tolerance {tolerance:.2})"
    )]
    TooManyUnrecognizedRows {
        /// Source of the page.
        source_id: SourceId,
        /// Rows that were not component entries.
        skipped: usize,
        /// Rows on the page.
        total: usize,
        /// Largest tolerated share of skipped rows, in `[0.0, 1.0]`.
        tolerance: f64,
    },

    /// The page names a source no adapter reads.
    #[error("{source_id}: no adapter registered for this source")]
    NoAdapter {
        /// Source of the page.
        source_id: SourceId,
    },
}

impl SourceStructureError {
    /// The source the failure belongs to.
    #[must_use]
    pub fn source_id(&self) -> &SourceId {
        match self {
            Self::EmptyPage { source_id }
            | Self::MissingColumn { source_id, .. }
            | Self::NoRecognizedRows { source_id, .. }
            | Self::TooManyUnrecognizedRows { source_id, .. }
            | Self::NoAdapter { source_id } => source_id,
        }
    }
}

/// Configuration errors, raised while building a pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML text is malformed or does not match the schema.
    #[error("Failed to parse configuration: {message}")]
    Parse {
        /// Parser message, with position.
        message: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// One raw label maps to two canonical fields of the same kind.
    #[error("Label '{label}' is mapped to both '{first}' and '{second}'")]
    ConflictingFieldMapping {
        /// The raw label, case-folded.
        label: String,
        /// Field the label was mapped to first.
        first: String,
        /// Field the later mapping asked for.
        second: String,
    },

    /// A mapping targets a field outside its component kind's schema.
    #[error("Field '{field}' does not belong to the {kind} schema")]
    FieldNotInSchema {
        /// The canonical field named by the mapping.
        field: String,
        /// The component kind the mapping was declared for.
        kind: String,
    },

    /// A configured priority list names no source.
    #[error("Source priority list for {scope} cannot be empty")]
    EmptyPriorityList {
        /// Kind and field category the list applies to.
        scope: String,
    },

    /// A ratio setting lies outside `[0.0, 1.0]`.
    #[error("{name} must be within [0.0, 1.0], got {value}")]
    OutOfRange {
        /// Name of the setting.
        name: &'static str,
        /// The configured value.
        value: f64,
    },
}

/// Errors raised by the sharded merge runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A non-blocking submit found the shard's queue at capacity.
    #[error("Merge queue for shard {shard} is full (capacity {capacity})")]
    QueueFull {
        /// Index of the shard.
        shard: usize,
        /// Records the queue holds.
        capacity: usize,
    },

    /// The shard's worker has exited.
    #[error("Merge worker for shard {shard} disconnected")]
    Disconnected {
        /// Index of the shard.
        shard: usize,
    },

    /// A merge did not complete in time.
    #[error("Merge timed out after {duration_ms}ms")]
    Timeout {
        /// Time waited, in milliseconds.
        duration_ms: u64,
    },

    /// The operating system refused to start a worker thread.
    #[error("Failed to spawn merge worker: {message}")]
    Spawn {
        /// The spawn failure.
        message: String,
    },
}

/// Top-level error type for hwcatalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The catalog backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The merge runtime failed.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// A source's page shape was not recognized.
    #[error("Source structure error: {0}")]
    SourceStructure(#[from] SourceStructureError),

    /// A broken internal invariant.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl CatalogError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a source structure error.
    #[must_use]
    pub const fn is_source_structure(&self) -> bool {
        matches!(self, Self::SourceStructure(_))
    }

    /// Returns true if retrying the same operation could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Runtime(e) => matches!(e, RuntimeError::QueueFull { .. } | RuntimeError::Timeout { .. }),
            Self::Storage(e) => matches!(e, StorageError::LockPoisoned(_) | StorageError::Io(_)),
            Self::Config(_) | Self::SourceStructure(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for hwcatalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_error_names_its_source() {
        let err = SourceStructureError::MissingColumn {
            source_id: SourceId::gpu_encyclopedia(),
            column: "model".to_string(),
        };
        assert_eq!(err.source_id(), &SourceId::gpu_encyclopedia());
        let msg = err.to_string();
        assert!(msg.contains("gpu-encyclopedia"));
        assert!(msg.contains("model"));
    }

    #[test]
    fn tolerance_is_rendered_with_two_decimals() {
        let err = SourceStructureError::TooManyUnrecognizedRows {
            source_id: SourceId::cpu_dataset(),
            skipped: 9,
            total: 10,
            tolerance: 0.5,
        };
        assert!(err.to_string().contains("9 of 10"));
        assert!(err.to_string().contains("0.50"));
    }

    #[test]
    fn catalog_error_from_config() {
        let err: CatalogError = ConfigError::EmptyPriorityList {
            scope: "gpu/clocks".to_string(),
        }
        .into();
        assert!(err.is_config());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("gpu/clocks"));
    }

    #[test]
    fn runtime_queue_full_is_retryable() {
        let err: CatalogError = RuntimeError::QueueFull { shard: 1, capacity: 4 }.into();
        assert!(err.is_retryable());

        let err: CatalogError = RuntimeError::Disconnected { shard: 0 }.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn config_errors_name_what_is_wrong() {
        let err = ConfigError::ConflictingFieldMapping {
            label: "boost clock".to_string(),
            first: "boost_clock_mhz".to_string(),
            second: "base_clock_mhz".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Label 'boost clock' is mapped to both 'boost_clock_mhz' and 'base_clock_mhz'"
        );

        let err = ConfigError::OutOfRange {
            name: "float_tolerance",
            value: 1.5,
        };
        assert_eq!(err.to_string(), "float_tolerance must be within [0.0, 1.0], got 1.5");
    }

    #[test]
    fn internal_error_message() {
        let err = CatalogError::internal("unexpected state");
        assert!(!err.is_storage());
        assert!(err.to_string().contains("unexpected state"));
    }
}
