//! Pipeline configuration.
//!
//! Every knob has a built-in default, so `PipelineConfig::default()` runs
//! the three built-in sources as-is. A TOML file only needs to name what it
//! changes:
//!
//! ```toml
//! float_tolerance = 0.01
//! gpu_table_mirrors = ["vendor-gpu-specs"]
//!
//! [merge]
//! workers = 8
//!
//! [priorities.cpu]
//! default = ["cpu-vendor-listing", "cpu-dataset"]
//! meta = ["cpu-dataset", "cpu-vendor-listing"]
//!
//! [tiers]
//! vendor-gpu-specs = "authoritative"
//!
//! [aliases.vendors]
//! "nvidia gmbh" = "nvidia"
//!
//! [[field_mappings]]
//! kind = "gpu"
//! label = "boost_clock_typical"
//! field = "boost_clock_mhz"
//! unit = "mhz"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{CpuDatasetAdapter, CpuListingAdapter, GpuEncyclopediaAdapter, SourceAdapter};
use crate::component::ComponentKind;
use crate::error::ConfigError;
use crate::identity::AliasTable;
use crate::merge::{KindPriorities, MergePolicy, DEFAULT_FLOAT_TOLERANCE, DEFAULT_MAX_SUPERSEDED};
use crate::normalize::ExtraFieldMapping;
use crate::pipeline::MergeRuntimeConfig;
use crate::source::{ConfidenceTier, SourceId};

/// Share of skipped rows each adapter tolerates before rejecting a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterTolerances {
    /// GPU table pages (encyclopedia and mirrors). Their lists carry many
    /// caption and sub-header rows.
    pub gpu_tables: f64,
    pub cpu_listing: f64,
    pub cpu_dataset: f64,
}

impl Default for AdapterTolerances {
    fn default() -> Self {
        Self {
            gpu_tables: 0.75,
            cpu_listing: 0.5,
            cpu_dataset: 0.5,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Relative tolerance under which two float values agree.
    pub float_tolerance: f64,
    /// Superseded values kept per field.
    pub max_superseded_per_field: usize,
    pub merge: MergeRuntimeConfig,
    pub tolerances: AdapterTolerances,
    /// Extra sources publishing GPU tables in the encyclopedia layout.
    pub gpu_table_mirrors: Vec<SourceId>,
    /// Priority overrides per kind; kinds not named keep the built-ins.
    pub priorities: BTreeMap<ComponentKind, KindPriorities>,
    /// Confidence tier overrides per source.
    pub tiers: BTreeMap<SourceId, ConfidenceTier>,
    /// Aliases added to the built-in table.
    pub aliases: AliasTable,
    /// Raw labels wired to canonical fields in addition to the adapters'
    /// own tables.
    pub field_mappings: Vec<ExtraFieldMapping>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            float_tolerance: DEFAULT_FLOAT_TOLERANCE,
            max_superseded_per_field: DEFAULT_MAX_SUPERSEDED,
            merge: MergeRuntimeConfig::default(),
            tolerances: AdapterTolerances::default(),
            gpu_table_mirrors: Vec::new(),
            priorities: BTreeMap::new(),
            tiers: BTreeMap::new(),
            aliases: AliasTable::empty(),
            field_mappings: Vec::new(),
        }
    }
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML or unknown values, and the
    /// errors of [`PipelineConfig::validated`].
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validated()
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`PipelineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading pipeline configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks ranges and priority lists, dropping repeated priority entries.
    ///
    /// # Errors
    /// [`ConfigError::OutOfRange`] for a tolerance outside `[0, 1]` and
    /// [`ConfigError::EmptyPriorityList`] for an empty priority list.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        check_unit_interval("float_tolerance", self.float_tolerance)?;
        check_unit_interval("tolerances.gpu_tables", self.tolerances.gpu_tables)?;
        check_unit_interval("tolerances.cpu_listing", self.tolerances.cpu_listing)?;
        check_unit_interval("tolerances.cpu_dataset", self.tolerances.cpu_dataset)?;
        self.priorities = self
            .priorities
            .iter()
            .map(|(kind, p)| Ok((*kind, p.validated(*kind)?)))
            .collect::<Result<_, ConfigError>>()?;
        Ok(self)
    }

    /// Merge policy built from tolerances and priorities.
    #[must_use]
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::new(
            self.priorities.clone(),
            self.float_tolerance,
            self.max_superseded_per_field,
        )
    }

    /// Built-in aliases extended with the configured ones.
    #[must_use]
    pub fn alias_table(&self) -> AliasTable {
        let mut table = AliasTable::default();
        table.extend(&self.aliases);
        table
    }

    /// Adapters for every configured source.
    #[must_use]
    pub fn adapters(&self) -> Vec<Arc<dyn SourceAdapter>> {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(GpuEncyclopediaAdapter::default().with_tolerance(self.tolerances.gpu_tables)),
            Arc::new(CpuListingAdapter::default().with_tolerance(self.tolerances.cpu_listing)),
            Arc::new(CpuDatasetAdapter::default().with_tolerance(self.tolerances.cpu_dataset)),
        ];
        for mirror in &self.gpu_table_mirrors {
            adapters.push(Arc::new(
                GpuEncyclopediaAdapter::for_source(mirror.clone()).with_tolerance(self.tolerances.gpu_tables),
            ));
        }
        adapters
    }
}
