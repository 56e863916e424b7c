//! Source priority policy.
//!
//! Priority is per component kind and per [`FieldCategory`]: a vendor's own
//! listing may be trusted for clocks while a community dataset is trusted
//! for launch metadata. Position 0 is the highest priority. Sources missing
//! from a list rank below every listed source and equal to each other.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::error::ConfigError;
use crate::schema::{CanonicalField, FieldCategory};
use crate::source::SourceId;

/// Default relative tolerance under which two floats agree.
pub const DEFAULT_FLOAT_TOLERANCE: f64 = 0.005;

/// Default number of superseded values kept per field.
pub const DEFAULT_MAX_SUPERSEDED: usize = 8;

/// Priority lists for one component kind.
///
/// ```toml
/// [priorities.cpu]
/// default = ["cpu-vendor-listing", "cpu-dataset"]
/// meta = ["cpu-dataset", "cpu-vendor-listing"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KindPriorities {
    /// Order used by categories without their own list.
    pub default: Vec<SourceId>,
    /// Per-category overrides.
    #[serde(flatten)]
    pub categories: BTreeMap<FieldCategory, Vec<SourceId>>,
}

impl KindPriorities {
    /// Priorities with a single order for every category.
    #[must_use]
    pub fn uniform(order: impl IntoIterator<Item = SourceId>) -> Self {
        Self {
            default: order.into_iter().collect(),
            categories: BTreeMap::new(),
        }
    }

    /// Order that applies to `category`.
    #[must_use]
    pub fn order(&self, category: FieldCategory) -> &[SourceId] {
        self.categories
            .get(&category)
            .map_or(self.default.as_slice(), Vec::as_slice)
    }

    /// Checks for empty lists and drops repeated sources (first occurrence
    /// wins).
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyPriorityList`] when the kind has no list
    /// at all, or when a category list is empty.
    pub fn validated(&self, kind: ComponentKind) -> Result<Self, ConfigError> {
        if self.default.is_empty() && self.categories.is_empty() {
            return Err(ConfigError::EmptyPriorityList {
                scope: kind.to_string(),
            });
        }
        let mut categories = BTreeMap::new();
        for (category, order) in &self.categories {
            if order.is_empty() {
                return Err(ConfigError::EmptyPriorityList {
                    scope: format!("{kind}.{category}"),
                });
            }
            categories.insert(*category, dedup(order));
        }
        Ok(Self {
            default: dedup(&self.default),
            categories,
        })
    }
}

fn dedup(order: &[SourceId]) -> Vec<SourceId> {
    let mut out: Vec<SourceId> = Vec::with_capacity(order.len());
    for source in order {
        if !out.contains(source) {
            out.push(source.clone());
        }
    }
    out
}

/// Built-in priorities: the vendor listing outranks the community dataset
/// for CPUs; the encyclopedia is the only built-in GPU source.
#[must_use]
pub fn default_priorities() -> BTreeMap<ComponentKind, KindPriorities> {
    let mut priorities = BTreeMap::new();
    priorities.insert(
        ComponentKind::Gpu,
        KindPriorities::uniform([SourceId::gpu_encyclopedia()]),
    );
    priorities.insert(
        ComponentKind::Cpu,
        KindPriorities::uniform([SourceId::cpu_vendor_listing(), SourceId::cpu_dataset()]),
    );
    priorities
}

/// Everything the merge engine needs to decide between two values.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    priorities: BTreeMap<ComponentKind, KindPriorities>,
    float_tolerance: f64,
    max_superseded: usize,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            priorities: default_priorities(),
            float_tolerance: DEFAULT_FLOAT_TOLERANCE,
            max_superseded: DEFAULT_MAX_SUPERSEDED,
        }
    }
}

impl MergePolicy {
    /// Creates a policy. Kinds missing from `priorities` keep the built-in
    /// order.
    #[must_use]
    pub fn new(
        priorities: BTreeMap<ComponentKind, KindPriorities>,
        float_tolerance: f64,
        max_superseded: usize,
    ) -> Self {
        let mut merged = default_priorities();
        merged.extend(priorities);
        Self {
            priorities: merged,
            float_tolerance,
            max_superseded: max_superseded.max(1),
        }
    }

    /// Replaces the priorities of one kind.
    #[must_use]
    pub fn with_priorities(mut self, kind: ComponentKind, priorities: KindPriorities) -> Self {
        self.priorities.insert(kind, priorities);
        self
    }

    /// Relative float tolerance.
    #[must_use]
    pub const fn float_tolerance(&self) -> f64 {
        self.float_tolerance
    }

    /// Bound on superseded values kept per field.
    #[must_use]
    pub const fn max_superseded(&self) -> usize {
        self.max_superseded
    }

    /// Priority order for one field of one kind.
    #[must_use]
    pub fn order(&self, kind: ComponentKind, field: CanonicalField) -> &[SourceId] {
        self.priorities
            .get(&kind)
            .map_or(&[], |p| p.order(field.category()))
    }

    /// Rank of `source` for a field; lower is better. Unlisted sources
    /// share the rank just below the last listed source.
    #[must_use]
    pub fn rank(&self, kind: ComponentKind, field: CanonicalField, source: &SourceId) -> usize {
        let order = self.order(kind, field);
        order.iter().position(|s| s == source).unwrap_or(order.len())
    }
}
