//! Field-mapping registry.
//!
//! Every adapter declares a static table of the raw labels it emits. The
//! registry for a component kind is the union of those tables plus any
//! mappings added by configuration; it is the single place where a new
//! source column gets wired into the canonical schema.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::error::ConfigError;
use crate::normalize::units::{MultiValue, Unit};
use crate::schema::CanonicalField;

/// One entry of an adapter's static field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    /// Raw label as emitted by the adapter.
    pub label: &'static str,
    /// Target canonical field.
    pub field: CanonicalField,
    /// Unit assumed when the value carries none.
    pub default_unit: Option<Unit>,
    /// Multi-value reduction.
    pub multi: MultiValue,
}

impl FieldMapping {
    /// A mapping without a default unit, taking the first value.
    #[must_use]
    pub const fn new(label: &'static str, field: CanonicalField) -> Self {
        Self {
            label,
            field,
            default_unit: None,
            multi: MultiValue::First,
        }
    }

    /// Sets the default unit.
    #[must_use]
    pub const fn unit(mut self, unit: Unit) -> Self {
        self.default_unit = Some(unit);
        self
    }

    /// Takes the largest value of a multi-value cell.
    #[must_use]
    pub const fn max(mut self) -> Self {
        self.multi = MultiValue::Max;
        self
    }
}

/// A mapping supplied by configuration rather than by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFieldMapping {
    pub kind: ComponentKind,
    pub label: String,
    pub field: CanonicalField,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub multi: MultiValue,
}

/// Resolved coercion rule for one raw label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: CanonicalField,
    pub default_unit: Option<Unit>,
    pub multi: MultiValue,
}

/// Label → rule lookup for one component kind.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    kind: ComponentKind,
    rules: HashMap<String, FieldRule>,
}

fn label_key(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl FieldRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            rules: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Registers one mapping.
    ///
    /// Re-registering a label with an identical rule is a no-op; mapping a
    /// label to a different rule is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FieldNotInSchema`] when the field does not
    /// belong to this registry's kind, and
    /// [`ConfigError::ConflictingFieldMapping`] on a label clash.
    pub fn register(
        &mut self,
        label: &str,
        field: CanonicalField,
        default_unit: Option<Unit>,
        multi: MultiValue,
    ) -> Result<(), ConfigError> {
        if !field.belongs_to(self.kind) {
            return Err(ConfigError::FieldNotInSchema {
                field: field.to_string(),
                kind: self.kind.to_string(),
            });
        }
        let rule = FieldRule {
            field,
            default_unit,
            multi,
        };
        let key = label_key(label);
        match self.rules.get(&key) {
            Some(existing) if *existing == rule => Ok(()),
            Some(existing) => Err(ConfigError::ConflictingFieldMapping {
                label: label.to_string(),
                first: existing.field.to_string(),
                second: field.to_string(),
            }),
            None => {
                self.rules.insert(key, rule);
                Ok(())
            }
        }
    }

    /// Registers every mapping of an adapter table.
    ///
    /// # Errors
    ///
    /// See [`FieldRegistry::register`].
    pub fn register_table(&mut self, table: &[FieldMapping]) -> Result<(), ConfigError> {
        for m in table {
            self.register(m.label, m.field, m.default_unit, m.multi)?;
        }
        Ok(())
    }

    /// Registers a configured mapping if it targets this registry's kind.
    ///
    /// # Errors
    ///
    /// See [`FieldRegistry::register`].
    pub fn register_extra(&mut self, extra: &ExtraFieldMapping) -> Result<(), ConfigError> {
        if extra.kind != self.kind {
            return Ok(());
        }
        self.register(&extra.label, extra.field, extra.unit, extra.multi)
    }

    /// Looks up the rule for a raw label (case- and spacing-insensitive).
    #[must_use]
    pub fn lookup(&self, label: &str) -> Option<&FieldRule> {
        self.rules.get(&label_key(label))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
