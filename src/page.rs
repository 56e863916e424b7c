//! Page model handed over by the fetch collaborator.
//!
//! A page is already row-structured: pagination, navigation and HTML
//! parsing happened upstream. Rows may be ragged, carry separator or
//! footnote content, or have empty cells; adapters decide what to keep.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::SourceId;

/// One `(label, value)` pair of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub label: String,
    pub value: String,
}

impl Cell {
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// True when the value is empty after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// An ordered sequence of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageRow {
    cells: Vec<Cell>,
}

impl PageRow {
    #[must_use]
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Builds a row from `(label, value)` pairs.
    #[must_use]
    pub fn from_pairs<L, V>(pairs: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs.into_iter().map(|(l, v)| Cell::new(l, v)).collect(),
        }
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// First value whose label matches `label` case-insensitively.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.label.trim().eq_ignore_ascii_case(label))
            .map(|c| c.value.as_str())
    }

    /// True when every cell is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }
}

/// One fetched page, parsed into rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageModel {
    /// The source the page was fetched from.
    pub source_id: SourceId,

    /// When the fetch collaborator retrieved the page.
    pub fetched_at: DateTime<Utc>,

    /// Where the page came from, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,

    /// Page-level facts that apply to every row (e.g. `vendor` on a
    /// per-vendor list page).
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    /// Rows in document order.
    pub rows: Vec<PageRow>,
}

impl PageModel {
    /// Creates an empty page.
    #[must_use]
    pub fn new(source_id: SourceId, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_id,
            fetched_at,
            locator: None,
            context: BTreeMap::new(),
            rows: Vec::new(),
        }
    }

    /// Sets the page locator.
    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Adds a page-level context value.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Appends a row.
    #[must_use]
    pub fn with_row(mut self, row: PageRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Appends a row built from `(label, value)` pairs.
    #[must_use]
    pub fn with_pairs<L, V>(self, pairs: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<String>,
    {
        self.with_row(PageRow::from_pairs(pairs))
    }

    /// Looks up a context value by key (case-insensitive).
    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_is_case_insensitive() {
        let row = PageRow::from_pairs([("Model", "RTX 4090"), ("TDP (W)", "450")]);
        assert_eq!(row.get("model"), Some("RTX 4090"));
        assert_eq!(row.get("tdp (w)"), Some("450"));
        assert_eq!(row.get("vram"), None);
    }

    #[test]
    fn blank_rows() {
        let row = PageRow::from_pairs([("Model", " "), ("TDP", "")]);
        assert!(row.is_blank());
        assert!(PageRow::default().is_blank());
    }

    #[test]
    fn context_keys_are_case_insensitive() {
        let page = PageModel::new(SourceId::gpu_encyclopedia(), Utc::now()).with_context("Vendor", "NVIDIA");
        assert_eq!(page.context_value("vendor"), Some("NVIDIA"));
        assert_eq!(page.context_value("VENDOR"), Some("NVIDIA"));
    }
}
