//! Fuzzy model lookup.
//!
//! Maps a free-form model string, such as the brand string an operating
//! system reports (`Intel(R) Core(TM) i9-9900K CPU @ 3.60GHz`), to the
//! catalog entry whose model text shares the longest common substring with
//! it.

use crate::catalog::{Catalog, CatalogEntry, StorageError};
use crate::component::ComponentKind;
use crate::schema::CanonicalField;

/// Shortest common substring accepted as a match.
pub const MIN_MATCH_LEN: usize = 3;

/// Length in characters of the longest common substring of `a` and `b`.
#[must_use]
pub fn longest_common_substring(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev = vec![0_usize; b.len() + 1];
    let mut best = 0;
    for ca in &a {
        let mut row = vec![0_usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                best = best.max(row[j + 1]);
            }
        }
        prev = row;
    }
    best
}

/// Lower-cased model texts of one kind, built once and queried many times.
#[derive(Debug, Clone)]
pub struct ModelIndex {
    entries: Vec<(String, CatalogEntry)>,
}

impl ModelIndex {
    /// Indexes every entry of `kind` that has a model text.
    ///
    /// # Errors
    /// Propagates the catalog's [`StorageError`].
    pub fn build(catalog: &dyn Catalog, kind: ComponentKind) -> Result<Self, StorageError> {
        let entries = catalog
            .entries()?
            .into_iter()
            .filter(|e| e.key.kind == kind)
            .filter_map(|e| {
                let model = e.text(CanonicalField::Model)?.to_lowercase();
                Some((model, e))
            })
            .collect();
        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best match for `query`, or `None` when no model shares at least
    /// [`MIN_MATCH_LEN`] characters with it.
    ///
    /// Longer common substrings win; on equal length the shorter model
    /// text wins, then the first in key order.
    #[must_use]
    pub fn find(&self, query: &str) -> Option<&CatalogEntry> {
        let query = query.to_lowercase();
        let mut best: Option<(usize, usize, &CatalogEntry)> = None;
        for (model, entry) in &self.entries {
            let len = longest_common_substring(model, &query);
            if len < MIN_MATCH_LEN {
                continue;
            }
            let model_len = model.chars().count();
            let better = best.map_or(true, |(best_len, best_model_len, _)| {
                len > best_len || (len == best_len && model_len < best_model_len)
            });
            if better {
                best = Some((len, model_len, entry));
            }
        }
        best.map(|(_, _, entry)| entry)
    }
}

/// One-shot lookup; builds a [`ModelIndex`] for the query.
///
/// # Errors
/// Propagates the catalog's [`StorageError`].
pub fn find_by_model(
    catalog: &dyn Catalog,
    kind: ComponentKind,
    query: &str,
) -> Result<Option<CatalogEntry>, StorageError> {
    Ok(ModelIndex::build(catalog, kind)?.find(query).cloned())
}
