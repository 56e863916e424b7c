//! Alias table for identity resolution.
//!
//! Static data: vendor spellings, brand prefixes and marketing suffixes
//! that do not distinguish parts, product-line words that only sometimes
//! do, and whole-model aliases. Keys and values
//! are compared after case folding and punctuation removal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lookup tables applied while computing a catalog key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasTable {
    /// Vendor spelling → canonical vendor name.
    pub vendors: BTreeMap<String, String>,
    /// Leading brand words removed from models (`geforce rtx 4090`).
    pub brand_prefixes: Vec<String>,
    /// Leading product-line words removed only when a processor number
    /// follows that names the part on its own: `core i7-920` loses `core`,
    /// `atom 330` keeps `atom`.
    pub line_prefixes: Vec<String>,
    /// Trailing marketing words removed from models (`founders edition`).
    pub marketing_suffixes: Vec<String>,
    /// Model spelling → canonical model spelling, per canonical vendor.
    pub models: BTreeMap<String, BTreeMap<String, String>>,
}

/// Lowercase, punctuation other than `-` as spaces, whitespace collapsed.
fn fold(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Default for AliasTable {
    fn default() -> Self {
        let vendors = [
            ("nvidia corporation", "nvidia"),
            ("nvidia corp.", "nvidia"),
            ("ati", "amd"),
            ("ati technologies", "amd"),
            ("advanced micro devices", "amd"),
            ("advanced micro devices, inc.", "amd"),
            ("authenticamd", "amd"),
            ("intel corporation", "intel"),
            ("genuineintel", "intel"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let brand_prefixes = ["geforce", "radeon", "arc"].into_iter().map(String::from).collect();

        let line_prefixes = ["core", "xeon", "pentium", "celeron", "atom"]
            .into_iter()
            .map(String::from)
            .collect();

        let marketing_suffixes = ["founders edition", "processor", "graphics", "gpu", "cpu"]
            .into_iter()
            .map(String::from)
            .collect();

        let mut models = BTreeMap::new();
        models.insert(
            "nvidia".to_string(),
            [
                ("titan x pascal", "titan xp"),
                ("gtx titan x pascal", "titan xp"),
                ("gtx titan x", "titan x"),
                ("gtx titan x maxwell", "titan x"),
                ("titan x maxwell", "titan x"),
                ("gtx titan", "titan"),
                ("gtx titan black", "titan black"),
                ("gtx titan z", "titan z"),
            ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );

        Self {
            vendors,
            brand_prefixes,
            line_prefixes,
            marketing_suffixes,
            models,
        }
    }
}

impl AliasTable {
    /// An empty table: no substitutions at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            vendors: BTreeMap::new(),
            brand_prefixes: Vec::new(),
            line_prefixes: Vec::new(),
            marketing_suffixes: Vec::new(),
            models: BTreeMap::new(),
        }
    }

    /// Canonical vendor for a folded vendor spelling.
    #[must_use]
    pub fn vendor(&self, folded: &str) -> Option<&str> {
        self.vendors
            .iter()
            .find(|(k, _)| fold(k) == folded)
            .map(|(_, v)| v.as_str())
    }

    /// Every spelling that resolves to `canonical`, plus `canonical` itself,
    /// longest first.
    #[must_use]
    pub fn vendor_spellings(&self, canonical: &str) -> Vec<String> {
        let mut spellings: Vec<String> = self
            .vendors
            .iter()
            .filter(|(_, v)| fold(v) == canonical)
            .map(|(k, _)| fold(k))
            .chain(std::iter::once(canonical.to_string()))
            .collect();
        spellings.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        spellings.dedup();
        spellings
    }

    /// Canonical model spelling for a vendor, if aliased.
    #[must_use]
    pub fn model(&self, vendor: &str, folded_model: &str) -> Option<&str> {
        self.models
            .get(vendor)?
            .iter()
            .find(|(k, _)| fold(k) == folded_model)
            .map(|(_, v)| v.as_str())
    }

    /// Merges `other` into this table; entries of `other` win.
    pub fn extend(&mut self, other: &Self) {
        self.vendors
            .extend(other.vendors.iter().map(|(k, v)| (k.clone(), v.clone())));
        for prefix in &other.brand_prefixes {
            if !self.brand_prefixes.contains(prefix) {
                self.brand_prefixes.push(prefix.clone());
            }
        }
        for prefix in &other.line_prefixes {
            if !self.line_prefixes.contains(prefix) {
                self.line_prefixes.push(prefix.clone());
            }
        }
        for suffix in &other.marketing_suffixes {
            if !self.marketing_suffixes.contains(suffix) {
                self.marketing_suffixes.push(suffix.clone());
            }
        }
        for (vendor, models) in &other.models {
            self.models
                .entry(vendor.clone())
                .or_default()
                .extend(models.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_aliases_fold_case_and_spacing() {
        let table = AliasTable::default();
        assert_eq!(table.vendor("ati"), Some("amd"));
        assert_eq!(table.vendor("intel corporation"), Some("intel"));
        assert_eq!(table.vendor("advanced micro devices inc"), Some("amd"));
        assert_eq!(table.vendor("nvidia"), None);
    }

    #[test]
    fn spellings_are_longest_first() {
        let table = AliasTable::default();
        let spellings = table.vendor_spellings("nvidia");
        assert_eq!(spellings.first().map(String::as_str), Some("nvidia corporation"));
        assert!(spellings.contains(&"nvidia".to_string()));
    }

    #[test]
    fn extend_adds_without_duplicates() {
        let mut table = AliasTable::default();
        let mut extra = AliasTable::empty();
        extra.brand_prefixes = vec!["geforce".into(), "quadro".into()];
        extra.vendors.insert("nvda".into(), "nvidia".into());
        table.extend(&extra);
        assert_eq!(table.brand_prefixes.iter().filter(|p| *p == "geforce").count(), 1);
        assert!(table.brand_prefixes.contains(&"quadro".to_string()));
        assert_eq!(table.vendor("nvda"), Some("nvidia"));
    }

    #[test]
    fn product_lines_are_not_brand_prefixes() {
        let table = AliasTable::default();
        for line in ["core", "xeon", "pentium", "celeron", "atom"] {
            assert!(!table.brand_prefixes.iter().any(|p| p == line), "{line}");
            assert!(table.line_prefixes.iter().any(|p| p == line), "{line}");
        }
    }
}
