//! Identity resolution.
//!
//! Computes a [`CatalogKey`] for a canonical record so the same physical part
//! is recognized across sources and runs, however each source spells it.
//! Resolution is a pure function of the record's vendor and model text and
//! the [`AliasTable`]; it never looks at the catalog.
//!
//! The model goes through these steps, in order:
//!
//! 1. case folding;
//! 2. removal of trademark marks, footnotes, parenthetical remarks and
//!    anything after `@` (clock suffixes of CPU brand strings);
//! 3. punctuation unification and whitespace collapsing;
//! 4. removal of leading vendor names and brand prefixes, and trailing
//!    marketing suffixes; product-line words (`core`, `atom`) only go when
//!    the processor number after them names the part on its own;
//! 5. model alias substitution, tried first on the text with its
//!    parenthetical remarks kept, so `Titan X (Pascal)` and
//!    `Titan X Pascal` meet on one alias;
//! 6. variant extraction (memory size, `mobile`/`laptop`, `max-q`, `oem`);
//! 7. tokenization at separators and letter/digit boundaries.
//!
//! Records whose model names several parts (`/`, `,`, `&`, ` and `) are not
//! guessed at: they go to the unresolved bucket.

pub mod alias;
pub mod key;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::normalize::units::clean_text;
use crate::record::CanonicalRecord;
use crate::schema::CanonicalField;
use crate::source::SourceId;

pub use alias::AliasTable;
pub use key::{CatalogKey, ParseKeyError};

/// Why a record could not be keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No vendor text, or nothing left of it after normalization.
    MissingVendor,
    /// No model text.
    MissingModel,
    /// Nothing remained of the model after normalization.
    EmptyModel,
    /// The model text lists more than one part.
    MultipleParts,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingVendor => "missing vendor",
            Self::MissingModel => "missing model",
            Self::EmptyModel => "model empty after normalization",
            Self::MultipleParts => "model names several parts",
        };
        f.write_str(s)
    }
}

/// A record that could not be assigned a confident key. Never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedIdentityWarning {
    /// Source of the record.
    pub source_id: SourceId,
    /// Component kind of the record.
    pub kind: ComponentKind,
    /// Vendor text as the record carried it.
    pub vendor: Option<String>,
    /// Model text as the record carried it.
    pub model: Option<String>,
    /// Why no key was computed.
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedIdentityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} / {}: {}",
            self.source_id,
            self.kind,
            self.vendor.as_deref().unwrap_or("-"),
            self.model.as_deref().unwrap_or("-"),
            self.reason
        )
    }
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)?").expect("static regex"))
}

fn memory_variant_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+)\s*(gb|mb|gib|mib)\b").expect("static regex"))
}

fn max_q_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bmax[\s-]?q\b").expect("static regex"))
}

fn word_variant_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(mobile|laptop|notebook|oem)\b").expect("static regex"))
}

/// A processor number that identifies a part without its product line:
/// `i7-920`, `e5-2690`, `g4560`, `w-2295`.
fn part_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{1,2}-?\d").expect("static regex"))
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Steps 1 and 2: fold case, drop marks, footnotes, remarks and `@` tails.
fn strip_decorations(raw: &str) -> String {
    let folded = clean_text(raw).to_lowercase();
    let without_remarks = parenthetical_re().replace_all(&folded, " ");
    cut_at_clock(&without_remarks)
}

/// Like [`strip_decorations`], but the words inside parentheses stay.
fn unwrap_remarks(raw: &str) -> String {
    let folded = clean_text(raw).to_lowercase().replace(['(', ')'], " ");
    cut_at_clock(&folded)
}

fn cut_at_clock(s: &str) -> String {
    collapse(s.split_once('@').map_or(s, |(head, _)| head))
}

fn names_several_parts(s: &str) -> bool {
    s.contains(['/', ',', '&']) || format!(" {s} ").contains(" and ")
}

/// Step 3: every punctuation mark except `-` becomes a space.
fn unify_punctuation(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();
    collapse(&mapped)
}

/// Splits at separators and letter/digit boundaries and joins with `-`.
fn tokenize(s: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    for word in s.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut current = String::new();
        let mut prev_digit: Option<bool> = None;
        for c in word.chars() {
            let digit = c.is_ascii_digit();
            if prev_digit.is_some_and(|p| p != digit) {
                tokens.push(std::mem::take(&mut current));
            }
            current.push(c);
            prev_digit = Some(digit);
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens.join("-")
}

fn strip_leading<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    if s == word {
        return Some("");
    }
    s.strip_prefix(word)
        .and_then(|rest| rest.strip_prefix(' '))
}

fn strip_trailing<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    if s == word {
        return Some("");
    }
    s.strip_suffix(word)
        .and_then(|rest| rest.strip_suffix(' '))
}

/// Words stripped from the ends of a model, folded like the model.
struct Affixes {
    prefixes: Vec<String>,
    line_prefixes: Vec<String>,
    suffixes: Vec<String>,
}

impl Affixes {
    fn new(aliases: &AliasTable, vendor: &str) -> Self {
        fn fold(words: &[String]) -> Vec<String> {
            words.iter().map(|w| unify_punctuation(&w.to_lowercase())).collect()
        }
        let mut prefixes = aliases.vendor_spellings(vendor);
        prefixes.extend(aliases.brand_prefixes.iter().cloned());
        Self {
            prefixes: fold(&prefixes),
            line_prefixes: fold(&aliases.line_prefixes),
            suffixes: fold(&aliases.marketing_suffixes),
        }
    }

    /// Step 4, repeated until nothing more comes off.
    fn strip(&self, mut s: String) -> String {
        loop {
            let before = s.len();
            for prefix in &self.prefixes {
                if let Some(rest) = strip_leading(&s, prefix) {
                    s = rest.to_string();
                }
            }
            for prefix in &self.line_prefixes {
                let rest = strip_leading(&s, prefix).filter(|rest| part_number_re().is_match(rest));
                if let Some(rest) = rest {
                    s = rest.to_string();
                }
            }
            for suffix in &self.suffixes {
                if let Some(rest) = strip_trailing(&s, suffix) {
                    s = rest.to_string();
                }
            }
            if s.len() == before {
                return s;
            }
        }
    }
}

/// Computes catalog keys.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    aliases: AliasTable,
}

impl IdentityResolver {
    #[must_use]
    pub const fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    #[must_use]
    pub const fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Computes the key of a record.
    ///
    /// # Errors
    ///
    /// Returns an [`UnresolvedIdentityWarning`] when the record lacks a
    /// vendor or model, or its model cannot be reduced to a single part.
    pub fn resolve_key(&self, record: &CanonicalRecord) -> Result<CatalogKey, UnresolvedIdentityWarning> {
        let vendor_text = record.text(CanonicalField::Vendor);
        let model_text = record.text(CanonicalField::Model);
        let unresolved = |reason| UnresolvedIdentityWarning {
            source_id: record.source_id.clone(),
            kind: record.kind,
            vendor: vendor_text.map(str::to_string),
            model: model_text.map(str::to_string),
            reason,
        };

        let vendor = vendor_text
            .and_then(|v| self.normalize_vendor(v))
            .ok_or_else(|| unresolved(UnresolvedReason::MissingVendor))?;
        let model_text = model_text
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| unresolved(UnresolvedReason::MissingModel))?;
        let (model, variant) = self
            .normalize_model(&vendor, model_text)
            .map_err(unresolved)?;

        Ok(CatalogKey::new(vendor, record.kind, model, variant))
    }

    /// Canonical vendor identifier, or `None` if nothing is left.
    #[must_use]
    pub fn normalize_vendor(&self, raw: &str) -> Option<String> {
        let stripped = unify_punctuation(&strip_decorations(raw));
        let canonical = self
            .aliases
            .vendor(&stripped)
            .map_or_else(|| tokenize(&stripped), tokenize);
        (!canonical.is_empty()).then_some(canonical)
    }

    /// Normalized `(model, variant)` for a model spelling of `vendor`.
    ///
    /// # Errors
    ///
    /// Returns the reason the model cannot be keyed.
    pub fn normalize_model(&self, vendor: &str, raw: &str) -> Result<(String, String), UnresolvedReason> {
        let stripped = strip_decorations(raw);
        if names_several_parts(&stripped) {
            return Err(UnresolvedReason::MultipleParts);
        }
        let affixes = Affixes::new(&self.aliases, vendor);
        let mut s = affixes.strip(unify_punctuation(&stripped));

        let remarked = affixes.strip(unify_punctuation(&unwrap_remarks(raw)));
        if let Some(alias) = self
            .aliases
            .model(vendor, &remarked)
            .or_else(|| self.aliases.model(vendor, &s))
        {
            s = collapse(&alias.to_lowercase());
        }

        let mut variants: Vec<String> = Vec::new();
        for caps in memory_variant_re().captures_iter(&s) {
            let unit = match &caps[2] {
                "gib" => "gb",
                "mib" => "mb",
                other => other,
            };
            variants.push(format!("{}{unit}", &caps[1]));
        }
        s = memory_variant_re().replace_all(&s, " ").into_owned();
        if max_q_re().is_match(&s) {
            variants.push("max-q".to_string());
            s = max_q_re().replace_all(&s, " ").into_owned();
        }
        for caps in word_variant_re().captures_iter(&s) {
            let v = match &caps[1] {
                "laptop" | "notebook" => "mobile",
                other => other,
            };
            if !variants.iter().any(|x| x == v) {
                variants.push(v.to_string());
            }
        }
        s = word_variant_re().replace_all(&s, " ").into_owned();

        let model = tokenize(&s);
        if model.is_empty() {
            return Err(UnresolvedReason::EmptyModel);
        }
        Ok((model, variants.join("-")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::source::ConfidenceTier;

    fn gpu(vendor: &str, model: &str) -> CanonicalRecord {
        CanonicalRecord::empty(
            ComponentKind::Gpu,
            SourceId::gpu_encyclopedia(),
            Utc::now(),
            ConfidenceTier::Curated,
        )
        .with(CanonicalField::Vendor, vendor)
        .with(CanonicalField::Model, model)
    }

    fn key(vendor: &str, model: &str) -> String {
        IdentityResolver::default()
            .resolve_key(&gpu(vendor, model))
            .unwrap()
            .to_string()
    }

    #[test]
    fn spellings_of_one_part_share_a_key() {
        let expected = "nvidia/gpu/rtx-4090";
        assert_eq!(key("NVIDIA", "GeForce RTX 4090"), expected);
        assert_eq!(key("NVIDIA Corporation", "NVIDIA GeForce RTX™ 4090 Founders Edition"), expected);
        assert_eq!(key("nvidia", "rtx4090[12]"), expected);
        assert_eq!(key("Nvidia", "GeForce  RTX 4090 (AD102)"), expected);
    }

    #[test]
    fn vendor_aliases_apply() {
        assert_eq!(key("ATI", "Radeon HD 5870"), "amd/gpu/hd-5870");
        assert_eq!(key("Advanced Micro Devices", "Radeon RX 7900 XTX"), "amd/gpu/rx-7900-xtx");
    }

    #[test]
    fn variants_are_extracted() {
        assert_eq!(key("NVIDIA", "GeForce RTX 3060 12GB"), "nvidia/gpu/rtx-3060/12gb");
        assert_eq!(key("NVIDIA", "GeForce RTX 4090 Laptop GPU"), "nvidia/gpu/rtx-4090/mobile");
        assert_eq!(key("NVIDIA", "GeForce RTX 2080 Max-Q"), "nvidia/gpu/rtx-2080/max-q");
        assert_eq!(key("NVIDIA", "GeForce GTX 1060 6 GB OEM"), "nvidia/gpu/gtx-1060/6gb-oem");
    }

    #[test]
    fn cpu_brand_strings_resolve_to_processor_numbers() {
        let resolver = IdentityResolver::default();
        let (model, variant) = resolver
            .normalize_model("intel", "Intel(R) Core(TM) i9-9900K CPU @ 3.60GHz")
            .unwrap();
        assert_eq!(model, "i-9-9900-k");
        assert!(variant.is_empty());
        assert_eq!(resolver.normalize_model("intel", "i9-9900K").unwrap().0, model);
    }

    #[test]
    fn model_aliases_apply() {
        let pascal = "nvidia/gpu/titan-xp";
        assert_eq!(key("NVIDIA", "Titan X (Pascal)"), pascal);
        assert_eq!(key("NVIDIA", "Titan X Pascal"), pascal);
        assert_eq!(key("NVIDIA", "NVIDIA TITAN Xp"), pascal);

        let maxwell = "nvidia/gpu/titan-x";
        assert_eq!(key("NVIDIA", "GeForce GTX Titan X"), maxwell);
        assert_eq!(key("NVIDIA", "Titan X"), maxwell);
        assert_eq!(key("NVIDIA", "GeForce GTX TITAN X (Maxwell)"), maxwell);
    }

    #[test]
    fn remarks_outside_aliases_are_dropped() {
        assert_eq!(key("NVIDIA", "GeForce RTX 4090 (AD102)"), "nvidia/gpu/rtx-4090");
        assert_eq!(key("NVIDIA", "GeForce GTX Titan Black (GK110)"), "nvidia/gpu/titan-black");
    }

    #[test]
    fn product_lines_sharing_a_number_stay_apart() {
        let resolver = IdentityResolver::default();
        let model = |m: &str| resolver.normalize_model("intel", m).unwrap().0;

        assert_eq!(model("Atom 330"), "atom-330");
        assert_eq!(model("Celeron 330"), "celeron-330");
        assert_eq!(model("Intel Pentium 4"), "pentium-4");
        assert_eq!(model("Intel Core 2 Duo E8400"), "core-2-duo-e-8400");

        assert_eq!(model("Core i7-920"), model("i7-920"));
        assert_eq!(model("Intel(R) Xeon(R) E5-2690 v4 @ 2.60GHz"), model("E5-2690 v4"));
    }

    #[test]
    fn unresolvable_records() {
        let resolver = IdentityResolver::default();
        let reason = |v: &str, m: &str| resolver.resolve_key(&gpu(v, m)).unwrap_err().reason;

        assert_eq!(reason("NVIDIA", "GeForce GTX 1070 / 1080"), UnresolvedReason::MultipleParts);
        assert_eq!(reason("NVIDIA", "RTX 4080 and RTX 4090"), UnresolvedReason::MultipleParts);
        assert_eq!(reason("NVIDIA", "GeForce"), UnresolvedReason::EmptyModel);
        assert_eq!(reason("™", "RTX 4090"), UnresolvedReason::MissingVendor);

        let no_model = CanonicalRecord::empty(
            ComponentKind::Gpu,
            SourceId::gpu_encyclopedia(),
            Utc::now(),
            ConfidenceTier::Curated,
        )
        .with(CanonicalField::Vendor, "NVIDIA");
        assert_eq!(resolver.resolve_key(&no_model).unwrap_err().reason, UnresolvedReason::MissingModel);
    }

    #[test]
    fn tokenizer_splits_letter_digit_boundaries() {
        assert_eq!(tokenize("rtx4090 ti"), "rtx-4090-ti");
        assert_eq!(tokenize("i5-750"), "i-5-750");
        assert_eq!(tokenize(""), "");
    }
}
