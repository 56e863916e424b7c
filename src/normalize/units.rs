//! Unit-bearing value parsing.
//!
//! Scraped cells look like `3.5 GHz`, `2933/2400/2133 MHz`, `8 MB SmartCache`,
//! `1,440[12]` or `1440\n1710`. This module turns such strings into a list of
//! [`Quantity`] values with optional units; the normalizer then converts
//! them into the canonical unit of the target field.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Physical dimension of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Frequency,
    DataSize,
    Power,
    Length,
    Bits,
    Bandwidth,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Frequency => "frequency",
            Self::DataSize => "data size",
            Self::Power => "power",
            Self::Length => "length",
            Self::Bits => "bit width",
            Self::Bandwidth => "bandwidth",
        };
        f.write_str(name)
    }
}

/// A recognized unit.
///
/// Byte units are binary: many vendors write `GB` and mean GiB, and the
/// catalog follows that convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Hz,
    Khz,
    Mhz,
    Ghz,
    /// Mega-transfers per second, treated as effective MHz.
    MtPerS,
    Byte,
    Kib,
    Mib,
    Gib,
    Tib,
    Milliwatt,
    Watt,
    Kilowatt,
    Nanometer,
    Micrometer,
    Bit,
    MbPerS,
    GbPerS,
    TbPerS,
}

impl Unit {
    /// Parses a unit token case-insensitively. Unknown tokens return `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let lower = token.trim().trim_start_matches('-').to_lowercase();
        let unit = match lower.as_str() {
            "hz" => Self::Hz,
            "khz" => Self::Khz,
            "mhz" => Self::Mhz,
            "ghz" => Self::Ghz,
            "mt/s" | "mts" => Self::MtPerS,
            "b" | "byte" | "bytes" => Self::Byte,
            "kb" | "kib" | "k" => Self::Kib,
            "mb" | "mib" | "m" => Self::Mib,
            "gb" | "gib" => Self::Gib,
            "tb" | "tib" => Self::Tib,
            "mw" => Self::Milliwatt,
            "w" | "watt" | "watts" => Self::Watt,
            "kw" => Self::Kilowatt,
            "nm" => Self::Nanometer,
            "µm" | "um" | "micron" | "microns" => Self::Micrometer,
            "bit" | "bits" => Self::Bit,
            "mb/s" | "mib/s" => Self::MbPerS,
            "gb/s" | "gib/s" => Self::GbPerS,
            "tb/s" | "tib/s" => Self::TbPerS,
            _ => return None,
        };
        Some(unit)
    }

    #[must_use]
    pub const fn dimension(self) -> Dimension {
        match self {
            Self::Hz | Self::Khz | Self::Mhz | Self::Ghz | Self::MtPerS => Dimension::Frequency,
            Self::Byte | Self::Kib | Self::Mib | Self::Gib | Self::Tib => Dimension::DataSize,
            Self::Milliwatt | Self::Watt | Self::Kilowatt => Dimension::Power,
            Self::Nanometer | Self::Micrometer => Dimension::Length,
            Self::Bit => Dimension::Bits,
            Self::MbPerS | Self::GbPerS | Self::TbPerS => Dimension::Bandwidth,
        }
    }

    /// Multiplier into the dimension's base unit: MHz, bytes, watts,
    /// nanometres, bits, GB/s.
    #[must_use]
    pub const fn to_base(self) -> f64 {
        match self {
            Self::Hz => 1e-6,
            Self::Khz => 1e-3,
            Self::Mhz | Self::MtPerS => 1.0,
            Self::Ghz => 1e3,
            Self::Byte => 1.0,
            Self::Kib => 1024.0,
            Self::Mib => 1_048_576.0,
            Self::Gib => 1_073_741_824.0,
            Self::Tib => 1_099_511_627_776.0,
            Self::Milliwatt => 1e-3,
            Self::Watt | Self::Nanometer | Self::Bit | Self::GbPerS => 1.0,
            Self::Kilowatt | Self::Micrometer | Self::TbPerS => 1e3,
            Self::MbPerS => 1e-3,
        }
    }
}

/// A number with the unit written next to it, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Option<Unit>,
    /// A unit-like token was present but not recognized.
    pub unknown_unit: bool,
}

/// How to reduce a multi-value cell to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiValue {
    /// Take the first listed value (base clocks, primary configurations).
    #[default]
    First,
    /// Take the largest value (boost clocks, memory options).
    Max,
}

fn footnote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("static regex"))
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)").expect("static regex"))
}

fn quantity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*-?\s*([A-Za-zµ][A-Za-zµ/]*)?")
            .expect("static regex")
    })
}

/// Removes footnote markers and normalizes whitespace (including NBSP and
/// newlines) to single spaces.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let without_notes = footnote_re().replace_all(raw, " ");
    without_notes
        .chars()
        .filter(|c| !matches!(c, '™' | '®' | '©'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True for placeholder cells that mean "no value".
#[must_use]
pub fn is_null_marker(raw: &str) -> bool {
    let cleaned = clean_text(raw);
    let lower = cleaned.to_lowercase();
    matches!(
        lower.as_str(),
        "" | "-" | "—" | "–" | "?" | "n/a" | "na" | "none" | "unknown" | "tba" | "tbd" | "varies"
    )
}

/// Extracts every number in `raw`, with the unit token directly following
/// it. Footnote markers and parenthetical remarks are ignored.
///
/// A number with no unit inherits the unit of the next number that has
/// one, so `2933/2400/2133 MHz` yields three MHz quantities.
#[must_use]
pub fn extract_quantities(raw: &str) -> Vec<Quantity> {
    let stripped = footnote_re().replace_all(raw, " ");
    let stripped = parenthetical_re().replace_all(&stripped, " ");

    let mut out: Vec<Quantity> = quantity_re()
        .captures_iter(&stripped)
        .filter_map(|caps| {
            let number = caps.get(1)?.as_str().replace(',', "");
            let value = number.parse::<f64>().ok()?;
            let token = caps.get(2).map(|m| m.as_str());
            let unit = token.and_then(Unit::parse);
            Some(Quantity {
                value,
                unit,
                unknown_unit: token.is_some() && unit.is_none(),
            })
        })
        .collect();

    let mut trailing: Option<Unit> = None;
    for q in out.iter_mut().rev() {
        match q.unit {
            Some(u) => trailing = Some(u),
            None if !q.unknown_unit => q.unit = trailing,
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_values_with_units() {
        let q = extract_quantities("3.5 GHz");
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].value, 3.5);
        assert_eq!(q[0].unit, Some(Unit::Ghz));

        let q = extract_quantities("250 W");
        assert_eq!(q[0].unit, Some(Unit::Watt));

        let q = extract_quantities("384-bit");
        assert_eq!(q[0].value, 384.0);
        assert_eq!(q[0].unit, Some(Unit::Bit));

        let q = extract_quantities("1008 GB/s");
        assert_eq!(q[0].unit, Some(Unit::GbPerS));
    }

    #[test]
    fn trailing_unit_applies_to_every_value() {
        let q = extract_quantities("2933/2400/2133 MHz");
        let values: Vec<f64> = q.iter().map(|q| q.value).collect();
        assert_eq!(values, vec![2933.0, 2400.0, 2133.0]);
        assert!(q.iter().all(|q| q.unit == Some(Unit::Mhz)));

        let q = extract_quantities("1440\n1710 MHz");
        assert_eq!(q.len(), 2);
        assert!(q.iter().all(|q| q.unit == Some(Unit::Mhz)));
    }

    #[test]
    fn footnotes_and_parentheticals_are_ignored() {
        let q = extract_quantities("1,440[12] (1,710 boost) MHz");
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].value, 1440.0);
        assert_eq!(q[0].unit, Some(Unit::Mhz));
    }

    #[test]
    fn unknown_unit_tokens_are_flagged() {
        let q = extract_quantities("4 cores");
        assert_eq!(q[0].unit, None);
        assert!(q[0].unknown_unit);

        let q = extract_quantities("8 MB SmartCache");
        assert_eq!(q[0].unit, Some(Unit::Mib));
        assert!(!q[0].unknown_unit);
    }

    #[test]
    fn clean_text_strips_footnotes_and_marks() {
        assert_eq!(clean_text("GeForce\u{a0}RTX 3080[155]"), "GeForce RTX 3080");
        assert_eq!(clean_text("Intel® Core™  i5-750\n"), "Intel Core i5-750");
    }

    #[test]
    fn null_markers() {
        assert!(is_null_marker(" N/A "));
        assert!(is_null_marker("—"));
        assert!(is_null_marker("[3]"));
        assert!(!is_null_marker("0"));
    }

    #[test]
    fn unit_conversion_factors() {
        assert_eq!(Unit::Ghz.to_base() * 2.52, 2520.0);
        assert_eq!(Unit::Gib.to_base() / Unit::Mib.to_base(), 1024.0);
        assert_eq!(Unit::parse("GiB"), Some(Unit::Gib));
        assert_eq!(Unit::parse("-bit"), Some(Unit::Bit));
        assert_eq!(Unit::parse("furlongs"), None);
    }
}
