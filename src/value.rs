//! Strongly-typed canonical field values.
//!
//! Raw strings never reach a canonical record: every value is coerced into
//! one of the [`FieldValue`] variants first, with units already converted to
//! the field's canonical unit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A canonical field value.
///
/// # Examples
///
/// ```
/// use hwcatalog::FieldValue;
///
/// let clock = FieldValue::Integer(2520);
/// assert_eq!(clock.as_integer(), Some(2520));
/// assert!(FieldValue::Float(250.0).agrees_with(&FieldValue::Float(250.4), 0.005));
/// assert!(FieldValue::text("NVIDIA").agrees_with(&FieldValue::text("Nvidia"), 0.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Socket(SocketType),
    Segment(MarketSegment),
}

impl FieldValue {
    /// Creates a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_socket(&self) -> Option<&SocketType> {
        match self {
            Self::Socket(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_segment(&self) -> Option<MarketSegment> {
        match self {
            Self::Segment(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Socket(_) => "socket",
            Self::Segment(_) => "segment",
        }
    }

    /// Type-aware equality used by the merge engine.
    ///
    /// Floats agree within `relative_tolerance` of the larger magnitude,
    /// text compares case-insensitively with whitespace collapsed, and
    /// everything else compares exactly. Values of different types never
    /// agree.
    #[must_use]
    pub fn agrees_with(&self, other: &Self, relative_tolerance: f64) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => {
                let scale = a.abs().max(b.abs());
                (a - b).abs() <= relative_tolerance * scale + f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => fold_text(a) == fold_text(b),
            (a, b) => a == b,
        }
    }
}

fn fold_text(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Socket(v) => write!(f, "{v}"),
            Self::Segment(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<SocketType> for FieldValue {
    fn from(v: SocketType) -> Self {
        Self::Socket(v)
    }
}

impl From<MarketSegment> for FieldValue {
    fn from(v: MarketSegment) -> Self {
        Self::Segment(v)
    }
}

/// CPU socket, by package family and pin count.
///
/// Vendor spellings (`FCLGA1700`, `LGA 1700`, `Socket LGA1700`) all parse to
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "package", rename_all = "snake_case")]
pub enum SocketType {
    Lga {
        pins: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<String>,
    },
    Bga {
        pins: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<String>,
    },
    Pga {
        pins: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<String>,
    },
    /// A named socket without a pin-count designation (e.g. `AM4`).
    Other {
        name: String,
    },
}

impl SocketType {
    /// Parses a socket designation. Returns `None` for empty input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        let mut rest = compact.as_str();
        rest = rest.strip_prefix("SOCKET").unwrap_or(rest);
        if rest.is_empty() {
            return None;
        }
        // Flip-chip and "r"/"s"/"m" prefixes do not change the socket.
        let stripped = rest
            .strip_prefix("FC")
            .or_else(|| rest.strip_prefix('R'))
            .or_else(|| rest.strip_prefix('S'))
            .or_else(|| rest.strip_prefix('M'))
            .unwrap_or(rest);

        for (prefix, family) in [("LGA", 0u8), ("BGA", 1), ("PGA", 2)] {
            let Some(tail) = stripped.strip_prefix(prefix) else {
                continue;
            };
            let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
            let Ok(pins) = digits.parse::<u32>() else {
                continue;
            };
            let revision = tail[digits.len()..].trim_start_matches('-');
            let revision = (!revision.is_empty()).then(|| revision.to_string());
            return Some(match family {
                0 => Self::Lga { pins, revision },
                1 => Self::Bga { pins, revision },
                _ => Self::Pga { pins, revision },
            });
        }

        Some(Self::Other {
            name: rest.to_string(),
        })
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (family, pins, revision) = match self {
            Self::Lga { pins, revision } => ("LGA", pins, revision),
            Self::Bga { pins, revision } => ("BGA", pins, revision),
            Self::Pga { pins, revision } => ("PGA", pins, revision),
            Self::Other { name } => return f.write_str(name),
        };
        match revision {
            Some(rev) if rev.chars().all(|c| c.is_ascii_digit()) => write!(f, "{family}{pins}-{rev}"),
            Some(rev) => write!(f, "{family}{pins}{rev}"),
            None => write!(f, "{family}{pins}"),
        }
    }
}

/// Market segment a CPU is sold into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSegment {
    Desktop,
    Mobile,
    Server,
    Workstation,
    Embedded,
}

impl MarketSegment {
    /// Maps a vendor segment label. Returns `None` for unknown labels.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "desktop" | "consumer desktop" => Some(Self::Desktop),
            "mobile" | "laptop" | "notebook" => Some(Self::Mobile),
            "server" | "data center" | "datacenter" => Some(Self::Server),
            "workstation" => Some(Self::Workstation),
            "embedded" | "iot" => Some(Self::Embedded),
            _ => None,
        }
    }
}

impl fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Mobile => write!(f, "mobile"),
            Self::Server => write!(f, "server"),
            Self::Workstation => write!(f, "workstation"),
            Self::Embedded => write!(f, "embedded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_tolerance_is_relative() {
        let a = FieldValue::Float(1000.0);
        assert!(a.agrees_with(&FieldValue::Float(1004.0), 0.005));
        assert!(!a.agrees_with(&FieldValue::Float(1010.0), 0.005));
        assert!(!a.agrees_with(&FieldValue::Float(1000.1), 0.0));
    }

    #[test]
    fn different_types_never_agree() {
        assert!(!FieldValue::Integer(8).agrees_with(&FieldValue::Float(8.0), 1.0));
        assert!(!FieldValue::text("8").agrees_with(&FieldValue::Integer(8), 1.0));
    }

    #[test]
    fn text_agreement_ignores_case_and_spacing() {
        let a = FieldValue::text("GeForce  RTX 4090");
        assert!(a.agrees_with(&FieldValue::text("geforce rtx 4090"), 0.0));
        assert!(!a.agrees_with(&FieldValue::text("geforce rtx 4080"), 0.0));
    }

    #[test]
    fn socket_spellings_converge() {
        let expected = SocketType::Lga { pins: 1700, revision: None };
        assert_eq!(SocketType::parse("FCLGA1700"), Some(expected.clone()));
        assert_eq!(SocketType::parse("LGA 1700"), Some(expected.clone()));
        assert_eq!(SocketType::parse("Socket LGA1700"), Some(expected));
    }

    #[test]
    fn socket_revision_and_other() {
        let socket = SocketType::parse("FCLGA2011-3").unwrap();
        assert_eq!(socket.to_string(), "LGA2011-3");
        assert_eq!(SocketType::parse("rPGA947").unwrap().to_string(), "PGA947");
        assert_eq!(SocketType::parse("PGA988B").unwrap().to_string(), "PGA988B");
        assert_eq!(
            SocketType::parse("AM4"),
            Some(SocketType::Other { name: "AM4".to_string() })
        );
        assert_eq!(SocketType::parse("  "), None);
    }

    #[test]
    fn segments() {
        assert_eq!(MarketSegment::parse("Desktop"), Some(MarketSegment::Desktop));
        assert_eq!(MarketSegment::parse("Laptop"), Some(MarketSegment::Mobile));
        assert_eq!(MarketSegment::parse("Toaster"), None);
    }

    #[test]
    fn serde_roundtrip_keeps_type_tag() {
        let value = FieldValue::Socket(SocketType::Lga { pins: 1200, revision: None });
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("\"socket\""));
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
