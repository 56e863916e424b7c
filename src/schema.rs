//! The canonical schema shared by every source of one component kind.
//!
//! Each [`CanonicalField`] has exactly one [`ValueKind`] (which decides how a
//! raw string is coerced and which unit it ends up in) and one
//! [`FieldCategory`] (which decides which source priority list applies when
//! sources disagree).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;

/// A field of the canonical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    // Shared
    Vendor,
    Model,
    Codename,
    Launch,
    BoostClockMhz,
    TdpW,
    ProcessNm,

    // GPU
    CoreClockMhz,
    MemoryClockMhz,
    VramMb,
    MemoryBusWidthBits,
    MemoryBandwidthGbs,
    MemoryType,
    ShaderCount,

    // CPU
    ProductId,
    CoreCount,
    ThreadCount,
    BaseClockMhz,
    CacheKb,
    Socket,
    Segment,
}

const GPU_SCHEMA: &[CanonicalField] = &[
    CanonicalField::Vendor,
    CanonicalField::Model,
    CanonicalField::Codename,
    CanonicalField::Launch,
    CanonicalField::CoreClockMhz,
    CanonicalField::BoostClockMhz,
    CanonicalField::MemoryClockMhz,
    CanonicalField::VramMb,
    CanonicalField::MemoryBusWidthBits,
    CanonicalField::MemoryBandwidthGbs,
    CanonicalField::MemoryType,
    CanonicalField::ShaderCount,
    CanonicalField::TdpW,
    CanonicalField::ProcessNm,
];

const CPU_SCHEMA: &[CanonicalField] = &[
    CanonicalField::Vendor,
    CanonicalField::Model,
    CanonicalField::Codename,
    CanonicalField::Launch,
    CanonicalField::ProductId,
    CanonicalField::CoreCount,
    CanonicalField::ThreadCount,
    CanonicalField::BaseClockMhz,
    CanonicalField::BoostClockMhz,
    CanonicalField::CacheKb,
    CanonicalField::TdpW,
    CanonicalField::ProcessNm,
    CanonicalField::Socket,
    CanonicalField::Segment,
];

/// Returns the canonical schema for a component kind.
#[must_use]
pub const fn schema(kind: ComponentKind) -> &'static [CanonicalField] {
    match kind {
        ComponentKind::Gpu => GPU_SCHEMA,
        ComponentKind::Cpu => CPU_SCHEMA,
    }
}

impl CanonicalField {
    /// Canonical snake_case name, identical to the serde representation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Model => "model",
            Self::Codename => "codename",
            Self::Launch => "launch",
            Self::BoostClockMhz => "boost_clock_mhz",
            Self::TdpW => "tdp_w",
            Self::ProcessNm => "process_nm",
            Self::CoreClockMhz => "core_clock_mhz",
            Self::MemoryClockMhz => "memory_clock_mhz",
            Self::VramMb => "vram_mb",
            Self::MemoryBusWidthBits => "memory_bus_width_bits",
            Self::MemoryBandwidthGbs => "memory_bandwidth_gbs",
            Self::MemoryType => "memory_type",
            Self::ShaderCount => "shader_count",
            Self::ProductId => "product_id",
            Self::CoreCount => "core_count",
            Self::ThreadCount => "thread_count",
            Self::BaseClockMhz => "base_clock_mhz",
            Self::CacheKb => "cache_kb",
            Self::Socket => "socket",
            Self::Segment => "segment",
        }
    }

    /// The coercion target of this field.
    #[must_use]
    pub const fn value_kind(self) -> ValueKind {
        match self {
            Self::Vendor | Self::Model | Self::Codename | Self::Launch => ValueKind::Text,
            Self::MemoryType => ValueKind::UpperText,
            Self::BoostClockMhz | Self::CoreClockMhz | Self::MemoryClockMhz | Self::BaseClockMhz => {
                ValueKind::Frequency
            }
            Self::VramMb => ValueKind::DataSize(SizeScale::Mebibytes),
            Self::CacheKb => ValueKind::DataSize(SizeScale::Kibibytes),
            Self::TdpW => ValueKind::Power,
            Self::ProcessNm => ValueKind::Length,
            Self::MemoryBusWidthBits => ValueKind::BusWidth,
            Self::MemoryBandwidthGbs => ValueKind::Bandwidth,
            Self::ShaderCount | Self::ProductId | Self::CoreCount | Self::ThreadCount => {
                ValueKind::Count
            }
            Self::Socket => ValueKind::Socket,
            Self::Segment => ValueKind::Segment,
        }
    }

    /// The priority category of this field.
    #[must_use]
    pub const fn category(self) -> FieldCategory {
        match self {
            Self::Vendor | Self::Model | Self::ProductId => FieldCategory::Identity,
            Self::BoostClockMhz | Self::CoreClockMhz | Self::MemoryClockMhz | Self::BaseClockMhz => {
                FieldCategory::Clocks
            }
            Self::ShaderCount | Self::CoreCount | Self::ThreadCount => FieldCategory::Topology,
            Self::VramMb
            | Self::MemoryBusWidthBits
            | Self::MemoryBandwidthGbs
            | Self::MemoryType
            | Self::CacheKb => FieldCategory::Memory,
            Self::TdpW => FieldCategory::Power,
            Self::ProcessNm | Self::Socket => FieldCategory::Physical,
            Self::Codename | Self::Launch | Self::Segment => FieldCategory::Meta,
        }
    }

    /// Whether this field is part of the given kind's schema.
    #[must_use]
    pub fn belongs_to(self, kind: ComponentKind) -> bool {
        schema(kind).contains(&self)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        GPU_SCHEMA
            .iter()
            .chain(CPU_SCHEMA)
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| format!("unknown canonical field: {s}"))
    }
}

/// Binary scale a data-size field is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeScale {
    Kibibytes,
    Mebibytes,
}

/// How a raw value is coerced for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Cleaned free text.
    Text,
    /// Cleaned free text, upper-cased (memory technology names).
    UpperText,
    /// Integer MHz.
    Frequency,
    /// Integer in the given binary scale.
    DataSize(SizeScale),
    /// Float watts.
    Power,
    /// Integer nanometres.
    Length,
    /// Integer bits.
    BusWidth,
    /// Float GB/s.
    Bandwidth,
    /// Plain integer.
    Count,
    /// [`crate::value::SocketType`].
    Socket,
    /// [`crate::value::MarketSegment`].
    Segment,
}

/// Group of fields sharing a source priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Identity,
    Clocks,
    Topology,
    Memory,
    Power,
    Physical,
    Meta,
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Identity => "identity",
            Self::Clocks => "clocks",
            Self::Topology => "topology",
            Self::Memory => "memory",
            Self::Power => "power",
            Self::Physical => "physical",
            Self::Meta => "meta",
        };
        f.write_str(name)
    }
}
