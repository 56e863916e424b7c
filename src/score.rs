//! Rough performance score.
//!
//! A single number for comparing parts of one kind, computed on demand from
//! a merged entry and never stored. 100 is roughly a mid-range part of the
//! late 2010s; newer parts score above it.

use crate::catalog::CatalogEntry;
use crate::component::ComponentKind;
use crate::schema::CanonicalField;

/// VRAM at which the memory half of a GPU score reaches 50.
pub const GPU_REFERENCE_VRAM_MB: f64 = 10.0 * 1024.0;
/// Core clock at which the clock half of a GPU score reaches 50.
pub const GPU_REFERENCE_CLOCK_MHZ: f64 = 1440.0;
/// Core count at which the core half of a CPU score reaches 50.
pub const CPU_REFERENCE_CORES: f64 = 8.0;
/// Base clock at which the clock half of a CPU score reaches 50.
pub const CPU_REFERENCE_CLOCK_MHZ: f64 = 5300.0;

/// `50 × (vram / 10 GiB + core clock / 1440 MHz)`.
#[must_use]
pub fn gpu_score(vram_mb: f64, core_clock_mhz: f64) -> f64 {
    50.0 * (vram_mb / GPU_REFERENCE_VRAM_MB + core_clock_mhz / GPU_REFERENCE_CLOCK_MHZ)
}

/// `50 × (cores / 8 + base clock / 5.3 GHz)`.
#[must_use]
pub fn cpu_score(cores: f64, base_clock_mhz: f64) -> f64 {
    50.0 * (cores / CPU_REFERENCE_CORES + base_clock_mhz / CPU_REFERENCE_CLOCK_MHZ)
}

/// Score of a merged entry, or `None` when an input field is absent.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score(entry: &CatalogEntry) -> Option<f64> {
    let get = |field| entry.integer(field).map(|v| v as f64);
    match entry.key.kind {
        ComponentKind::Gpu => Some(gpu_score(
            get(CanonicalField::VramMb)?,
            get(CanonicalField::CoreClockMhz)?,
        )),
        ComponentKind::Cpu => Some(cpu_score(
            get(CanonicalField::CoreCount)?,
            get(CanonicalField::BaseClockMhz)?,
        )),
    }
}
