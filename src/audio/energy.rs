//! Band energy extraction from byte spectra.

use crate::params::{bands, clamp_band};

/// Average magnitude over the half-open bin range `[start_bin, end_bin)`,
/// normalized to [0, 1].
///
/// Bins past the end of `bins` are ignored; an empty effective range
/// yields 0 rather than dividing by zero.
pub fn average_energy(bins: &[u8], start_bin: usize, end_bin: usize) -> f32 {
    let end = end_bin.min(bins.len());
    if start_bin >= end {
        return 0.0;
    }
    let count = end - start_bin;
    let sum: u32 = bins[start_bin..end].iter().map(|&b| b as u32).sum();
    sum as f32 / (count as f32 * 255.0)
}

/// One published analysis result: a copy of the byte spectrum plus the
/// four named band energies, each in [0, 1].
///
/// Immutable once constructed; the energies are always derived from
/// `audio_data` via [`average_energy`] and the fixed band definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySnapshot {
    pub audio_data: Vec<u8>,
    pub bass_energy: f32,
    pub mid_energy: f32,
    pub high_energy: f32,
    pub full_energy: f32,
}

impl EnergySnapshot {
    /// Inert snapshot: all-zero spectrum of `bin_count` bins, zero energies.
    pub fn zero(bin_count: usize) -> Self {
        Self {
            audio_data: vec![0; bin_count],
            bass_energy: 0.0,
            mid_energy: 0.0,
            high_energy: 0.0,
            full_energy: 0.0,
        }
    }

    /// Build a snapshot from a byte spectrum, copying the bins.
    pub fn from_bins(bins: &[u8]) -> Self {
        let bass = clamp_band(&bands::BASS_BINS, bins.len());
        let mid = clamp_band(&bands::MID_BINS, bins.len());
        let high = clamp_band(&bands::HIGH_BINS, bins.len());
        let full = clamp_band(&bands::FULL_BINS, bins.len());

        Self {
            audio_data: bins.to_vec(),
            bass_energy: average_energy(bins, bass.start, bass.end),
            mid_energy: average_energy(bins, mid.start, mid.end),
            high_energy: average_energy(bins, high.start, high.end),
            full_energy: average_energy(bins, full.start, full.end),
        }
    }
}
