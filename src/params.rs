//! Parameter definitions with physical units and documented semantics.

use std::ops::Range;
use std::path::PathBuf;

use crate::error::AudioError;

/// Frequency band definitions, as half-open bin ranges into the byte
/// spectrum. Fixed constants: the visual tuning downstream depends on
/// exactly these boundaries.
pub mod bands {
    use std::ops::Range;

    /// Bass band (bins 0..10, ≈ 0-1.7 kHz at 44.1 kHz / 256-point FFT)
    pub const BASS_BINS: Range<usize> = 0..10;

    /// Mid band (bins 10..30)
    pub const MID_BINS: Range<usize> = 10..30;

    /// High band (bins 30..60)
    pub const HIGH_BINS: Range<usize> = 30..60;

    /// Full band (bins 0..60, the whole perceptually loud region)
    pub const FULL_BINS: Range<usize> = 0..60;
}

/// Spectral analysis configuration with byte-spectrum conversion parameters
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// FFT transform size in samples (must be a power of 2).
    /// 256 samples -> 128 frequency bins
    pub fft_size: usize,

    /// Fixed-interval sampling period (milliseconds)
    /// 30 ms ≈ 33 snapshots/sec
    pub update_interval_ms: u64,

    /// Minimum interval between samples for the frame-throttled
    /// scheduler (milliseconds)
    pub frame_min_interval_ms: u64,

    /// Exponential smoothing applied to bin magnitudes between
    /// successive analyses (0.0 = none, must be < 1.0)
    pub smoothing: f32,

    /// Magnitude mapped to byte value 0 (decibels full scale)
    pub min_db: f32,

    /// Magnitude mapped to byte value 255 (decibels full scale)
    pub max_db: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            update_interval_ms: 30,
            frame_min_interval_ms: 100,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

impl AnalyzerConfig {
    /// Number of frequency bins produced per analysis
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), AudioError> {
        if !self.fft_size.is_power_of_two() {
            return Err(AudioError::InvalidConfig(format!(
                "FFT size must be power of 2, got {}",
                self.fft_size
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(AudioError::InvalidConfig(format!(
                "smoothing must be in [0, 1), got {}",
                self.smoothing
            )));
        }
        if self.min_db >= self.max_db {
            return Err(AudioError::InvalidConfig(format!(
                "min_db ({}) must be below max_db ({})",
                self.min_db, self.max_db
            )));
        }
        Ok(())
    }
}

/// Step sequencer configuration
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Tempo (beats per minute). One step = one 16th note.
    pub bpm: f32,

    /// Master gain applied to the voice mix before the clip stage
    pub master_gain: f32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            master_gain: 0.8,
        }
    }
}

impl SequencerConfig {
    /// Samples per 16th-note step at the given sample rate
    pub fn samples_per_step(&self, sample_rate_hz: u32) -> f64 {
        sample_rate_hz as f64 * 60.0 / (self.bpm as f64 * 4.0)
    }

    pub fn validate(&self) -> Result<(), AudioError> {
        if !(20.0..=300.0).contains(&self.bpm) {
            return Err(AudioError::InvalidConfig(format!(
                "bpm must be in 20..=300, got {}",
                self.bpm
            )));
        }
        if !(0.0..=1.0).contains(&self.master_gain) {
            return Err(AudioError::InvalidConfig(format!(
                "master gain must be in 0..=1, got {}",
                self.master_gain
            )));
        }
        Ok(())
    }
}

/// Recording mode configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Duration to record (seconds)
    pub duration_secs: f32,

    /// Output WAV path
    pub path: PathBuf,
}

impl RecordingConfig {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration_secs,
            path: PathBuf::from("pulsegrid.wav"),
        }
    }

    /// Total number of audio frames to capture at the given rate
    pub fn total_frames(&self, sample_rate_hz: u32) -> u64 {
        (self.duration_secs as f64 * sample_rate_hz as f64).ceil() as u64
    }
}

/// Convert a band range to the bins actually available in a spectrum
/// of `bin_count` bins.
pub fn clamp_band(band: &Range<usize>, bin_count: usize) -> Range<usize> {
    band.start.min(bin_count)..band.end.min(bin_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_analyzer_config_is_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bin_count(), 128);
    }

    #[test]
    fn test_fft_size_must_be_power_of_two() {
        let config = AnalyzerConfig {
            fft_size: 300,
            ..AnalyzerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_band_ranges_are_contiguous() {
        assert_eq!(bands::BASS_BINS.end, bands::MID_BINS.start);
        assert_eq!(bands::MID_BINS.end, bands::HIGH_BINS.start);
        assert_eq!(bands::FULL_BINS.start, bands::BASS_BINS.start);
        assert_eq!(bands::FULL_BINS.end, bands::HIGH_BINS.end);
    }

    #[test]
    fn test_samples_per_step() {
        let config = SequencerConfig {
            bpm: 120.0,
            ..SequencerConfig::default()
        };
        // 120 BPM -> 8 sixteenths per second -> 5512.5 samples at 44.1kHz
        assert!((config.samples_per_step(44_100) - 5512.5).abs() < 1e-6);
    }

    #[test]
    fn test_bpm_out_of_range_rejected() {
        let config = SequencerConfig {
            bpm: 1000.0,
            ..SequencerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
