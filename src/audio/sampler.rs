//! Spectral sampler: on-demand byte spectra from the mix bus tap.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::{debug, info};

use super::bus::MixBus;
use crate::error::AudioError;
use crate::params::AnalyzerConfig;

/// Wraps one frequency-analysis tap on the mix bus and converts raw
/// sample frames into a byte spectrum (one magnitude byte per bin).
///
/// Intended as the single analysis point for the whole process: one
/// sampler per mix bus, created lazily and kept for the lifetime of
/// the application. [`dispose`](Self::dispose) exists and is safe, but
/// nothing requires it to ever be called.
pub struct SpectralSampler {
    config: AnalyzerConfig,
    analyzer: Option<Analyzer>,
    /// Reused output buffer; overwritten in place by every `sample()`.
    bins: Vec<u8>,
}

/// The analysis primitive proper, created once by `initialize`.
struct Analyzer {
    bus: MixBus,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    /// Exponentially smoothed linear magnitudes, one per bin.
    smoothed: Vec<f32>,
}

impl SpectralSampler {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AudioError> {
        config.validate()?;
        let bins = vec![0; config.bin_count()];
        Ok(Self {
            config,
            analyzer: None,
            bins,
        })
    }

    /// Attach the analysis tap to the mix bus. Idempotent: once attached,
    /// re-invocation is a no-op returning `true`.
    ///
    /// Returns `false` if the bus is not yet online (the output stream
    /// has not started). That is not fatal; retry on the next user
    /// interaction.
    pub fn initialize(&mut self, bus: &MixBus) -> bool {
        if self.analyzer.is_some() {
            return true;
        }
        if !bus.is_online() {
            debug!("sampler: mix bus offline, analysis not attached");
            return false;
        }

        let fft_size = self.config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = (0..fft_size).map(|i| hann_window(i, fft_size)).collect();

        self.analyzer = Some(Analyzer {
            bus: bus.clone(),
            fft,
            window,
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; self.config.bin_count()],
        });
        info!(fft_size, bins = self.config.bin_count(), "sampler: attached to mix bus");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Number of frequency bins per snapshot.
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Refresh the internal byte spectrum from the tap and return a view
    /// of it. No allocation; the returned slice is overwritten by the
    /// next call.
    ///
    /// If analysis is not attached, or fewer than one transform's worth
    /// of samples has accumulated since the last read, the previous
    /// spectrum is returned unchanged.
    pub fn sample(&mut self) -> &[u8] {
        if let Some(analyzer) = &mut self.analyzer {
            analyzer.analyze_into(&self.config, &mut self.bins);
        }
        &self.bins
    }

    /// Detach the analysis tap. Idempotent, and safe even if
    /// `initialize` never succeeded.
    pub fn dispose(&mut self) {
        if self.analyzer.take().is_some() {
            info!("sampler: detached from mix bus");
        }
    }
}

impl Analyzer {
    /// Run one windowed FFT over the oldest buffered frame and write
    /// byte magnitudes into `bins`. Leaves `bins` untouched when not
    /// enough samples are buffered.
    fn analyze_into(&mut self, config: &AnalyzerConfig, bins: &mut [u8]) {
        let fft_size = config.fft_size;

        let consumed = self.bus.with_tap(|tap| {
            if tap.len() < fft_size {
                return false;
            }
            for i in 0..fft_size {
                self.scratch[i] = Complex::new(tap[i] * self.window[i], 0.0);
            }
            // 50% overlap between successive analyses
            tap.drain(0..fft_size / 2);
            true
        });
        if !consumed {
            return;
        }

        self.fft.process(&mut self.scratch);

        let db_span = config.max_db - config.min_db;
        for (k, bin) in bins.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() / fft_size as f32;
            let s = &mut self.smoothed[k];
            *s = config.smoothing * *s + (1.0 - config.smoothing) * magnitude;

            // dB-scaled byte value, matching the spectrum shape the
            // visual tuning expects
            let db = 20.0 * s.log10();
            let scaled = (db - config.min_db) / db_span;
            *bin = (scaled.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
}

/// Hann window function
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_bus() -> MixBus {
        let bus = MixBus::new();
        bus.set_online(true);
        bus
    }

    #[test]
    fn test_initialize_fails_while_bus_offline() {
        let bus = MixBus::new();
        let mut sampler = SpectralSampler::new(AnalyzerConfig::default()).unwrap();
        assert!(!sampler.initialize(&bus));
        assert!(!sampler.is_initialized());

        // Retry after the stream comes up succeeds.
        bus.set_online(true);
        assert!(sampler.initialize(&bus));
        assert!(sampler.is_initialized());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let bus = online_bus();
        let mut sampler = SpectralSampler::new(AnalyzerConfig::default()).unwrap();
        assert!(sampler.initialize(&bus));
        assert!(sampler.initialize(&bus));
        assert!(sampler.is_initialized());
    }

    #[test]
    fn test_dispose_is_idempotent_and_safe_without_initialize() {
        let mut sampler = SpectralSampler::new(AnalyzerConfig::default()).unwrap();
        sampler.dispose();
        sampler.dispose();

        let bus = online_bus();
        assert!(sampler.initialize(&bus));
        sampler.dispose();
        sampler.dispose();
        assert!(!sampler.is_initialized());
    }

    #[test]
    fn test_sample_without_data_is_all_zero() {
        let bus = online_bus();
        let mut sampler = SpectralSampler::new(AnalyzerConfig::default()).unwrap();
        sampler.initialize(&bus);
        let bins = sampler.sample();
        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sample_without_initialize_is_all_zero() {
        let mut sampler = SpectralSampler::new(AnalyzerConfig::default()).unwrap();
        assert!(sampler.sample().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sine_peaks_near_expected_bin() {
        let config = AnalyzerConfig::default();
        let bus = online_bus();
        let mut sampler = SpectralSampler::new(config.clone()).unwrap();
        sampler.initialize(&bus);

        // Full-scale tone exactly on bin 16 of a 256-point transform.
        let sample_rate = 44_100.0f32;
        let freq = 16.0 * sample_rate / config.fft_size as f32;
        let tone: Vec<f32> = (0..config.fft_size)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect();
        bus.write(&tone);

        let bins = sampler.sample();
        assert!(bins.iter().any(|&b| b > 0));
        let peak = bins
            .iter()
            .enumerate()
            .max_by_key(|&(_, &b)| b)
            .map(|(i, _)| i)
            .unwrap();
        assert!((14..=18).contains(&peak), "peak at bin {}", peak);
    }

    #[test]
    fn test_silence_stays_zero() {
        let bus = online_bus();
        let mut sampler = SpectralSampler::new(AnalyzerConfig::default()).unwrap();
        sampler.initialize(&bus);
        bus.write(&[0.0; 1024]);
        assert!(sampler.sample().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hann_window_shape() {
        let size = 256;
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }
}
