//! Mix bus tap shared between the drum machine and the spectral sampler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Upper bound on buffered tap samples. Keeps the tap from growing
/// without bound when nothing is sampling; old samples are discarded.
const MAX_TAP_SAMPLES: usize = 8192;

/// Handle to the audio graph's terminal mix point.
///
/// The engine's output callback appends the mono mix here after every
/// rendered block; the [`SpectralSampler`](super::SpectralSampler) reads
/// and drains it. Tapping is non-destructive: the audible signal is
/// written to the device regardless of what the tap holds.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct MixBus {
    tap: Arc<Mutex<Vec<f32>>>,
    online: Arc<AtomicBool>,
}

impl MixBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the owning output stream is running. Analysis cannot
    /// attach before this.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Append mono samples to the tap, discarding the oldest samples
    /// beyond the buffering cap. Called from the audio callback.
    pub fn write(&self, samples: &[f32]) {
        let mut tap = self.tap.lock().unwrap();
        tap.extend_from_slice(samples);
        let len = tap.len();
        if len > MAX_TAP_SAMPLES {
            tap.drain(0..len - MAX_TAP_SAMPLES);
        }
    }

    /// Run `f` against the buffered samples under the tap lock.
    pub(crate) fn with_tap<R>(&self, f: impl FnOnce(&mut Vec<f32>) -> R) -> R {
        f(&mut self.tap.lock().unwrap())
    }
}
