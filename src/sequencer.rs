//! Step sequencer data and drum voice synthesis.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

pub const STEP_COUNT: usize = 16;
pub const VOICE_COUNT: usize = 4;

pub const INSTRUMENT_NAMES: [&str; VOICE_COUNT] = ["Kick", "Hi-hat", "Perc", "Bass"];

/// One row per instrument, one bool per 16th-note step.
pub type Pattern = [[bool; STEP_COUNT]; VOICE_COUNT];

/// Pre-programmed minimal techno pattern
pub fn initial_pattern() -> Pattern {
    const X: bool = true;
    const O: bool = false;
    [
        // Kick
        [X, O, O, O, X, O, O, O, X, O, O, O, X, O, O, O],
        // Hi-hat
        [O, O, X, O, O, O, X, O, O, O, X, O, O, O, X, X],
        // Perc
        [O, O, O, O, X, O, O, O, O, O, O, O, X, O, O, O],
        // Bass
        [X, O, O, O, O, O, O, X, O, O, X, O, O, O, O, O],
    ]
}

/// Bass note walk, one note per beat (A1, G1, F1, E1)
const BASS_NOTES_HZ: [f32; 4] = [55.0, 49.0, 43.65, 41.2];

/// Sample-accurate step clock. `tick()` is called once per output frame
/// and reports step boundaries; the first frame lands on step 0.
pub struct StepClock {
    samples_per_step: f64,
    until_next: f64,
    step: usize,
}

impl StepClock {
    pub fn new(samples_per_step: f64) -> Self {
        Self {
            samples_per_step,
            until_next: 0.0,
            // Wraps to 0 on the first boundary.
            step: STEP_COUNT - 1,
        }
    }

    /// Advance one sample. Returns true when this sample starts a new step.
    pub fn tick(&mut self) -> bool {
        let boundary = self.until_next <= 0.0;
        if boundary {
            // Carry the fractional remainder so tempo stays exact.
            self.until_next += self.samples_per_step;
            self.step = (self.step + 1) % STEP_COUNT;
        }
        self.until_next -= 1.0;
        boundary
    }

    pub fn step(&self) -> usize {
        self.step
    }
}

#[derive(Clone, Copy)]
enum VoiceKind {
    Kick,
    Hat,
    Perc,
    Bass,
}

/// One drum voice, rendered a sample at a time inside the output
/// callback. Envelopes are one-pole exponential decays.
pub struct Voice {
    kind: VoiceKind,
    sample_rate_hz: f32,
    gain: f32,
    phase: f32,
    phase2: f32,
    freq_hz: f32,
    amp_env: f32,
    amp_decay: f32,
    pitch_env: f32,
    pitch_decay: f32,
    rng: SmallRng,
}

impl Voice {
    fn new(kind: VoiceKind, gain: f32, decay_secs: f32, sample_rate_hz: f32) -> Self {
        Self {
            kind,
            sample_rate_hz,
            gain,
            phase: 0.0,
            phase2: 0.0,
            freq_hz: 0.0,
            amp_env: 0.0,
            amp_decay: decay_multiplier(decay_secs, sample_rate_hz),
            pitch_env: 0.0,
            pitch_decay: decay_multiplier(0.05, sample_rate_hz),
            rng: SmallRng::seed_from_u64(0x5eed),
        }
    }

    /// The default kit: kick, hi-hat, perc, bass, in pattern row order.
    pub fn default_kit(sample_rate_hz: f32) -> [Voice; VOICE_COUNT] {
        [
            Voice::new(VoiceKind::Kick, 0.9, 0.35, sample_rate_hz),
            Voice::new(VoiceKind::Hat, 0.15, 0.12, sample_rate_hz),
            Voice::new(VoiceKind::Perc, 0.12, 0.4, sample_rate_hz),
            Voice::new(VoiceKind::Bass, 0.4, 0.5, sample_rate_hz),
        ]
    }

    /// Start a new note. `step` selects the bass note walk position.
    pub fn trigger(&mut self, step: usize) {
        self.amp_env = 1.0;
        self.pitch_env = 1.0;
        self.phase = 0.0;
        self.phase2 = 0.0;
        self.freq_hz = match self.kind {
            // Pitch envelope sweeps the kick down onto this fundamental.
            VoiceKind::Kick => 45.0,
            VoiceKind::Hat => 0.0,
            VoiceKind::Perc => 820.0,
            VoiceKind::Bass => BASS_NOTES_HZ[(step / 4) % BASS_NOTES_HZ.len()],
        };
    }

    pub fn is_active(&self) -> bool {
        self.amp_env > 1e-4
    }

    /// Render the next sample of this voice.
    pub fn next_sample(&mut self) -> f32 {
        if !self.is_active() {
            return 0.0;
        }
        let dt = 1.0 / self.sample_rate_hz;
        let sample = match self.kind {
            VoiceKind::Kick => {
                let freq = self.freq_hz * (1.0 + 3.0 * self.pitch_env);
                self.phase = (self.phase + freq * dt).fract();
                self.pitch_env *= self.pitch_decay;
                (2.0 * PI * self.phase).sin()
            }
            VoiceKind::Hat => self.rng.gen_range(-1.0..1.0),
            VoiceKind::Perc => {
                // Two inharmonic partials for a metallic strike
                self.phase = (self.phase + self.freq_hz * dt).fract();
                self.phase2 = (self.phase2 + self.freq_hz * 3.1 * dt).fract();
                0.6 * (2.0 * PI * self.phase).sin() + 0.4 * (2.0 * PI * self.phase2).sin()
            }
            VoiceKind::Bass => {
                self.phase = (self.phase + self.freq_hz * dt).fract();
                triangle(self.phase)
            }
        };
        self.amp_env *= self.amp_decay;
        sample * self.amp_env * self.gain
    }
}

/// Per-sample multiplier for an exponential decay with time constant
/// `decay_secs`.
fn decay_multiplier(decay_secs: f32, sample_rate_hz: f32) -> f32 {
    (-1.0 / (decay_secs * sample_rate_hz)).exp()
}

/// Triangle wave over phase [0, 1), range [-1, 1]
fn triangle(phase: f32) -> f32 {
    4.0 * (phase - (phase + 0.5).floor()).abs() - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_pattern_shape() {
        let pattern = initial_pattern();
        // Four-on-the-floor kick
        for step in [0, 4, 8, 12] {
            assert!(pattern[0][step]);
        }
        assert_eq!(pattern[0].iter().filter(|&&on| on).count(), 4);
        // Hi-hat lands on the off-beats plus the closing double hit
        assert!(pattern[1][2] && pattern[1][14] && pattern[1][15]);
    }

    #[test]
    fn test_step_clock_boundaries() {
        // 120 BPM at 44.1 kHz: 5512.5 samples per step, 8 steps per second
        let mut clock = StepClock::new(5512.5);
        let mut boundaries = 0;
        let mut first_steps = Vec::new();
        for _ in 0..44_100 {
            if clock.tick() {
                boundaries += 1;
                if first_steps.len() < 4 {
                    first_steps.push(clock.step());
                }
            }
        }
        assert_eq!(boundaries, 8);
        assert_eq!(first_steps, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_step_clock_wraps_after_full_bar() {
        let mut clock = StepClock::new(10.0);
        let mut last = 0;
        for _ in 0..(10 * STEP_COUNT + 5) {
            if clock.tick() {
                last = clock.step();
            }
        }
        assert_eq!(last, 0); // wrapped back around
    }

    #[test]
    fn test_kick_triggers_and_decays() {
        let mut kit = Voice::default_kit(44_100.0);
        let kick = &mut kit[0];
        assert_eq!(kick.next_sample(), 0.0);

        kick.trigger(0);
        assert!(kick.is_active());
        let early: f32 = (0..100).map(|_| kick.next_sample().abs()).fold(0.0, f32::max);
        assert!(early > 0.0);

        // A few seconds later the envelope has died out.
        for _ in 0..240_000 {
            kick.next_sample();
        }
        assert!(!kick.is_active());
        assert_eq!(kick.next_sample(), 0.0);
    }

    #[test]
    fn test_voices_stay_in_unit_range() {
        let mut kit = Voice::default_kit(44_100.0);
        for (i, voice) in kit.iter_mut().enumerate() {
            voice.trigger(i);
            for _ in 0..4096 {
                let s = voice.next_sample();
                assert!((-1.0..=1.0).contains(&s), "voice {} sample {}", i, s);
            }
        }
    }

    #[test]
    fn test_bass_note_walk_follows_beat() {
        let mut kit = Voice::default_kit(44_100.0);
        let bass = &mut kit[3];
        bass.trigger(0);
        assert_eq!(bass.freq_hz, 55.0);
        bass.trigger(7);
        assert_eq!(bass.freq_hz, 49.0);
        bass.trigger(10);
        assert_eq!(bass.freq_hz, 43.65);
        bass.trigger(15);
        assert_eq!(bass.freq_hz, 41.2);
    }
}
