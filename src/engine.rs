//! Drum machine engine: renders the pattern to the audio device and
//! feeds the mix bus tap.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::audio::MixBus;
use crate::error::AudioError;
use crate::params::{RecordingConfig, SequencerConfig};
use crate::sequencer::{initial_pattern, Pattern, StepClock, Voice, VOICE_COUNT};

type StepHook = Box<dyn Fn(usize) + Send>;
type WavWriter = hound::WavWriter<BufWriter<File>>;

/// Owns the output stream and all synthesis state. Everything audible
/// is summed here before hitting the device, so the bus tap sees the
/// same signal the speakers do.
pub struct DrumMachine {
    bus: MixBus,
    pattern: Arc<Mutex<Pattern>>,
    playing: Arc<AtomicBool>,
    current_step: Arc<AtomicUsize>,
    step_hook: Arc<Mutex<Option<StepHook>>>,
    sample_rate_hz: u32,

    /// Audio output stream (kept alive)
    _stream: cpal::Stream,
}

impl DrumMachine {
    /// Build the output stream, start it, and bring the mix bus online.
    /// The transport starts paused.
    pub fn new(
        config: SequencerConfig,
        recording: Option<RecordingConfig>,
    ) -> Result<Self, AudioError> {
        config.validate()?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let stream_config = device.default_output_config()?;

        let sample_rate_hz = stream_config.sample_rate().0;
        let channels = stream_config.channels() as usize;
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate_hz,
            channels,
            "audio output"
        );

        let mut wav_writer: Option<WavWriter> = match &recording {
            Some(rec) => {
                let spec = hound::WavSpec {
                    channels: 1,
                    sample_rate: sample_rate_hz,
                    bits_per_sample: 32,
                    sample_format: hound::SampleFormat::Float,
                };
                info!(path = %rec.path.display(), secs = rec.duration_secs, "recording");
                Some(hound::WavWriter::create(&rec.path, spec)?)
            }
            None => None,
        };
        let mut frames_to_record = recording
            .as_ref()
            .map(|rec| rec.total_frames(sample_rate_hz))
            .unwrap_or(0);

        let bus = MixBus::new();
        let pattern = Arc::new(Mutex::new(initial_pattern()));
        let playing = Arc::new(AtomicBool::new(false));
        let current_step = Arc::new(AtomicUsize::new(0));
        let step_hook: Arc<Mutex<Option<StepHook>>> = Arc::new(Mutex::new(None));

        // State moved into the audio callback
        let cb_bus = bus.clone();
        let cb_pattern = Arc::clone(&pattern);
        let cb_playing = Arc::clone(&playing);
        let cb_step = Arc::clone(&current_step);
        let cb_hook = Arc::clone(&step_hook);
        let mut voices = Voice::default_kit(sample_rate_hz as f32);
        let mut clock = StepClock::new(config.samples_per_step(sample_rate_hz));
        let master_gain = config.master_gain;
        let mut mono = Vec::new();

        let stream = device.build_output_stream(
            &stream_config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                mono.clear();
                mono.reserve(frames);

                if cb_playing.load(Ordering::Acquire) {
                    let pattern = cb_pattern.lock().unwrap();
                    let hook = cb_hook.lock().unwrap();
                    for frame in 0..frames {
                        if clock.tick() {
                            let step = clock.step();
                            cb_step.store(step, Ordering::Release);
                            for (voice, row) in voices.iter_mut().zip(pattern.iter()) {
                                if row[step] {
                                    voice.trigger(step);
                                }
                            }
                            if let Some(hook) = hook.as_ref() {
                                hook(step);
                            }
                        }

                        let mix: f32 = voices.iter_mut().map(Voice::next_sample).sum();
                        // Safety limiter: hard clip to ±0.5
                        let sample = (mix * master_gain).clamp(-0.5, 0.5);
                        for ch in 0..channels {
                            data[frame * channels + ch] = sample;
                        }
                        mono.push(sample);
                    }
                } else {
                    data.fill(0.0);
                    mono.resize(frames, 0.0);
                }

                cb_bus.write(&mono);

                if let Some(writer) = wav_writer.as_mut() {
                    for &sample in mono.iter().take(frames_to_record as usize) {
                        let _ = writer.write_sample(sample);
                    }
                    frames_to_record = frames_to_record.saturating_sub(frames as u64);
                    if frames_to_record == 0 {
                        if let Some(writer) = wav_writer.take() {
                            match writer.finalize() {
                                Ok(()) => info!("recording finished"),
                                Err(e) => error!("failed to finalize recording: {e}"),
                            }
                        }
                    }
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )?;

        stream.play()?;
        bus.set_online(true);

        Ok(Self {
            bus,
            pattern,
            playing,
            current_step,
            step_hook,
            sample_rate_hz,
            _stream: stream,
        })
    }

    /// Handle to the mixing destination the sampler taps.
    pub fn bus(&self) -> &MixBus {
        &self.bus
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn play(&self) {
        self.playing.store(true, Ordering::Release);
    }

    pub fn pause(&self) {
        self.playing.store(false, Ordering::Release);
    }

    pub fn toggle_play(&self) {
        self.playing.fetch_xor(true, Ordering::AcqRel);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Step most recently started by the clock (for UI highlight).
    pub fn current_step(&self) -> usize {
        self.current_step.load(Ordering::Acquire)
    }

    pub fn pattern(&self) -> Pattern {
        *self.pattern.lock().unwrap()
    }

    pub fn toggle_step(&self, voice: usize, step: usize) {
        if voice < VOICE_COUNT {
            let mut pattern = self.pattern.lock().unwrap();
            if let Some(cell) = pattern[voice].get_mut(step) {
                *cell = !*cell;
            }
        }
    }

    /// Install the per-step hook, invoked from the audio callback at
    /// every step boundary. Used to drive the manual sampling policy.
    pub fn set_step_hook(&self, hook: impl Fn(usize) + Send + 'static) {
        *self.step_hook.lock().unwrap() = Some(Box::new(hook));
    }
}
