//! Pulsegrid — step-sequencer drum machine with an audio-reactive
//! terminal visualizer.

use anyhow::Context;
use clap::Parser;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulsegrid::audio::{EnergyPublisher, SamplingScheduler, SchedulerPolicy, SpectralSampler};
use pulsegrid::cli::Args;
use pulsegrid::engine::DrumMachine;
use pulsegrid::params::{AnalyzerConfig, SequencerConfig};
use pulsegrid::viz;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // In TUI mode only warnings and up, so stderr doesn't fight the UI.
    let default_filter = if args.headless {
        "pulsegrid=info"
    } else {
        "pulsegrid=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let analyzer_config = AnalyzerConfig::default();
    let sequencer_config = SequencerConfig {
        bpm: args.bpm,
        ..SequencerConfig::default()
    };

    // One engine, one sampler, one publisher, wired explicitly.
    let engine = DrumMachine::new(sequencer_config, args.recording_config())
        .context("failed to start audio engine")?;

    let mut sampler = SpectralSampler::new(analyzer_config.clone())?;
    if !sampler.initialize(engine.bus()) {
        info!("analysis not attached yet; will stay inert until audio is up");
    }

    let publisher = Arc::new(EnergyPublisher::new(analyzer_config.bin_count()));
    let policy = args.scheduler_policy(&analyzer_config);
    let scheduler = Arc::new(SamplingScheduler::new(
        policy,
        Arc::new(Mutex::new(sampler)),
        Arc::clone(&publisher),
    ));

    if matches!(policy, SchedulerPolicy::Manual) {
        let step_scheduler = Arc::clone(&scheduler);
        engine.set_step_hook(move |_step| step_scheduler.trigger());
    }

    scheduler.start();

    if args.headless {
        engine.play();
        run_headless(&publisher, &scheduler, args.duration.unwrap_or(10.0));
    } else {
        viz::run(&engine, &publisher, &scheduler)?;
    }

    scheduler.stop();
    Ok(())
}

/// Log band energies until the duration runs out. Each loop pass counts
/// as a frame for the frame-throttled policy.
fn run_headless(publisher: &EnergyPublisher, scheduler: &SamplingScheduler, duration_secs: f32) {
    let deadline = Instant::now() + Duration::from_secs_f32(duration_secs);
    while Instant::now() < deadline {
        scheduler.on_frame();
        std::thread::sleep(Duration::from_millis(250));
        let snap = publisher.current();
        info!(
            bass = format_args!("{:.3}", snap.bass_energy),
            mid = format_args!("{:.3}", snap.mid_energy),
            high = format_args!("{:.3}", snap.high_energy),
            full = format_args!("{:.3}", snap.full_energy),
            "energy"
        );
    }
}
