//! Command-line argument parsing.

use clap::Parser;
use std::time::Duration;
use tracing::warn;

use crate::audio::SchedulerPolicy;
use crate::params::{AnalyzerConfig, RecordingConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "pulsegrid")]
#[command(about = "Audio-reactive step-sequencer drum machine", long_about = None)]
pub struct Args {
    /// Tempo in beats per minute
    #[arg(long, default_value = "120")]
    pub bpm: f32,

    /// Sampling policy: interval (default), frame, manual
    #[arg(long, value_name = "POLICY", default_value = "interval")]
    pub scheduler: String,

    /// Record the mix to a WAV file (duration in seconds)
    #[arg(long, value_name = "SECONDS")]
    pub record: Option<f32>,

    /// Run without the terminal UI, logging band energies instead
    #[arg(long)]
    pub headless: bool,

    /// Exit after this many seconds (headless mode only; default 10)
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f32>,
}

impl Args {
    /// Parse the sampling policy from command-line arguments
    pub fn scheduler_policy(&self, config: &AnalyzerConfig) -> SchedulerPolicy {
        match self.scheduler.to_lowercase().as_str() {
            "interval" => SchedulerPolicy::FixedInterval {
                period: Duration::from_millis(config.update_interval_ms),
            },
            "frame" => SchedulerPolicy::FrameThrottled {
                min_interval: Duration::from_millis(config.frame_min_interval_ms),
            },
            "manual" => SchedulerPolicy::Manual,
            other => {
                warn!("unknown scheduler policy '{other}', using interval");
                SchedulerPolicy::FixedInterval {
                    period: Duration::from_millis(config.update_interval_ms),
                }
            }
        }
    }

    /// Create recording configuration if recording mode is enabled
    pub fn recording_config(&self) -> Option<RecordingConfig> {
        self.record.map(RecordingConfig::new)
    }
}
