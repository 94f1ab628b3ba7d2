//! Error types for the audio engine and analysis pipeline.

use thiserror::Error;

/// Errors raised while setting up or running the audio side.
///
/// Everything past setup is handled locally: subscriber failures are
/// isolated and logged, teardown tolerates already-torn-down resources,
/// and degenerate band ranges simply yield zero energy.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("failed to query output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create WAV writer: {0}")]
    Recording(#[from] hound::Error),
}
