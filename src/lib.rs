//! Pulsegrid — a step-sequencer drum machine whose mix feeds a
//! real-time audio energy pipeline for visualization.

pub mod audio;
pub mod cli;
pub mod engine;
pub mod error;
pub mod params;
pub mod sequencer;
pub mod viz;
