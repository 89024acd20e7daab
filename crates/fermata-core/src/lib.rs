//! Fermata Core - playback and live-input engine for the practice player

pub mod audio;
pub mod audio_file;
pub mod effect;
pub mod engine;
pub mod eq;
pub mod error;
pub mod playlist;
pub mod settings;
pub mod timestretch;
pub mod types;
pub mod waveform;

pub use error::{CoreError, CoreResult};
pub use types::*;
