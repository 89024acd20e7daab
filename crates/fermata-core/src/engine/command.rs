//! Lock-free command queue for real-time engine control
//!
//! The control thread sends commands through a bounded `rtrb` ring buffer and
//! the audio thread drains them at buffer boundaries. Push and pop are both
//! wait-free, so a slow control thread can never stall the audio callback and
//! the callback never takes a lock.
//!
//! Commands are applied between render buffers, so every state change is
//! atomic with respect to audio.

use crate::audio_file::SampleSource;

/// Request data for loading a track.
///
/// Separated into a struct and boxed in the command enum because it carries
/// the fully decoded sample data; the enum itself stays pointer-sized for
/// cache-efficient queueing.
pub struct LoadRequest {
    pub source: SampleSource,
    /// Frame to start playback from (the track's configured start time).
    pub start_frame: u64,
    /// Per-track volume 0..1.
    pub volume: f32,
    /// Session master volume 0..1.
    pub master_volume: f32,
    /// Playback rate 0.5-2.0.
    pub rate: f64,
    /// Pitch shift in semitones, -12..+12.
    pub pitch_semitones: f64,
}

/// Commands sent from the control thread to the audio thread.
pub enum EngineCommand {
    // Transport
    /// Load a decoded track; replaces whatever is loaded.
    LoadTrack(Box<LoadRequest>),
    /// Unload the current track and return to the empty state.
    Unload,
    Play,
    Pause,
    /// Jump to an absolute source frame. Preserves play state.
    Seek { frame: u64 },
    /// Per-track volume 0..1.
    SetTrackVolume(f32),
    /// Session master volume 0..1.
    SetMasterVolume(f32),
    /// Playback rate 0.5-2.0 (pitch unaffected).
    SetRate(f64),
    /// Pitch shift in semitones -12..+12 (rate unaffected).
    SetPitch(f64),

    // Live input
    /// Attach the capture ring for a freshly opened input stream.
    ///
    /// Boxed because the consumer half is larger than a pointer.
    InputAttach {
        ring: Box<rtrb::Consumer<f32>>,
        mono_source: bool,
    },
    /// Detach the capture ring and reset the input chain.
    InputDetach,
    /// Pre-gain in dB for the input chain.
    InputSetGainDb(f32),
    /// Output volume 0..1 for the input chain.
    InputSetVolume(f32),
    /// Reverb wet amount 0..1 for the input chain.
    InputSetReverb(f32),
    /// One EQ band gain in dB for the input chain.
    InputSetEqBand { band: usize, gain_db: f32 },
}

/// Capacity of the command queue.
///
/// A preset application sends at most a dozen commands in a burst; 256 leaves
/// generous headroom while keeping the buffer small.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create the command channel. The producer belongs to the control thread,
/// the consumer to the audio thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
