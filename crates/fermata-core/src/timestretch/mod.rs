//! Time-stretching and pitch shifting via signalsmith-stretch
//!
//! The transport gathers a rate-scaled number of source frames per render
//! buffer and runs them through this wrapper, so playback rate changes tempo
//! without touching pitch, and pitch shift transposes without touching tempo.
//! The two controls are fully independent.
//!
//! Uses zero-copy format conversion - StereoBuffer is reinterpreted as
//! interleaved f32 without any per-frame copying.

use signalsmith_stretch::Stretch;

use crate::types::{StereoBuffer, SAMPLE_RATE};

/// Number of channels (stereo)
const CHANNELS: u32 = 2;

/// Playback rate limits.
pub const MIN_RATE: f64 = 0.5;
pub const MAX_RATE: f64 = 2.0;

/// Pitch shift limits in semitones (one octave each way).
pub const MAX_PITCH_SEMITONES: f64 = 12.0;

/// Pitch-preserving rate changer for the playback path.
///
/// Rate is expressed as source frames consumed per output frame: 2.0 plays
/// twice as fast, 0.5 at half speed. The stretcher itself is ratio-free; the
/// caller sizes the input buffer per output buffer and the size difference is
/// the stretch.
pub struct TimeStretcher {
    stretcher: Stretch,
    rate: f64,
    pitch_semitones: f64,
}

impl TimeStretcher {
    pub fn new_with_sample_rate(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_default(CHANNELS, sample_rate),
            rate: 1.0,
            pitch_semitones: 0.0,
        }
    }

    pub fn new() -> Self {
        Self::new_with_sample_rate(SAMPLE_RATE)
    }

    /// Set the playback rate, clamped to 0.5-2.0.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Source frames needed to fill `output_frames` at the current rate.
    pub fn input_frames_for(&self, output_frames: usize) -> usize {
        (output_frames as f64 * self.rate).round() as usize
    }

    /// Set pitch shift in semitones (positive = up), clamped to one octave
    /// each way. Independent of the playback rate.
    pub fn set_pitch_semitones(&mut self, semitones: f64) {
        self.pitch_semitones = semitones.clamp(-MAX_PITCH_SEMITONES, MAX_PITCH_SEMITONES);
        // None = no tonality limit
        self.stretcher
            .set_transpose_factor_semitones(self.pitch_semitones as f32, None);
    }

    pub fn pitch_semitones(&self) -> f64 {
        self.pitch_semitones
    }

    pub fn input_latency(&self) -> usize {
        self.stretcher.input_latency()
    }

    pub fn output_latency(&self) -> usize {
        self.stretcher.output_latency()
    }

    pub fn total_latency(&self) -> usize {
        self.input_latency() + self.output_latency()
    }

    /// Reset internal windowing state. Called on load and seek so no audio
    /// from the previous position bleeds across.
    pub fn reset(&mut self) {
        self.stretcher.reset();
    }

    /// Stretch a variable-size input into a fixed-size output.
    ///
    /// The effective ratio is `input.len() / output.len()`; the transport
    /// sizes the input with [`input_frames_for`](Self::input_frames_for).
    pub fn process(&mut self, input: &StereoBuffer, output: &mut StereoBuffer) {
        if input.is_empty() {
            output.fill_silence();
            return;
        }

        let input_len = input.len();
        let output_len = output.len();

        // Zero-copy: #[repr(C)] StereoSample slices reinterpret as interleaved f32
        let input_interleaved = input.as_interleaved();
        let output_interleaved = output.as_interleaved_mut();

        output_interleaved[..output_len * 2].fill(0.0);

        self.stretcher.process(
            &input_interleaved[..input_len * 2],
            &mut output_interleaved[..output_len * 2],
        );
    }

    /// Flush the stretcher's tail into `output` at end of track.
    pub fn flush(&mut self, output: &mut StereoBuffer) {
        let output_len = output.len();
        let output_interleaved = output.as_interleaved_mut();

        output_interleaved[..output_len * 2].fill(0.0);
        self.stretcher.flush(&mut output_interleaved[..output_len * 2]);
    }
}

impl Default for TimeStretcher {
    fn default() -> Self {
        Self::new()
    }
}
