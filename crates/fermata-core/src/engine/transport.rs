//! Transport - the file playback path
//!
//! Owns the loaded sample source, the playhead, the time-pitch stage, and the
//! output volume. Runs entirely on the audio thread; the control thread steers
//! it through engine commands and observes it through [`TransportAtomics`].
//!
//! Per render buffer the transport gathers a rate-scaled number of source
//! frames, stretches them to the output size (tempo without pitch), then runs
//! the output stage. Position is the count of consumed source frames, so the
//! reported time always refers to a place in the file regardless of rate.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::audio_file::SampleSource;
use crate::effect::native::OutputStage;
use crate::effect::EffectChain;
use crate::timestretch::TimeStretcher;
use crate::types::{StereoBuffer, MAX_BUFFER_SIZE, SAMPLE_RATE};

use super::command::LoadRequest;

/// Playback state of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// No track loaded.
    Empty,
    /// Track loaded, not playing.
    Paused,
    Playing,
}

impl PlayState {
    fn as_u8(self) -> u8 {
        match self {
            PlayState::Empty => 0,
            PlayState::Paused => 1,
            PlayState::Playing => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            2 => PlayState::Playing,
            1 => PlayState::Paused,
            _ => PlayState::Empty,
        }
    }
}

/// Lock-free transport state for control-thread reads.
///
/// The audio thread stores on every change; readers only need visibility, so
/// everything is `Ordering::Relaxed`.
pub struct TransportAtomics {
    /// Playhead in source frames.
    position: AtomicU64,
    /// Encoded [`PlayState`].
    state: AtomicU8,
    /// Loaded track length in frames (0 when empty).
    duration_frames: AtomicU64,
}

impl TransportAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(PlayState::Empty.as_u8()),
            duration_frames: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn position_frames(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Playhead in seconds.
    #[inline]
    pub fn position_seconds(&self) -> f64 {
        self.position_frames() as f64 / SAMPLE_RATE as f64
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.play_state() == PlayState::Playing
    }

    #[inline]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_frames.load(Ordering::Relaxed) as f64 / SAMPLE_RATE as f64
    }
}

impl Default for TransportAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// The file playback path.
pub struct Transport {
    source: Option<SampleSource>,
    /// Playhead in source frames.
    position: u64,
    state: PlayState,
    /// Per-track volume 0..1.
    volume: f32,
    /// Session master volume 0..1.
    master_volume: f32,
    stretcher: TimeStretcher,
    chain: EffectChain,
    /// Index of the output stage in `chain`.
    output_stage: usize,
    atomics: Arc<TransportAtomics>,
    /// Pre-allocated gather buffer for rate-scaled source reads.
    gather: StereoBuffer,
}

impl Transport {
    pub fn new() -> Self {
        let mut chain = EffectChain::new();
        let output_stage = chain.push(Box::new(OutputStage::new()));

        // Rate 2.0 doubles the source frames per buffer; size for the worst case
        let mut transport = Self {
            source: None,
            position: 0,
            state: PlayState::Empty,
            volume: 1.0,
            master_volume: 1.0,
            stretcher: TimeStretcher::new(),
            chain,
            output_stage,
            atomics: Arc::new(TransportAtomics::new()),
            gather: StereoBuffer::silence(MAX_BUFFER_SIZE * 2),
        };
        transport.apply_effective_volume();
        transport
    }

    /// Lock-free state handle for the control thread.
    pub fn atomics(&self) -> Arc<TransportAtomics> {
        Arc::clone(&self.atomics)
    }

    #[inline]
    fn sync_position_atomic(&self) {
        self.atomics.position.store(self.position, Ordering::Relaxed);
    }

    #[inline]
    fn sync_state_atomic(&self) {
        self.atomics.state.store(self.state.as_u8(), Ordering::Relaxed);
    }

    /// Clamped product of track and master volume, never above unity.
    fn apply_effective_volume(&mut self) {
        let effective = (self.volume * self.master_volume).min(1.0);
        self.chain.set_param_actual(self.output_stage, 0, effective);
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn has_track(&self) -> bool {
        self.source.is_some()
    }

    pub fn position_frames(&self) -> u64 {
        self.position
    }

    /// Load a decoded track and leave it paused at its start frame.
    pub fn load(&mut self, request: LoadRequest) {
        let duration = request.source.frame_count();
        self.position = request.start_frame.min(duration);
        self.source = Some(request.source);
        self.state = PlayState::Paused;
        self.volume = request.volume.clamp(0.0, 1.0);
        self.master_volume = request.master_volume.clamp(0.0, 1.0);
        self.stretcher.set_rate(request.rate);
        self.stretcher.set_pitch_semitones(request.pitch_semitones);
        self.stretcher.reset();
        self.chain.reset();
        self.apply_effective_volume();

        self.atomics.duration_frames.store(duration, Ordering::Relaxed);
        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    pub fn unload(&mut self) {
        self.source = None;
        self.position = 0;
        self.state = PlayState::Empty;
        self.stretcher.reset();
        self.chain.reset();

        self.atomics.duration_frames.store(0, Ordering::Relaxed);
        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    pub fn play(&mut self) {
        if self.source.is_some() {
            self.state = PlayState::Playing;
            self.sync_state_atomic();
        }
    }

    pub fn pause(&mut self) {
        if self.source.is_some() {
            self.state = PlayState::Paused;
            self.sync_state_atomic();
        }
    }

    /// Jump to an absolute source frame, clamped to the track length.
    /// Play state is preserved; the stretcher is reset so no audio from the
    /// old position bleeds across the seek.
    pub fn seek(&mut self, frame: u64) {
        let Some(source) = &self.source else {
            return;
        };
        self.position = frame.min(source.frame_count());
        self.stretcher.reset();
        self.sync_position_atomic();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_effective_volume();
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        self.apply_effective_volume();
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.stretcher.set_rate(rate);
    }

    pub fn set_pitch_semitones(&mut self, semitones: f64) {
        self.stretcher.set_pitch_semitones(semitones);
    }

    /// Render one buffer. Silence unless playing.
    pub fn render(&mut self, output: &mut StereoBuffer) {
        let Some(source) = &self.source else {
            output.fill_silence();
            return;
        };
        if self.state != PlayState::Playing {
            output.fill_silence();
            return;
        }

        let needed = self.stretcher.input_frames_for(output.len());
        self.gather.set_len_from_capacity(needed);
        source.read_frames_clamped(self.position, self.gather.as_mut_slice());

        self.stretcher.process(&self.gather, output);
        self.chain.process(output);

        self.position += needed as u64;

        // Natural end of track: rewind and pause
        if self.position >= source.frame_count() {
            self.position = 0;
            self.state = PlayState::Paused;
            self.stretcher.reset();
            self.sync_state_atomic();
        }
        self.sync_position_atomic();
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn tone_source(frames: usize) -> SampleSource {
        let samples: Vec<StereoSample> = (0..frames)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                StereoSample::mono((t * 440.0 * std::f32::consts::TAU).sin() * 0.5)
            })
            .collect();
        SampleSource::from_buffer(StereoBuffer::from_vec(samples))
    }

    fn load_default(transport: &mut Transport, frames: usize) {
        transport.load(LoadRequest {
            source: tone_source(frames),
            start_frame: 0,
            volume: 1.0,
            master_volume: 1.0,
            rate: 1.0,
            pitch_semitones: 0.0,
        });
    }

    #[test]
    fn empty_transport_renders_silence() {
        let mut transport = Transport::new();
        let mut out = StereoBuffer::silence(256);
        transport.render(&mut out);
        assert!(out.iter().all(|s| s.left == 0.0 && s.right == 0.0));
        assert_eq!(transport.state(), PlayState::Empty);
    }

    #[test]
    fn load_pauses_at_start_frame() {
        let mut transport = Transport::new();
        transport.load(LoadRequest {
            source: tone_source(SAMPLE_RATE as usize),
            start_frame: 4800,
            volume: 0.9,
            master_volume: 1.0,
            rate: 1.0,
            pitch_semitones: 0.0,
        });
        assert_eq!(transport.state(), PlayState::Paused);
        assert_eq!(transport.position_frames(), 4800);
        assert!((transport.atomics().duration_seconds() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn playing_advances_position_at_rate() {
        let mut transport = Transport::new();
        load_default(&mut transport, SAMPLE_RATE as usize);
        transport.play();

        let mut out = StereoBuffer::silence(1024);
        transport.render(&mut out);
        assert_eq!(transport.position_frames(), 1024);

        transport.set_rate(2.0);
        transport.render(&mut out);
        assert_eq!(transport.position_frames(), 1024 + 2048);
    }

    #[test]
    fn effective_volume_never_exceeds_unity() {
        let mut transport = Transport::new();
        load_default(&mut transport, SAMPLE_RATE as usize);
        transport.set_volume(1.0);
        transport.set_master_volume(1.0);
        transport.play();

        let mut out = StereoBuffer::silence(1024);
        transport.render(&mut out);
        assert!(out.peak() <= 0.5 + 1e-3);
    }

    #[test]
    fn seek_clamps_and_preserves_play_state() {
        let mut transport = Transport::new();
        load_default(&mut transport, SAMPLE_RATE as usize);
        transport.play();

        transport.seek(u64::MAX);
        assert_eq!(transport.position_frames(), SAMPLE_RATE as u64);
        assert_eq!(transport.state(), PlayState::Playing);
    }

    #[test]
    fn natural_end_rewinds_and_pauses() {
        let mut transport = Transport::new();
        load_default(&mut transport, 2048);
        transport.play();

        let mut out = StereoBuffer::silence(1024);
        transport.render(&mut out);
        transport.render(&mut out);

        assert_eq!(transport.state(), PlayState::Paused);
        assert_eq!(transport.position_frames(), 0);
        assert!(!transport.atomics().is_playing());
    }

    #[test]
    fn unload_returns_to_empty() {
        let mut transport = Transport::new();
        load_default(&mut transport, 2048);
        transport.unload();
        assert_eq!(transport.state(), PlayState::Empty);
        assert_eq!(transport.atomics().duration_seconds(), 0.0);
    }

    #[test]
    fn pause_holds_position() {
        let mut transport = Transport::new();
        load_default(&mut transport, SAMPLE_RATE as usize);
        transport.play();

        let mut out = StereoBuffer::silence(512);
        transport.render(&mut out);
        transport.pause();
        let held = transport.position_frames();

        transport.render(&mut out);
        assert_eq!(transport.position_frames(), held);
        assert!(out.iter().all(|s| s.left == 0.0 && s.right == 0.0));
    }
}
