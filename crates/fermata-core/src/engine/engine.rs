//! Main audio engine - transport, live input, and the output mix
//!
//! Owned by the output stream callback. Commands are drained at the start of
//! every buffer, then the file path and the live-input path render into
//! pre-allocated buffers and sum into the device output.

use crate::types::{StereoBuffer, MAX_BUFFER_SIZE};

use super::command::EngineCommand;
use super::input::LiveInput;
use super::transport::Transport;

/// Default processing buffer size in frames.
pub const BUFFER_SIZE: usize = 256;

/// The audio-thread side of the player.
pub struct AudioEngine {
    transport: Transport,
    input: LiveInput,
    /// Pre-allocated scratch for the live-input render.
    input_buffer: StereoBuffer,
}

impl AudioEngine {
    pub fn new() -> Self {
        Self {
            transport: Transport::new(),
            input: LiveInput::new(),
            input_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn live_input(&self) -> &LiveInput {
        &self.input
    }

    pub fn live_input_mut(&mut self) -> &mut LiveInput {
        &mut self.input
    }

    /// Drain and apply all pending commands.
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(command) = rx.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::LoadTrack(request) => self.transport.load(*request),
            EngineCommand::Unload => self.transport.unload(),
            EngineCommand::Play => self.transport.play(),
            EngineCommand::Pause => self.transport.pause(),
            EngineCommand::Seek { frame } => self.transport.seek(frame),
            EngineCommand::SetTrackVolume(v) => self.transport.set_volume(v),
            EngineCommand::SetMasterVolume(v) => self.transport.set_master_volume(v),
            EngineCommand::SetRate(rate) => self.transport.set_rate(rate),
            EngineCommand::SetPitch(semitones) => self.transport.set_pitch_semitones(semitones),
            EngineCommand::InputAttach { ring, mono_source } => {
                self.input.attach(*ring, mono_source)
            }
            EngineCommand::InputDetach => self.input.detach(),
            EngineCommand::InputSetGainDb(db) => self.input.set_gain_db(db),
            EngineCommand::InputSetVolume(v) => self.input.set_volume(v),
            EngineCommand::InputSetReverb(amount) => self.input.set_reverb_amount(amount),
            EngineCommand::InputSetEqBand { band, gain_db } => {
                self.input.set_eq_band(band, gain_db)
            }
        }
    }

    /// Render one buffer: file playback plus live input, summed.
    pub fn process(&mut self, output: &mut StereoBuffer) {
        let frames = output.len();
        self.transport.render(output);

        if self.input.is_active() {
            self.input_buffer.set_len_from_capacity(frames);
            self.input.render(&mut self.input_buffer);
            output.add_buffer(&self.input_buffer);
        }
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::command::command_channel;
    use super::super::transport::PlayState;
    use super::*;
    use crate::audio_file::SampleSource;
    use crate::engine::command::LoadRequest;
    use crate::types::{StereoSample, SAMPLE_RATE};

    fn load_command(frames: usize) -> EngineCommand {
        let samples = vec![StereoSample::mono(0.25); frames];
        EngineCommand::LoadTrack(Box::new(LoadRequest {
            source: SampleSource::from_buffer(StereoBuffer::from_vec(samples)),
            start_frame: 0,
            volume: 1.0,
            master_volume: 1.0,
            rate: 1.0,
            pitch_semitones: 0.0,
        }))
    }

    #[test]
    fn empty_engine_renders_silence() {
        let mut engine = AudioEngine::new();
        let mut out = StereoBuffer::silence(BUFFER_SIZE);
        engine.process(&mut out);
        assert!(out.iter().all(|s| s.left == 0.0 && s.right == 0.0));
    }

    #[test]
    fn commands_drive_the_transport() {
        let mut engine = AudioEngine::new();
        let (mut tx, mut rx) = command_channel();

        tx.push(load_command(SAMPLE_RATE as usize)).unwrap();
        tx.push(EngineCommand::Play).unwrap();
        engine.process_commands(&mut rx);

        assert_eq!(engine.transport().state(), PlayState::Playing);

        let mut out = StereoBuffer::silence(512);
        engine.process(&mut out);
        assert_eq!(engine.transport().position_frames(), 512);
    }

    #[test]
    fn live_input_sums_into_the_mix() {
        let mut engine = AudioEngine::new();
        let (mut tx, mut rx) = command_channel();

        let (mut ring_tx, ring_rx) = rtrb::RingBuffer::new(1024);
        for _ in 0..1024 {
            ring_tx.push(0.25f32).unwrap();
        }

        tx.push(EngineCommand::InputAttach {
            ring: Box::new(ring_rx),
            mono_source: true,
        })
        .unwrap();
        tx.push(EngineCommand::InputSetGainDb(0.0)).unwrap();
        engine.process_commands(&mut rx);

        let mut out = StereoBuffer::silence(256);
        engine.process(&mut out);
        assert!(out[10].left > 0.0);
    }

    #[test]
    fn detach_silences_the_input_path() {
        let mut engine = AudioEngine::new();
        let (mut tx, mut rx) = command_channel();

        let (_ring_tx, ring_rx) = rtrb::RingBuffer::<f32>::new(64);
        tx.push(EngineCommand::InputAttach {
            ring: Box::new(ring_rx),
            mono_source: true,
        })
        .unwrap();
        tx.push(EngineCommand::InputDetach).unwrap();
        engine.process_commands(&mut rx);

        assert!(!engine.live_input().is_active());
    }
}
