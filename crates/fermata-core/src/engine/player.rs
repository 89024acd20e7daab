//! Player controller - the control-thread facade
//!
//! One object the UI talks to. It owns the command producer, reads engine
//! state through the lock-free atomics, persists every user-facing setting,
//! and runs the two periodic jobs: the 100 ms transport poll (loop watchdog +
//! state snapshots) and the 50 ms level meter.
//!
//! Hardware is reached through the [`DeviceCatalog`] and [`CaptureBackend`]
//! seams so the whole enable/disable lifecycle is testable without devices.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::audio::{CaptureBackend, CaptureStream, DeviceCatalog, InputDeviceDescriptor};
use crate::audio_file::SampleSource;
use crate::effect::native::{DEFAULT_GAIN_DB, DEFAULT_VOLUME, MAX_GAIN_DB, MIN_GAIN_DB};
use crate::eq::{EqProfile, BAND_COUNT};
use crate::error::{CoreError, CoreResult};
use crate::settings::SettingsStore;
use crate::types::SAMPLE_RATE;

use super::command::{EngineCommand, LoadRequest};
use super::timer::PollTimer;
use super::InputAtomics;
use super::TransportAtomics;

/// Transport poll interval: loop watchdog and snapshot cadence.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Level meter tick interval.
pub const METER_INTERVAL: Duration = Duration::from_millis(50);

/// Samples in the level meter's moving average.
pub const METER_WINDOW: usize = 10;

/// Capture ring capacity: half a second of headroom.
const CAPTURE_RING_CAPACITY: usize = SAMPLE_RATE as usize / 2;

mod keys {
    pub const INPUT_GAIN: &str = "input_gain";
    pub const INPUT_VOLUME: &str = "input_volume";
    pub const INPUT_REVERB: &str = "input_reverb";
    pub const INPUT_DEVICE: &str = "input_device";
    pub const INPUT_CHANNEL: &str = "input_channel";
    pub const PANEL_VISIBLE: &str = "panel_visible";
    pub const PANEL_EXPANDED: &str = "panel_expanded";
}

/// Transport state snapshot emitted on every control operation and poll tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub position_seconds: f64,
    pub is_playing: bool,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy)]
struct LoopRegion {
    start_seconds: f64,
    end_seconds: f64,
}

/// The control-thread facade over the audio engine.
pub struct PlayerController {
    commands: rtrb::Producer<EngineCommand>,
    transport: Arc<TransportAtomics>,
    input: Arc<InputAtomics>,
    store: Arc<dyn SettingsStore>,
    catalog: Box<dyn DeviceCatalog>,
    capture: Box<dyn CaptureBackend>,

    events_tx: Sender<PlayerSnapshot>,
    events_rx: Receiver<PlayerSnapshot>,

    loaded_path: Option<PathBuf>,
    duration_seconds: f64,
    master_volume: f32,
    rate: f64,
    pitch_semitones: f64,
    loop_region: Option<LoopRegion>,

    eq: EqProfile,
    capture_stream: Option<Box<dyn CaptureStream>>,
    level_history: VecDeque<f32>,
}

impl PlayerController {
    pub fn new(
        commands: rtrb::Producer<EngineCommand>,
        transport: Arc<TransportAtomics>,
        input: Arc<InputAtomics>,
        store: Arc<dyn SettingsStore>,
        catalog: Box<dyn DeviceCatalog>,
        capture: Box<dyn CaptureBackend>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        let eq = EqProfile::new(Arc::clone(&store));

        let mut controller = Self {
            commands,
            transport,
            input,
            store,
            catalog,
            capture,
            events_tx,
            events_rx,
            loaded_path: None,
            duration_seconds: 0.0,
            master_volume: 1.0,
            rate: 1.0,
            pitch_semitones: 0.0,
            loop_region: None,
            eq,
            capture_stream: None,
            level_history: VecDeque::with_capacity(METER_WINDOW),
        };
        controller.sync_input_chain();
        controller
    }

    /// Receiver for state snapshots; clones share the same stream.
    pub fn events(&self) -> Receiver<PlayerSnapshot> {
        self.events_rx.clone()
    }

    fn send(&mut self, command: EngineCommand) {
        if self.commands.push(command).is_err() {
            log::warn!("engine command queue full, dropping command");
        }
    }

    /// Push the persisted input-chain settings to the engine so the DSP
    /// matches the stored state from the first buffer.
    fn sync_input_chain(&mut self) {
        let gain = self.input_gain_db();
        let volume = self.input_volume();
        let reverb = self.input_reverb();
        self.send(EngineCommand::InputSetGainDb(gain));
        self.send(EngineCommand::InputSetVolume(volume));
        self.send(EngineCommand::InputSetReverb(reverb));
        for band in 0..BAND_COUNT {
            let gain_db = self.eq.band(band);
            self.send(EngineCommand::InputSetEqBand { band, gain_db });
        }
    }

    // --- Transport ---

    /// Decode and load a track, paused at `start_time_seconds`.
    ///
    /// An unreadable file unloads the transport and surfaces the error; the
    /// engine itself never crashes on bad input.
    pub fn load_track(
        &mut self,
        path: &Path,
        volume: f32,
        start_time_seconds: f64,
    ) -> CoreResult<()> {
        let source = match SampleSource::open(path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to load {:?}: {e}", path);
                self.stop();
                return Err(e);
            }
        };

        self.duration_seconds = source.duration_seconds();
        self.loaded_path = Some(path.to_path_buf());
        self.loop_region = None;

        let start_frame = (start_time_seconds.max(0.0) * SAMPLE_RATE as f64) as u64;
        let request = LoadRequest {
            source,
            start_frame,
            volume: volume.clamp(0.0, 1.0),
            master_volume: self.master_volume,
            rate: self.rate,
            pitch_semitones: self.pitch_semitones,
        };
        self.send(EngineCommand::LoadTrack(Box::new(request)));
        self.emit();
        Ok(())
    }

    /// Whether `path` is the currently loaded track.
    pub fn is_track_loaded(&self, path: &Path) -> bool {
        self.loaded_path.as_deref() == Some(path)
    }

    /// Stop playback, release the loaded track, and return to the empty
    /// state.
    pub fn stop(&mut self) {
        self.loaded_path = None;
        self.duration_seconds = 0.0;
        self.loop_region = None;
        self.send(EngineCommand::Unload);
        self.emit();
    }

    pub fn play(&mut self) {
        self.send(EngineCommand::Play);
        self.emit();
    }

    pub fn pause(&mut self) {
        self.send(EngineCommand::Pause);
        self.emit();
    }

    /// Seek to an absolute position in seconds, clamped to the track.
    pub fn seek(&mut self, seconds: f64) {
        let seconds = seconds.clamp(0.0, self.duration_seconds);
        let frame = (seconds * SAMPLE_RATE as f64) as u64;
        self.send(EngineCommand::Seek { frame });
        self.emit();
    }

    /// Set the loop region in seconds. Rejects empty/inverted regions.
    pub fn set_loop(&mut self, start_seconds: f64, end_seconds: f64) {
        if !(end_seconds > start_seconds && start_seconds >= 0.0) {
            log::warn!("rejecting loop region {start_seconds}..{end_seconds}");
            return;
        }
        let end_seconds = if self.duration_seconds > 0.0 {
            end_seconds.min(self.duration_seconds)
        } else {
            end_seconds
        };
        self.loop_region = Some(LoopRegion {
            start_seconds,
            end_seconds,
        });
    }

    pub fn clear_loop(&mut self) {
        self.loop_region = None;
    }

    pub fn set_track_volume(&mut self, volume: f32) {
        self.send(EngineCommand::SetTrackVolume(volume.clamp(0.0, 1.0)));
    }

    /// Master volume applies immediately to the loaded session.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        let v = self.master_volume;
        self.send(EngineCommand::SetMasterVolume(v));
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.clamp(crate::timestretch::MIN_RATE, crate::timestretch::MAX_RATE);
        let r = self.rate;
        self.send(EngineCommand::SetRate(r));
    }

    pub fn set_pitch_semitones(&mut self, semitones: f64) {
        let limit = crate::timestretch::MAX_PITCH_SEMITONES;
        self.pitch_semitones = semitones.clamp(-limit, limit);
        let p = self.pitch_semitones;
        self.send(EngineCommand::SetPitch(p));
    }

    pub fn position_seconds(&self) -> f64 {
        self.transport.position_seconds()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            position_seconds: self.position_seconds(),
            is_playing: self.is_playing(),
            duration_seconds: self.duration_seconds,
        }
    }

    fn emit(&self) {
        let _ = self.events_tx.send(self.snapshot());
    }

    /// 100 ms tick: enforce the loop region and emit a snapshot.
    ///
    /// The loop boundary error is bounded by one poll interval.
    pub fn poll_tick(&mut self) {
        if let Some(region) = self.loop_region {
            if self.transport.is_playing()
                && self.transport.position_seconds() >= region.end_seconds
            {
                self.seek(region.start_seconds);
                return; // seek already emitted
            }
        }
        self.emit();
    }

    // --- Live input ---

    /// Current capture device list, re-queried from the catalog.
    pub fn input_devices(&self) -> Vec<InputDeviceDescriptor> {
        self.catalog.input_devices()
    }

    pub fn is_input_enabled(&self) -> bool {
        self.capture_stream.is_some()
    }

    /// Open the capture stream on the selected device and channel.
    ///
    /// Fails with [`CoreError::EngineUnavailable`] when no capture device is
    /// present; the controller stays disabled. The enabled flag is never
    /// persisted.
    pub fn enable_input(&mut self) -> CoreResult<()> {
        if self.capture_stream.is_some() {
            return Ok(());
        }

        let devices = self.catalog.input_devices();
        if devices.is_empty() {
            return Err(CoreError::EngineUnavailable("no capture devices".into()));
        }

        let stored_id = self.store.get_string(keys::INPUT_DEVICE, "");
        let device = match devices.iter().find(|d| d.id == stored_id) {
            Some(d) => d.clone(),
            None => devices[0].clone(),
        };

        let mut channel = self.store.get_i64(keys::INPUT_CHANNEL, 0).max(0) as u16;
        if channel >= device.channels {
            // Selection from a previous device; fall back to the first channel
            channel = 0;
            self.store.set_i64(keys::INPUT_CHANNEL, 0);
        }

        let (producer, consumer) = rtrb::RingBuffer::new(CAPTURE_RING_CAPACITY);
        let stream = match self.capture.open(&device, channel, producer) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to enable input on {}: {e}", device.id);
                return Err(e);
            }
        };

        self.store.set_string(keys::INPUT_DEVICE, &device.id);
        self.capture_stream = Some(stream);
        self.send(EngineCommand::InputAttach {
            ring: Box::new(consumer),
            mono_source: true,
        });
        log::info!("live input enabled on {} channel {channel}", device.id);
        Ok(())
    }

    /// Stop capture. Safe to call when already disabled.
    pub fn disable_input(&mut self) {
        if self.capture_stream.take().is_none() {
            return;
        }
        self.send(EngineCommand::InputDetach);
        self.level_history.clear();
        log::info!("live input disabled");
    }

    /// Select the capture device; re-applies the stream when enabled.
    pub fn set_input_device(&mut self, device_id: &str) {
        self.store.set_string(keys::INPUT_DEVICE, device_id);
        if self.is_input_enabled() {
            self.disable_input();
            if let Err(e) = self.enable_input() {
                log::warn!("could not re-enable input after device change: {e}");
            }
        }
    }

    /// Select the capture channel; re-applies the stream when enabled.
    pub fn set_input_channel(&mut self, channel: u16) {
        self.store.set_i64(keys::INPUT_CHANNEL, channel as i64);
        if self.is_input_enabled() {
            self.disable_input();
            if let Err(e) = self.enable_input() {
                log::warn!("could not re-enable input after channel change: {e}");
            }
        }
    }

    pub fn input_gain_db(&self) -> f32 {
        self.store
            .get_f32(keys::INPUT_GAIN, DEFAULT_GAIN_DB)
            .clamp(MIN_GAIN_DB, MAX_GAIN_DB)
    }

    pub fn set_input_gain_db(&mut self, db: f32) {
        let db = db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        self.store.set_f32(keys::INPUT_GAIN, db);
        self.send(EngineCommand::InputSetGainDb(db));
    }

    pub fn input_volume(&self) -> f32 {
        self.store
            .get_f32(keys::INPUT_VOLUME, DEFAULT_VOLUME)
            .clamp(0.0, 1.0)
    }

    pub fn set_input_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.store.set_f32(keys::INPUT_VOLUME, volume);
        self.send(EngineCommand::InputSetVolume(volume));
    }

    pub fn input_reverb(&self) -> f32 {
        self.store.get_f32(keys::INPUT_REVERB, 0.0).clamp(0.0, 1.0)
    }

    pub fn set_input_reverb(&mut self, amount: f32) {
        let amount = amount.clamp(0.0, 1.0);
        self.store.set_f32(keys::INPUT_REVERB, amount);
        self.send(EngineCommand::InputSetReverb(amount));
    }

    /// Set one EQ band; the profile clamps and persists, the clamped value
    /// goes to the engine.
    pub fn set_eq_band(&mut self, band: usize, gain_db: f32) {
        self.eq.set_band(band, gain_db);
        let gain_db = self.eq.band(band);
        self.send(EngineCommand::InputSetEqBand { band, gain_db });
    }

    pub fn apply_eq_preset(&mut self, name: &str) {
        self.eq.apply_preset(name);
        for band in 0..BAND_COUNT {
            let gain_db = self.eq.band(band);
            self.send(EngineCommand::InputSetEqBand { band, gain_db });
        }
    }

    pub fn eq(&self) -> &EqProfile {
        &self.eq
    }

    /// Smoothed input level: moving average over the last
    /// [`METER_WINDOW`] meter ticks.
    pub fn input_level(&self) -> f32 {
        if self.level_history.is_empty() {
            return 0.0;
        }
        self.level_history.iter().sum::<f32>() / self.level_history.len() as f32
    }

    /// 50 ms tick: fold the engine's instantaneous RMS into the average.
    pub fn meter_tick(&mut self) {
        if !self.is_input_enabled() {
            return;
        }
        if self.level_history.len() == METER_WINDOW {
            self.level_history.pop_front();
        }
        self.level_history.push_back(self.input.level());
    }

    // --- Panel flags (UI passthrough) ---

    pub fn panel_visible(&self) -> bool {
        self.store.get_bool(keys::PANEL_VISIBLE, false)
    }

    pub fn set_panel_visible(&mut self, visible: bool) {
        self.store.set_bool(keys::PANEL_VISIBLE, visible);
    }

    pub fn panel_expanded(&self) -> bool {
        self.store.get_bool(keys::PANEL_EXPANDED, false)
    }

    pub fn set_panel_expanded(&mut self, expanded: bool) {
        self.store.set_bool(keys::PANEL_EXPANDED, expanded);
    }
}

/// Spawn the transport poll and level meter timers for a shared controller.
pub fn start_timers(controller: &Arc<Mutex<PlayerController>>) -> (PollTimer, PollTimer) {
    let poll_target = Arc::clone(controller);
    let poll = PollTimer::spawn("fermata-poll", POLL_INTERVAL, move || {
        if let Ok(mut c) = poll_target.lock() {
            c.poll_tick();
        }
    });

    let meter_target = Arc::clone(controller);
    let meter = PollTimer::spawn("fermata-meter", METER_INTERVAL, move || {
        if let Ok(mut c) = meter_target.lock() {
            c.meter_tick();
        }
    });

    (poll, meter)
}
