//! cpal stream plumbing
//!
//! The output stream owns the [`AudioEngine`]: every callback drains pending
//! commands, renders one buffer, and interleaves it into the device buffer.
//! The control thread only ever touches the command producer and the atomics,
//! so the callback never contends with anything.
//!
//! Capture streams live on a dedicated thread because `cpal::Stream` is not
//! `Send`; the returned handle parks that thread until dropped.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::engine::{
    command_channel, AudioEngine, EngineCommand, InputAtomics, TransportAtomics,
};
use crate::error::{CoreError, CoreResult};
use crate::types::{StereoBuffer, MAX_BUFFER_SIZE, SAMPLE_RATE};

use super::backend::{CaptureBackend, CaptureStream};
use super::device::{find_input_device, InputDeviceDescriptor};

/// Keeps the output stream alive. Drop to stop audio.
pub struct OutputHandle {
    _stream: Stream,
    sample_rate: u32,
}

impl OutputHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Everything the control layer needs after the output stream starts.
pub struct PlaybackSystem {
    pub handle: OutputHandle,
    /// Command producer for the engine.
    pub commands: rtrb::Producer<EngineCommand>,
    pub transport: Arc<TransportAtomics>,
    pub input: Arc<InputAtomics>,
    pub sample_rate: u32,
}

/// Start the output stream on the default device.
pub fn start_playback_system() -> CoreResult<PlaybackSystem> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| CoreError::EngineUnavailable("no output device".into()))?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());

    let supported = device
        .supported_output_configs()
        .map_err(|e| CoreError::EngineUnavailable(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        .find(|c| {
            SAMPLE_RATE >= c.min_sample_rate().0 && SAMPLE_RATE <= c.max_sample_rate().0
        })
        .ok_or_else(|| {
            CoreError::EngineUnavailable(format!(
                "{device_name}: no f32 stereo config at {SAMPLE_RATE}Hz"
            ))
        })?
        .with_sample_rate(cpal::SampleRate(SAMPLE_RATE));

    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    log::info!(
        "output device {device_name}: {} channels at {}Hz",
        config.channels,
        config.sample_rate.0
    );

    let engine = AudioEngine::new();
    let transport = engine.transport().atomics();
    let input = engine.live_input().atomics();
    let (command_tx, command_rx) = command_channel();

    let stream = build_output_stream(&device, &config, engine, command_rx)?;
    stream
        .play()
        .map_err(|e| CoreError::EngineUnavailable(e.to_string()))?;

    Ok(PlaybackSystem {
        handle: OutputHandle {
            _stream: stream,
            sample_rate: SAMPLE_RATE,
        },
        commands: command_tx,
        transport,
        input,
        sample_rate: SAMPLE_RATE,
    })
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: AudioEngine,
    mut command_rx: rtrb::Consumer<EngineCommand>,
) -> CoreResult<Stream> {
    let channels = config.channels as usize;
    let mut render = StereoBuffer::silence(MAX_BUFFER_SIZE);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let frames = (data.len() / channels).min(MAX_BUFFER_SIZE);
                render.set_len_from_capacity(frames);

                engine.process_commands(&mut command_rx);
                engine.process(&mut render);

                let samples = render.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    let sample = samples.get(i).copied().unwrap_or_default();
                    frame[0] = sample.left;
                    if channels > 1 {
                        frame[1] = sample.right;
                    }
                    for ch in frame.iter_mut().skip(2) {
                        *ch = 0.0;
                    }
                }
            },
            move |err| {
                log::error!("output stream error: {err}");
            },
            None,
        )
        .map_err(|e| CoreError::EngineUnavailable(e.to_string()))
}

/// Capture stream hosted on its own thread.
///
/// Dropping the handle wakes the thread, which drops the stream.
struct CpalCaptureStream {
    stop_tx: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl CaptureStream for CpalCaptureStream {}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// The real capture backend.
pub struct CpalCaptureBackend;

impl CaptureBackend for CpalCaptureBackend {
    fn open(
        &mut self,
        descriptor: &InputDeviceDescriptor,
        channel: u16,
        tx: rtrb::Producer<f32>,
    ) -> CoreResult<Box<dyn CaptureStream>> {
        let (ready_tx, ready_rx) = mpsc::channel::<CoreResult<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let descriptor = descriptor.clone();

        let join = std::thread::Builder::new()
            .name("fermata-capture".into())
            .spawn(move || match build_capture_stream(&descriptor, channel, tx) {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(CoreError::EngineUnavailable(e.to_string())));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));
                    // Park until the handle drops; recv errors when the
                    // sender side goes away
                    let _ = stop_rx.recv();
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CoreError::EngineUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalCaptureStream {
                stop_tx: Some(stop_tx),
                join: Some(join),
            })),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(CoreError::EngineUnavailable("capture thread died".into()))
            }
        }
    }
}

fn build_capture_stream(
    descriptor: &InputDeviceDescriptor,
    channel: u16,
    mut tx: rtrb::Producer<f32>,
) -> CoreResult<Stream> {
    let device = find_input_device(descriptor)?;

    let supported = device
        .supported_input_configs()
        .map_err(|e| CoreError::EngineUnavailable(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32 && c.channels() > channel)
        .find(|c| {
            SAMPLE_RATE >= c.min_sample_rate().0 && SAMPLE_RATE <= c.max_sample_rate().0
        })
        .ok_or_else(|| {
            CoreError::EngineUnavailable(format!(
                "{}: no f32 capture config with channel {channel} at {SAMPLE_RATE}Hz",
                descriptor.id
            ))
        })?
        .with_sample_rate(cpal::SampleRate(SAMPLE_RATE));

    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = config.channels as usize;
    let channel = channel as usize;
    log::info!(
        "capture device {}: channel {channel} of {channels} at {}Hz",
        descriptor.id,
        config.sample_rate.0
    );

    device
        .build_input_stream(
            &config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    let sample = frame.get(channel).copied().unwrap_or(0.0);
                    // Ring full means the engine is behind; dropping the
                    // newest samples is the real-time safe choice
                    if tx.push(sample).is_err() {
                        break;
                    }
                }
            },
            move |err| {
                log::error!("capture stream error: {err}");
            },
            None,
        )
        .map_err(|e| CoreError::EngineUnavailable(e.to_string()))
}
