//! Audio file decoding
//!
//! [`SampleSource`] opens an audio file with symphonia, decodes the whole
//! stream to 32-bit float PCM, and resamples to the engine rate with rubato.
//! The decoded buffer is immutable afterwards; the transport reads frames out
//! of it by index, which makes seeking trivial and sample-accurate.
//!
//! Supported formats are whatever symphonia's full codec registry handles
//! (MP3, FLAC, WAV, OGG, AAC, ...).

use std::path::{Path, PathBuf};

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{CoreError, CoreResult};
use crate::types::{ChannelLayout, Sample, StereoBuffer, StereoSample, SAMPLE_RATE};

/// File extensions the folder scanner recognizes.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac"];

/// Check whether a path has a recognized audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A fully decoded audio file at the engine sample rate.
#[derive(Debug)]
pub struct SampleSource {
    path: PathBuf,
    /// Decoded frames, stereo, at [`SAMPLE_RATE`].
    samples: StereoBuffer,
    /// Channel layout of the file itself (pre-upmix).
    layout: ChannelLayout,
    /// Sample rate of the file before resampling.
    source_rate: u32,
}

impl SampleSource {
    /// Open and fully decode an audio file.
    ///
    /// Any probe, decode, or resample failure maps to
    /// [`CoreError::UnreadableFile`].
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let decoded = decode_file(path)?;

        let (samples, layout) = match decoded.channels {
            1 => {
                let buf = StereoBuffer::from_channels(&decoded.planes[0], &decoded.planes[0]);
                (buf, ChannelLayout::Mono)
            }
            _ => {
                let buf = StereoBuffer::from_channels(&decoded.planes[0], &decoded.planes[1]);
                (buf, ChannelLayout::Stereo)
            }
        };

        let samples = if decoded.sample_rate != SAMPLE_RATE {
            log::debug!(
                "resampling {:?} from {}Hz to {}Hz",
                path,
                decoded.sample_rate,
                SAMPLE_RATE
            );
            resample(&samples, decoded.sample_rate, SAMPLE_RATE)
                .map_err(|e| CoreError::UnreadableFile(format!("{:?}: resample failed: {e}", path)))?
        } else {
            samples
        };

        log::info!(
            "loaded {:?}: {} frames, {}Hz source, {:?}",
            path,
            samples.len(),
            decoded.sample_rate,
            layout
        );

        Ok(Self {
            path: path.to_path_buf(),
            samples,
            layout,
            source_rate: decoded.sample_rate,
        })
    }

    /// Build a source from an already decoded buffer (synthesized audio).
    pub fn from_buffer(samples: StereoBuffer) -> Self {
        Self {
            path: PathBuf::new(),
            samples,
            layout: ChannelLayout::Stereo,
            source_rate: SAMPLE_RATE,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine-rate frame count of the decoded stream.
    pub fn frame_count(&self) -> u64 {
        self.samples.len() as u64
    }

    /// Duration in seconds at the engine rate.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Borrow `count` frames starting at `start`.
    ///
    /// Fails with [`CoreError::OutOfRange`] when the range extends past the
    /// end of the stream.
    pub fn read_frames(&self, start: u64, count: u64) -> CoreResult<&[StereoSample]> {
        let total = self.frame_count();
        let end = start.saturating_add(count);
        if end > total {
            return Err(CoreError::OutOfRange { start, end, total });
        }
        Ok(&self.samples.as_slice()[start as usize..end as usize])
    }

    /// Copy frames starting at `start` into `out`, padding the tail with
    /// silence past end-of-stream. Returns the number of real frames copied.
    /// This is the render-path read: it clamps instead of erroring.
    pub fn read_frames_clamped(&self, start: u64, out: &mut [StereoSample]) -> usize {
        let total = self.samples.len();
        let start = (start as usize).min(total);
        let available = (total - start).min(out.len());
        out[..available].copy_from_slice(&self.samples.as_slice()[start..start + available]);
        for frame in &mut out[available..] {
            *frame = StereoSample::silence();
        }
        available
    }

    /// Full decoded buffer, for offline analysis.
    pub fn samples(&self) -> &StereoBuffer {
        &self.samples
    }
}

/// Duration in seconds as declared by the container, without decoding.
///
/// Files whose duration metadata is missing or indefinite report 0.0 rather
/// than failing; playback still works because the transport decodes the whole
/// stream anyway.
pub fn probe_duration(path: impl AsRef<Path>) -> f64 {
    let path = path.as_ref();
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return 0.0,
    };
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(p) => p,
        Err(_) => return 0.0,
    };

    let Some(track) = probed.format.default_track() else {
        return 0.0;
    };
    let params = &track.codec_params;
    match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => frames as f64 / rate as f64,
        _ => 0.0,
    }
}

/// Raw planar decode result before stereo conversion.
struct DecodedPcm {
    planes: Vec<Vec<Sample>>,
    channels: usize,
    sample_rate: u32,
}

fn decode_file(path: &Path) -> CoreResult<DecodedPcm> {
    let unreadable = |msg: String| CoreError::UnreadableFile(format!("{:?}: {msg}", path));

    let file = std::fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unreadable(format!("probe failed: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| unreadable("no audio tracks".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| unreadable("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unreadable(format!("no decoder: {e}")))?;

    let mut channels = 0usize;
    let mut planes: Vec<Vec<Sample>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<Sample>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            // End of stream or a truncated tail; what we have is the track
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(unreadable(format!("demux failed: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet; skip it and keep going
                log::warn!("decode error in {:?}: {e}", path);
                continue;
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(unreadable(format!("decode failed: {e}"))),
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
            planes = vec![Vec::new(); channels.max(1)];
        }

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<Sample>::new(decoded.capacity() as u64, spec)
        });
        buf.copy_interleaved_ref(decoded);

        let interleaved = buf.samples();
        for (i, &s) in interleaved.iter().enumerate() {
            planes[i % channels].push(s);
        }
    }

    if channels == 0 || planes[0].is_empty() {
        return Err(unreadable("no decodable audio".into()));
    }

    Ok(DecodedPcm {
        planes,
        channels,
        sample_rate,
    })
}

/// Offline sinc resampling of a whole stereo buffer.
fn resample(input: &StereoBuffer, from: u32, to: u32) -> Result<StereoBuffer, rubato::ResampleError> {
    const CHUNK: usize = 1024;

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<Sample>::new(to as f64 / from as f64, 2.0, params, CHUNK, 2)
        .expect("valid resampler construction");

    let mut left = Vec::with_capacity(input.len());
    let mut right = Vec::with_capacity(input.len());
    for frame in input.iter() {
        left.push(frame.left);
        right.push(frame.right);
    }

    let mut out_left: Vec<Sample> = Vec::new();
    let mut out_right: Vec<Sample> = Vec::new();
    let mut pos = 0usize;

    loop {
        let need = resampler.input_frames_next();
        let remaining = left.len() - pos;
        if remaining >= need {
            let chunk = [&left[pos..pos + need], &right[pos..pos + need]];
            let out = resampler.process(&chunk, None)?;
            out_left.extend_from_slice(&out[0]);
            out_right.extend_from_slice(&out[1]);
            pos += need;
        } else {
            let chunk = [&left[pos..], &right[pos..]];
            let out = resampler.process_partial(Some(&chunk), None)?;
            out_left.extend_from_slice(&out[0]);
            out_right.extend_from_slice(&out[1]);
            break;
        }
    }

    Ok(StereoBuffer::from_channels(&out_left, &out_right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, seconds: f64, rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (seconds * rate as f64) as usize;
        for i in 0..frames {
            let t = i as f32 / rate as f32;
            let value = ((t * 440.0 * std::f32::consts::TAU).sin() * 0.25 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn open_missing_file_is_unreadable() {
        let err = SampleSource::open("/nonexistent/track.mp3").unwrap_err();
        assert!(matches!(err, CoreError::UnreadableFile(_)));
    }

    #[test]
    fn decode_stereo_wav_at_engine_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1.0, SAMPLE_RATE, 2);

        let source = SampleSource::open(&path).unwrap();
        assert_eq!(source.channel_layout(), ChannelLayout::Stereo);
        assert_eq!(source.frame_count(), SAMPLE_RATE as u64);
        assert!((source.duration_seconds() - 1.0).abs() < 0.01);
    }

    #[test]
    fn mono_is_duplicated_to_both_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 0.25, SAMPLE_RATE, 1);

        let source = SampleSource::open(&path).unwrap();
        assert_eq!(source.channel_layout(), ChannelLayout::Mono);
        let frames = source.read_frames(100, 64).unwrap();
        for frame in frames {
            assert_eq!(frame.left, frame.right);
        }
    }

    #[test]
    fn read_frames_past_end_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 0.1, SAMPLE_RATE, 2);

        let source = SampleSource::open(&path).unwrap();
        let total = source.frame_count();
        let err = source.read_frames(total - 10, 20).unwrap_err();
        assert!(matches!(err, CoreError::OutOfRange { .. }));
    }

    #[test]
    fn clamped_read_pads_tail_with_silence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 0.1, SAMPLE_RATE, 2);

        let source = SampleSource::open(&path).unwrap();
        let total = source.frame_count();
        let mut out = [StereoSample::mono(1.0); 32];
        let copied = source.read_frames_clamped(total - 8, &mut out);
        assert_eq!(copied, 8);
        for frame in &out[8..] {
            assert_eq!(*frame, StereoSample::silence());
        }
    }

    #[test]
    fn non_engine_rate_is_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cd.wav");
        write_wav(&path, 1.0, 44_100, 2);

        let source = SampleSource::open(&path).unwrap();
        assert_eq!(source.source_rate(), 44_100);
        // Length should be within 1% of one engine-rate second
        let expected = SAMPLE_RATE as f64;
        assert!((source.frame_count() as f64 - expected).abs() < expected * 0.01);
    }

    #[test]
    fn probe_duration_reports_zero_for_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp3");
        std::fs::write(&path, b"not audio at all").unwrap();
        assert_eq!(probe_duration(&path), 0.0);
    }

    #[test]
    fn audio_extension_filter() {
        assert!(is_audio_file(Path::new("/a/b.MP3")));
        assert!(is_audio_file(Path::new("song.flac")));
        assert!(!is_audio_file(Path::new("notes.txt")));
        assert!(!is_audio_file(Path::new("noext")));
    }
}
