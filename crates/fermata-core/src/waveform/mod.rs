//! Background waveform analysis
//!
//! Decoding a track and reducing it to a display envelope can take tens of
//! milliseconds for a long file, so it runs on a dedicated thread. The caller
//! submits a path, polls for the result, and a generation counter makes sure
//! an envelope for a track the user has already moved away from is discarded
//! instead of flashing up late.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::audio_file::SampleSource;

/// Number of envelope points a full track is reduced to.
pub const ENVELOPE_RESOLUTION: usize = 2000;

/// Display scaling applied to per-chunk RMS before clamping.
const RMS_DISPLAY_SCALE: f32 = 3.0;

struct AnalyzeRequest {
    generation: u64,
    path: PathBuf,
}

/// A finished analysis: per-chunk RMS values in `[0, 1]`.
///
/// Empty when the file could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformEnvelope {
    pub generation: u64,
    pub points: Vec<f32>,
}

impl WaveformEnvelope {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Reduce a decoded track to at most [`ENVELOPE_RESOLUTION`] RMS points.
///
/// RMS per chunk is scaled up for display (quiet material would otherwise
/// render nearly flat) and clamped to `[0, 1]`.
pub fn compute_envelope(source: &SampleSource) -> Vec<f32> {
    let samples = source.samples().as_slice();
    if samples.is_empty() {
        return Vec::new();
    }

    let chunk = samples.len().div_ceil(ENVELOPE_RESOLUTION).max(1);
    samples
        .chunks(chunk)
        .map(|chunk| {
            let sum_squares: f32 = chunk
                .iter()
                .map(|s| {
                    let mono = (s.left + s.right) / 2.0;
                    mono * mono
                })
                .sum();
            let rms = (sum_squares / chunk.len() as f32).sqrt();
            (rms * RMS_DISPLAY_SCALE).clamp(0.0, 1.0)
        })
        .collect()
}

/// Background waveform analyzer.
///
/// One worker thread serves all requests in order. Results carry the
/// generation of the request that produced them; [`try_recv`] drops anything
/// older than the latest [`analyze`] call.
///
/// [`try_recv`]: WaveformAnalyzer::try_recv
/// [`analyze`]: WaveformAnalyzer::analyze
pub struct WaveformAnalyzer {
    tx: Sender<AnalyzeRequest>,
    rx: Receiver<WaveformEnvelope>,
    generation: u64,
    _handle: JoinHandle<()>,
}

impl WaveformAnalyzer {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = unbounded::<AnalyzeRequest>();
        let (result_tx, result_rx) = unbounded::<WaveformEnvelope>();

        let handle = thread::Builder::new()
            .name("fermata-waveform".to_string())
            .spawn(move || {
                analyzer_thread(request_rx, result_tx);
            })
            .expect("spawn waveform analyzer thread");

        Self {
            tx: request_tx,
            rx: result_rx,
            generation: 0,
            _handle: handle,
        }
    }

    /// Queue a track for analysis. Supersedes any in-flight request: its
    /// result will be discarded by [`try_recv`](Self::try_recv).
    pub fn analyze(&mut self, path: impl Into<PathBuf>) {
        self.generation += 1;
        let request = AnalyzeRequest {
            generation: self.generation,
            path: path.into(),
        };
        if self.tx.send(request).is_err() {
            log::error!("waveform analyzer thread disconnected");
        }
    }

    /// Poll for the envelope of the latest request, skipping stale results.
    pub fn try_recv(&self) -> Option<WaveformEnvelope> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) if envelope.generation == self.generation => {
                    return Some(envelope);
                }
                Ok(stale) => {
                    log::debug!(
                        "discarding stale waveform (generation {} < {})",
                        stale.generation,
                        self.generation
                    );
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    log::error!("waveform analyzer thread disconnected");
                    return None;
                }
            }
        }
    }

    /// Blocking variant for callers without a tick loop (and for tests).
    pub fn recv(&self) -> Option<WaveformEnvelope> {
        while let Ok(envelope) = self.rx.recv() {
            if envelope.generation == self.generation {
                return Some(envelope);
            }
        }
        None
    }
}

fn analyzer_thread(rx: Receiver<AnalyzeRequest>, tx: Sender<WaveformEnvelope>) {
    while let Ok(request) = rx.recv() {
        let started = std::time::Instant::now();

        let points = match SampleSource::open(&request.path) {
            Ok(source) => compute_envelope(&source),
            Err(e) => {
                // Unreadable tracks still get a (blank) waveform slot
                log::warn!("waveform: could not analyze {:?}: {e}", request.path);
                Vec::new()
            }
        };

        log::debug!(
            "waveform: {:?} -> {} points in {:?}",
            request.path,
            points.len(),
            started.elapsed()
        );

        if tx
            .send(WaveformEnvelope {
                generation: request.generation,
                points,
            })
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StereoBuffer, StereoSample, SAMPLE_RATE};

    fn constant_source(frames: usize, level: f32) -> SampleSource {
        SampleSource::from_buffer(StereoBuffer::from_vec(vec![
            StereoSample::mono(level);
            frames
        ]))
    }

    #[test]
    fn envelope_has_bounded_resolution() {
        let source = constant_source(SAMPLE_RATE as usize * 3, 0.1);
        let points = compute_envelope(&source);
        assert!(!points.is_empty());
        assert!(points.len() <= ENVELOPE_RESOLUTION);
    }

    #[test]
    fn short_track_yields_one_point_per_frame() {
        let source = constant_source(10, 0.1);
        assert_eq!(compute_envelope(&source).len(), 10);
    }

    #[test]
    fn rms_is_scaled_and_clamped() {
        // 0.1 constant signal: RMS 0.1, scaled to 0.3
        let quiet = compute_envelope(&constant_source(4000, 0.1));
        assert!((quiet[0] - 0.3).abs() < 1e-3);

        // Full-scale signal clamps at 1.0
        let loud = compute_envelope(&constant_source(4000, 1.0));
        assert!(loud.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn empty_source_yields_empty_envelope() {
        let source = constant_source(0, 0.0);
        assert!(compute_envelope(&source).is_empty());
    }

    #[test]
    fn unreadable_file_reports_empty_envelope() {
        let mut analyzer = WaveformAnalyzer::spawn();
        analyzer.analyze("/nonexistent/track.wav");
        let envelope = analyzer.recv().unwrap();
        assert!(envelope.is_empty());
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut analyzer = WaveformAnalyzer::spawn();
        analyzer.analyze("/nonexistent/first.wav");
        analyzer.analyze("/nonexistent/second.wav");

        // The blocking recv skips the generation-1 result
        let envelope = analyzer.recv().unwrap();
        assert_eq!(envelope.generation, 2);
        assert!(analyzer.try_recv().is_none());
    }
}
