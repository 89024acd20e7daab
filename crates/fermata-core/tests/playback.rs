//! End-to-end playback scenarios against real WAV files.

use std::path::PathBuf;
use std::sync::Arc;

use fermata_core::audio_file::SampleSource;
use fermata_core::engine::{command_channel, AudioEngine, EngineCommand, LoadRequest, PlayState};
use fermata_core::eq::{EqProfile, BAND_COUNT};
use fermata_core::playlist::Playlist;
use fermata_core::settings::{MemorySettingsStore, SettingsStore};
use fermata_core::{StereoBuffer, SAMPLE_RATE};

/// Write a one-second 440 Hz stereo WAV at the engine rate.
fn write_test_wav(dir: &tempfile::TempDir, name: &str, seconds: f64) -> PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (seconds * SAMPLE_RATE as f64) as usize;
    for i in 0..frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        let value = ((t * 440.0 * std::f32::consts::TAU).sin() * 0.25 * i16::MAX as f32) as i16;
        writer.write_sample(value).unwrap();
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[test]
fn wav_decodes_at_full_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_wav(&dir, "tone.wav", 1.0);

    let source = SampleSource::open(&path).unwrap();
    assert_eq!(source.frame_count(), SAMPLE_RATE as u64);
    assert!((source.duration_seconds() - 1.0).abs() < 1e-6);
}

#[test]
fn unreadable_file_is_an_error_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.wav");
    std::fs::write(&path, b"not a wav file").unwrap();
    assert!(SampleSource::open(&path).is_err());
}

#[test]
fn load_play_seek_through_the_command_queue() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_wav(&dir, "tone.wav", 1.0);
    let source = SampleSource::open(&path).unwrap();

    let mut engine = AudioEngine::new();
    let (mut tx, mut rx) = command_channel();

    tx.push(EngineCommand::LoadTrack(Box::new(LoadRequest {
        source,
        start_frame: 0,
        volume: 0.8,
        master_volume: 1.0,
        rate: 1.0,
        pitch_semitones: 0.0,
    })))
    .ok()
    .unwrap();
    tx.push(EngineCommand::Play).ok().unwrap();
    engine.process_commands(&mut rx);
    assert_eq!(engine.transport().state(), PlayState::Playing);

    let mut out = StereoBuffer::silence(1024);
    engine.process(&mut out);
    assert!(out.peak() > 0.0);
    assert_eq!(engine.transport().position_frames(), 1024);

    tx.push(EngineCommand::Seek { frame: 24_000 }).ok().unwrap();
    engine.process_commands(&mut rx);
    assert_eq!(engine.transport().position_frames(), 24_000);
    assert_eq!(engine.transport().state(), PlayState::Playing);
}

#[test]
fn half_rate_consumes_half_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_wav(&dir, "tone.wav", 1.0);
    let source = SampleSource::open(&path).unwrap();

    let mut engine = AudioEngine::new();
    let (mut tx, mut rx) = command_channel();

    tx.push(EngineCommand::LoadTrack(Box::new(LoadRequest {
        source,
        start_frame: 0,
        volume: 1.0,
        master_volume: 1.0,
        rate: 0.5,
        pitch_semitones: 0.0,
    })))
    .ok()
    .unwrap();
    tx.push(EngineCommand::Play).ok().unwrap();
    engine.process_commands(&mut rx);

    let mut out = StereoBuffer::silence(1024);
    engine.process(&mut out);
    assert_eq!(engine.transport().position_frames(), 512);
}

#[test]
fn rock_preset_persists_across_profiles() {
    let store: Arc<MemorySettingsStore> = Arc::new(MemorySettingsStore::new());

    {
        let mut eq = EqProfile::new(store.clone());
        eq.apply_preset("Rock");
        assert_eq!(eq.band(0), 2.0);
        assert_eq!(eq.band(7), 2.0);
    }

    // A fresh profile over the same store sees the preset's gains
    let eq = EqProfile::new(store);
    let expected = [2.0, 1.0, -1.0, 3.0, 2.0, 4.0, 3.0, 2.0];
    for band in 0..BAND_COUNT {
        assert_eq!(eq.band(band), expected[band]);
    }
}

#[test]
fn playlist_scans_and_loads_real_audio() {
    let dir = tempfile::tempdir().unwrap();
    write_test_wav(&dir, "a.wav", 1.0);
    write_test_wav(&dir, "b.wav", 2.0);
    std::fs::write(dir.path().join("setlist.txt"), b"ignored").unwrap();

    let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());
    let mut playlist = Playlist::new(store);
    playlist.open_folder(dir.path()).unwrap();

    assert_eq!(playlist.len(), 2);
    assert!((playlist.tracks()[0].duration - 1.0).abs() < 0.1);
    assert!((playlist.tracks()[1].duration - 2.0).abs() < 0.1);
    assert!((playlist.total_duration_seconds() - 3.0).abs() < 0.2);

    // The scanned track loads straight into the engine
    let track = playlist.tracks()[0].clone();
    let source = SampleSource::open(&track.location).unwrap();
    assert_eq!(source.frame_count(), SAMPLE_RATE as u64);
}
