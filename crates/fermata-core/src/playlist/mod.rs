//! Playlist - folder-backed track list with persisted edits
//!
//! A playlist is always the audio files of one folder, scanned fresh on every
//! open. User edits (title, volume, start time, order, export flags) are
//! persisted as a JSON blob per folder and merged back over the scan: the
//! filesystem decides which tracks exist, the blob decides what the user
//! changed about them. Persisted entries whose file disappeared are dropped
//! silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio_file::{is_audio_file, probe_duration};
use crate::error::{CoreError, CoreResult};
use crate::settings::SettingsStore;

mod keys {
    pub const LAST_FOLDER: &str = "last_folder";
    pub const LAST_SONG_INDEX: &str = "last_song_index";
    pub const PAUSE_BETWEEN_SONGS: &str = "pause_between_songs";
}

fn default_include_in_export() -> bool {
    true
}

/// One track in a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Absolute file path; the merge key for persisted edits.
    pub location: PathBuf,
    /// User-edited title; falls back to the filename when empty.
    pub title: String,
    /// Per-track volume 0..1.
    pub volume: f32,
    /// Position in the playlist, dense from 0.
    pub order: usize,
    /// Duration in seconds (0 when the file could not be probed).
    pub duration: f64,
    /// Playback start offset in seconds.
    pub start_time: f64,
    #[serde(default = "default_include_in_export")]
    pub include_in_export: bool,
    /// Title override for the exported set list; empty means use the
    /// display title.
    #[serde(default)]
    pub export_title: String,
}

impl Track {
    /// Build a track from a scanned file, probing its duration.
    pub fn scan(location: PathBuf, order: usize) -> Self {
        let title = location
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let duration = probe_duration(&location);
        Self {
            location,
            title,
            volume: 1.0,
            order,
            duration,
            start_time: 0.0,
            include_in_export: true,
            export_title: String::new(),
        }
    }

    /// Title shown in lists; the filename when no title was set.
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            self.location
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            self.title.clone()
        }
    }
}

/// FNV-1a over the folder path. The per-folder settings keys must be stable
/// across runs and releases, which rules out the stdlib hasher.
fn folder_key_hash(folder: &Path) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in folder.to_string_lossy().as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn playlist_key(folder: &Path) -> String {
    format!("playlist_{:016x}", folder_key_hash(folder))
}

fn master_volume_key(folder: &Path) -> String {
    format!("master_volume_{:016x}", folder_key_hash(folder))
}

/// Folder-backed playlist with per-folder persistence.
pub struct Playlist {
    tracks: Vec<Track>,
    current_index: usize,
    folder: Option<PathBuf>,
    /// Master volume for the whole folder, 0..1.
    master_volume: f32,
    /// Pause between songs in minutes (global setting).
    pause_between_songs: f64,
    store: Arc<dyn SettingsStore>,
}

impl Playlist {
    /// Create an empty playlist, restoring the global settings and the last
    /// opened folder when it still exists.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let pause_between_songs = store.get_f64(keys::PAUSE_BETWEEN_SONGS, 0.0).max(0.0);

        let mut playlist = Self {
            tracks: Vec::new(),
            current_index: 0,
            folder: None,
            master_volume: 1.0,
            pause_between_songs,
            store,
        };

        let last_folder = playlist.store.get_string(keys::LAST_FOLDER, "");
        if !last_folder.is_empty() {
            let folder = PathBuf::from(&last_folder);
            if folder.is_dir() {
                if let Err(e) = playlist.open_folder(&folder) {
                    log::warn!("playlist: could not reopen {:?}: {e}", folder);
                }
                let index = playlist.store.get_i64(keys::LAST_SONG_INDEX, 0).max(0) as usize;
                if index < playlist.tracks.len() {
                    playlist.current_index = index;
                }
            }
        }

        playlist
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn set_current_index(&mut self, index: usize) {
        if index < self.tracks.len() {
            self.current_index = index;
            self.store.set_i64(keys::LAST_SONG_INDEX, index as i64);
        }
    }

    /// Scan a folder (non-recursive) and merge persisted edits over the scan.
    pub fn open_folder(&mut self, folder: &Path) -> CoreResult<()> {
        // The outgoing folder keeps its master volume
        self.save_master_volume();

        let entries = std::fs::read_dir(folder)
            .map_err(|e| CoreError::UnreadableFile(format!("{}: {e}", folder.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_audio_file(path))
            .collect();
        files.sort();

        self.tracks = files
            .into_iter()
            .enumerate()
            .map(|(order, path)| Track::scan(path, order))
            .collect();

        self.master_volume = self
            .store
            .get_f32(&master_volume_key(folder), 1.0)
            .clamp(0.0, 1.0);
        self.folder = Some(folder.to_path_buf());
        self.merge_persisted();
        self.current_index = 0;

        self.store
            .set_string(keys::LAST_FOLDER, &folder.to_string_lossy());
        self.store.set_i64(keys::LAST_SONG_INDEX, 0);

        log::info!(
            "playlist: opened {:?} with {} tracks",
            folder,
            self.tracks.len()
        );
        Ok(())
    }

    /// Apply persisted edits over the scanned tracks, matched by location.
    /// Files on disk that have no persisted entry keep their scan defaults;
    /// persisted entries without a file are dropped.
    fn merge_persisted(&mut self) {
        let Some(folder) = &self.folder else { return };
        let Some(blob) = self.store.get_blob(&playlist_key(folder)) else {
            return;
        };

        let saved: Vec<Track> = match serde_json::from_slice(&blob) {
            Ok(tracks) => tracks,
            Err(e) => {
                log::warn!("playlist: ignoring unparsable blob for {:?}: {e}", folder);
                return;
            }
        };

        for saved_track in saved {
            if let Some(track) = self
                .tracks
                .iter_mut()
                .find(|t| t.location == saved_track.location)
            {
                track.title = saved_track.title;
                track.volume = saved_track.volume;
                track.order = saved_track.order;
                track.start_time = saved_track.start_time;
                track.include_in_export = saved_track.include_in_export;
                track.export_title = saved_track.export_title;
            }
        }

        self.tracks.sort_by_key(|t| t.order);
        self.renumber();
    }

    fn persist(&self) {
        let Some(folder) = &self.folder else { return };
        match serde_json::to_vec(&self.tracks) {
            Ok(blob) => self.store.set_blob(&playlist_key(folder), blob),
            Err(e) => log::warn!("playlist: could not serialize {:?}: {e}", folder),
        }
    }

    fn save_master_volume(&self) {
        if let Some(folder) = &self.folder {
            self.store
                .set_f32(&master_volume_key(folder), self.master_volume);
        }
    }

    /// Assign dense orders matching the current vec positions.
    fn renumber(&mut self) {
        for (index, track) in self.tracks.iter_mut().enumerate() {
            track.order = index;
        }
    }

    /// Move a track to a new position; orders stay dense.
    pub fn move_track(&mut self, from: usize, to: usize) {
        if from >= self.tracks.len() || to >= self.tracks.len() || from == to {
            return;
        }
        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);
        self.renumber();
        self.persist();
    }

    pub fn set_track_volume(&mut self, index: usize, volume: f32) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.volume = volume.clamp(0.0, 1.0);
            self.persist();
        }
    }

    pub fn set_track_start_time(&mut self, index: usize, start_time: f64) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.start_time = start_time.max(0.0);
            self.persist();
        }
    }

    pub fn set_track_title(&mut self, index: usize, title: &str) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.title = title.to_string();
            self.persist();
        }
    }

    pub fn set_track_export_included(&mut self, index: usize, included: bool) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.include_in_export = included;
            self.persist();
        }
    }

    pub fn set_track_export_title(&mut self, index: usize, title: &str) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.export_title = title.to_string();
            self.persist();
        }
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Folder-wide master volume, persisted per folder.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        self.save_master_volume();
    }

    /// Playback volume for one track: per-track times master, never above
    /// unity.
    pub fn effective_volume(&self, track: &Track) -> f32 {
        (track.volume * self.master_volume).min(1.0)
    }

    pub fn pause_between_songs_minutes(&self) -> f64 {
        self.pause_between_songs
    }

    pub fn set_pause_between_songs_minutes(&mut self, minutes: f64) {
        self.pause_between_songs = minutes.max(0.0);
        self.store
            .set_f64(keys::PAUSE_BETWEEN_SONGS, self.pause_between_songs);
    }

    /// Total set length in seconds, including the pause after every track
    /// except the last.
    pub fn total_duration_seconds(&self) -> f64 {
        let songs: f64 = self.tracks.iter().map(|t| t.duration).sum();
        let pauses = self.tracks.len().saturating_sub(1) as f64 * self.pause_between_songs * 60.0;
        songs + pauses
    }

    /// Ordered `(order, title)` pairs for the set-list exporter, filtered to
    /// tracks marked for export.
    pub fn export_entries(&self) -> Vec<(usize, String)> {
        let mut entries: Vec<(usize, String)> = self
            .tracks
            .iter()
            .filter(|t| t.include_in_export)
            .map(|t| {
                let title = if t.export_title.is_empty() {
                    t.display_title()
                } else {
                    t.export_title.clone()
                };
                (t.order, title)
            })
            .collect();
        entries.sort_by_key(|(order, _)| *order);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    fn store() -> Arc<MemorySettingsStore> {
        Arc::new(MemorySettingsStore::new())
    }

    fn folder_with_tracks(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            touch(dir.path(), name);
        }
        dir
    }

    #[test]
    fn scan_skips_non_audio_files() {
        let dir = folder_with_tracks(&["a.mp3", "b.wav", "notes.txt", "c.flac"]);
        let mut playlist = Playlist::new(store());
        playlist.open_folder(dir.path()).unwrap();

        let names: Vec<String> = playlist
            .tracks()
            .iter()
            .map(|t| t.display_title())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let mut playlist = Playlist::new(store());
        let err = playlist.open_folder(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, CoreError::UnreadableFile(_)));
    }

    #[test]
    fn edits_survive_a_rescan() {
        let dir = folder_with_tracks(&["a.mp3", "b.mp3"]);
        let store = store();

        {
            let mut playlist = Playlist::new(store.clone());
            playlist.open_folder(dir.path()).unwrap();
            playlist.set_track_volume(0, 0.4);
            playlist.set_track_title(1, "Encore");
            playlist.set_track_start_time(1, 12.5);
        }

        let mut playlist = Playlist::new(store);
        playlist.open_folder(dir.path()).unwrap();
        assert_eq!(playlist.tracks()[0].volume, 0.4);
        assert_eq!(playlist.tracks()[1].title, "Encore");
        assert_eq!(playlist.tracks()[1].start_time, 12.5);
    }

    #[test]
    fn scan_wins_existence_over_persisted_entries() {
        let dir = folder_with_tracks(&["a.mp3", "b.mp3"]);
        let store = store();

        {
            let mut playlist = Playlist::new(store.clone());
            playlist.open_folder(dir.path()).unwrap();
            playlist.set_track_volume(1, 0.3);
        }

        // One file disappears, a new one appears
        std::fs::remove_file(dir.path().join("b.mp3")).unwrap();
        touch(dir.path(), "c.mp3");

        let mut playlist = Playlist::new(store);
        playlist.open_folder(dir.path()).unwrap();
        let names: Vec<String> = playlist
            .tracks()
            .iter()
            .map(|t| t.display_title())
            .collect();
        assert_eq!(names, ["a", "c"]);
        // The new file gets scan defaults
        assert_eq!(playlist.tracks()[1].volume, 1.0);
    }

    #[test]
    fn reorder_keeps_orders_dense() {
        let dir = folder_with_tracks(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut playlist = Playlist::new(store());
        playlist.open_folder(dir.path()).unwrap();

        playlist.move_track(0, 2);
        let orders: Vec<usize> = playlist.tracks().iter().map(|t| t.order).collect();
        assert_eq!(orders, [0, 1, 2]);
        assert_eq!(playlist.tracks()[2].display_title(), "a");
    }

    #[test]
    fn persisted_order_is_restored() {
        let dir = folder_with_tracks(&["a.mp3", "b.mp3", "c.mp3"]);
        let store = store();

        {
            let mut playlist = Playlist::new(store.clone());
            playlist.open_folder(dir.path()).unwrap();
            playlist.move_track(2, 0);
        }

        let mut playlist = Playlist::new(store);
        playlist.open_folder(dir.path()).unwrap();
        let names: Vec<String> = playlist
            .tracks()
            .iter()
            .map(|t| t.display_title())
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn master_volume_is_per_folder() {
        let dir_a = folder_with_tracks(&["a.mp3"]);
        let dir_b = folder_with_tracks(&["b.mp3"]);
        let store = store();

        let mut playlist = Playlist::new(store.clone());
        playlist.open_folder(dir_a.path()).unwrap();
        playlist.set_master_volume(0.5);

        playlist.open_folder(dir_b.path()).unwrap();
        assert_eq!(playlist.master_volume(), 1.0);

        playlist.open_folder(dir_a.path()).unwrap();
        assert_eq!(playlist.master_volume(), 0.5);
    }

    #[test]
    fn effective_volume_never_exceeds_unity() {
        let dir = folder_with_tracks(&["a.mp3"]);
        let mut playlist = Playlist::new(store());
        playlist.open_folder(dir.path()).unwrap();
        playlist.set_master_volume(1.0);

        let track = playlist.tracks()[0].clone();
        assert_eq!(playlist.effective_volume(&track), 1.0);

        playlist.set_master_volume(0.5);
        assert_eq!(playlist.effective_volume(&track), 0.5);
    }

    #[test]
    fn total_duration_includes_pauses() {
        let dir = folder_with_tracks(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut playlist = Playlist::new(store());
        playlist.open_folder(dir.path()).unwrap();
        // Probing empty fixture files yields zero durations
        playlist.set_pause_between_songs_minutes(2.0);

        // Two pauses of two minutes between three tracks
        assert_eq!(playlist.total_duration_seconds(), 240.0);
    }

    #[test]
    fn export_entries_respect_flags_and_overrides() {
        let dir = folder_with_tracks(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut playlist = Playlist::new(store());
        playlist.open_folder(dir.path()).unwrap();

        playlist.set_track_export_included(1, false);
        playlist.set_track_export_title(2, "Closer");

        let entries = playlist.export_entries();
        assert_eq!(entries, [(0, "a".to_string()), (2, "Closer".to_string())]);
    }

    #[test]
    fn last_folder_and_index_are_restored() {
        let dir = folder_with_tracks(&["a.mp3", "b.mp3"]);
        let store = store();

        {
            let mut playlist = Playlist::new(store.clone());
            playlist.open_folder(dir.path()).unwrap();
            playlist.set_current_index(1);
        }

        let playlist = Playlist::new(store);
        assert_eq!(playlist.folder(), Some(dir.path()));
        assert_eq!(playlist.current_index(), 1);
        assert_eq!(playlist.len(), 2);
    }
}
