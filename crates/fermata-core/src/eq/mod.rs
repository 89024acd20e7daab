//! EQ profile - band layout, named presets, and persisted gains
//!
//! The profile is the UI-facing model of the 8-band EQ: it stores the current
//! gains, clamps them to the legal range, knows the named presets, and saves
//! every band under its own settings key. The live-input engine reads
//! `current_values` and pushes them into the DSP stage.

use std::sync::Arc;

use crate::settings::SettingsStore;

/// Number of EQ bands.
pub const BAND_COUNT: usize = 8;

/// Band gain range in dB.
pub const MIN_BAND_GAIN_DB: f32 = -15.0;
pub const MAX_BAND_GAIN_DB: f32 = 15.0;

const SETTINGS_PREFIX: &str = "eq_band";

/// Filter shape of one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandShape {
    /// Rumble cut below the band frequency; gain is ignored.
    HighPass,
    Peaking,
    HighShelf,
}

/// Fixed configuration of one band.
#[derive(Debug, Clone, Copy)]
pub struct BandConfig {
    pub frequency: f32,
    pub shape: BandShape,
    /// Bandwidth in octaves.
    pub bandwidth: f32,
    pub label: &'static str,
}

impl BandConfig {
    /// The fixed 8-band layout: a 60 Hz high-pass, six peaking bands, and a
    /// 12 kHz high-shelf. The 170 Hz band is slightly wider.
    pub fn default_bands() -> [BandConfig; BAND_COUNT] {
        [
            BandConfig { frequency: 60.0, shape: BandShape::HighPass, bandwidth: 1.0, label: "60Hz" },
            BandConfig { frequency: 170.0, shape: BandShape::Peaking, bandwidth: 1.2, label: "170Hz" },
            BandConfig { frequency: 310.0, shape: BandShape::Peaking, bandwidth: 1.0, label: "310Hz" },
            BandConfig { frequency: 600.0, shape: BandShape::Peaking, bandwidth: 1.0, label: "600Hz" },
            BandConfig { frequency: 1000.0, shape: BandShape::Peaking, bandwidth: 1.0, label: "1kHz" },
            BandConfig { frequency: 3000.0, shape: BandShape::Peaking, bandwidth: 1.0, label: "3kHz" },
            BandConfig { frequency: 6000.0, shape: BandShape::Peaking, bandwidth: 1.0, label: "6kHz" },
            BandConfig { frequency: 12000.0, shape: BandShape::HighShelf, bandwidth: 1.0, label: "12kHz" },
        ]
    }
}

/// Named preset gains, sorted by name.
const PRESETS: [(&str, [f32; BAND_COUNT]); 8] = [
    ("Blues", [1.0, 2.0, 0.0, 2.0, 1.0, -1.0, 2.0, 1.0]),
    ("Clean", [-1.0, 1.0, 2.0, 0.0, -1.0, 1.0, 2.0, 0.0]),
    ("Flat", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("Jazz", [-2.0, 1.0, 2.0, 1.0, -1.0, 2.0, 1.0, -1.0]),
    ("Metal", [3.0, -1.0, -2.0, 0.0, 2.0, 4.0, 5.0, 3.0]),
    ("Modern", [-2.0, 0.0, 1.0, 2.0, 3.0, 2.0, 4.0, 5.0]),
    ("Rock", [2.0, 1.0, -1.0, 3.0, 2.0, 4.0, 3.0, 2.0]),
    ("Vintage", [2.0, 3.0, 1.0, -1.0, 0.0, 2.0, 1.0, -2.0]),
];

/// Current EQ gains with preset and persistence support.
pub struct EqProfile {
    gains: [f32; BAND_COUNT],
    configs: [BandConfig; BAND_COUNT],
    store: Arc<dyn SettingsStore>,
}

impl EqProfile {
    /// Load the profile from the store; missing bands default to 0 dB.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let mut gains = [0.0; BAND_COUNT];
        for (i, gain) in gains.iter_mut().enumerate() {
            *gain = store
                .get_f32(&format!("{SETTINGS_PREFIX}{i}"), 0.0)
                .clamp(MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB);
        }
        Self {
            gains,
            configs: BandConfig::default_bands(),
            store,
        }
    }

    pub fn band_count(&self) -> usize {
        BAND_COUNT
    }

    /// Gain of one band in dB; out-of-range indices read as 0.
    pub fn band(&self, index: usize) -> f32 {
        self.gains.get(index).copied().unwrap_or(0.0)
    }

    /// Set one band's gain in dB, clamped, and persist it.
    pub fn set_band(&mut self, index: usize, gain_db: f32) {
        let Some(slot) = self.gains.get_mut(index) else {
            return;
        };
        *slot = gain_db.clamp(MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB);
        log::debug!("eq {}: {} dB", self.configs[index].label, *slot);
        self.store.set_f32(&format!("{SETTINGS_PREFIX}{index}"), *slot);
    }

    pub fn band_config(&self, index: usize) -> Option<&BandConfig> {
        self.configs.get(index)
    }

    /// Preset names in sorted order.
    pub fn available_presets() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(name, _)| *name)
    }

    /// Apply a named preset. Unknown names are ignored.
    pub fn apply_preset(&mut self, name: &str) {
        let Some((_, values)) = PRESETS.iter().find(|(n, _)| *n == name) else {
            log::warn!("unknown eq preset: {name}");
            return;
        };
        for (i, &value) in values.iter().enumerate() {
            self.set_band(i, value);
        }
        log::info!("applied eq preset: {name}");
    }

    /// Reset every band to 0 dB.
    pub fn reset_all(&mut self) {
        self.apply_preset("Flat");
    }

    /// Snapshot of all gains, in band order.
    pub fn current_values(&self) -> [f32; BAND_COUNT] {
        self.gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;

    fn profile() -> EqProfile {
        EqProfile::new(Arc::new(MemorySettingsStore::new()))
    }

    #[test]
    fn new_profile_is_flat() {
        let profile = profile();
        assert_eq!(profile.current_values(), [0.0; BAND_COUNT]);
    }

    #[test]
    fn set_band_clamps_and_persists() {
        let store = Arc::new(MemorySettingsStore::new());
        let mut profile = EqProfile::new(store.clone());
        profile.set_band(2, 22.0);
        assert_eq!(profile.band(2), MAX_BAND_GAIN_DB);

        // A fresh profile reads the clamped value back
        let reloaded = EqProfile::new(store);
        assert_eq!(reloaded.band(2), MAX_BAND_GAIN_DB);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut profile = profile();
        profile.set_band(99, 5.0);
        assert_eq!(profile.band(99), 0.0);
    }

    #[test]
    fn rock_preset_values() {
        let mut profile = profile();
        profile.apply_preset("Rock");
        assert_eq!(profile.current_values(), [2.0, 1.0, -1.0, 3.0, 2.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn unknown_preset_leaves_gains_untouched() {
        let mut profile = profile();
        profile.set_band(0, 3.0);
        profile.apply_preset("Dubstep");
        assert_eq!(profile.band(0), 3.0);
    }

    #[test]
    fn reset_all_returns_to_flat() {
        let mut profile = profile();
        profile.apply_preset("Metal");
        profile.reset_all();
        assert_eq!(profile.current_values(), [0.0; BAND_COUNT]);
    }

    #[test]
    fn presets_are_sorted_by_name() {
        let names: Vec<_> = EqProfile::available_presets().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }
}
