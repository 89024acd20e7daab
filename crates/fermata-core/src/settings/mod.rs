//! Settings store port
//!
//! The engine never touches an ambient global preference store. Everything
//! that persists (EQ band gains, input gain/volume/reverb, device/channel
//! selection, per-folder playlist blobs, master volumes) goes through the
//! [`SettingsStore`] trait, injected at construction.
//!
//! Two implementations are provided: a YAML-file-backed store for the
//! application and an in-memory store for tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A typed settings value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingsValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Key-value settings store with typed accessors and per-key defaults.
///
/// Implementations take `&self`; shared use behind an `Arc` is expected.
pub trait SettingsStore: Send + Sync {
    fn set(&self, key: &str, value: SettingsValue);
    fn get(&self, key: &str) -> Option<SettingsValue>;
    fn remove(&self, key: &str);

    fn set_f32(&self, key: &str, value: f32) {
        self.set(key, SettingsValue::Float(value as f64));
    }

    fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.get(key) {
            Some(SettingsValue::Float(v)) => v as f32,
            Some(SettingsValue::Int(v)) => v as f32,
            _ => default,
        }
    }

    fn set_f64(&self, key: &str, value: f64) {
        self.set(key, SettingsValue::Float(value));
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(SettingsValue::Float(v)) => v,
            Some(SettingsValue::Int(v)) => v as f64,
            _ => default,
        }
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set(key, SettingsValue::Bool(value));
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(SettingsValue::Bool(v)) => v,
            _ => default,
        }
    }

    fn set_i64(&self, key: &str, value: i64) {
        self.set(key, SettingsValue::Int(value));
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(SettingsValue::Int(v)) => v,
            _ => default,
        }
    }

    fn set_string(&self, key: &str, value: &str) {
        self.set(key, SettingsValue::Text(value.to_string()));
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(SettingsValue::Text(v)) => v,
            _ => default.to_string(),
        }
    }

    fn set_blob(&self, key: &str, value: Vec<u8>) {
        self.set(key, SettingsValue::Blob(value));
    }

    fn get_blob(&self, key: &str) -> Option<Vec<u8>> {
        match self.get(key) {
            Some(SettingsValue::Blob(v)) => Some(v),
            _ => None,
        }
    }
}

/// Default settings file location (`~/.config/fermata/settings.yaml`).
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fermata")
        .join("settings.yaml")
}

/// YAML-file-backed settings store.
///
/// The whole map is loaded at open and rewritten on every mutation. Settings
/// writes are rare (user gestures), so write-through keeps crash behavior
/// simple: the file is always consistent with the last completed gesture.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, SettingsValue>>,
}

impl FileSettingsStore {
    /// Open the store at `path`, loading existing values.
    ///
    /// A missing file yields an empty store; an unparsable file is logged and
    /// treated as empty rather than failing startup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::load(&path) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("settings: failed to load {:?}: {:#}, starting empty", path, e);
                BTreeMap::new()
            }
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn load(path: &Path) -> Result<BTreeMap<String, SettingsValue>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {:?}", path))?;
        serde_yaml::from_str(&contents).context("failed to parse settings file")
    }

    fn flush(&self, values: &BTreeMap<String, SettingsValue>) {
        let result: Result<()> = (|| {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create settings dir {:?}", parent))?;
            }
            let yaml = serde_yaml::to_string(values).context("failed to serialize settings")?;
            std::fs::write(&self.path, yaml)
                .with_context(|| format!("failed to write settings file {:?}", self.path))?;
            Ok(())
        })();

        if let Err(e) = result {
            log::warn!("settings: flush failed: {:#}", e);
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn set(&self, key: &str, value: SettingsValue) {
        let mut values = self.values.lock().expect("settings lock poisoned");
        values.insert(key.to_string(), value);
        self.flush(&values);
    }

    fn get(&self, key: &str) -> Option<SettingsValue> {
        self.values
            .lock()
            .expect("settings lock poisoned")
            .get(key)
            .cloned()
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock().expect("settings lock poisoned");
        if values.remove(key).is_some() {
            self.flush(&values);
        }
    }
}

/// In-memory settings store for tests.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, SettingsValue>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys (test helper).
    pub fn len(&self) -> usize {
        self.values.lock().expect("settings lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SettingsStore for MemorySettingsStore {
    fn set(&self, key: &str, value: SettingsValue) {
        self.values
            .lock()
            .expect("settings lock poisoned")
            .insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<SettingsValue> {
        self.values
            .lock()
            .expect("settings lock poisoned")
            .get(key)
            .cloned()
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .expect("settings lock poisoned")
            .remove(key);
    }
}
