// File-backed store with atomic writes

use super::KeyValueStore;
use log::warn;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

/// Key-value store persisted as a single JSON map, written with
/// write-to-temp-then-rename so a crash mid-write never corrupts it.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Default location under the platform data directory.
    pub fn default_path() -> PathBuf {
        let base_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base_dir.join("FAB").join("data").join("client_store.json")
    }

    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Discarding unreadable store file {:?}: {}", path, e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        if let Err(e) = self.try_flush(entries) {
            warn!("Failed to persist store file {:?}: {}", self.path, e);
        }
    }

    fn try_flush(&self, entries: &HashMap<String, String>) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create directory {:?}: {}", parent, e))?;
        }

        let json_string = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("failed to serialize store: {}", e))?;

        let temp_path = self.path.with_extension("tmp");

        let mut temp_file = File::create(&temp_path)
            .map_err(|e| format!("failed to create temp file {:?}: {}", temp_path, e))?;

        temp_file
            .write_all(json_string.as_bytes())
            .map_err(|e| format!("failed to write temp file: {}", e))?;

        temp_file
            .sync_all()
            .map_err(|e| format!("failed to sync temp file: {}", e))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| format!("failed to rename temp file to {:?}: {}", self.path, e))?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}
