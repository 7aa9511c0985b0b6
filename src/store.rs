//! Key/value persistence for the studio session.
//!
//! Values are plain strings in a flat JSON object, rewritten on every change.
//! Image payloads are stored as `data:` URLs and only decoded on rehydration.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("store file {} is not a JSON string map: {source}", .path.display())]
    Json { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKey {
    ApiKey,
    CharacterDescription,
    StylePreset,
    SceneDescription,
    PanelCount,
    CharacterImage,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::ApiKey => "apiKey",
            StoreKey::CharacterDescription => "characterDescription",
            StoreKey::StylePreset => "stylePreset",
            StoreKey::SceneDescription => "sceneDescription",
            StoreKey::PanelCount => "panelCount",
            StoreKey::CharacterImage => "characterImage",
        }
    }
}

#[derive(Debug, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl PreferenceStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens (or lazily creates) a JSON-backed store. A missing file is an
    /// empty store; the file is written on the first `set`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|source| StoreError::Json { path: path.clone(), source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("🗂️ No store at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        info!("🗂️ Loaded {} stored values from {}", values.len(), path.display());
        Ok(Self { path: Some(path), values })
    }

    pub fn get(&self, key: StoreKey) -> Option<&str> {
        self.values.get(key.as_str()).map(String::as_str)
    }

    pub fn set(&mut self, key: StoreKey, value: impl Into<String>) -> Result<(), StoreError> {
        self.values.insert(key.as_str().to_string(), value.into());
        self.flush()
    }

    pub fn remove(&mut self, key: StoreKey) -> Result<(), StoreError> {
        if self.values.remove(key.as_str()).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
        // replace via rename; readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, path).map_err(|source| {
            warn!("⚠️ Could not replace store file {}", path.display());
            StoreError::Io { path: path.clone(), source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("comic-studio-store-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn in_memory_store_round_trips_values() {
        let mut store = PreferenceStore::in_memory();
        assert_eq!(store.get(StoreKey::StylePreset), None);
        store.set(StoreKey::StylePreset, "Noir").unwrap();
        assert_eq!(store.get(StoreKey::StylePreset), Some("Noir"));
        store.remove(StoreKey::StylePreset).unwrap();
        assert_eq!(store.get(StoreKey::StylePreset), None);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let path = temp_path("prefs.json");
        {
            let mut store = PreferenceStore::open(&path).unwrap();
            store.set(StoreKey::CharacterDescription, "A knight made of glass").unwrap();
            store.set(StoreKey::PanelCount, "6").unwrap();
        }
        let store = PreferenceStore::open(&path).unwrap();
        assert_eq!(store.get(StoreKey::CharacterDescription), Some("A knight made of glass"));
        assert_eq!(store.get(StoreKey::PanelCount), Some("6"));

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["characterDescription"], "A knight made of glass");
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_store_file_is_an_error() {
        let path = temp_path("broken.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(PreferenceStore::open(&path), Err(StoreError::Json { .. })));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
