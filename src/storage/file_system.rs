use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use super::models::Persisted;
use crate::error::StorageError;

/// One JSON file per key under a base directory.
#[derive(Clone, Debug)]
pub struct Storage {
    base_path: PathBuf,
}

impl Storage {
    /// Create a new storage instance with the default base directory ("./.chaos-star")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./.chaos-star"),
        }
    }

    /// Create storage with custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn record_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    /// Write `value` under `key`, replacing any previous record
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let path = self.record_path(key)?;
        fs::create_dir_all(&self.base_path)?;
        let json = serde_json::to_string_pretty(&Persisted::now(value))?;

        // Write-then-rename so a crash never leaves a half-written record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        log::debug!("Saved '{}' to {:?}", key, path);
        Ok(())
    }

    /// Load the record under `key`, or `None` if nothing was saved
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Persisted<T>>, StorageError> {
        let path = self.record_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let record = serde_json::from_str(&contents)?;
        Ok(Some(record))
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.record_path(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
            log::info!("Removed stored record '{}'", key);
        }
        Ok(())
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
