use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Device storage could not be read or written.
#[derive(Debug, thiserror::Error)]
#[error("device storage unavailable: {0}")]
pub struct StorageError(pub String);

/// Synchronous text-blob slots local to the device.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per slot under a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(StorageError(format!("invalid storage key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError(format!("read {}: {err}", path.display()))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| StorageError(format!("create {}: {err}", self.dir.display())))?;

        let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp_path, value)
            .map_err(|err| StorageError(format!("write {}: {err}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &path).map_err(|err| {
            let _ = std::fs::remove_file(&tmp_path);
            StorageError(format!("rename to {}: {err}", path.display()))
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError(format!("remove {}: {err}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trips_and_removes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get("xkcd-read-status")?, None);
        storage.set("xkcd-read-status", "{\"1\":{}}")?;
        storage.set("xkcd-read-status", "{}")?;
        assert_eq!(storage.get("xkcd-read-status")?.as_deref(), Some("{}"));

        storage.remove("xkcd-read-status")?;
        storage.remove("xkcd-read-status")?;
        assert_eq!(storage.get("xkcd-read-status")?, None);
        Ok(())
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let storage = FileStorage::new("unused");
        let err = storage.get("../etc/passwd").unwrap_err();
        assert!(err.to_string().contains("invalid storage key"));
    }
}
