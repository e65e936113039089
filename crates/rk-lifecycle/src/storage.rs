// storage.rs — StateStorage trait and its backends.
//
// Server state is one opaque blob. A backend only has to read it back
// (absent on first start) and overwrite it. Backends are chosen at runtime
// from a URL: `file://<path>`, `memory://`, or a bare filesystem path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::LifecycleError;

/// Persistence for the serialized server state.
pub trait StateStorage: Send + Sync {
    /// The stored bytes, or `None` if nothing was ever written.
    fn read(&self) -> Result<Option<Vec<u8>>, LifecycleError>;

    /// Replace the stored bytes.
    fn write(&self, bytes: &[u8]) -> Result<(), LifecycleError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// A single JSON file on disk. Parent directories are created on write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, source: std::io::Error) -> LifecycleError {
        LifecycleError::StorageError {
            location: self.path.display().to_string(),
            source,
        }
    }
}

impl StateStorage for FileStorage {
    fn read(&self) -> Result<Option<Vec<u8>>, LifecycleError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.storage_error(e)),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<(), LifecycleError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }
        // Written beside the target, then renamed over it.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| self.storage_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.storage_error(e))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Process-local storage; state is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn read(&self) -> Result<Option<Vec<u8>>, LifecycleError> {
        Ok(self.bytes.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn write(&self, bytes: &[u8]) -> Result<(), LifecycleError> {
        *self.bytes.lock().unwrap_or_else(|p| p.into_inner()) = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

/// Pick a backend from a storage URL.
pub fn open_storage(url: &str) -> Result<Box<dyn StateStorage>, LifecycleError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(LifecycleError::UnsupportedStorage("empty storage url".to_string()));
    }
    if let Some(path) = url.strip_prefix("file://") {
        if path.is_empty() {
            return Err(LifecycleError::UnsupportedStorage(url.to_string()));
        }
        return Ok(Box::new(FileStorage::new(path)));
    }
    if url.starts_with("memory://") {
        return Ok(Box::new(MemoryStorage::new()));
    }
    if url.contains("://") {
        return Err(LifecycleError::UnsupportedStorage(url.to_string()));
    }
    Ok(Box::new(FileStorage::new(url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_storage_round_trip_creates_parents() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/deeper/state.json"));
        assert_eq!(storage.read().unwrap(), None);
        storage.write(b"{\"a\":1}").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some(&b"{\"a\":1}"[..]));
        storage.write(b"{}").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn memory_storage_starts_empty() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read().unwrap(), None);
        storage.write(b"x").unwrap();
        assert_eq!(storage.read().unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn urls_select_backends() {
        assert_eq!(open_storage("memory://").unwrap().describe(), "memory://");
        assert_eq!(
            open_storage("file://data/state.json").unwrap().describe(),
            "file://data/state.json"
        );
        assert_eq!(
            open_storage("data/state.json").unwrap().describe(),
            "file://data/state.json"
        );
    }

    #[test]
    fn unknown_schemes_are_rejected() {
        for url in ["s3://bucket/state.json", "", "file://"] {
            assert!(matches!(
                open_storage(url),
                Err(LifecycleError::UnsupportedStorage(_))
            ));
        }
    }
}
