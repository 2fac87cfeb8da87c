//! Storage backend trait and implementations.
//!
//! The draft store persists a single record. Backends only move that
//! record's bytes; they know nothing about drafts:
//! - `FileBackend` - One JSON file under the data directory (default)
//! - `MemoryBackend` - In-process buffer, for tests and embedders

use crate::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Trait for storage backends that handle raw persistence of the draft record.
pub trait StorageBackend: Send + Sync {
    /// Read the stored record, or `None` if nothing has been written yet.
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored record.
    fn save(&mut self, payload: &str) -> Result<()>;

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;

    /// Get the backend type.
    fn backend_type(&self) -> BackendType;
}

/// Available storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// JSON file in the data directory - ~/.local/share/postdraft/<key>.json
    File,
    /// Process memory, lost on exit
    Memory,
}

impl BackendType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stores the record as `<dir>/<key>.json`.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so a crash mid-write leaves the previous
/// record intact.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Backend for the record named `key` inside `dir`.
    pub fn new(dir: &Path, key: &str) -> Self {
        Self {
            path: dir.join(format!("{}.json", key)),
        }
    }

    /// Path of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, payload: &str) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| Error::Other(format!("Invalid store path: {}", self.path.display())))?;
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(payload.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::File
    }
}

/// Keeps the record in memory.
///
/// Clones share the same buffer, so a clone handed to a second store
/// behaves like reopening the same storage after a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    payload: Arc<Mutex<Option<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with a raw record.
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Arc::new(Mutex::new(Some(payload.into()))),
        }
    }

    /// Current raw record, if any.
    pub fn payload(&self) -> Option<String> {
        self.payload.lock().ok().and_then(|p| p.clone())
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .payload
            .lock()
            .map_err(|_| Error::Other("memory backend lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&mut self, payload: &str) -> Result<()> {
        let mut guard = self
            .payload
            .lock()
            .map_err(|_| Error::Other("memory backend lock poisoned".to_string()))?;
        *guard = Some(payload.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backend_type_display() {
        assert_eq!(BackendType::File.to_string(), "file");
        assert_eq!(BackendType::Memory.to_string(), "memory");
        assert_eq!(MemoryBackend::new().backend_type().as_str(), "memory");
    }

    #[test]
    fn test_file_backend_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path(), "post-drafts");
        assert_eq!(backend.load().unwrap(), None);
    }

    #[test]
    fn test_file_backend_save_then_load() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut backend = FileBackend::new(&nested, "post-drafts");

        backend.save("{\"x\":1}").unwrap();
        backend.save("{\"x\":2}").unwrap();

        assert!(backend.path().ends_with("a/b/post-drafts.json"));
        assert_eq!(backend.load().unwrap().as_deref(), Some("{\"x\":2}"));
        assert_eq!(backend.backend_type(), BackendType::File);
    }

    #[test]
    fn test_memory_backend_clones_share_buffer() {
        let mut backend = MemoryBackend::new();
        let reopened = backend.clone();

        backend.save("payload").unwrap();
        assert_eq!(reopened.load().unwrap().as_deref(), Some("payload"));
        assert_eq!(reopened.payload().as_deref(), Some("payload"));
        assert_eq!(reopened.location(), "memory");
    }
}
