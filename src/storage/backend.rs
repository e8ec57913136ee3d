//! Key/value storage media.

use crate::error::{ClinicError, Result};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the storage manifest.
const STORAGE_MAGIC: &[u8; 4] = b"AYU\0";

/// Current storage format version.
const STORAGE_VERSION: u8 = 1;

/// A medium that holds one serialized document per key.
///
/// Absence of a key is not an error; it reads as `None`.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the whole document stored under `key`.
    fn write(&self, key: &str, document: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Volatile storage, used by tests and ephemeral profiles.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write(&self, key: &str, document: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), document.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Directory-backed storage: one `<key>.json` file per key.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash mid-write leaves the previous document intact. An exclusive lock
/// file keeps a second process from opening the same profile.
pub struct FileBackend {
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,
}

impl FileBackend {
    /// Open an existing storage directory or create a new one.
    pub fn open_or_create(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.join("MANIFEST").exists() {
            Self::open(path)
        } else if create_if_missing {
            Self::create(path)
        } else {
            Err(ClinicError::NotInitialized)
        }
    }

    /// Create a new storage directory.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Self::write_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;

        tracing::info!(path = %path.display(), "created storage");
        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Open an existing storage directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Self::verify_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;

        tracing::debug!(path = %path.display(), "opened storage");
        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{}.json", key))
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORAGE_MAGIC)?;
        file.write_all(&[STORAGE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORAGE_MAGIC {
            return Err(ClinicError::InvalidFormat("Invalid storage magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORAGE_VERSION {
            return Err(ClinicError::InvalidFormat(format!(
                "Unsupported storage version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| ClinicError::Locked)?;
        Ok(lock_file)
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.document_path(key)) {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, document: &str) -> Result<()> {
        let target = self.document_path(key);
        let staging = self.path.join(format!("{}.json.tmp", key));

        let mut file = File::create(&staging)?;
        file.write_all(document.as_bytes())?;
        file.sync_all()?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.document_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
