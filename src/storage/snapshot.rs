//! File-backed persistence for index snapshots.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use rkyv::rancor::Error as RkyvError;
use rkyv::{access, from_bytes, to_bytes};
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::model::{ArchivedIndexSnapshot, IndexSnapshot};

const TEMP_SUFFIX: &str = "tmp";

/// Summary read straight from the archived bytes, without deserializing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub format_version: u32,
    pub generation: u64,
    pub dimension: u32,
    pub items: usize,
    pub saved_at: i64,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
/// Saves and loads a single [`IndexSnapshot`] file.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    fn ensure_parent_dir(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|_| StorageError::DirCreationFailed {
                path: parent.to_path_buf(),
            })?;
        }
        Ok(())
    }

    /// Writes `snapshot` atomically (temp file, fsync, rename). Returns bytes written.
    pub fn save(&self, snapshot: &IndexSnapshot) -> StorageResult<usize> {
        self.ensure_parent_dir()?;

        let bytes = to_bytes::<RkyvError>(snapshot)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        info!(
            path = %self.path.display(),
            bytes = bytes.len(),
            items = snapshot.items.len(),
            generation = snapshot.generation,
            "Index snapshot saved"
        );
        Ok(bytes.len())
    }

    fn map(&self) -> StorageResult<Mmap> {
        if !self.path.exists() {
            return Err(StorageError::NotFound {
                path: self.path.clone(),
            });
        }
        let file = File::open(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Err(StorageError::EmptyFile {
                path: self.path.clone(),
            });
        }
        // SAFETY: The file is only replaced by rename, never written in place.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(mmap)
    }

    /// Validates the archive and returns its header fields.
    pub fn inspect(&self) -> StorageResult<SnapshotHeader> {
        let mmap = self.map()?;
        let archived = access::<ArchivedIndexSnapshot, RkyvError>(&mmap)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;
        Ok(SnapshotHeader {
            format_version: archived.format_version.to_native(),
            generation: archived.generation.to_native(),
            dimension: archived.dimension.to_native(),
            items: archived.items.len(),
            saved_at: archived.saved_at.to_native(),
            bytes: mmap.len(),
        })
    }

    /// Memory-maps the file and deserializes the full snapshot.
    pub fn load(&self) -> StorageResult<IndexSnapshot> {
        let mmap = self.map()?;
        let snapshot = from_bytes::<IndexSnapshot, RkyvError>(&mmap)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;
        debug!(
            path = %self.path.display(),
            items = snapshot.items.len(),
            generation = snapshot.generation,
            "Index snapshot loaded"
        );
        Ok(snapshot)
    }
}
