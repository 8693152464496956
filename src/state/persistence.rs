//! Snapshot Persistence Backends
//!
//! Storage for [`AuditSnapshot`]s keyed by a caller-supplied identifier:
//! - **JSON**: one pretty-printed `<id>.json` file per snapshot
//! - **Memory**: in-process storage for tests
//!
//! The JSON document is the compatibility surface read by offline tooling:
//! device name at the top level, field names exactly as in [`PortConfig`].
//!
//! [`PortConfig`]: super::PortConfig

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use super::AuditSnapshot;

/// Errors raised by snapshot storage.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot '{0}' not found")]
    NotFound(String),

    #[error("invalid snapshot id '{0}'")]
    InvalidId(String),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for snapshot storage implementations.
///
/// Identifiers are owned by the caller; two writers sharing an id is a
/// caller error and the last write wins.
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Save a snapshot under `id`, replacing any previous one.
    fn save(&self, id: &str, snapshot: &AuditSnapshot) -> StoreResult<()>;

    /// Load the snapshot stored under `id`.
    fn load(&self, id: &str) -> StoreResult<AuditSnapshot>;

    /// Returns true if a snapshot exists under `id`.
    fn exists(&self, id: &str) -> bool;

    /// List stored ids, sorted.
    fn list(&self) -> StoreResult<Vec<String>>;
}

fn validate_id(id: &str) -> StoreResult<()> {
    if id.is_empty()
        || id.contains(['/', '\\'])
        || id.starts_with('.')
        || id.chars().any(char::is_control)
    {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ============================================================================
// JSON Persistence Backend
// ============================================================================

/// JSON file-based snapshot store.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    base_dir: PathBuf,
}

impl JsonSnapshotStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the file path for a snapshot.
    pub fn snapshot_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.json"))
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, id: &str, snapshot: &AuditSnapshot) -> StoreResult<()> {
        validate_id(id)?;
        let path = self.snapshot_path(id);

        // Write beside the target and rename so readers never see a torn file.
        let tmp = NamedTempFile::new_in(&self.base_dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(id = %id, path = %path.display(), devices = snapshot.len(), "Saved snapshot");
        Ok(())
    }

    fn load(&self, id: &str) -> StoreResult<AuditSnapshot> {
        validate_id(id)?;
        let path = self.snapshot_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        load_snapshot_file(&path)
    }

    fn exists(&self, id: &str) -> bool {
        validate_id(id).is_ok() && self.snapshot_path(id).exists()
    }

    fn list(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Read a snapshot document from an arbitrary path.
pub fn load_snapshot_file(path: &Path) -> StoreResult<AuditSnapshot> {
    let file = File::open(path)?;
    let snapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(snapshot)
}

/// Write a snapshot document to an arbitrary path.
pub fn save_snapshot_file(path: &Path, snapshot: &AuditSnapshot) -> StoreResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Memory Persistence Backend
// ============================================================================

/// In-memory snapshot store (for testing).
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<String, AuditSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, id: &str, snapshot: &AuditSnapshot) -> StoreResult<()> {
        validate_id(id)?;
        self.snapshots
            .write()
            .insert(id.to_string(), snapshot.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> StoreResult<AuditSnapshot> {
        self.snapshots
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn exists(&self, id: &str) -> bool {
        self.snapshots.read().contains_key(id)
    }

    fn list(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.snapshots.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
