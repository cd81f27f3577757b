//! Storage backends and the simulation path scheme

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Blob storage addressed by store-relative paths
///
/// The engine never touches the filesystem directly; everything goes through
/// this trait so a run can write to local disk, memory (tests) or anything
/// else that can hold named byte blobs.
pub trait StorageBackend: Send + Sync {
    /// Write a blob, replacing any existing blob at `path`
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read a blob back
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// List stored blob paths with the given prefix, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Filesystem-backed storage rooted at a directory
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl StorageBackend for LocalBackend {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        debug!(path = %full.display(), bytes = bytes.len(), "writing blob");
        fs::write(&full, bytes).map_err(|source| StorageError::Io {
            path: full.display().to_string(),
            source,
        })
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.full_path(path);
        if !full.exists() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        fs::read(&full).map_err(|source| StorageError::Io {
            path: full.display().to_string(),
            source,
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.full_path(prefix);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| StorageError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let mut paths: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .map(|name| format!("{prefix}/{name}"))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// In-memory storage, mainly for tests
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.data
            .lock()
            .expect("storage mutex poisoned")
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.data
            .lock()
            .expect("storage mutex poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut paths: Vec<String> = self
            .data
            .lock()
            .expect("storage mutex poisoned")
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// High-level storage with the simulation path scheme
///
/// Cloning is cheap; all clones share the same backend.
#[derive(Clone)]
pub struct SimulationStorage {
    backend: Arc<dyn StorageBackend>,
}

impl SimulationStorage {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Open filesystem-backed storage rooted at `root`
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(LocalBackend::new(root)))
    }

    /// Open in-memory storage
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn samples_path(replica: u32, start: u64, end: u64) -> String {
        format!("samples/samples_{replica}_{start}-{end}.json")
    }

    pub fn energies_path(replica: u32, start: u64, end: u64) -> String {
        format!("energies/energies_{replica}_{start}-{end}.json")
    }

    pub fn works_path(a: u32, b: u32, start: u64, end: u64) -> String {
        format!("works/works_{a}-{b}_{start}-{end}.json")
    }

    pub fn heats_path(a: u32, b: u32, start: u64, end: u64) -> String {
        format!("heats/heats_{a}-{b}_{start}-{end}.json")
    }

    pub fn statistics_path(step: u64) -> String {
        format!("statistics/statistics_{step}.json")
    }

    fn write_json<T: Serialize>(&self, path: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.write(path, &bytes)
    }

    fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StorageError> {
        let bytes = self.backend.read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write_samples(
        &self,
        replica: u32,
        start: u64,
        end: u64,
        samples: &[Vec<f64>],
    ) -> Result<(), StorageError> {
        self.write_json(&Self::samples_path(replica, start, end), &samples)
    }

    pub fn read_samples(&self, replica: u32, start: u64, end: u64) -> Result<Vec<Vec<f64>>, StorageError> {
        self.read_json(&Self::samples_path(replica, start, end))
    }

    pub fn write_energies(
        &self,
        replica: u32,
        start: u64,
        end: u64,
        energies: &[f64],
    ) -> Result<(), StorageError> {
        self.write_json(&Self::energies_path(replica, start, end), &energies)
    }

    pub fn read_energies(&self, replica: u32, start: u64, end: u64) -> Result<Vec<f64>, StorageError> {
        self.read_json(&Self::energies_path(replica, start, end))
    }

    pub fn write_works(&self, a: u32, b: u32, start: u64, end: u64, works: &[f64]) -> Result<(), StorageError> {
        self.write_json(&Self::works_path(a, b, start, end), &works)
    }

    pub fn write_heats(&self, a: u32, b: u32, start: u64, end: u64, heats: &[f64]) -> Result<(), StorageError> {
        self.write_json(&Self::heats_path(a, b, start, end), &heats)
    }

    /// Write a per-step statistics snapshot; re-writing a step replaces it
    pub fn write_statistics<T: Serialize>(&self, step: u64, snapshot: &T) -> Result<(), StorageError> {
        self.write_json(&Self::statistics_path(step), snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_path_scheme() {
        assert_eq!(
            SimulationStorage::samples_path(3, 100, 200),
            "samples/samples_3_100-200.json"
        );
        assert_eq!(
            SimulationStorage::energies_path(1, 0, 50),
            "energies/energies_1_0-50.json"
        );
        assert_eq!(SimulationStorage::works_path(1, 2, 0, 10), "works/works_1-2_0-10.json");
        assert_eq!(SimulationStorage::statistics_path(500), "statistics/statistics_500.json");
    }

    #[test]
    fn test_memory_backend_roundtrip() {
        let storage = SimulationStorage::in_memory();

        let samples = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        storage.write_samples(1, 0, 100, &samples).unwrap();

        let read = storage.read_samples(1, 0, 100).unwrap();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_memory_backend_not_found() {
        let storage = SimulationStorage::in_memory();
        let err = storage.read_energies(9, 0, 10).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_local_backend_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = SimulationStorage::local(dir.path());

        storage.write_energies(2, 0, 10, &[1.0, 2.0, 3.0]).unwrap();

        assert!(dir.path().join("energies/energies_2_0-10.json").exists());
        let read = storage.read_energies(2, 0, 10).unwrap();
        assert_eq!(read, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_local_backend_list() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path());

        backend.write("samples/samples_2_0-10.json", b"[]").unwrap();
        backend.write("samples/samples_1_0-10.json", b"[]").unwrap();

        let listed = backend.list("samples").unwrap();
        assert_eq!(
            listed,
            vec![
                "samples/samples_1_0-10.json".to_string(),
                "samples/samples_2_0-10.json".to_string(),
            ]
        );
        assert!(backend.list("energies").unwrap().is_empty());
    }

    #[test]
    fn test_statistics_overwrite_replaces() {
        let storage = SimulationStorage::in_memory();

        storage.write_statistics(5, &vec![1.0]).unwrap();
        storage.write_statistics(5, &vec![2.0, 3.0]).unwrap();

        let bytes = storage.backend().read("statistics/statistics_5.json").unwrap();
        let read: Vec<f64> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(read, vec![2.0, 3.0]);
    }
}
