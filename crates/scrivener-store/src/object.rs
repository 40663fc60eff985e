//! Object storage implementations

use crate::StoreError;
use scrivener_domain::ObjectStore;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Reject keys that would escape the store root
fn validate_key(key: &str) -> Result<&Path, StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidKey("key is empty".to_string()));
    }
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(StoreError::InvalidKey(format!(
            "{} must be a relative path without '..'",
            key
        )));
    }
    Ok(path)
}

/// Filesystem-backed object store
///
/// Keys are relative paths under `root`; intermediate directories are
/// created on write.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(validate_key(key)?))
    }
}

impl ObjectStore for FsObjectStore {
    type Error = StoreError;

    fn get(&self, key: &str) -> Result<Vec<u8>, Self::Error> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<String, Self::Error> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)?;
        debug!(key, content_type, bytes = body.len(), "Stored object");
        Ok(key.to_string())
    }
}

/// In-memory object store
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for `key`
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).map(|(_, ct)| ct.clone()))
    }

    /// Stored keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    type Error = StoreError;

    fn get(&self, key: &str) -> Result<Vec<u8>, Self::Error> {
        let objects = self.objects.read().map_err(|_| StoreError::Poisoned)?;
        objects
            .get(key)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<String, Self::Error> {
        validate_key(key)?;
        let mut objects = self.objects.write().map_err(|_| StoreError::Poisoned)?;
        objects.insert(key.to_string(), (body.to_vec(), content_type.to_string()));
        Ok(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_round_trip_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();

        let key = store
            .put("output/legal_1.jsonl", b"{}\n", "application/jsonl")
            .unwrap();
        assert_eq!(key, "output/legal_1.jsonl");
        assert!(dir.path().join("output").is_dir());
        assert_eq!(store.get(&key).unwrap(), b"{}\n");
    }

    #[test]
    fn test_fs_missing_key() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();
        assert!(matches!(store.get("nope.txt"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.put("../escape.txt", b"x", "text/plain"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get("/etc/passwd"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_store_records_content_type() {
        let store = MemoryObjectStore::new();
        store.put("b.csv", b"a,b", "text/csv").unwrap();
        store.put("a.json", b"[]", "application/json").unwrap();
        assert_eq!(store.content_type("b.csv").as_deref(), Some("text/csv"));
        assert_eq!(store.keys(), vec!["a.json", "b.csv"]);
        assert!(matches!(store.get("c"), Err(StoreError::NotFound(_))));
    }
}
