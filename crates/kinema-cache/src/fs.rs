//! Virtual filesystem implementations.

use indexmap::IndexMap;
use kinema_core::{AssetError, VirtualFs};

/// In-memory virtual filesystem.
#[derive(Clone, Debug, Default)]
pub struct MemoryFs {
    files: IndexMap<String, Vec<u8>>,
}

impl MemoryFs {
    /// An empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether there are no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Every path, in creation order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Sum of file sizes.
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

impl VirtualFs for MemoryFs {
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), AssetError> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> Result<(), AssetError> {
        self.files
            .shift_remove(path)
            .map(|_| ())
            .ok_or_else(|| AssetError::NotFound {
                path: path.to_string(),
            })
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                path: path.to_string(),
            })
    }
}

/// Records every path a load writes.
///
/// Wraps the filesystem for the duration of one scene load. Written
/// paths are what the scene depends on; created paths are the subset
/// that did not exist before, which is all a failed load may remove.
pub struct ResourceTracker<'a> {
    inner: &'a mut dyn VirtualFs,
    created: Vec<String>,
    written: Vec<String>,
}

impl<'a> ResourceTracker<'a> {
    /// Start tracking writes to `inner`.
    pub fn new(inner: &'a mut dyn VirtualFs) -> Self {
        Self {
            inner,
            created: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Paths created so far.
    pub fn created(&self) -> &[String] {
        &self.created
    }

    /// Paths written so far, in first-write order.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Stop tracking and return every written path.
    pub fn finish(self) -> Vec<String> {
        self.written
    }

    /// Remove everything created so far, for a load that failed.
    pub fn rollback(mut self) {
        for path in &self.created {
            if let Err(e) = self.inner.remove_file(path) {
                tracing::warn!(path = %path, error = %e, "could not remove file from failed load");
            }
        }
    }
}

impl VirtualFs for ResourceTracker<'_> {
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), AssetError> {
        let fresh = !self.inner.exists(path);
        self.inner.write_file(path, data)?;
        if fresh {
            self.created.push(path.to_string());
        }
        if !self.written.iter().any(|p| p == path) {
            self.written.push(path.to_string());
        }
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> Result<(), AssetError> {
        self.inner.remove_file(path)?;
        self.created.retain(|p| p != path);
        self.written.retain(|p| p != path);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.inner.exists(path)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.inner.read_file(path)
    }
}
