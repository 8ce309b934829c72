//! An in-memory asset store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use kinema_core::{AssetError, AssetStore};

/// Asset store backed by a map, counting fetches.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssets {
    files: IndexMap<String, Vec<u8>>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), data.into());
        self
    }

    /// Successful and failed fetches so far, across clones.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl AssetStore for MemoryAssets {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                path: path.to_string(),
            })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, AssetError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut out: Vec<String> = self
            .files
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect();
        out.sort();
        Ok(out)
    }
}
