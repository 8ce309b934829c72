//! Asset store backed by a directory on disk.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use kinema_core::{AssetError, AssetStore};
use walkdir::WalkDir;

/// Serves files below a root directory, addressed by `/`-separated
/// relative paths.
///
/// Paths that would escape the root (`..`, absolute paths) are treated
/// as missing.
#[derive(Clone, Debug)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    /// Serve files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path.trim_start_matches("./"));
        if rel.components().all(|c| matches!(c, Component::Normal(_))) {
            Some(self.root.join(rel))
        } else {
            None
        }
    }
}

impl AssetStore for FsAssetStore {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.resolve(path).ok_or_else(|| AssetError::NotFound {
            path: path.to_string(),
        })?;
        std::fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssetError::NotFound {
                path: path.to_string(),
            },
            _ => AssetError::Io {
                path: path.to_string(),
                reason: e.to_string(),
            },
        })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, AssetError> {
        let base = self.resolve(dir).ok_or_else(|| AssetError::NotFound {
            path: dir.to_string(),
        })?;
        if !base.is_dir() {
            return Err(AssetError::NotFound {
                path: dir.to_string(),
            });
        }
        let mut out = Vec::new();
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(|e| AssetError::Io {
                path: dir.to_string(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect();
            out.push(parts.join("/"));
        }
        Ok(out)
    }
}
