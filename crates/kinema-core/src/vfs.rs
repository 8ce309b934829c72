//! Virtual filesystem and asset store interfaces.
//!
//! The physics engine resolves mesh and texture references against a
//! virtual filesystem that the scene loader populates before compiling a
//! model. Assets themselves come from an [`AssetStore`] (a directory on
//! disk, an HTTP origin, an in-memory map in tests).

use crate::error::AssetError;

/// In-process filesystem the physics engine reads model assets from.
pub trait VirtualFs: Send {
    /// Create or overwrite a file.
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), AssetError>;

    /// Delete a file. Deleting a missing file is an error.
    fn remove_file(&mut self, path: &str) -> Result<(), AssetError>;

    /// Whether a file exists.
    fn exists(&self, path: &str) -> bool;

    /// Read a file's bytes.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, AssetError>;
}

/// Read-only source of scene and policy assets.
pub trait AssetStore: Send + Sync {
    /// Fetch one asset.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetError>;

    /// List every asset below `dir`, as paths usable with
    /// [`fetch`](Self::fetch), in a stable order.
    fn list(&self, dir: &str) -> Result<Vec<String>, AssetError>;

    /// Fetch an asset and decode it as UTF-8.
    fn fetch_text(&self, path: &str) -> Result<String, AssetError> {
        let bytes = self.fetch(path)?;
        String::from_utf8(bytes).map_err(|_| AssetError::NotText {
            path: path.to_string(),
        })
    }
}
