//! Budgeted LRU cache of per-scene resources for Kinema.
//!
//! Loading a scene compiles a physics model, allocates its state, builds
//! a render graph and writes the scene's assets into a virtual
//! filesystem. All of that is kept in a [`SceneCache`] so that switching
//! back to a recent scene costs nothing.
//!
//! # Ownership
//!
//! ```text
//! SceneCache (sole owner)
//! ├── IndexMap<SceneKey, CacheEntry>
//! │   └── CacheEntry
//! │       ├── SimulationHandle   (disposed on eviction)
//! │       ├── Box<dyn RenderGraph> (released on eviction)
//! │       └── tracked paths      (removed from the VFS on eviction)
//! └── Box<dyn VirtualFs>
//! ```
//!
//! Runtimes hold a [`SceneKey`](kinema_core::SceneKey), never an entry.
//! A runtime drops its key before calling
//! [`SceneCache::prepare_for_new_scene`], so eviction decisions depend
//! only on cache membership.
//!
//! # Budget
//!
//! A [`CacheBudget`] limits slot count, estimated bytes, or both. The
//! cache evicts while either limit would be exceeded.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod entry;
pub mod estimate;
pub mod fs;

pub use cache::{CacheStats, InsertOutcome, SceneCache, SharedSceneCache};
pub use config::CacheBudget;
pub use entry::CacheEntry;
pub use estimate::{estimate_scene_bytes, MISSING_TEXTURE_BYTES};
pub use fs::{MemoryFs, ResourceTracker};
