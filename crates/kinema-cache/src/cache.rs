//! The scene resource cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use indexmap::IndexMap;
use kinema_core::{ConfigError, SceneKey, VirtualFs};

use crate::config::CacheBudget;
use crate::entry::CacheEntry;
use crate::fs::MemoryFs;

/// Result of [`SceneCache::set`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry was inserted; these keys were evicted to make it fit.
    Inserted {
        /// Evicted keys, least recently used first.
        evicted: Vec<SceneKey>,
    },
    /// The key was already cached. The offered entry was disposed and
    /// the cached one kept.
    KeptExisting,
}

/// Running counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` calls that found an entry.
    pub hits: u64,
    /// `get` calls that found nothing.
    pub misses: u64,
    /// Entries inserted.
    pub inserts: u64,
    /// Offered entries disposed because the key was present.
    pub rejected: u64,
    /// Entries evicted.
    pub evictions: u64,
}

/// Keyed store of per-scene resources under a [`CacheBudget`].
///
/// The cache is the only owner of cached resources; callers refer to a
/// scene by [`SceneKey`]. Access order is a logical clock bumped on
/// every insert and [`get`](Self::get), so least-recently-used order is
/// exact and deterministic. Ties on last access fall back to insertion
/// order.
///
/// Eviction disposes the simulation handle and render graph, and removes
/// the scene's tracked files from the virtual filesystem. Scenes that
/// share a directory share files; each file is counted once per resident
/// scene and removed only when its last owner leaves.
pub struct SceneCache {
    entries: IndexMap<SceneKey, CacheEntry>,
    budget: CacheBudget,
    clock: u64,
    vfs: Box<dyn VirtualFs>,
    owners: HashMap<String, usize>,
    stats: CacheStats,
}

impl SceneCache {
    /// An empty cache over an in-memory filesystem.
    pub fn new(budget: CacheBudget) -> Result<Self, ConfigError> {
        Self::with_vfs(budget, Box::new(MemoryFs::new()))
    }

    /// An empty cache that removes evicted files from `vfs`.
    pub fn with_vfs(budget: CacheBudget, vfs: Box<dyn VirtualFs>) -> Result<Self, ConfigError> {
        budget.validate()?;
        Ok(Self {
            entries: IndexMap::new(),
            budget,
            clock: 0,
            vfs,
            owners: HashMap::new(),
            stats: CacheStats::default(),
        })
    }

    /// The budget.
    pub fn budget(&self) -> CacheBudget {
        self.budget
    }

    /// Change the budget. Takes effect at the next load or insert.
    pub fn set_budget(&mut self, budget: CacheBudget) -> Result<(), ConfigError> {
        budget.validate()?;
        self.budget = budget;
        Ok(())
    }

    /// Number of resident scenes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of resident estimates.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(CacheEntry::bytes).sum()
    }

    /// Resident keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &SceneKey> {
        self.entries.keys()
    }

    /// Counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The filesystem scene loads write into.
    pub fn vfs(&self) -> &dyn VirtualFs {
        self.vfs.as_ref()
    }

    /// The filesystem scene loads write into, mutably.
    pub fn vfs_mut(&mut self) -> &mut dyn VirtualFs {
        self.vfs.as_mut()
    }

    /// Number of resident scenes whose tracked files include `path`.
    pub fn file_owners(&self, path: &str) -> usize {
        self.owners.get(path).copied().unwrap_or(0)
    }

    /// Whether `key` is cached.
    pub fn has(&self, key: &SceneKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&mut self, key: &SceneKey) -> Option<&mut CacheEntry> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.clock += 1;
                entry.last_accessed = self.clock;
                self.stats.hits += 1;
                Some(entry)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up `key` without touching access order.
    pub fn peek(&self, key: &SceneKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Mutable lookup without touching access order.
    pub fn peek_mut(&mut self, key: &SceneKey) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    /// Size assumed for a scene that is about to load: the mean of the
    /// resident estimates, or zero when nothing is resident.
    pub fn projected_incoming_bytes(&self) -> usize {
        match self.entries.len() {
            0 => 0,
            n => self.total_bytes() / n,
        }
    }

    /// Make room for one more scene.
    ///
    /// Evicts least-recently-used entries until one more scene of the
    /// projected size fits both limits, or the cache is empty. Callers
    /// must drop their own references to cached scenes first.
    pub fn prepare_for_new_scene(&mut self) -> Vec<SceneKey> {
        let incoming = self.projected_incoming_bytes();
        let mut evicted = Vec::new();
        while !self.entries.is_empty()
            && self
                .budget
                .exceeded_by(self.entries.len() + 1, self.total_bytes() + incoming)
        {
            match self.evict_lru(None) {
                Some(key) => evicted.push(key),
                None => break,
            }
        }
        evicted
    }

    /// Insert a fully constructed entry.
    ///
    /// An existing entry for `key` is never replaced. After inserting,
    /// other entries are evicted until the budget holds again; the new
    /// entry itself is never evicted by its own insert.
    pub fn set(&mut self, key: SceneKey, mut entry: CacheEntry) -> InsertOutcome {
        if self.entries.contains_key(&key) {
            tracing::debug!(scene = %key, "scene already cached, discarding duplicate load");
            let paths = entry.dispose();
            self.remove_unowned(&paths);
            self.stats.rejected += 1;
            return InsertOutcome::KeptExisting;
        }
        for path in entry.tracked_paths() {
            *self.owners.entry(path.clone()).or_insert(0) += 1;
        }
        self.clock += 1;
        entry.loaded_at = self.clock;
        entry.last_accessed = self.clock;
        tracing::debug!(
            scene = %key,
            bytes = entry.bytes(),
            files = entry.tracked_paths().len(),
            "cached scene"
        );
        self.entries.insert(key.clone(), entry);
        self.stats.inserts += 1;

        let mut evicted = Vec::new();
        while self.budget.exceeded_by(self.entries.len(), self.total_bytes()) {
            match self.evict_lru(Some(&key)) {
                Some(k) => evicted.push(k),
                None => break,
            }
        }
        InsertOutcome::Inserted { evicted }
    }

    /// Evict one scene by key.
    pub fn evict(&mut self, key: &SceneKey) -> bool {
        match self.entries.shift_remove(key) {
            Some(entry) => {
                self.dispose(key, entry);
                true
            }
            None => false,
        }
    }

    /// Evict everything.
    pub fn clear(&mut self) {
        while let Some((key, entry)) = self.entries.pop() {
            self.dispose(&key, entry);
        }
    }

    fn evict_lru(&mut self, protect: Option<&SceneKey>) -> Option<SceneKey> {
        let victim = self
            .entries
            .iter()
            .filter(|(k, _)| Some(*k) != protect)
            .min_by_key(|(_, e)| (e.last_accessed, e.loaded_at))
            .map(|(k, _)| k.clone())?;
        self.evict(&victim);
        Some(victim)
    }

    fn dispose(&mut self, key: &SceneKey, entry: CacheEntry) {
        tracing::debug!(
            scene = %key,
            bytes = entry.bytes(),
            files = entry.tracked_paths().len(),
            "evicted scene"
        );
        let paths = entry.dispose();
        for path in &paths {
            if let Some(n) = self.owners.get_mut(path) {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    self.owners.remove(path);
                }
            }
        }
        self.remove_unowned(&paths);
        self.stats.evictions += 1;
    }

    fn remove_unowned(&mut self, paths: &[String]) {
        for path in paths {
            if self.owners.contains_key(path) {
                continue;
            }
            if let Err(e) = self.vfs.remove_file(path) {
                tracing::warn!(path = %path, error = %e, "tracked file already gone");
            }
        }
    }
}

impl Drop for SceneCache {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for SceneCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneCache")
            .field("budget", &self.budget)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("total_bytes", &self.total_bytes())
            .field("stats", &self.stats)
            .finish()
    }
}

// ── Shared handle ──────────────────────────────────────────────────

/// Cloneable handle to a [`SceneCache`] shared between runtimes.
#[derive(Clone, Debug)]
pub struct SharedSceneCache(Arc<Mutex<SceneCache>>);

impl SharedSceneCache {
    /// Share `cache`.
    pub fn new(cache: SceneCache) -> Self {
        Self(Arc::new(Mutex::new(cache)))
    }

    /// Lock the cache. A poisoned lock is recovered; every cache
    /// operation leaves the entry map consistent.
    pub fn lock(&self) -> MutexGuard<'_, SceneCache> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether two handles refer to the same cache.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

static GLOBAL: OnceLock<SharedSceneCache> = OnceLock::new();

impl SceneCache {
    /// The process-wide cache with the default budget, created on first
    /// use.
    pub fn global() -> SharedSceneCache {
        GLOBAL
            .get_or_init(|| {
                SharedSceneCache::new(Self {
                    entries: IndexMap::new(),
                    budget: CacheBudget::default(),
                    clock: 0,
                    vfs: Box::new(MemoryFs::new()),
                    owners: HashMap::new(),
                    stats: CacheStats::default(),
                })
            })
            .clone()
    }
}
