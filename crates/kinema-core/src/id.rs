//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a loaded scene in the resource cache.
///
/// Scene keys are the scene's asset path as requested by the host
/// (for example `"main/go2/scene.xml"`). Two loads with the same key
/// always resolve to the same cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneKey(String);

impl SceneKey {
    /// Create a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneKey {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for SceneKey {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Identifies a rigid body within a loaded model.
///
/// `BodyId(n)` is the n-th entry of the model's body table. Body 0 is
/// the world body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl BodyId {
    /// Index into per-body arrays.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for BodyId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing control-tick counter.
///
/// Incremented once per completed control period (not per physics
/// substep). Reset to zero when a scene is loaded or reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
