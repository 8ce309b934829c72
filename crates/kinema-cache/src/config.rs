//! Cache budget.

use kinema_core::ConfigError;

/// Limits on what the cache may hold.
///
/// Either limit may be absent. When both are set, the cache evicts while
/// **either** one would be exceeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheBudget {
    /// Maximum number of resident scenes.
    pub max_entries: Option<usize>,
    /// Maximum estimated bytes across resident scenes.
    pub max_bytes: Option<usize>,
}

impl CacheBudget {
    /// Default slot limit.
    pub const DEFAULT_MAX_ENTRIES: usize = 5;

    /// Default byte limit: 512 MiB.
    pub const DEFAULT_MAX_BYTES: usize = 512 * 1024 * 1024;

    /// No limits at all.
    pub fn unbounded() -> Self {
        Self {
            max_entries: None,
            max_bytes: None,
        }
    }

    /// Only a slot limit.
    pub fn entries(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            max_bytes: None,
        }
    }

    /// Only a byte limit.
    pub fn bytes(max_bytes: usize) -> Self {
        Self {
            max_entries: None,
            max_bytes: Some(max_bytes),
        }
    }

    /// Reject zero limits, which could never hold a scene.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == Some(0) {
            return Err(ConfigError::InvalidParameter {
                owner: "cache.max_entries".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_bytes == Some(0) {
            return Err(ConfigError::InvalidParameter {
                owner: "cache.max_bytes".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Whether `entries` scenes totalling `bytes` exceed either limit.
    pub fn exceeded_by(&self, entries: usize, bytes: usize) -> bool {
        self.max_entries.is_some_and(|m| entries > m) || self.max_bytes.is_some_and(|m| bytes > m)
    }
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self {
            max_entries: Some(Self::DEFAULT_MAX_ENTRIES),
            max_bytes: Some(Self::DEFAULT_MAX_BYTES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn either_limit_triggers() {
        let b = CacheBudget {
            max_entries: Some(2),
            max_bytes: Some(100),
        };
        assert!(!b.exceeded_by(2, 100));
        assert!(b.exceeded_by(3, 10));
        assert!(b.exceeded_by(1, 101));
    }

    #[test]
    fn unbounded_never_exceeded() {
        assert!(!CacheBudget::unbounded().exceeded_by(usize::MAX, usize::MAX));
    }

    #[test]
    fn zero_limits_rejected() {
        assert!(CacheBudget::entries(0).validate().is_err());
        assert!(CacheBudget::bytes(0).validate().is_err());
        assert!(CacheBudget::default().validate().is_ok());
    }
}
