//! Runtime configuration.

use kinema_core::ConfigError;
use kinema_policy::DEFAULT_CONTROL_DT;

/// Settings for one [`Runtime`](crate::Runtime).
///
/// Per-policy settings (gains, control period) live in the policy
/// config; these apply to whatever policy and scene are loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Control period used when the policy config gives none, and for
    /// scenes running without a policy. Default: 0.02 s.
    pub control_dt: f64,
    /// Newtons per unit of screen offset for drag forces. Default: 250.
    pub drag_stiffness: f64,
    /// Log a warning when an inference call has been outstanding for
    /// this many ticks. Default: 50.
    pub inference_timeout_ticks: u64,
}

impl RuntimeConfig {
    /// Default drag stiffness.
    pub const DEFAULT_DRAG_STIFFNESS: f64 = 250.0;

    /// Default stall warning threshold.
    pub const DEFAULT_INFERENCE_TIMEOUT_TICKS: u64 = 50;

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.control_dt.is_finite() && self.control_dt > 0.0) {
            return Err(ConfigError::InvalidParameter {
                owner: "runtime.control_dt".into(),
                reason: format!("must be positive, got {}", self.control_dt),
            });
        }
        if !(self.drag_stiffness.is_finite() && self.drag_stiffness >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                owner: "runtime.drag_stiffness".into(),
                reason: format!("must be non-negative, got {}", self.drag_stiffness),
            });
        }
        if self.inference_timeout_ticks == 0 {
            return Err(ConfigError::InvalidParameter {
                owner: "runtime.inference_timeout_ticks".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            control_dt: DEFAULT_CONTROL_DT,
            drag_stiffness: Self::DEFAULT_DRAG_STIFFNESS,
            inference_timeout_ticks: Self::DEFAULT_INFERENCE_TIMEOUT_TICKS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
        assert_eq!(RuntimeConfig::default().control_dt, 0.02);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            RuntimeConfig {
                control_dt: 0.0,
                ..Default::default()
            },
            RuntimeConfig {
                control_dt: f64::NAN,
                ..Default::default()
            },
            RuntimeConfig {
                drag_stiffness: -1.0,
                ..Default::default()
            },
            RuntimeConfig {
                inference_timeout_ticks: 0,
                ..Default::default()
            },
        ];
        for c in bad {
            assert!(c.validate().is_err(), "{c:?}");
        }
    }
}
