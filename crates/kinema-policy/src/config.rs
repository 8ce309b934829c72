//! The policy configuration file.
//!
//! Policy configs are JSON documents written by the authoring tools
//! next to the network file. Only the fields the runtime consumes are
//! modelled; unknown fields are ignored.

use indexmap::IndexMap;
use kinema_command::CommandGroupSpec;
use kinema_core::ConfigError;
use kinema_obs::GroupDescriptor;
use serde::{Deserialize, Serialize};

/// Default control period when a config gives none.
pub const DEFAULT_CONTROL_DT: f64 = 0.02;

/// A gain or scale given as one number for every joint, or per joint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PerJoint {
    /// Same value for every joint.
    Uniform(f64),
    /// One value per policy joint.
    Each(Vec<f64>),
}

impl PerJoint {
    /// Expand to exactly `n` values.
    pub fn expand(&self, n: usize, field: &str) -> Result<Vec<f64>, ConfigError> {
        let values = match self {
            Self::Uniform(v) => vec![*v; n],
            Self::Each(v) if v.len() == n => v.clone(),
            Self::Each(v) => {
                return Err(ConfigError::LengthMismatch {
                    field: field.to_string(),
                    expected: n,
                    got: v.len(),
                })
            }
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                owner: field.to_string(),
                reason: "values must be finite".into(),
            });
        }
        Ok(values)
    }
}

/// How actions become actuator controls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    /// PD control toward `default + scale * action`.
    #[default]
    Position,
    /// `scale * action` passed straight to the actuator.
    Torque,
}

/// Input and output tensor names of the network.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMeta {
    /// Input names fed each tick.
    #[serde(default)]
    pub in_keys: Vec<String>,
    /// Output names read back; the first one is the action.
    #[serde(default)]
    pub out_keys: Vec<String>,
}

/// Reference to the network file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkRef {
    /// Asset path, relative to the asset root.
    pub path: String,
    /// Declared I/O names.
    #[serde(default)]
    pub meta: NetworkMeta,
}

/// Selection of a behavior module and its parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDescriptor {
    /// Registry key.
    pub name: String,
    /// Module-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A parsed policy configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Names of the joints the policy controls, in action order.
    pub policy_joint_names: Vec<String>,
    /// Default joint positions, in policy joint order.
    pub default_joint_pos: Vec<f64>,
    /// Action scale.
    #[serde(default = "unit_scale")]
    pub action_scale: PerJoint,
    /// Control law.
    #[serde(default)]
    pub control_type: ControlType,
    /// Proportional gains (position control).
    #[serde(default = "zero_gain")]
    pub stiffness: PerJoint,
    /// Derivative gains (position control).
    #[serde(default = "zero_gain")]
    pub damping: PerJoint,
    /// Control period in seconds.
    #[serde(default)]
    pub control_dt: Option<f64>,
    /// Observation groups keyed by inference input name.
    #[serde(default)]
    pub obs_config: IndexMap<String, GroupDescriptor>,
    /// Command groups this policy exposes.
    #[serde(default)]
    pub commands: IndexMap<String, CommandGroupSpec>,
    /// The network.
    pub onnx: NetworkRef,
    /// Optional behavior module.
    #[serde(default)]
    pub policy_module: Option<BehaviorDescriptor>,
}

fn unit_scale() -> PerJoint {
    PerJoint::Uniform(1.0)
}

fn zero_gain() -> PerJoint {
    PerJoint::Uniform(0.0)
}

impl PolicyConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Number of policy joints, which is also the action width.
    pub fn num_joints(&self) -> usize {
        self.policy_joint_names.len()
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.num_joints();
        if n == 0 {
            return Err(ConfigError::MissingField {
                field: "policy_joint_names".into(),
            });
        }
        if self.default_joint_pos.len() != n {
            return Err(ConfigError::LengthMismatch {
                field: "default_joint_pos".into(),
                expected: n,
                got: self.default_joint_pos.len(),
            });
        }
        self.action_scale.expand(n, "action_scale")?;
        self.stiffness.expand(n, "stiffness")?;
        self.damping.expand(n, "damping")?;
        if let Some(dt) = self.control_dt {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    owner: "control_dt".into(),
                    reason: format!("must be positive, got {dt}"),
                });
            }
        }
        if self.obs_config.is_empty() {
            return Err(ConfigError::MissingField {
                field: "obs_config".into(),
            });
        }
        if self.onnx.path.is_empty() {
            return Err(ConfigError::MissingField {
                field: "onnx.path".into(),
            });
        }
        Ok(())
    }

    /// The control period, falling back to `fallback`.
    pub fn control_dt_or(&self, fallback: f64) -> f64 {
        self.control_dt.unwrap_or(fallback)
    }
}

/// Physics substeps per control tick: `control_dt / timestep`, rounded,
/// at least 1.
///
/// ```
/// use kinema_policy::decimation;
///
/// assert_eq!(decimation(0.02, 0.005), 4);
/// assert_eq!(decimation(0.02, 0.006), 3);
/// assert_eq!(decimation(0.001, 0.005), 1);
/// ```
pub fn decimation(control_dt: f64, timestep: f64) -> usize {
    if !(timestep > 0.0) || !control_dt.is_finite() {
        return 1;
    }
    ((control_dt / timestep).round() as usize).max(1)
}
