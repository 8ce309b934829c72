//! Pluggable behavior modules.
//!
//! A behavior module supplies per-tick context that is neither
//! simulation state nor a user command: a reference trajectory for
//! motion tracking, or a gait clock. Modules are selected by name from
//! the policy config and resolved when the policy loads.

use indexmap::IndexMap;
use kinema_core::{ConfigError, PolicyState};
use kinema_obs::TrackingSample;
use serde::Deserialize;

/// Per-policy strategy advanced once per control tick.
pub trait BehaviorModule: Send {
    /// Registry name.
    fn name(&self) -> &str;

    /// Advance by one control tick.
    fn update(&mut self, state: &PolicyState);

    /// Return to the initial condition.
    fn reset(&mut self, state: &PolicyState);

    /// Reference sample at the current cursor, if the module tracks a
    /// trajectory that has data.
    fn tracking(&self) -> Option<TrackingSample<'_>> {
        None
    }

    /// Current gait phase in radians, if the module keeps one.
    fn phase(&self) -> Option<f32> {
        None
    }
}

/// Dimensions and timing a module may need at construction.
#[derive(Clone, Copy, Debug)]
pub struct BehaviorContext {
    /// Number of policy joints.
    pub num_joints: usize,
    /// Control period in seconds.
    pub control_dt: f64,
}

fn parse_params<T: for<'de> Deserialize<'de>>(
    owner: &str,
    params: &serde_json::Value,
) -> Result<T, ConfigError> {
    let value = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|e| ConfigError::InvalidParameter {
        owner: owner.to_string(),
        reason: e.to_string(),
    })
}

// ── Motion tracking ────────────────────────────────────────────────

#[derive(Deserialize)]
struct MotionTrackingParams {
    #[serde(default)]
    joint_pos: Vec<Vec<f32>>,
    #[serde(default)]
    root_pos: Vec<[f32; 3]>,
    #[serde(default, rename = "loop")]
    looping: bool,
}

/// Follows a reference trajectory, one frame per control tick.
///
/// The cursor is clamped to the last frame unless `loop` is set. An
/// empty trajectory yields no tracking sample, so tracking observations
/// read as zeros.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionTracking {
    joint_pos: Vec<Vec<f32>>,
    root_pos: Vec<[f32; 3]>,
    looping: bool,
    cursor: usize,
}

impl MotionTracking {
    /// Build from per-frame joint positions and optional root positions.
    pub fn new(
        joint_pos: Vec<Vec<f32>>,
        root_pos: Vec<[f32; 3]>,
        looping: bool,
        num_joints: usize,
    ) -> Result<Self, ConfigError> {
        if let Some(bad) = joint_pos.iter().find(|f| f.len() != num_joints) {
            return Err(ConfigError::LengthMismatch {
                field: "motion_tracking.joint_pos".into(),
                expected: num_joints,
                got: bad.len(),
            });
        }
        if !root_pos.is_empty() && root_pos.len() != joint_pos.len() {
            return Err(ConfigError::LengthMismatch {
                field: "motion_tracking.root_pos".into(),
                expected: joint_pos.len(),
                got: root_pos.len(),
            });
        }
        Ok(Self {
            joint_pos,
            root_pos,
            looping,
            cursor: 0,
        })
    }

    fn from_params(
        params: &serde_json::Value,
        ctx: &BehaviorContext,
    ) -> Result<Box<dyn BehaviorModule>, ConfigError> {
        let p: MotionTrackingParams = parse_params("motion_tracking", params)?;
        Ok(Box::new(Self::new(
            p.joint_pos,
            p.root_pos,
            p.looping,
            ctx.num_joints,
        )?))
    }

    /// Current frame index.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of reference frames.
    pub fn len(&self) -> usize {
        self.joint_pos.len()
    }

    /// Whether the trajectory has no frames.
    pub fn is_empty(&self) -> bool {
        self.joint_pos.is_empty()
    }
}

impl BehaviorModule for MotionTracking {
    fn name(&self) -> &str {
        "motion_tracking"
    }

    fn update(&mut self, _state: &PolicyState) {
        let len = self.len();
        if len == 0 {
            return;
        }
        self.cursor = if self.looping {
            (self.cursor + 1) % len
        } else {
            (self.cursor + 1).min(len - 1)
        };
    }

    fn reset(&mut self, _state: &PolicyState) {
        self.cursor = 0;
    }

    fn tracking(&self) -> Option<TrackingSample<'_>> {
        let joint_pos = self.joint_pos.get(self.cursor)?;
        Some(TrackingSample {
            joint_pos,
            root_pos: self.root_pos.get(self.cursor).copied(),
        })
    }
}

// ── Gait clock ─────────────────────────────────────────────────────

fn default_period() -> f64 {
    0.8
}

#[derive(Deserialize)]
struct GaitClockParams {
    #[serde(default = "default_period")]
    period: f64,
}

/// A phase oscillator advancing `2π · dt / period` per tick.
#[derive(Clone, Debug, PartialEq)]
pub struct GaitClock {
    step: f64,
    phase: f64,
}

impl GaitClock {
    /// A clock with the given period, ticking every `control_dt`.
    pub fn new(period: f64, control_dt: f64) -> Result<Self, ConfigError> {
        if !(period.is_finite() && period > 0.0) {
            return Err(ConfigError::InvalidParameter {
                owner: "gait_clock".into(),
                reason: format!("period must be positive, got {period}"),
            });
        }
        Ok(Self {
            step: std::f64::consts::TAU * control_dt / period,
            phase: 0.0,
        })
    }

    fn from_params(
        params: &serde_json::Value,
        ctx: &BehaviorContext,
    ) -> Result<Box<dyn BehaviorModule>, ConfigError> {
        let p: GaitClockParams = parse_params("gait_clock", params)?;
        Ok(Box::new(Self::new(p.period, ctx.control_dt)?))
    }
}

impl BehaviorModule for GaitClock {
    fn name(&self) -> &str {
        "gait_clock"
    }

    fn update(&mut self, _state: &PolicyState) {
        self.phase = (self.phase + self.step) % std::f64::consts::TAU;
    }

    fn reset(&mut self, _state: &PolicyState) {
        self.phase = 0.0;
    }

    fn phase(&self) -> Option<f32> {
        Some(self.phase as f32)
    }
}

// ── Registry ───────────────────────────────────────────────────────

/// Constructor for one behavior module key.
pub type BehaviorConstructor =
    fn(&serde_json::Value, &BehaviorContext) -> Result<Box<dyn BehaviorModule>, ConfigError>;

/// Maps behavior module names to constructors.
#[derive(Clone, Debug)]
pub struct BehaviorRegistry {
    constructors: IndexMap<String, BehaviorConstructor>,
}

impl BehaviorRegistry {
    /// A registry holding `motion_tracking` and `gait_clock`.
    pub fn builtin() -> Self {
        let mut r = Self {
            constructors: IndexMap::new(),
        };
        r.register("motion_tracking", MotionTracking::from_params);
        r.register("gait_clock", GaitClock::from_params);
        r
    }

    /// Add or replace a constructor.
    pub fn register(&mut self, name: &str, ctor: BehaviorConstructor) {
        self.constructors.insert(name.to_string(), ctor);
    }

    /// Build the named module.
    pub fn build(
        &self,
        name: &str,
        params: &serde_json::Value,
        ctx: &BehaviorContext,
    ) -> Result<Box<dyn BehaviorModule>, ConfigError> {
        let ctor = self
            .constructors
            .get(name)
            .ok_or_else(|| ConfigError::UnknownBehavior {
                name: name.to_string(),
            })?;
        ctor(params, ctx)
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
