//! Component descriptors and the name → constructor registry.
//!
//! Observation configs name components by string. Every name is
//! resolved against a [`ComponentRegistry`] when the policy loads, so an
//! unknown name fails before the first tick.

use indexmap::IndexMap;
use kinema_core::ConfigError;
use serde::{Deserialize, Serialize};

use crate::component::{
    BaseAngularVelocity, BaseLinearVelocity, GaitPhase, GeneratedCommands, JointPositions,
    JointVelocities, LastAction, ObservationComponent, ProjectedGravity, TrackingJointPositions,
    TrackingRootOffset,
};
use crate::history::Windowed;
use crate::transform::{Affine, AffineParam, Scaled};

// ── Descriptor ─────────────────────────────────────────────────────

/// One component entry of an observation group config.
///
/// Accepts either a bare name (`"ProjectedGravity"`) or an object with
/// a `name` and optional parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "DescriptorRepr")]
pub struct ComponentDescriptor {
    /// Registry key.
    pub name: String,
    /// Wrap in a window of this many frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_steps: Option<usize>,
    /// Output scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<AffineParam>,
    /// Output bias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<AffineParam>,
    /// `JointPositions`: subtract the default pose (default `true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<bool>,
    /// `GeneratedCommands`: command group to read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        history_steps: Option<usize>,
        #[serde(default)]
        scale: Option<AffineParam>,
        #[serde(default)]
        bias: Option<AffineParam>,
        #[serde(default)]
        relative: Option<bool>,
        #[serde(default)]
        command_name: Option<String>,
    },
}

impl From<DescriptorRepr> for ComponentDescriptor {
    fn from(repr: DescriptorRepr) -> Self {
        match repr {
            DescriptorRepr::Name(name) => Self::new(name),
            DescriptorRepr::Full {
                name,
                history_steps,
                scale,
                bias,
                relative,
                command_name,
            } => Self {
                name,
                history_steps,
                scale,
                bias,
                relative,
                command_name,
            },
        }
    }
}

impl ComponentDescriptor {
    /// A descriptor with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history_steps: None,
            scale: None,
            bias: None,
            relative: None,
            command_name: None,
        }
    }

    /// Same descriptor with a history window.
    pub fn with_history(mut self, steps: usize) -> Self {
        self.history_steps = Some(steps);
        self
    }

    /// Same descriptor with a scalar scale.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(AffineParam::Scalar(scale));
        self
    }

    /// Same descriptor reading command group `group`.
    pub fn with_command(mut self, group: impl Into<String>) -> Self {
        self.command_name = Some(group.into());
        self
    }
}

// ── Build context ──────────────────────────────────────────────────

/// Dimensions a component needs to know its size at construction.
#[derive(Clone, Debug, Default)]
pub struct BuildContext {
    /// Number of policy joints.
    pub num_joints: usize,
    /// Width of one action vector.
    pub num_actions: usize,
    /// Slider count of every registered command group.
    pub command_sizes: IndexMap<String, usize>,
}

/// Constructor for one registry key, returning the instantaneous
/// component before any scale or window is applied.
pub type Constructor =
    fn(&ComponentDescriptor, &BuildContext) -> Result<Box<dyn ObservationComponent>, ConfigError>;

fn base_linear_velocity(
    _: &ComponentDescriptor,
    _: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(BaseLinearVelocity))
}

fn base_angular_velocity(
    _: &ComponentDescriptor,
    _: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(BaseAngularVelocity))
}

fn projected_gravity(
    _: &ComponentDescriptor,
    _: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(ProjectedGravity))
}

fn joint_positions(
    desc: &ComponentDescriptor,
    ctx: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(JointPositions::new(
        ctx.num_joints,
        desc.relative.unwrap_or(true),
    )))
}

fn joint_velocities(
    _: &ComponentDescriptor,
    ctx: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(JointVelocities::new(ctx.num_joints)))
}

fn prev_actions(
    _: &ComponentDescriptor,
    ctx: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(LastAction::new(ctx.num_actions)))
}

fn generated_commands(
    desc: &ComponentDescriptor,
    ctx: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    let group = desc
        .command_name
        .as_deref()
        .ok_or_else(|| ConfigError::MissingField {
            field: format!("{}.command_name", desc.name),
        })?;
    let n = ctx
        .command_sizes
        .get(group)
        .copied()
        .ok_or_else(|| ConfigError::InvalidParameter {
            owner: desc.name.clone(),
            reason: format!("unknown command group '{group}'"),
        })?;
    Ok(Box::new(GeneratedCommands::new(group, n)))
}

fn tracking_joint_positions(
    _: &ComponentDescriptor,
    ctx: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(TrackingJointPositions::new(ctx.num_joints)))
}

fn tracking_root_offset(
    _: &ComponentDescriptor,
    _: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(TrackingRootOffset))
}

fn gait_phase(
    _: &ComponentDescriptor,
    _: &BuildContext,
) -> Result<Box<dyn ObservationComponent>, ConfigError> {
    Ok(Box::new(GaitPhase))
}

// ── Registry ───────────────────────────────────────────────────────

/// Maps component names to constructors.
///
/// # Examples
///
/// ```
/// use kinema_obs::{BuildContext, ComponentDescriptor, ComponentRegistry};
///
/// let registry = ComponentRegistry::builtin();
/// let ctx = BuildContext { num_joints: 12, num_actions: 12, ..Default::default() };
///
/// let c = registry.build(&ComponentDescriptor::new("JointPositions"), &ctx).unwrap();
/// assert_eq!(c.size(), 12);
///
/// let windowed = ComponentDescriptor::new("ProjectedGravity").with_history(3);
/// assert_eq!(registry.build(&windowed, &ctx).unwrap().size(), 9);
///
/// assert!(registry.build(&ComponentDescriptor::new("Telepathy"), &ctx).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct ComponentRegistry {
    constructors: IndexMap<String, Constructor>,
}

impl ComponentRegistry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// A registry holding every built-in component.
    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register("BaseLinearVelocity", base_linear_velocity);
        r.register("BaseAngularVelocity", base_angular_velocity);
        r.register("ProjectedGravity", projected_gravity);
        r.register("JointPositions", joint_positions);
        r.register("JointVelocities", joint_velocities);
        r.register("PrevActions", prev_actions);
        r.register("GeneratedCommands", generated_commands);
        r.register("TrackingJointPositions", tracking_joint_positions);
        r.register("TrackingRootOffset", tracking_root_offset);
        r.register("GaitPhase", gait_phase);
        r
    }

    /// Add or replace a constructor.
    pub fn register(&mut self, name: &str, ctor: Constructor) {
        self.constructors.insert(name.to_string(), ctor);
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Build a component from its descriptor.
    ///
    /// Applies the scale/bias transform to the instantaneous value, then
    /// wraps it in a history window if `history_steps` is set.
    /// `PrevActions` is always windowed (one step by default).
    pub fn build(
        &self,
        desc: &ComponentDescriptor,
        ctx: &BuildContext,
    ) -> Result<Box<dyn ObservationComponent>, ConfigError> {
        let ctor = self
            .constructors
            .get(&desc.name)
            .ok_or_else(|| ConfigError::UnknownObservation {
                name: desc.name.clone(),
            })?;
        let mut component = ctor(desc, ctx)?;

        if desc.scale.is_some() || desc.bias.is_some() {
            let affine = Affine::new(
                desc.scale.as_ref(),
                desc.bias.as_ref(),
                component.size(),
                &desc.name,
            )?;
            component = Box::new(Scaled::new(component, affine));
        }

        let steps = match (desc.history_steps, desc.name.as_str()) {
            (Some(0), _) => {
                return Err(ConfigError::InvalidParameter {
                    owner: desc.name.clone(),
                    reason: "history_steps must be at least 1".into(),
                })
            }
            (Some(n), _) => Some(n),
            (None, "PrevActions") => Some(1),
            (None, _) => None,
        };
        if let Some(steps) = steps {
            component = Box::new(Windowed::new(component, steps));
        }
        Ok(component)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
