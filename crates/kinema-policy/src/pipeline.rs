//! The policy execution pipeline.
//!
//! [`PolicyPipeline`] turns one [`PolicyState`] snapshot into one flat
//! observation vector per group. It owns the optional behavior module
//! and every observation group; it never runs inference.

use indexmap::IndexMap;
use kinema_command::CommandValues;
use kinema_core::{ConfigError, ObsError, PolicyState};
use kinema_obs::{BuildContext, ComponentRegistry, ObsFrame, ObservationGroup};

use crate::behavior::{BehaviorContext, BehaviorModule, BehaviorRegistry};
use crate::config::PolicyConfig;

/// Observation vectors keyed by group name, in config order.
pub type Observations = IndexMap<String, Vec<f32>>;

/// Per-tick inputs to the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct PipelineInput<'a> {
    /// This tick's snapshot.
    pub state: &'a PolicyState,
    /// Action applied during the previous tick.
    pub last_action: &'a [f32],
    /// Command values as of this tick.
    pub commands: &'a CommandValues,
}

/// Behavior module plus observation groups.
pub struct PolicyPipeline {
    behavior: Option<Box<dyn BehaviorModule>>,
    groups: IndexMap<String, ObservationGroup>,
    default_pose: Vec<f32>,
}

impl PolicyPipeline {
    /// Assemble from constructed parts.
    pub fn new(
        groups: Vec<ObservationGroup>,
        behavior: Option<Box<dyn BehaviorModule>>,
        default_pose: Vec<f32>,
    ) -> Self {
        let groups = groups
            .into_iter()
            .map(|g| (g.name().to_string(), g))
            .collect();
        Self {
            behavior,
            groups,
            default_pose,
        }
    }

    /// Build every group and the behavior module named by `config`.
    ///
    /// Unknown component or behavior names fail here, before any tick.
    pub fn from_config(
        config: &PolicyConfig,
        components: &ComponentRegistry,
        behaviors: &BehaviorRegistry,
        control_dt: f64,
    ) -> Result<Self, ConfigError> {
        let n = config.num_joints();
        let ctx = BuildContext {
            num_joints: n,
            num_actions: n,
            command_sizes: config
                .commands
                .iter()
                .map(|(name, spec)| (name.clone(), spec.slider_count()))
                .collect(),
        };
        let groups = config
            .obs_config
            .iter()
            .map(|(name, desc)| ObservationGroup::from_descriptor(name, desc, components, &ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let behavior = config
            .policy_module
            .as_ref()
            .map(|b| {
                behaviors.build(
                    &b.name,
                    &b.params,
                    &BehaviorContext {
                        num_joints: n,
                        control_dt,
                    },
                )
            })
            .transpose()?;
        let default_pose = config.default_joint_pos.iter().map(|&v| v as f32).collect();
        Ok(Self::new(groups, behavior, default_pose))
    }

    /// Output length of every group.
    pub fn group_sizes(&self) -> IndexMap<String, usize> {
        self.groups
            .iter()
            .map(|(name, g)| (name.clone(), g.size()))
            .collect()
    }

    /// A group by name.
    pub fn group(&self, name: &str) -> Option<&ObservationGroup> {
        self.groups.get(name)
    }

    /// The behavior module, if any.
    pub fn behavior(&self) -> Option<&dyn BehaviorModule> {
        self.behavior.as_deref()
    }

    /// Advance the behavior module and every component, then build each
    /// group's output.
    pub fn observe(&mut self, input: &PipelineInput<'_>) -> Result<Observations, ObsError> {
        if let Some(b) = &mut self.behavior {
            b.update(input.state);
        }
        self.build(input, false)
    }

    /// Reset the behavior module, then seed every component and group
    /// ring from this one snapshot.
    pub fn reset(&mut self, input: &PipelineInput<'_>) -> Result<Observations, ObsError> {
        if let Some(b) = &mut self.behavior {
            b.reset(input.state);
        }
        self.build(input, true)
    }

    fn build(&mut self, input: &PipelineInput<'_>, reset: bool) -> Result<Observations, ObsError> {
        let behavior = self.behavior.as_deref();
        let frame = ObsFrame {
            tracking: behavior.and_then(|b| b.tracking()),
            phase: behavior.and_then(|b| b.phase()),
            ..ObsFrame::new(input.state, input.last_action, input.commands, &self.default_pose)
        };
        let mut out = Observations::with_capacity(self.groups.len());
        for (name, group) in &mut self.groups {
            let values = if reset {
                group.reset(&frame)?
            } else {
                group.observe(&frame)?
            };
            out.insert(name.clone(), values.to_vec());
        }
        Ok(out)
    }
}

impl std::fmt::Debug for PolicyPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyPipeline")
            .field("behavior", &self.behavior.as_ref().map(|b| b.name()))
            .field("groups", &self.groups.values().collect::<Vec<_>>())
            .finish()
    }
}
