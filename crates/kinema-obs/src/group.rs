//! Observation groups: one flattened buffer per inference input.

use kinema_core::{ConfigError, ObsError};
use serde::{Deserialize, Serialize};

use crate::component::{compute_checked, ObservationComponent};
use crate::frame::ObsFrame;
use crate::history::HistoryRing;
use crate::registry::{BuildContext, ComponentDescriptor, ComponentRegistry};

/// Group-level history window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    /// Number of frames kept.
    pub steps: usize,
    /// Lay the output out component by component instead of frame by
    /// frame.
    #[serde(default)]
    pub interleaved: bool,
}

/// Config of one observation group.
///
/// Accepts either a bare list of components or an object with
/// `components` and an optional `history` window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "GroupRepr")]
pub struct GroupDescriptor {
    /// Components in output order.
    pub components: Vec<ComponentDescriptor>,
    /// Optional window over the whole group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryWindow>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupRepr {
    List(Vec<ComponentDescriptor>),
    Full {
        components: Vec<ComponentDescriptor>,
        #[serde(default)]
        history: Option<HistoryWindow>,
    },
}

impl From<GroupRepr> for GroupDescriptor {
    fn from(repr: GroupRepr) -> Self {
        match repr {
            GroupRepr::List(components) => Self {
                components,
                history: None,
            },
            GroupRepr::Full {
                components,
                history,
            } => Self {
                components,
                history,
            },
        }
    }
}

/// A named, ordered set of components producing one flat buffer.
///
/// Without a window the output is the concatenation of every
/// component's output. With a window the group keeps one flattened ring
/// of past concatenated frames, laid out `[t, t-1, ...]`; when
/// `interleaved` is set, the output instead lists each component's own
/// history contiguously (`[c0_t, c0_t-1, ..., c1_t, c1_t-1, ...]`).
pub struct ObservationGroup {
    name: String,
    components: Vec<Box<dyn ObservationComponent>>,
    offsets: Vec<usize>,
    frame_size: usize,
    window: Option<HistoryWindow>,
    ring: Option<HistoryRing>,
    output: Vec<f32>,
}

impl ObservationGroup {
    /// Build from already-constructed components.
    pub fn new(
        name: impl Into<String>,
        components: Vec<Box<dyn ObservationComponent>>,
        window: Option<HistoryWindow>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if components.is_empty() {
            return Err(ConfigError::InvalidParameter {
                owner: name,
                reason: "observation group has no components".into(),
            });
        }
        if let Some(w) = window {
            if w.steps == 0 {
                return Err(ConfigError::InvalidParameter {
                    owner: name,
                    reason: "history window steps must be at least 1".into(),
                });
            }
        }
        let mut offsets = Vec::with_capacity(components.len());
        let mut frame_size = 0;
        for c in &components {
            offsets.push(frame_size);
            frame_size += c.size();
        }
        let ring = window.map(|w| HistoryRing::new(frame_size, w.steps));
        let size = frame_size * window.map_or(1, |w| w.steps);
        Ok(Self {
            name,
            components,
            offsets,
            frame_size,
            window,
            ring,
            output: vec![0.0; size],
        })
    }

    /// Build from config, resolving every component name.
    pub fn from_descriptor(
        name: &str,
        desc: &GroupDescriptor,
        registry: &ComponentRegistry,
        ctx: &BuildContext,
    ) -> Result<Self, ConfigError> {
        let components = desc
            .components
            .iter()
            .map(|d| registry.build(d, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, components, desc.history)
    }

    /// Group name; also the inference input it feeds.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of one concatenated frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Length of the flattened output.
    pub fn size(&self) -> usize {
        self.output.len()
    }

    /// The group-level window, if any.
    pub fn window(&self) -> Option<HistoryWindow> {
        self.window
    }

    /// Names of the components, in output order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.name())
    }

    fn current_frame(&self, frame: &ObsFrame<'_>) -> Result<Vec<f32>, ObsError> {
        let mut buf = Vec::with_capacity(self.frame_size);
        for c in &self.components {
            buf.extend_from_slice(&compute_checked(c.as_ref(), frame)?);
        }
        Ok(buf)
    }

    fn write_output(&mut self, current: Vec<f32>) {
        let (Some(ring), Some(window)) = (&self.ring, self.window) else {
            self.output = current;
            return;
        };
        if !window.interleaved {
            self.output.copy_from_slice(ring.as_slice());
            return;
        }
        let mut pos = 0;
        for (c, &offset) in self.components.iter().zip(&self.offsets) {
            let width = c.size();
            for age in 0..window.steps {
                let src = &ring.frame(age)[offset..offset + width];
                self.output[pos..pos + width].copy_from_slice(src);
                pos += width;
            }
        }
    }

    /// Advance every component by one tick and rebuild the output.
    ///
    /// The group ring is only pushed once the whole frame is valid, but
    /// component-level history may already have advanced when this
    /// fails. A group that returned an error must be reset or dropped.
    pub fn observe(&mut self, frame: &ObsFrame<'_>) -> Result<&[f32], ObsError> {
        for c in &mut self.components {
            c.update(frame)?;
        }
        let current = self.current_frame(frame)?;
        if let Some(ring) = &mut self.ring {
            ring.push(&current);
        }
        self.write_output(current);
        Ok(&self.output)
    }

    /// Seed every component and the group ring from `frame`.
    pub fn reset(&mut self, frame: &ObsFrame<'_>) -> Result<&[f32], ObsError> {
        for c in &mut self.components {
            c.reset(frame)?;
        }
        let current = self.current_frame(frame)?;
        if let Some(ring) = &mut self.ring {
            ring.seed(&current);
        }
        self.write_output(current);
        Ok(&self.output)
    }

    /// The output as of the last `observe` or `reset`.
    pub fn output(&self) -> &[f32] {
        &self.output
    }
}

impl std::fmt::Debug for ObservationGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationGroup")
            .field("name", &self.name)
            .field("components", &self.component_names().collect::<Vec<_>>())
            .field("frame_size", &self.frame_size)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_command::CommandValues;
    use kinema_core::PolicyState;

    fn build(json: &str, joints: usize) -> ObservationGroup {
        let desc: GroupDescriptor = serde_json::from_str(json).unwrap();
        let ctx = BuildContext {
            num_joints: joints,
            num_actions: joints,
            ..Default::default()
        };
        ObservationGroup::from_descriptor("policy", &desc, &ComponentRegistry::builtin(), &ctx)
            .unwrap()
    }

    #[test]
    fn plain_group_concatenates_in_order() {
        let mut g = build(r#"["BaseLinearVelocity", "JointPositions"]"#, 12);
        assert_eq!(g.size(), 15);

        let mut state = PolicyState::neutral(12);
        state.root_lin_vel = [1.0, 2.0, 3.0];
        state.joint_pos = (0..12).map(|i| i as f32).collect();
        let cmds = CommandValues::new();
        let default_pose = vec![0.0; 12];
        let frame = ObsFrame::new(&state, &[], &cmds, &default_pose);

        let out = g.observe(&frame).unwrap().to_vec();
        assert_eq!(out.len(), 15);
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&out[3..], state.joint_pos.as_slice());
    }

    #[test]
    fn windowed_group_is_newest_first() {
        let mut g = build(
            r#"{"components": ["JointVelocities"], "history": {"steps": 3}}"#,
            2,
        );
        assert_eq!(g.frame_size(), 2);
        assert_eq!(g.size(), 6);

        let cmds = CommandValues::new();
        let mut state = PolicyState::neutral(2);
        state.joint_vel = vec![1.0, 1.0];
        g.reset(&ObsFrame::new(&state, &[], &cmds, &[])).unwrap();
        assert_eq!(g.output(), &[1.0; 6]);

        state.joint_vel = vec![2.0, 2.5];
        let out = g.observe(&ObsFrame::new(&state, &[], &cmds, &[])).unwrap();
        assert_eq!(out, &[2.0, 2.5, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn interleaved_group_is_component_major() {
        let mut g = build(
            r#"{"components": ["GaitPhase", "JointVelocities"], "history": {"steps": 2, "interleaved": true}}"#,
            1,
        );
        let cmds = CommandValues::new();
        let mut state = PolicyState::neutral(1);
        state.joint_vel = vec![7.0];
        g.reset(&ObsFrame::new(&state, &[], &cmds, &[])).unwrap();
        state.joint_vel = vec![8.0];
        let out = g.observe(&ObsFrame::new(&state, &[], &cmds, &[])).unwrap();
        // GaitPhase reads zero without a phase source.
        assert_eq!(out, &[0.0, 0.0, 0.0, 0.0, 8.0, 7.0]);
    }

    #[test]
    fn empty_group_rejected() {
        let err = ObservationGroup::new("policy", Vec::new(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));
    }

    #[test]
    fn wrong_length_fails_observe() {
        let mut g = build(r#"["JointPositions"]"#, 4);
        let cmds = CommandValues::new();
        let state = PolicyState::neutral(3);
        let err = g
            .observe(&ObsFrame::new(&state, &[], &cmds, &[]))
            .unwrap_err();
        assert_eq!(
            err,
            ObsError::LengthMismatch {
                component: "JointPositions".into(),
                declared: 4,
                computed: 3
            }
        );
    }

    #[test]
    fn failed_observe_leaves_window_untouched() {
        let mut g = build(
            r#"{"components": ["JointVelocities"], "history": {"steps": 2}}"#,
            2,
        );
        let cmds = CommandValues::new();
        let mut state = PolicyState::neutral(2);
        state.joint_vel = vec![1.0, 2.0];
        g.reset(&ObsFrame::new(&state, &[], &cmds, &[])).unwrap();

        state.joint_vel = vec![9.0];
        assert!(g.observe(&ObsFrame::new(&state, &[], &cmds, &[])).is_err());
        assert_eq!(g.output(), &[1.0, 2.0, 1.0, 2.0]);

        state.joint_vel = vec![3.0, 4.0];
        let out = g.observe(&ObsFrame::new(&state, &[], &cmds, &[])).unwrap();
        assert_eq!(out, &[3.0, 4.0, 1.0, 2.0]);
    }
}
