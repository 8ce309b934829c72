//! A policy bound to one loaded scene.

use kinema_command::CommandValues;
use kinema_core::{
    ConfigError, InferenceError, InferenceFuture, InferenceSession, ModelLayout, NamedTensors,
    ObsError, PolicyState, SimState,
};
use kinema_obs::ComponentRegistry;

use crate::behavior::BehaviorRegistry;
use crate::binding::InferenceBinding;
use crate::config::{decimation, PolicyConfig};
use crate::control::ControlMapping;
use crate::extractor::PolicyStateExtractor;
use crate::pipeline::{Observations, PipelineInput, PolicyPipeline};

/// Everything derived from a [`PolicyConfig`] once it meets a scene and
/// an inference session.
///
/// Construction performs every load-time check: joint names, per-joint
/// parameters, component and behavior names, and the network's declared
/// I/O. A scene without matching actuators binds but receives no controls. After
/// `bind` succeeds, per-tick calls can only fail transiently.
pub struct BoundPolicy {
    config: PolicyConfig,
    extractor: PolicyStateExtractor,
    mapping: ControlMapping,
    pipeline: PolicyPipeline,
    binding: InferenceBinding,
    session: Box<dyn InferenceSession>,
    control_dt: f64,
    decimation: usize,
}

impl BoundPolicy {
    /// Resolve `config` against `layout` and `session`.
    ///
    /// `fallback_dt` is used when the config gives no control period.
    pub fn bind(
        config: PolicyConfig,
        layout: &ModelLayout,
        session: Box<dyn InferenceSession>,
        components: &ComponentRegistry,
        behaviors: &BehaviorRegistry,
        fallback_dt: f64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let control_dt = config.control_dt_or(fallback_dt);
        let extractor = PolicyStateExtractor::new(layout, &config.policy_joint_names)?;
        let mapping = ControlMapping::new(&config, &extractor, layout)?;
        let pipeline = PolicyPipeline::from_config(&config, components, behaviors, control_dt)?;
        let binding = InferenceBinding::new(
            session.as_ref(),
            &config.onnx.meta,
            &pipeline.group_sizes(),
            config.num_joints(),
        )?;
        Ok(Self {
            decimation: decimation(control_dt, layout.timestep),
            config,
            extractor,
            mapping,
            pipeline,
            binding,
            session,
            control_dt,
        })
    }

    /// The parsed config.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// The bound extractor.
    pub fn extractor(&self) -> &PolicyStateExtractor {
        &self.extractor
    }

    /// The control mapping.
    pub fn mapping(&self) -> &ControlMapping {
        &self.mapping
    }

    /// The observation pipeline.
    pub fn pipeline(&self) -> &PolicyPipeline {
        &self.pipeline
    }

    /// The inference binding.
    pub fn binding(&self) -> &InferenceBinding {
        &self.binding
    }

    /// Control period in seconds.
    pub fn control_dt(&self) -> f64 {
        self.control_dt
    }

    /// Physics substeps per control tick.
    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Width of the action vector.
    pub fn action_len(&self) -> usize {
        self.binding.action_len()
    }

    /// Snapshot the policy-relevant state.
    pub fn extract(&self, state: &SimState) -> PolicyState {
        self.extractor.extract(state)
    }

    /// Advance the pipeline one tick.
    pub fn observe(
        &mut self,
        state: &PolicyState,
        last_action: &[f32],
        commands: &CommandValues,
    ) -> Result<Observations, ObsError> {
        self.pipeline.observe(&PipelineInput {
            state,
            last_action,
            commands,
        })
    }

    /// Start one inference call on `observations`.
    pub fn request(&self, observations: &Observations) -> Result<InferenceFuture, InferenceError> {
        let inputs = self.binding.assemble(observations)?;
        Ok(self.session.run(inputs))
    }

    /// Adopt a completed response; returns the new action.
    pub fn accept(&mut self, outputs: NamedTensors) -> Result<Vec<f32>, InferenceError> {
        self.binding.absorb(outputs)
    }

    /// Write controls for `action` into `state`.
    pub fn apply(&self, action: &[f32], state: &mut SimState) {
        self.mapping.apply(action, state);
    }

    /// Clear recurrent state and reseed the pipeline from `state` with a
    /// zero previous action.
    pub fn reset(
        &mut self,
        state: &SimState,
        commands: &CommandValues,
    ) -> Result<Observations, ObsError> {
        self.binding.reset();
        let snapshot = self.extractor.extract(state);
        let zeros = vec![0.0; self.action_len()];
        self.pipeline.reset(&PipelineInput {
            state: &snapshot,
            last_action: &zeros,
            commands,
        })
    }
}

impl std::fmt::Debug for BoundPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundPolicy")
            .field("joints", &self.config.policy_joint_names)
            .field("control_dt", &self.control_dt)
            .field("decimation", &self.decimation)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use kinema_core::{SimModel, Tensor};
    use kinema_test_utils::inference::{spec, MockSession};
    use kinema_test_utils::layouts;
    use kinema_test_utils::physics::MockModel;

    fn config_text(out_keys: &str) -> String {
        format!(
            r#"{{
                "policy_joint_names": ["FL_hip", "FL_thigh", "FL_calf"],
                "default_joint_pos": [0.0, 0.8, -1.5],
                "action_scale": 0.25,
                "stiffness": 20.0,
                "damping": 0.5,
                "obs_config": {{"policy": [
                    "BaseAngularVelocity", "ProjectedGravity", "JointPositions"
                ]}},
                "onnx": {{"path": "policy.onnx", "meta": {{"in_keys": ["policy"], "out_keys": {out_keys}}}}}
            }}"#
        )
    }

    fn session() -> Box<dyn InferenceSession> {
        Box::new(
            MockSession::new(vec![spec("policy", &[1, 9])], vec![spec("action", &[1, 3])])
                .with_response(vec![0.4, 0.0, -0.4]),
        )
    }

    fn bind(text: &str, session: Box<dyn InferenceSession>) -> Result<BoundPolicy, ConfigError> {
        BoundPolicy::bind(
            PolicyConfig::from_json(text)?,
            &layouts::quadruped(),
            session,
            &ComponentRegistry::builtin(),
            &BehaviorRegistry::builtin(),
            0.02,
        )
    }

    #[test]
    fn bind_derives_decimation() {
        let p = bind(&config_text(r#"["action"]"#), session()).unwrap();
        assert_eq!(p.decimation(), 4);
        assert_eq!(p.action_len(), 3);
        assert_eq!(p.pipeline().group_sizes()["policy"], 9);
    }

    #[test]
    fn bind_rejects_unknown_output() {
        let err = bind(&config_text(r#"["logits"]"#), session()).unwrap_err();
        assert!(matches!(err, ConfigError::InferenceBinding { .. }));
    }

    #[test]
    fn observe_request_accept_round() {
        let mut p = bind(&config_text(r#"["action"]"#), session()).unwrap();
        let model = MockModel::new(layouts::quadruped());
        let mut sim = model.new_state();
        model.forward(&mut sim);
        let commands = CommandValues::new();

        let obs = p.reset(&sim, &commands).unwrap();
        assert_eq!(obs["policy"].len(), 9);

        let snap = p.extract(&sim);
        let obs = p.observe(&snap, &[0.0; 3], &commands).unwrap();
        let outputs = p.request(&obs).unwrap().now_or_never().unwrap().unwrap();
        let action = p.accept(outputs).unwrap();
        assert_eq!(action, vec![0.4, 0.0, -0.4]);

        p.apply(&action, &mut sim);
        // 20 * (0 + 0.25 * 0.4 - 0) = 2
        assert!((sim.ctrl[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn accept_rejects_wrong_width() {
        let mut p = bind(&config_text(r#"["action"]"#), session()).unwrap();
        let mut bad = NamedTensors::new();
        bad.insert("action".into(), Tensor::from_f32(&[1, 2], vec![0.0; 2]).unwrap());
        assert!(p.accept(bad).is_err());
    }
}
