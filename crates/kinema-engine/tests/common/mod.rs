//! Shared fixtures for the runtime integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use kinema_cache::{CacheBudget, MemoryFs, SceneCache, SharedSceneCache};
use kinema_command::SharedCommandStore;
use kinema_engine::{Backends, Runtime, RuntimeConfig};
use kinema_test_utils::layouts::{self, QUADRUPED_JOINTS};
use kinema_test_utils::{spec, MemoryAssets, MockInference, MockPhysics, MockRenderer, MockSession};

pub const GO1_SCENE: &str = "main/assets/go1/scene.xml";
pub const GO1_POLICY: &str = "main/assets/go1/walk.json";
pub const PENDULUM_SCENE: &str = "main/assets/pendulum/scene.xml";
pub const PENDULUM_POLICY: &str = "main/assets/pendulum/swing.json";
pub const CARTPOLE_SCENE: &str = "main/assets/cartpole/scene.xml";

pub const GO1_XML: &str = "<mujoco model='go1'/>";
pub const PENDULUM_XML: &str = "<mujoco model='pendulum'/>";
pub const CARTPOLE_XML: &str = "<mujoco model='cartpole'/>";

/// Width of the `policy` group in [`walk_config`]:
/// 3 + 3 + 3 + 12 + 12 + 4 * 12.
pub const POLICY_OBS: usize = 81;

/// Offset of the `PrevActions` window inside the `policy` group.
pub const PREV_ACTIONS_AT: usize = 33;

/// Offset of the velocity command inside the `policy` group.
pub const COMMAND_AT: usize = 6;

/// A walking policy over all twelve quadruped joints.
pub fn walk_config() -> String {
    let names = QUADRUPED_JOINTS
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let pose = ["0.0", "0.8", "-1.5"].repeat(4).join(", ");
    format!(
        r#"{{
            "policy_joint_names": [{names}],
            "default_joint_pos": [{pose}],
            "action_scale": 0.25,
            "control_type": "position",
            "stiffness": 20.0,
            "damping": 0.5,
            "control_dt": 0.02,
            "obs_config": {{
                "policy": [
                    "BaseAngularVelocity",
                    "ProjectedGravity",
                    {{"name": "GeneratedCommands", "command_name": "velocity"}},
                    "JointPositions",
                    "JointVelocities",
                    {{"name": "PrevActions", "history_steps": 4}}
                ]
            }},
            "commands": {{
                "velocity": {{"inputs": [
                    {{"type": "slider", "name": "lin_vel_x", "label": "Forward", "min": -1.0, "max": 1.0, "default": 0.5}},
                    {{"type": "slider", "name": "lin_vel_y", "label": "Lateral", "min": -0.5, "max": 0.5, "default": 0.0}},
                    {{"type": "slider", "name": "ang_vel_z", "label": "Turn", "min": -1.0, "max": 1.0, "default": 0.0}},
                    {{"type": "button", "name": "reset", "label": "Reset"}}
                ]}}
            }},
            "onnx": {{"path": "walk.onnx", "meta": {{"in_keys": ["policy"], "out_keys": ["action"]}}}}
        }}"#
    )
}

/// Session matching [`walk_config`].
pub fn walk_session() -> MockSession {
    MockSession::new(
        vec![spec("policy", &[1, POLICY_OBS])],
        vec![spec("action", &[1, QUADRUPED_JOINTS.len()])],
    )
}

/// A policy over the pendulum's single unactuated hinge.
pub fn swing_config() -> String {
    r#"{
        "policy_joint_names": ["hinge"],
        "default_joint_pos": [0.0],
        "action_scale": 1.0,
        "control_type": "torque",
        "stiffness": 0.0,
        "damping": 0.0,
        "control_dt": 0.02,
        "obs_config": {"policy": ["JointPositions", "JointVelocities"]},
        "onnx": {"path": "swing.onnx", "meta": {"in_keys": ["policy"], "out_keys": ["action"]}}
    }"#
    .to_string()
}

/// Session matching [`swing_config`].
pub fn swing_session() -> MockSession {
    MockSession::new(vec![spec("policy", &[1, 2])], vec![spec("action", &[1, 1])])
}

/// Mocks plus the shared state a runtime loads into.
pub struct Rig {
    pub physics: MockPhysics,
    pub renderer: MockRenderer,
    pub inference: MockInference,
    pub assets: MemoryAssets,
    pub cache: SharedSceneCache,
    pub commands: SharedCommandStore,
}

impl Rig {
    pub fn new(session: MockSession) -> Self {
        Self::with_budget(session, CacheBudget::default())
    }

    pub fn with_budget(session: MockSession, budget: CacheBudget) -> Self {
        let physics = MockPhysics::new()
            .with_model(GO1_XML, layouts::quadruped())
            .with_model(PENDULUM_XML, layouts::passive_pendulum())
            .with_model(CARTPOLE_XML, layouts::passive_pendulum())
            .require_asset(GO1_XML, "main/assets/go1/meshes/trunk.obj");
        let assets = MemoryAssets::new()
            .with_file(GO1_SCENE, GO1_XML)
            .with_file("main/assets/go1/meshes/trunk.obj", vec![7u8; 256])
            .with_file("main/assets/go1/textures/grid.png", vec![3u8; 64])
            .with_file(GO1_POLICY, walk_config())
            .with_file("main/assets/go1/walk.onnx", vec![1u8; 32])
            .with_file(PENDULUM_SCENE, PENDULUM_XML)
            .with_file(PENDULUM_POLICY, swing_config())
            .with_file("main/assets/pendulum/swing.onnx", vec![2u8; 16])
            .with_file(CARTPOLE_SCENE, CARTPOLE_XML);
        let cache = SceneCache::with_vfs(budget, Box::new(MemoryFs::new())).unwrap();
        Self {
            physics,
            renderer: MockRenderer::new(),
            inference: MockInference::new(session),
            assets,
            cache: SharedSceneCache::new(cache),
            commands: SharedCommandStore::new(),
        }
    }

    /// Replace or add an asset.
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.assets = self.assets.with_file(path, data);
        self
    }

    pub fn runtime(&self) -> Runtime {
        let backends = Backends {
            physics: Arc::new(self.physics.clone()),
            inference: Arc::new(self.inference.clone()),
            renderer: Arc::new(self.renderer.clone()),
            assets: Arc::new(self.assets.clone()),
        };
        Runtime::new(backends, RuntimeConfig::default())
            .unwrap()
            .with_cache(self.cache.clone())
            .with_command_store(self.commands.clone())
    }
}
