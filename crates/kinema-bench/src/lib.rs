//! Benchmark profiles for the Kinema runtime.
//!
//! Every profile runs against the mock backends from
//! `kinema-test-utils`, so the numbers measure Kinema's own overhead
//! (observation assembly, action mapping, cache bookkeeping) and not a
//! physics engine or a network.
//!
//! - [`walking_profile`]: quadruped with a 12-joint walking policy
//! - [`scene_rig`]: `n` distinct passive scenes for cache churn

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use kinema_cache::{CacheBudget, MemoryFs, SceneCache, SharedSceneCache};
use kinema_command::SharedCommandStore;
use kinema_core::TensorSpec;
use kinema_engine::{Backends, LoadError, Runtime, RuntimeConfig};
use kinema_test_utils::layouts::{self, QUADRUPED_JOINTS};
use kinema_test_utils::{
    spec, MemoryAssets, MockInference, MockPhysics, MockRenderer, MockSession,
};

/// Scene path used by [`walking_profile`].
pub const QUADRUPED_SCENE: &str = "main/assets/go1/scene.xml";

/// Policy config path used by [`walking_profile`].
pub const QUADRUPED_POLICY: &str = "main/assets/go1/walk.json";

const QUADRUPED_XML: &str = "<mujoco model='go1'/>";

/// Observation width of [`walking_config`] for a given history length.
pub fn walking_obs_width(history: usize) -> usize {
    let n = QUADRUPED_JOINTS.len();
    3 + 3 + 3 + n + n + history * n
}

/// A walking policy config whose `PrevActions` window is `history`
/// steps long.
pub fn walking_config(history: usize) -> String {
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
                    {{"name": "PrevActions", "history_steps": {history}}}
                ]
            }},
            "commands": {{
                "velocity": {{"inputs": [
                    {{"type": "slider", "name": "x", "label": "x", "min": -1.0, "max": 1.0, "default": 0.5}},
                    {{"type": "slider", "name": "y", "label": "y", "min": -1.0, "max": 1.0, "default": 0.0}},
                    {{"type": "slider", "name": "yaw", "label": "yaw", "min": -1.0, "max": 1.0, "default": 0.0}}
                ]}}
            }},
            "onnx": {{"path": "walk.onnx", "meta": {{"in_keys": ["policy"], "out_keys": ["action"]}}}}
        }}"#
    )
}

fn walking_session(history: usize) -> MockSession {
    let inputs: Vec<TensorSpec> = vec![spec("policy", &[1, walking_obs_width(history)])];
    MockSession::new(inputs, vec![spec("action", &[1, QUADRUPED_JOINTS.len()])])
        .with_response(vec![0.1; QUADRUPED_JOINTS.len()])
}

fn runtime_over(backends: Backends, budget: CacheBudget) -> Result<Runtime, LoadError> {
    let cache = SceneCache::with_vfs(budget, Box::new(MemoryFs::new()))?;
    Ok(Runtime::new(backends, RuntimeConfig::default())?
        .with_cache(SharedSceneCache::new(cache))
        .with_command_store(SharedCommandStore::new()))
}

/// A running quadruped runtime with [`walking_config`] loaded.
pub fn walking_profile(history: usize) -> Result<Runtime, LoadError> {
    let assets = MemoryAssets::new()
        .with_file(QUADRUPED_SCENE, QUADRUPED_XML)
        .with_file("main/assets/go1/meshes/trunk.obj", vec![0u8; 4096])
        .with_file(QUADRUPED_POLICY, walking_config(history))
        .with_file("main/assets/go1/walk.onnx", vec![1u8; 64]);
    let backends = Backends {
        physics: Arc::new(MockPhysics::new().with_model(QUADRUPED_XML, layouts::quadruped())),
        inference: Arc::new(MockInference::new(walking_session(history))),
        renderer: Arc::new(MockRenderer::new()),
        assets: Arc::new(assets),
    };
    let mut runtime = runtime_over(backends, CacheBudget::default())?;
    runtime.load_environment(QUADRUPED_SCENE, Some(QUADRUPED_POLICY))?;
    Ok(runtime)
}

/// Path of the `i`-th scene in [`scene_rig`].
pub fn scene_path(i: usize) -> String {
    format!("main/assets/scene{i}/scene.xml")
}

/// An idle runtime over `n` distinct passive scenes, with a cache that
/// holds at most `capacity` of them.
pub fn scene_rig(n: usize, capacity: usize) -> Result<Runtime, LoadError> {
    let mut physics = MockPhysics::new();
    let mut assets = MemoryAssets::new();
    for i in 0..n {
        let xml = format!("<mujoco model='scene{i}'/>");
        physics = physics.with_model(&xml, layouts::passive_pendulum());
        assets = assets
            .with_file(&scene_path(i), xml)
            .with_file(&format!("main/assets/scene{i}/mesh.obj"), vec![0u8; 2048]);
    }
    let backends = Backends {
        physics: Arc::new(physics),
        inference: Arc::new(MockInference::new(MockSession::new(vec![], vec![]))),
        renderer: Arc::new(MockRenderer::new()),
        assets: Arc::new(assets),
    };
    runtime_over(backends, CacheBudget::entries(capacity))
}
