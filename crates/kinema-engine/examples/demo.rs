//! Kinema runtime walkthrough over mock backends.
//!
//! Demonstrates:
//!   1. Resolving a scene and policy from an app manifest
//!   2. Loading them into a lockstep `Runtime` and ticking by hand
//!   3. Handing the runtime to `RealtimeRuntime` for wall-clock pacing
//!   4. Dragging a body, then resetting mid-drag
//!   5. Switching scenes and coming back to a cached one
//!
//! The physics, renderer and inference engines are the mocks from
//! `kinema-test-utils`, so the numbers are illustrative only.
//!
//! Run with:
//!   RUST_LOG=kinema_engine=debug cargo run --example demo

use std::sync::Arc;
use std::time::Duration;

use kinema_cache::{CacheBudget, MemoryFs, SceneCache, SharedSceneCache};
use kinema_command::SharedCommandStore;
use kinema_engine::{
    AppManifest, Backends, DragInput, RealtimeRuntime, Runtime, RuntimeConfig,
};
use kinema_test_utils::layouts::{self, QUADRUPED_JOINTS, TRUNK};
use kinema_test_utils::{spec, MemoryAssets, MockInference, MockPhysics, MockRenderer, MockSession};
use tracing_subscriber::EnvFilter;

// ─── Assets ─────────────────────────────────────────────────────

const MANIFEST: &str = r#"{
    "version": "1",
    "projects": [{
        "name": "Main",
        "scenes": [
            {"name": "Go1", "path": "go1/scene.xml",
             "policies": [{"name": "Stand", "config": "go1/stand.json"}]},
            {"name": "Pendulum", "path": "pendulum/scene.xml"}
        ]
    }]
}"#;

const GO1_XML: &str = "<mujoco model='go1'/>";
const PENDULUM_XML: &str = "<mujoco model='pendulum'/>";

/// JointPositions + JointVelocities + PrevActions.
const OBS_WIDTH: usize = 36;

fn stand_config() -> String {
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
            "obs_config": {{"policy": ["JointPositions", "JointVelocities", "PrevActions"]}},
            "onnx": {{"path": "stand.onnx", "meta": {{"in_keys": ["policy"], "out_keys": ["action"]}}}}
        }}"#
    )
}

fn backends() -> (Backends, MockPhysics, MockRenderer) {
    let physics = MockPhysics::new()
        .with_model(GO1_XML, layouts::quadruped())
        .with_model(PENDULUM_XML, layouts::passive_pendulum());
    let renderer = MockRenderer::new();
    let session = MockSession::new(
        vec![spec("policy", &[1, OBS_WIDTH])],
        vec![spec("action", &[1, QUADRUPED_JOINTS.len()])],
    )
    .with_response(vec![0.1; QUADRUPED_JOINTS.len()]);
    let assets = MemoryAssets::new()
        .with_file("main/assets/config.json", MANIFEST)
        .with_file("main/assets/go1/scene.xml", GO1_XML)
        .with_file("main/assets/go1/meshes/trunk.obj", vec![0u8; 1024])
        .with_file("main/assets/go1/stand.json", stand_config())
        .with_file("main/assets/go1/stand.onnx", vec![1u8; 64])
        .with_file("main/assets/pendulum/scene.xml", PENDULUM_XML);
    let backends = Backends {
        physics: Arc::new(physics.clone()),
        inference: Arc::new(MockInference::new(session)),
        renderer: Arc::new(renderer.clone()),
        assets: Arc::new(assets),
    };
    (backends, physics, renderer)
}

// ─── Main ───────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (backends, physics, renderer) = backends();
    let manifest = AppManifest::from_json(MANIFEST)?;
    let go1 = manifest.resolve("main", "go1", Some("stand"))?;
    let pendulum = manifest.resolve("main", "pendulum", None)?;

    let cache = SharedSceneCache::new(SceneCache::with_vfs(
        CacheBudget::default(),
        Box::new(MemoryFs::new()),
    )?);
    let mut runtime = Runtime::new(backends, RuntimeConfig::default())?
        .with_cache(cache.clone())
        .with_command_store(SharedCommandStore::new());

    // ── Lockstep ────────────────────────────────────────────────
    println!("=== Lockstep ===");
    runtime.load_environment(&go1.scene_path, go1.policy_path.as_deref())?;
    println!(
        "  loaded {} (decimation {}, control period {:?})",
        go1.scene_path,
        runtime.decimation(),
        runtime.control_period()
    );
    for _ in 0..3 {
        let m = runtime.tick();
        println!(
            "  tick {:>2}: {} substeps, adopted={} ({} us)",
            runtime.tick_id().0,
            m.substeps,
            m.inference_adopted,
            m.total_us
        );
    }
    runtime.render();
    if let Some(action) = runtime.held_action() {
        println!("  held action[0..3] = {:?}", &action[..3]);
    }

    // ── Realtime ────────────────────────────────────────────────
    println!("\n=== Realtime ===");
    let rt = RealtimeRuntime::start(runtime);
    let handle = rt.handle();
    handle.drag(DragInput {
        body: TRUNK,
        point: [0.0, 0.0, 0.3],
        offset: [0.1, 0.0],
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    if let Some(frame) = rt.latest_frame() {
        let trunk = frame.pose(TRUNK).map(|p| p.position);
        println!("  t={:.3}s trunk at {trunk:?} while dragged", frame.time);
    }

    handle.request_reset();
    tokio::time::sleep(Duration::from_millis(60)).await;
    if let Some(frame) = rt.latest_frame() {
        let trunk = frame.pose(TRUNK).map(|p| p.position);
        println!("  t={:.3}s trunk at {trunk:?} after reset", frame.time);
    }
    let stats = rt.stats();
    println!("  {} loop iterations, {} overruns", stats.ticks, stats.overruns);
    let mut runtime = rt.stop().await?;

    // ── Scene switching ─────────────────────────────────────────
    println!("\n=== Scene switching ===");
    runtime.load_environment(&pendulum.scene_path, None)?;
    runtime.tick();
    runtime.load_environment(&go1.scene_path, go1.policy_path.as_deref())?;
    runtime.tick();
    println!(
        "  models loaded: {}, render scenes built: {}, cached scenes: {}",
        physics.stats().loads(),
        renderer.log().built(),
        cache.lock().len()
    );

    Ok(())
}
