//! End-to-end runtime scenarios over the mock physics, renderer and
//! inference backends.

mod common;

use common::*;
use kinema_cache::CacheBudget;
use kinema_command::{CommandGroupSpec, CommandId, CommandInput, SliderSpec};
use kinema_core::{BodyId, ObsError, SceneKey};
use kinema_engine::{DragInput, LoadError, RuntimePhase};
use kinema_test_utils::layouts::{QUADRUPED_JOINTS, TRUNK};

fn policy_window(rt: &kinema_engine::Runtime) -> Vec<f32> {
    rt.policy()
        .unwrap()
        .pipeline()
        .group("policy")
        .unwrap()
        .output()
        .to_vec()
}

#[test]
fn decimation_follows_policy_control_dt() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    // 0.02 / 0.005
    assert_eq!(rt.decimation(), 4);
    let before = rig.physics.stats().steps();
    let m = rt.tick();
    assert_eq!(m.substeps, 4);
    assert_eq!(rig.physics.stats().steps() - before, 4);
}

#[test]
fn policy_group_has_expected_width() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    assert_eq!(rt.policy().unwrap().pipeline().group_sizes()["policy"], POLICY_OBS);
    assert_eq!(rt.held_action().unwrap(), &[0.0; 12][..]);
}

#[test]
fn prev_actions_window_lists_newest_first() {
    let rig = Rig::new(walk_session());
    let handle = rig.inference.handle();
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();

    for k in 1..=6 {
        handle.set_response(vec![k as f32; QUADRUPED_JOINTS.len()]);
        let m = rt.tick();
        assert!(m.inference_dispatched && m.inference_adopted, "tick {k}: {m:?}");
    }
    // Tick 6 observed a5 as the last action.
    let window = policy_window(&rt);
    let prev = &window[PREV_ACTIONS_AT..PREV_ACTIONS_AT + 48];
    let firsts: Vec<f32> = prev.chunks(12).map(|c| c[0]).collect();
    assert_eq!(firsts, vec![5.0, 4.0, 3.0, 2.0]);
    assert_eq!(rt.held_action().unwrap()[0], 6.0);
}

#[test]
fn second_request_while_in_flight_is_a_no_op() {
    let rig = Rig::new(walk_session().with_response(vec![0.5; 12]).gated());
    let handle = rig.inference.handle();
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();

    assert!(rt.tick().inference_dispatched);
    for _ in 0..5 {
        let m = rt.tick();
        assert!(!m.inference_dispatched);
        assert!(!m.inference_adopted);
        assert_eq!(m.substeps, 4);
    }
    assert_eq!(handle.calls(), 1);
    assert!(rt.inference_in_flight());
    assert_eq!(rt.held_action().unwrap(), &[0.0; 12][..]);

    handle.open();
    let m = rt.tick();
    assert!(m.inference_adopted);
    assert!(!m.inference_dispatched);
    assert_eq!(rt.held_action().unwrap(), &[0.5; 12][..]);
    assert_eq!(handle.calls(), 1);

    assert!(rt.tick().inference_dispatched);
    assert_eq!(handle.calls(), 2);
}

#[test]
fn failed_inference_keeps_previous_action() {
    let rig = Rig::new(walk_session().with_response(vec![0.5; 12]));
    let handle = rig.inference.handle();
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    assert!(rt.tick().inference_adopted);

    handle.set_failing(true);
    let m = rt.tick();
    assert!(m.inference_failed);
    assert_eq!(m.substeps, 4);
    assert_eq!(rt.held_action().unwrap(), &[0.5; 12][..]);

    handle.set_failing(false);
    handle.set_response(vec![-0.5; 12]);
    assert!(rt.tick().inference_adopted);
    assert_eq!(rt.held_action().unwrap(), &[-0.5; 12][..]);
}

#[test]
fn non_finite_action_is_rejected() {
    let rig = Rig::new(walk_session().with_response(vec![0.25; 12]));
    let handle = rig.inference.handle();
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();

    let mut bad = vec![0.0; 12];
    bad[3] = f32::NAN;
    handle.set_response(bad);
    assert!(rt.tick().inference_failed);
    assert_eq!(rt.held_action().unwrap(), &[0.25; 12][..]);
}

#[test]
fn result_dispatched_before_reset_is_discarded() {
    let rig = Rig::new(walk_session().with_response(vec![0.5; 12]).gated());
    let handle = rig.inference.handle();
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();

    assert!(rt.tick().inference_dispatched);
    assert!(rt.handle().request_reset());
    assert!(rt.tick().reset);

    handle.open();
    let m = rt.tick();
    assert!(m.inference_discarded);
    assert!(!m.inference_adopted);
    assert_eq!(rt.held_action().unwrap(), &[0.0; 12][..]);

    let m = rt.tick();
    assert!(m.inference_dispatched && m.inference_adopted);
    assert_eq!(rt.held_action().unwrap(), &[0.5; 12][..]);
}

#[test]
fn reset_mid_drag_clears_forces_and_restores_pose() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, None).unwrap();
    let initial = rt.frame().cloned().unwrap();

    let drag = DragInput {
        body: TRUNK,
        point: [0.0, 0.0, 0.3],
        offset: [0.2, 0.0],
    };
    assert!(rt.handle().drag(drag));
    for _ in 0..5 {
        rt.tick();
    }
    assert_eq!(rt.drag(), Some(&drag));
    let dragged = rt.frame().unwrap().pose(TRUNK).unwrap().position;
    assert!(dragged[0] > 0.0, "trunk should move along +x, got {dragged:?}");

    assert!(rt.handle().request_reset());
    let m = rt.tick();
    assert!(m.reset);
    assert_eq!(m.substeps, 0);
    assert!(rt.drag().is_none());
    assert_eq!(rt.frame().unwrap().poses, initial.poses);
    {
        let cache = rig.cache.lock();
        let state = cache.peek(&SceneKey::new(GO1_SCENE)).unwrap().sim().state();
        assert!(state.xfrc_applied.iter().all(|v| *v == 0.0));
        assert!(state.ctrl.iter().all(|v| *v == 0.0));
        assert!(state.qvel.iter().all(|v| *v == 0.0));
    }

    // Without a drag the base stays put.
    rt.tick();
    let after = rt.frame().unwrap().pose(TRUNK).unwrap().position;
    assert_eq!(after, initial.pose(TRUNK).unwrap().position);
}

#[test]
fn drag_release_stops_force() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, None).unwrap();
    rt.handle().drag(DragInput {
        body: TRUNK,
        point: [0.0, 0.0, 0.3],
        offset: [0.0, -0.1],
    });
    rt.tick();
    rt.handle().release_drag();
    rt.tick();
    let cache = rig.cache.lock();
    let state = cache.peek(&SceneKey::new(GO1_SCENE)).unwrap().sim().state();
    assert!(state.xfrc_applied.iter().all(|v| *v == 0.0));
    // Screen y up means world +y.
    assert!(state.qvel[1] > 0.0);
}

#[test]
fn policy_runs_on_unactuated_scene() {
    let rig = Rig::new(swing_session().with_response(vec![3.0]));
    let handle = rig.inference.handle();
    let mut rt = rig.runtime();
    rt.load_environment(PENDULUM_SCENE, Some(PENDULUM_POLICY)).unwrap();
    assert_eq!(rt.phase(), RuntimePhase::Running);
    assert!(rt.policy().unwrap().mapping().actuators().is_none());
    // 0.02 / 0.002
    assert_eq!(rt.decimation(), 10);

    for _ in 0..3 {
        let m = rt.tick();
        assert!(m.inference_adopted, "{m:?}");
        assert_eq!(m.substeps, 10);
    }
    assert_eq!(handle.calls(), 3);
    assert_eq!(rt.held_action().unwrap(), &[3.0][..]);
    assert_eq!(policy_window(&rt).len(), 2);
    let cache = rig.cache.lock();
    let state = cache.peek(&SceneKey::new(PENDULUM_SCENE)).unwrap().sim().state();
    assert!(state.ctrl.iter().all(|v| *v == 0.0));
}

#[test]
fn scene_reuse_does_not_reload() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();
    rt.load_environment(PENDULUM_SCENE, None).unwrap();
    rt.tick();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();

    assert_eq!(rig.physics.stats().loads(), 2);
    assert_eq!(rig.physics.stats().releases(), 0);
    assert_eq!(rig.renderer.log().built(), 2);
    let cache = rig.cache.lock();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().inserts, 2);
    assert_eq!(rt.scene(), Some(&SceneKey::new(GO1_SCENE)));
}

#[test]
fn revisited_scene_survives_two_slot_budget() {
    let rig = Rig::with_budget(walk_session(), CacheBudget::entries(2));
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();
    rt.load_environment(PENDULUM_SCENE, None).unwrap();
    rt.tick();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();
    assert_eq!(rig.physics.stats().loads(), 2);

    // The pendulum is now least recently used.
    rt.load_environment(CARTPOLE_SCENE, None).unwrap();
    rt.tick();

    assert_eq!(rig.physics.stats().loads(), 3);
    assert_eq!(rig.physics.stats().releases(), 1);
    assert_eq!(rig.physics.stats().live(), 2);
    assert_eq!(rig.renderer.log().released(), 1);
    let cache = rig.cache.lock();
    assert_eq!(cache.len(), 2);
    assert!(cache.has(&SceneKey::new(GO1_SCENE)));
    assert!(cache.has(&SceneKey::new(CARTPOLE_SCENE)));
    assert!(!cache.has(&SceneKey::new(PENDULUM_SCENE)));
    assert!(!cache.vfs().exists(PENDULUM_SCENE));
    assert!(cache.vfs().exists("main/assets/go1/meshes/trunk.obj"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn budget_evicts_least_recent_scene() {
    let rig = Rig::with_budget(walk_session(), CacheBudget::entries(1));
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, None).unwrap();
    assert!(rig.cache.lock().vfs().exists("main/assets/go1/meshes/trunk.obj"));

    rt.load_environment(PENDULUM_SCENE, None).unwrap();
    {
        let cache = rig.cache.lock();
        assert_eq!(cache.len(), 1);
        assert!(!cache.has(&SceneKey::new(GO1_SCENE)));
        assert!(!cache.vfs().exists("main/assets/go1/meshes/trunk.obj"));
        assert!(!cache.vfs().exists(GO1_SCENE));
    }
    assert_eq!(rig.physics.stats().releases(), 1);
    assert_eq!(rig.renderer.log().released(), 1);

    rt.load_environment(GO1_SCENE, None).unwrap();
    assert_eq!(rig.physics.stats().loads(), 3);
    assert_eq!(rig.physics.stats().live(), 1);
}

#[test]
fn bad_policy_stops_runtime_but_keeps_scene_cached() {
    let bad = walk_config().replace("\"FL_hip\"", "\"FL_hip_typo\"");
    let rig = Rig::new(walk_session()).with_file(GO1_POLICY, bad);
    let mut rt = rig.runtime();
    let err = rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap_err();
    assert!(matches!(err, LoadError::Config(_)), "{err}");
    assert_eq!(rt.phase(), RuntimePhase::Stopped);
    assert!(rt.scene().is_none());
    assert!(rt.policy().is_none());
    assert_eq!(rt.tick().substeps, 0);
    assert!(rig.cache.lock().has(&SceneKey::new(GO1_SCENE)));
}

#[test]
fn mismatched_network_is_rejected_at_load() {
    let session = kinema_test_utils::MockSession::new(
        vec![kinema_test_utils::spec("policy", &[1, POLICY_OBS + 1])],
        vec![kinema_test_utils::spec("action", &[1, 12])],
    );
    let rig = Rig::new(session);
    let mut rt = rig.runtime();
    let err = rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap_err();
    assert!(matches!(err, LoadError::Config(_)), "{err}");
}

#[test]
fn command_sliders_feed_observations() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();
    let window = policy_window(&rt);
    assert_eq!(&window[COMMAND_AT..COMMAND_AT + 3], &[0.5, 0.0, 0.0]);

    let stored = rig
        .commands
        .lock()
        .set_value(&CommandId::new("velocity", "lin_vel_x"), 5.0)
        .unwrap();
    assert_eq!(stored, 1.0);
    rt.tick();
    let window = policy_window(&rt);
    assert_eq!(window[COMMAND_AT], 1.0);
}

#[test]
fn reset_button_resets_through_command_store() {
    let rig = Rig::new(walk_session().with_response(vec![0.5; 12]));
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();
    assert_eq!(rt.held_action().unwrap()[0], 0.5);

    rig.commands
        .lock()
        .press(&CommandId::new("velocity", "reset"))
        .unwrap();
    assert!(rt.tick().reset);
    assert_eq!(rt.held_action().unwrap(), &[0.0; 12][..]);
    // Reset reseeds every history slot.
    let window = policy_window(&rt);
    assert!(window[PREV_ACTIONS_AT..].iter().all(|v| *v == 0.0));
}

#[test]
fn observation_fault_stops_runtime() {
    let rig = Rig::new(walk_session().with_response(vec![0.5; 12]));
    let handle = rig.inference.handle();
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    assert!(rt.tick().inference_adopted);
    assert!(rt.last_error().is_none());

    // The policy was bound against three velocity sliders.
    let narrow = CommandGroupSpec {
        inputs: vec![CommandInput::Slider(SliderSpec::new(
            "lin_vel_x", "Forward", -1.0, 1.0, 0.5,
        ))],
    };
    rig.commands.lock().register_group("velocity", narrow).unwrap();

    let steps = rig.physics.stats().steps();
    let m = rt.tick();
    assert!(m.observation_failed);
    assert!(!m.inference_dispatched);
    assert_eq!(m.substeps, 0);
    assert_eq!(rig.physics.stats().steps(), steps);
    assert_eq!(rt.phase(), RuntimePhase::Stopped);
    assert!(rt.policy().is_none());
    assert!(matches!(
        rt.last_error(),
        Some(ObsError::LengthMismatch { declared: 3, computed: 1, .. })
    ));

    assert_eq!(rt.tick(), kinema_engine::TickMetrics::default());
    assert_eq!(handle.calls(), 1);

    // A fresh load clears the fault.
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    assert!(rt.last_error().is_none());
    assert!(rt.tick().inference_dispatched);
}

#[test]
fn observation_fault_during_reset_stops_runtime() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    rt.tick();

    let narrow = CommandGroupSpec {
        inputs: vec![CommandInput::Slider(SliderSpec::new("x", "x", -1.0, 1.0, 0.0))],
    };
    rig.commands.lock().register_group("velocity", narrow).unwrap();
    assert!(rt.reset());
    assert_eq!(rt.phase(), RuntimePhase::Stopped);
    assert!(rt.policy().is_none());
    assert!(rt.last_error().is_some());
}

#[test]
fn loading_replaces_command_groups() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, Some(GO1_POLICY)).unwrap();
    assert!(rig.commands.lock().group_values("velocity").is_some());
    rt.load_environment(PENDULUM_SCENE, None).unwrap();
    assert!(rig.commands.lock().group_values("velocity").is_none());
}

#[test]
fn render_writes_last_frame_and_lights() {
    let rig = Rig::new(walk_session());
    let mut rt = rig.runtime();
    rt.load_environment(GO1_SCENE, None).unwrap();
    assert!(rig.renderer.log().light(0).is_some());
    rt.tick();
    assert!(rt.render());
    let frame = rt.frame().unwrap();
    let (pos, quat) = rig.renderer.log().pose(BodyId(1)).unwrap();
    assert_eq!(pos, frame.pose(BodyId(1)).unwrap().position);
    assert_eq!(quat, frame.pose(BodyId(1)).unwrap().quaternion);
}
