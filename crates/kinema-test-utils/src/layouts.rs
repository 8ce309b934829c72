//! Model layouts used across the test suites.

use kinema_core::{
    ActuatorInfo, BodyId, BodyInfo, JointInfo, JointKind, LightInfo, MeshInfo, ModelLayout,
    TextureInfo, Transmission,
};

/// Policy joint names of [`quadruped`], in actuator order.
pub const QUADRUPED_JOINTS: [&str; 12] = [
    "FL_hip", "FL_thigh", "FL_calf", "FR_hip", "FR_thigh", "FR_calf", "RL_hip", "RL_thigh",
    "RL_calf", "RR_hip", "RR_thigh", "RR_calf",
];

/// Body that carries the free joint in [`quadruped`].
pub const TRUNK: BodyId = BodyId(1);

/// A floating-base quadruped: one free joint named `root` on the trunk,
/// then twelve hinges, each driven by one joint actuator.
///
/// Hinge `i` lives at `qpos[7 + i]` and `qvel[6 + i]`. Physics runs at
/// 200 Hz.
pub fn quadruped() -> ModelLayout {
    let mut joints = vec![JointInfo {
        name: "root".into(),
        kind: JointKind::Free,
        qpos_addr: 0,
        dof_addr: 0,
        body: TRUNK,
    }];
    let mut bodies = vec![
        BodyInfo {
            name: "world".into(),
            parent: BodyId(0),
        },
        BodyInfo {
            name: "trunk".into(),
            parent: BodyId(0),
        },
    ];
    let mut actuators = Vec::with_capacity(QUADRUPED_JOINTS.len());
    for (i, name) in QUADRUPED_JOINTS.iter().enumerate() {
        let body = BodyId(2 + i as u32);
        // Hip bodies hang off the trunk; thigh and calf off the previous link.
        let parent = if i % 3 == 0 { TRUNK } else { BodyId(1 + i as u32) };
        bodies.push(BodyInfo {
            name: format!("{name}_link"),
            parent,
        });
        joints.push(JointInfo {
            name: (*name).into(),
            kind: JointKind::Hinge,
            qpos_addr: 7 + i,
            dof_addr: 6 + i,
            body,
        });
        actuators.push(ActuatorInfo {
            name: format!("{name}_motor"),
            transmission: Transmission::Joint(i + 1),
            ctrl_range: None,
        });
    }
    ModelLayout {
        nq: 7 + QUADRUPED_JOINTS.len(),
        nv: 6 + QUADRUPED_JOINTS.len(),
        nu: QUADRUPED_JOINTS.len(),
        nbody: bodies.len(),
        timestep: 0.005,
        joints,
        actuators,
        bodies,
        meshes: vec![
            MeshInfo {
                vertex_count: 1000,
                normal_count: 1000,
                face_count: 2000,
            },
            MeshInfo {
                vertex_count: 200,
                normal_count: 200,
                face_count: 400,
            },
        ],
        textures: vec![
            TextureInfo {
                width: 64,
                height: 64,
                channels: 3,
                has_data: true,
            },
            TextureInfo {
                width: 512,
                height: 512,
                channels: 3,
                has_data: false,
            },
        ],
        lights: vec![LightInfo {
            body: None,
            position: [0.0, 0.0, 3.0],
            direction: [0.0, 0.0, -1.0],
            diffuse: [0.8, 0.8, 0.8],
            directional: true,
            cast_shadow: true,
        }],
    }
}

/// A fixed-base pendulum with one unactuated hinge named `hinge`.
pub fn passive_pendulum() -> ModelLayout {
    ModelLayout {
        nq: 1,
        nv: 1,
        nu: 0,
        nbody: 2,
        timestep: 0.002,
        joints: vec![JointInfo {
            name: "hinge".into(),
            kind: JointKind::Hinge,
            qpos_addr: 0,
            dof_addr: 0,
            body: BodyId(1),
        }],
        bodies: vec![
            BodyInfo {
                name: "world".into(),
                parent: BodyId(0),
            },
            BodyInfo {
                name: "pole".into(),
                parent: BodyId(0),
            },
        ],
        ..Default::default()
    }
}
