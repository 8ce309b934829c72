//! Approximate memory accounting for a loaded scene.
//!
//! The estimate only has to rank scenes against each other and against
//! the byte budget; it is not an exact accounting of native memory.

use kinema_core::{MeshInfo, ModelLayout, SimState, TextureInfo};

/// Bytes charged for a texture whose image data was never loaded.
pub const MISSING_TEXTURE_BYTES: usize = 4 * 1024;

/// Bytes per vertex, normal or face (three 4-byte values each).
const TRIPLE: usize = 12;

/// Estimated bytes held by one mesh's vertex, normal and face buffers.
pub fn mesh_bytes(mesh: &MeshInfo) -> usize {
    (mesh.vertex_count + mesh.normal_count + mesh.face_count) * TRIPLE
}

/// Estimated bytes held by one texture.
pub fn texture_bytes(texture: &TextureInfo) -> usize {
    if texture.has_data {
        texture.width * texture.height * texture.channels
    } else {
        MISSING_TEXTURE_BYTES
    }
}

/// Estimated bytes for a scene: state arrays, meshes and textures.
pub fn estimate_scene_bytes(layout: &ModelLayout, state: &SimState) -> usize {
    state.byte_size()
        + layout.meshes.iter().map(mesh_bytes).sum::<usize>()
        + layout.textures.iter().map(texture_bytes).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_test_utils::layouts;

    #[test]
    fn missing_texture_uses_constant() {
        let t = TextureInfo {
            width: 4096,
            height: 4096,
            channels: 4,
            has_data: false,
        };
        assert_eq!(texture_bytes(&t), MISSING_TEXTURE_BYTES);
    }

    #[test]
    fn quadruped_estimate_sums_parts() {
        let layout = layouts::quadruped();
        let state = SimState::zeroed(&layout);
        // qpos 19 + qvel 18 + ctrl 12 + 14 bodies * (6 + 3 + 4 + 3) = 273 f64
        let state_bytes = 273 * 8;
        let mesh = (1000 + 1000 + 2000) * 12 + (200 + 200 + 400) * 12;
        let tex = 64 * 64 * 3 + MISSING_TEXTURE_BYTES;
        assert_eq!(estimate_scene_bytes(&layout, &state), state_bytes + mesh + tex);
    }

    #[test]
    fn bigger_scenes_estimate_bigger() {
        let small = layouts::passive_pendulum();
        let big = layouts::quadruped();
        assert!(
            estimate_scene_bytes(&small, &SimState::zeroed(&small))
                < estimate_scene_bytes(&big, &SimState::zeroed(&big))
        );
    }
}
