//! Building a [`CacheEntry`] for a scene that is not cached.
//!
//! A load stages the scene's directory into the cache's virtual
//! filesystem through a [`ResourceTracker`], compiles the model, runs
//! one forward pass and builds the render graph. If any step fails,
//! everything created so far is released and the staged files removed.
//!
//! Scenes in one directory stage the same files. An entry tracks every
//! file it wrote that it created or that another cached scene already
//! owns, and the cache removes a file only when no resident scene
//! tracks it.

use std::sync::Arc;

use kinema_cache::{estimate_scene_bytes, CacheEntry, ResourceTracker, SceneCache};
use kinema_core::{
    AssetStore, InferenceEngine, PhysicsEngine, RenderBackend, RenderScene, SimulationHandle,
    VirtualFs,
};

use crate::error::LoadError;

/// Extensions of policy artifacts that share a scene directory but are
/// not model assets.
const POLICY_EXTENSIONS: &[&str] = &[".onnx", ".json"];

/// The external engines a runtime drives.
#[derive(Clone)]
pub struct Backends {
    /// Compiles models.
    pub physics: Arc<dyn PhysicsEngine>,
    /// Builds inference sessions from network files.
    pub inference: Arc<dyn InferenceEngine>,
    /// Builds render graphs.
    pub renderer: Arc<dyn RenderBackend>,
    /// Source of scene files.
    pub assets: Arc<dyn AssetStore>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

/// Directory part of a `/`-separated path, if any.
pub(crate) fn parent_dir(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i]).filter(|d| !d.is_empty())
}

/// Resolve `relative` against the directory containing `base`.
pub(crate) fn sibling_path(base: &str, relative: &str) -> String {
    match parent_dir(base) {
        Some(dir) if !relative.starts_with('/') => format!("{dir}/{relative}"),
        _ => relative.trim_start_matches('/').to_string(),
    }
}

/// Load `scene_path` into a fresh entry, writing assets into `cache`'s
/// filesystem.
///
/// The caller is responsible for making room first
/// ([`SceneCache::prepare_for_new_scene`]) and for inserting the result.
pub fn load_scene(
    cache: &mut SceneCache,
    backends: &Backends,
    scene_path: &str,
) -> Result<CacheEntry, LoadError> {
    let xml = backends.assets.fetch_text(scene_path)?;
    let mut tracker = ResourceTracker::new(cache.vfs_mut());
    match build(&mut tracker, backends, scene_path, &xml) {
        Ok((sim, render)) => {
            let created = tracker.created().to_vec();
            let paths: Vec<String> = tracker
                .finish()
                .into_iter()
                .filter(|p| created.contains(p) || cache.file_owners(p) > 0)
                .collect();
            let bytes = estimate_scene_bytes(sim.layout(), sim.state());
            tracing::debug!(
                scene = scene_path,
                files = paths.len(),
                bytes,
                "scene loaded"
            );
            Ok(CacheEntry::new(sim, render, paths, bytes))
        }
        Err(e) => {
            tracker.rollback();
            Err(e)
        }
    }
}

fn build(
    tracker: &mut ResourceTracker<'_>,
    backends: &Backends,
    scene_path: &str,
    xml: &str,
) -> Result<(SimulationHandle, RenderScene), LoadError> {
    if let Some(dir) = parent_dir(scene_path) {
        for path in backends.assets.list(dir)? {
            if path == scene_path || POLICY_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
                continue;
            }
            let data = backends.assets.fetch(&path)?;
            tracker.write_file(&path, &data)?;
        }
    }
    tracker.write_file(scene_path, xml.as_bytes())?;

    let model = backends.physics.load_model(xml, &*tracker)?;
    let mut sim = SimulationHandle::new(model);
    sim.forward();
    match backends.renderer.build(sim.layout()) {
        Ok(render) => Ok((sim, render)),
        Err(e) => {
            sim.dispose();
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_cache::{CacheBudget, MemoryFs};
    use kinema_core::SceneKey;
    use kinema_test_utils::{
        layouts, MemoryAssets, MockInference, MockPhysics, MockRenderer, MockSession,
    };

    const XML: &str = "<mujoco model='go1'/>";

    fn backends(physics: MockPhysics, renderer: MockRenderer) -> Backends {
        let assets = MemoryAssets::new()
            .with_file("go1/scene.xml", XML)
            .with_file("go1/meshes/trunk.obj", vec![1u8; 64])
            .with_file("go1/policy.onnx", vec![9u8; 8])
            .with_file("go1/policy.json", "{}");
        Backends {
            physics: Arc::new(physics),
            inference: Arc::new(MockInference::new(MockSession::new(vec![], vec![]))),
            renderer: Arc::new(renderer),
            assets: Arc::new(assets),
        }
    }

    fn cache() -> SceneCache {
        SceneCache::with_vfs(CacheBudget::default(), Box::new(MemoryFs::new())).unwrap()
    }

    #[test]
    fn paths_resolve_against_parent() {
        assert_eq!(parent_dir("a/b/scene.xml"), Some("a/b"));
        assert_eq!(parent_dir("scene.xml"), None);
        assert_eq!(sibling_path("go1/policy.json", "policy.onnx"), "go1/policy.onnx");
        assert_eq!(sibling_path("policy.json", "policy.onnx"), "policy.onnx");
    }

    #[test]
    fn load_stages_model_assets_only() {
        let physics = MockPhysics::new()
            .with_model(XML, layouts::quadruped())
            .require_asset(XML, "go1/meshes/trunk.obj");
        let b = backends(physics, MockRenderer::new());
        let mut cache = cache();
        let entry = load_scene(&mut cache, &b, "go1/scene.xml").unwrap();

        let mut tracked = entry.tracked_paths().to_vec();
        tracked.sort();
        assert_eq!(tracked, vec!["go1/meshes/trunk.obj", "go1/scene.xml"]);
        assert!(cache.vfs().exists("go1/scene.xml"));
        assert!(!cache.vfs().exists("go1/policy.onnx"));
        assert!(entry.bytes() > 0);
        assert_eq!(entry.lights().len(), 1);
        // Forward ran: the trunk sits at the initial height.
        assert!(entry.sim().state().body_position(layouts::TRUNK)[2] > 0.0);
    }

    #[test]
    fn sibling_scenes_share_staged_files() {
        const ROUGH: &str = "<mujoco model='go1_rough'/>";
        let physics = MockPhysics::new()
            .with_model(XML, layouts::quadruped())
            .with_model(ROUGH, layouts::quadruped());
        let mut b = backends(physics, MockRenderer::new());
        b.assets = Arc::new(
            MemoryAssets::new()
                .with_file("go1/scene.xml", XML)
                .with_file("go1/scene_rough.xml", ROUGH)
                .with_file("go1/meshes/trunk.obj", vec![1u8; 64])
                .with_file("go1/notes.txt", "asset copy"),
        );
        let mut cache = cache();
        cache.vfs_mut().write_file("go1/notes.txt", b"host file").unwrap();
        let flat = load_scene(&mut cache, &b, "go1/scene.xml").unwrap();
        cache.set(SceneKey::new("go1/scene.xml"), flat);
        let rough = load_scene(&mut cache, &b, "go1/scene_rough.xml").unwrap();

        let mut tracked = rough.tracked_paths().to_vec();
        tracked.sort();
        assert_eq!(
            tracked,
            vec!["go1/meshes/trunk.obj", "go1/scene.xml", "go1/scene_rough.xml"]
        );
        cache.set(SceneKey::new("go1/scene_rough.xml"), rough);

        cache.evict(&SceneKey::new("go1/scene.xml"));
        assert!(cache.vfs().exists("go1/scene_rough.xml"));
        assert!(cache.vfs().exists("go1/meshes/trunk.obj"));

        cache.evict(&SceneKey::new("go1/scene_rough.xml"));
        assert!(!cache.vfs().exists("go1/scene_rough.xml"));
        assert!(!cache.vfs().exists("go1/meshes/trunk.obj"));
        // Files the cache never created are not claimed.
        assert!(cache.vfs().exists("go1/notes.txt"));
    }

    #[test]
    fn physics_failure_rolls_back_files() {
        let b = backends(MockPhysics::new(), MockRenderer::new());
        let mut cache = cache();
        let err = load_scene(&mut cache, &b, "go1/scene.xml").unwrap_err();
        assert!(matches!(err, LoadError::Physics(_)));
        assert!(!cache.vfs().exists("go1/scene.xml"));
        assert!(!cache.vfs().exists("go1/meshes/trunk.obj"));
    }

    #[test]
    fn render_failure_disposes_model() {
        let physics = MockPhysics::new().with_model(XML, layouts::quadruped());
        let stats = physics.stats();
        let b = backends(physics, MockRenderer::failing());
        let mut cache = cache();
        let err = load_scene(&mut cache, &b, "go1/scene.xml").unwrap_err();
        assert!(matches!(err, LoadError::Render(_)));
        assert_eq!(stats.loads(), 1);
        assert_eq!(stats.releases(), 1);
        assert_eq!(stats.live(), 0);
        assert!(!cache.vfs().exists("go1/scene.xml"));
    }

    #[test]
    fn missing_scene_file_is_asset_error() {
        let b = backends(MockPhysics::new(), MockRenderer::new());
        let mut cache = cache();
        let err = load_scene(&mut cache, &b, "h1/scene.xml").unwrap_err();
        assert!(matches!(err, LoadError::Asset(_)));
    }
}
