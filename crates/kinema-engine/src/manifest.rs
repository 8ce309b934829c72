//! The application manifest: which projects, scenes and policies exist.
//!
//! A built application keeps a root `assets/config.json` listing every
//! project. Each project's files live under `<project-id>/assets/`, or
//! `main/assets/` for a project without an id:
//!
//! ```text
//! assets/config.json
//! main/assets/<scene-id>/scene.mjb
//! main/assets/<scene-id>/<policy-id>.onnx
//! main/assets/<scene-id>/<policy-id>.json
//! ```

use kinema_core::ConfigError;
use serde::{Deserialize, Serialize};

/// Path of the manifest relative to the asset root.
pub const MANIFEST_PATH: &str = "assets/config.json";

/// Directory name used for a project without an id.
pub const DEFAULT_PROJECT_DIR: &str = "main";

/// Normalize a display name into an identifier: lowercase, with spaces
/// and hyphens replaced by underscores.
///
/// ```
/// use kinema_engine::manifest::scene_id;
///
/// assert_eq!(scene_id("Unitree Go-1"), "unitree_go_1");
/// ```
pub fn scene_id(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Root manifest document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    /// Version of the tool that wrote the manifest.
    #[serde(default)]
    pub version: Option<String>,
    /// Projects, in display order.
    pub projects: Vec<ProjectEntry>,
}

/// One project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// Display name.
    pub name: String,
    /// Directory id; `None` means [`DEFAULT_PROJECT_DIR`].
    #[serde(default)]
    pub id: Option<String>,
    /// Scenes, in display order.
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
}

impl ProjectEntry {
    /// Directory holding this project's files.
    pub fn dir(&self) -> &str {
        self.id.as_deref().unwrap_or(DEFAULT_PROJECT_DIR)
    }
}

/// One scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneEntry {
    /// Display name.
    pub name: String,
    /// Model path relative to the project's asset directory.
    pub path: String,
    /// Policies runnable on this scene.
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
}

/// One policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// Display name.
    pub name: String,
    /// Config path relative to the project's asset directory. Absent
    /// when the policy has neither config nor commands.
    #[serde(default)]
    pub config: Option<String>,
    /// Where the policy came from, for display only.
    #[serde(default)]
    pub source: Option<String>,
}

/// Asset-store paths for one selection, ready for
/// [`Runtime::load_environment`](crate::Runtime::load_environment).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Scene model path.
    pub scene_path: String,
    /// Policy config path, if the selection runs a policy.
    pub policy_path: Option<String>,
}

impl AppManifest {
    /// Parse manifest JSON.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            reason: format!("manifest: {e}"),
        })
    }

    /// Find a project by id or by name (names are compared after
    /// [`scene_id`] normalization).
    pub fn project(&self, key: &str) -> Option<&ProjectEntry> {
        let wanted = scene_id(key);
        self.projects
            .iter()
            .find(|p| p.id.as_deref() == Some(key) || scene_id(&p.name) == wanted)
    }

    /// Resolve a selection. `policy` of `None` selects the scene alone.
    pub fn resolve(
        &self,
        project: &str,
        scene: &str,
        policy: Option<&str>,
    ) -> Result<Selection, ConfigError> {
        let not_found = |what: &str, name: &str| ConfigError::InvalidParameter {
            owner: "manifest".into(),
            reason: format!("no {what} named '{name}'"),
        };
        let p = self.project(project).ok_or_else(|| not_found("project", project))?;
        let wanted = scene_id(scene);
        let s = p
            .scenes
            .iter()
            .find(|s| scene_id(&s.name) == wanted)
            .ok_or_else(|| not_found("scene", scene))?;
        let policy_path = match policy {
            None => None,
            Some(name) => {
                let wanted = scene_id(name);
                let entry = s
                    .policies
                    .iter()
                    .find(|e| scene_id(&e.name) == wanted)
                    .ok_or_else(|| not_found("policy", name))?;
                entry
                    .config
                    .as_ref()
                    .map(|c| format!("{}/assets/{c}", p.dir()))
            }
        };
        Ok(Selection {
            scene_path: format!("{}/assets/{}", p.dir(), s.path),
            policy_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "version": "0.3.1",
        "projects": [
            {
                "name": "Locomotion",
                "id": null,
                "scenes": [
                    {
                        "name": "Unitree Go1",
                        "path": "unitree_go1/scene.mjb",
                        "policies": [
                            {"name": "Walk", "config": "unitree_go1/walk.json"},
                            {"name": "Passive"}
                        ]
                    }
                ]
            },
            {
                "name": "Humanoids",
                "id": "humanoids",
                "scenes": [{"name": "H1", "path": "h1/scene.mjb", "policies": []}]
            }
        ]
    }"#;

    #[test]
    fn normalizes_names() {
        assert_eq!(scene_id("Unitree Go1"), "unitree_go1");
        assert_eq!(scene_id("ANYmal-C rough"), "anymal_c_rough");
    }

    #[test]
    fn resolves_default_project_dir() {
        let m = AppManifest::from_json(MANIFEST).unwrap();
        let sel = m.resolve("Locomotion", "unitree go1", Some("walk")).unwrap();
        assert_eq!(sel.scene_path, "main/assets/unitree_go1/scene.mjb");
        assert_eq!(
            sel.policy_path.as_deref(),
            Some("main/assets/unitree_go1/walk.json")
        );
    }

    #[test]
    fn policy_without_config_resolves_to_scene_only() {
        let m = AppManifest::from_json(MANIFEST).unwrap();
        let sel = m.resolve("locomotion", "Unitree Go1", Some("Passive")).unwrap();
        assert_eq!(sel.policy_path, None);
    }

    #[test]
    fn project_by_id() {
        let m = AppManifest::from_json(MANIFEST).unwrap();
        let sel = m.resolve("humanoids", "H1", None).unwrap();
        assert_eq!(sel.scene_path, "humanoids/assets/h1/scene.mjb");
    }

    #[test]
    fn unknown_names_are_errors() {
        let m = AppManifest::from_json(MANIFEST).unwrap();
        assert!(m.resolve("nope", "H1", None).is_err());
        assert!(m.resolve("humanoids", "G1", None).is_err());
        assert!(m.resolve("humanoids", "H1", Some("run")).is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            AppManifest::from_json("{\"projects\": 3}"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
