//! Errors surfaced by scene and policy loading.

use std::error::Error;
use std::fmt;

use kinema_command::CommandError;
use kinema_core::{AssetError, ConfigError, InferenceError, ObsError, PhysicsError, RenderError};

/// Why [`Runtime::load_environment`](crate::Runtime::load_environment)
/// failed.
///
/// Every variant is fatal for the load; the runtime is left stopped
/// with no scene active.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadError {
    /// An asset could not be fetched or staged.
    Asset(AssetError),
    /// The physics engine rejected the model.
    Physics(PhysicsError),
    /// The renderer could not build the scene.
    Render(RenderError),
    /// The policy config is invalid or does not fit the scene.
    Config(ConfigError),
    /// The network could not be loaded.
    Inference(InferenceError),
    /// The initial observation pass failed.
    Observation(ObsError),
    /// The policy's command groups are malformed.
    Command(CommandError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(e) => write!(f, "asset error: {e}"),
            Self::Physics(e) => write!(f, "physics error: {e}"),
            Self::Render(e) => write!(f, "render error: {e}"),
            Self::Config(e) => write!(f, "policy config error: {e}"),
            Self::Inference(e) => write!(f, "inference error: {e}"),
            Self::Observation(e) => write!(f, "observation error: {e}"),
            Self::Command(e) => write!(f, "command error: {e}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Asset(e) => Some(e),
            Self::Physics(e) => Some(e),
            Self::Render(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Inference(e) => Some(e),
            Self::Observation(e) => Some(e),
            Self::Command(e) => Some(e),
        }
    }
}

impl From<AssetError> for LoadError {
    fn from(e: AssetError) -> Self {
        Self::Asset(e)
    }
}

impl From<PhysicsError> for LoadError {
    fn from(e: PhysicsError) -> Self {
        Self::Physics(e)
    }
}

impl From<RenderError> for LoadError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<InferenceError> for LoadError {
    fn from(e: InferenceError) -> Self {
        Self::Inference(e)
    }
}

impl From<ObsError> for LoadError {
    fn from(e: ObsError) -> Self {
        Self::Observation(e)
    }
}

impl From<CommandError> for LoadError {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}
