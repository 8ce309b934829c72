//! Error types for the Kinema runtime.
//!
//! Organized by the four failure classes the runtime distinguishes:
//!
//! - **Configuration** ([`ConfigError`], [`ObsError`]): fail fast during
//!   load, before the control loop starts. Never recovered.
//! - **Transient** ([`InferenceError`]): logged and swallowed by the
//!   control loop; the previously held action is reused.
//! - **Collaborator** ([`PhysicsError`], [`RenderError`], [`AssetError`]):
//!   surfaced as a load failure.
//! - **Lifecycle**: double-dispose and evicting a live scene are made
//!   unrepresentable by ownership, so they have no error type.

use std::error::Error;
use std::fmt;

// ── ConfigError ────────────────────────────────────────────────────

/// Fatal configuration errors detected while loading a scene or policy.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A policy joint name is not present in the model's joint table.
    UnresolvedJoint {
        /// The joint name that could not be found.
        name: String,
    },
    /// A policy joint exists but cannot be driven as a scalar joint.
    UnsupportedJoint {
        /// The offending joint name.
        name: String,
        /// Why the joint was rejected.
        reason: String,
    },
    /// An observation component name is not registered.
    UnknownObservation {
        /// The unknown component name.
        name: String,
    },
    /// A policy behavior-module name is not registered.
    UnknownBehavior {
        /// The unknown module name.
        name: String,
    },
    /// A required configuration field is missing.
    MissingField {
        /// Dotted path of the missing field.
        field: String,
    },
    /// A per-joint array does not match the number of policy joints.
    LengthMismatch {
        /// Name of the configuration field.
        field: String,
        /// Expected length.
        expected: usize,
        /// Length found in the configuration.
        got: usize,
    },
    /// A parameter value is out of range or otherwise unusable.
    InvalidParameter {
        /// Component or section the parameter belongs to.
        owner: String,
        /// Description of the problem.
        reason: String,
    },
    /// The declared inference inputs/outputs do not match the session.
    InferenceBinding {
        /// Description of the mismatch.
        reason: String,
    },
    /// The configuration document could not be parsed.
    Parse {
        /// Parser error message.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedJoint { name } => write!(f, "joint '{name}' not found in model"),
            Self::UnsupportedJoint { name, reason } => {
                write!(f, "joint '{name}' unsupported: {reason}")
            }
            Self::UnknownObservation { name } => {
                write!(f, "unknown observation component '{name}'")
            }
            Self::UnknownBehavior { name } => write!(f, "unknown policy module '{name}'"),
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::LengthMismatch {
                field,
                expected,
                got,
            } => write!(f, "'{field}' has {got} entries, expected {expected}"),
            Self::InvalidParameter { owner, reason } => write!(f, "{owner}: {reason}"),
            Self::InferenceBinding { reason } => write!(f, "inference binding: {reason}"),
            Self::Parse { reason } => write!(f, "parse error: {reason}"),
        }
    }
}

impl Error for ConfigError {}

// ── ObsError ───────────────────────────────────────────────────────

/// Errors from observation building.
///
/// A length mismatch means a component broke its size contract; the
/// runtime treats it as data corruption and stops rather than feeding a
/// misaligned vector to the policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObsError {
    /// A component produced a vector whose length differs from its
    /// declared size.
    LengthMismatch {
        /// Component name.
        component: String,
        /// Declared size.
        declared: usize,
        /// Length actually produced.
        computed: usize,
    },
    /// An observation group with this name does not exist.
    UnknownGroup {
        /// The requested group name.
        name: String,
    },
}

impl fmt::Display for ObsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch {
                component,
                declared,
                computed,
            } => write!(
                f,
                "observation '{component}' produced {computed} values, declared {declared}"
            ),
            Self::UnknownGroup { name } => write!(f, "unknown observation group '{name}'"),
        }
    }
}

impl Error for ObsError {}

// ── InferenceError ─────────────────────────────────────────────────

/// Errors from the neural-inference collaborator.
///
/// Session creation failures are fatal (they happen at load). Failures
/// of an individual `run` are transient: the control loop logs them and
/// keeps the previously held action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InferenceError {
    /// The engine could not build a session from the model bytes.
    SessionCreation {
        /// Engine-provided reason.
        reason: String,
    },
    /// A `run` call failed inside the engine.
    RunFailed {
        /// Engine-provided reason.
        reason: String,
    },
    /// A declared output was absent from the engine's result.
    MissingOutput {
        /// Name of the missing output.
        name: String,
    },
    /// Tensor data length does not match the product of its shape.
    ShapeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        got: usize,
    },
    /// An output had an unexpected element type.
    WrongType {
        /// Name of the tensor.
        name: String,
    },
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionCreation { reason } => write!(f, "session creation failed: {reason}"),
            Self::RunFailed { reason } => write!(f, "inference run failed: {reason}"),
            Self::MissingOutput { name } => write!(f, "output '{name}' missing from result"),
            Self::ShapeMismatch { expected, got } => {
                write!(f, "tensor has {got} elements, shape implies {expected}")
            }
            Self::WrongType { name } => write!(f, "tensor '{name}' has unexpected dtype"),
        }
    }
}

impl Error for InferenceError {}

// ── PhysicsError ───────────────────────────────────────────────────

/// Errors from the physics collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhysicsError {
    /// The model description could not be compiled.
    LoadFailed {
        /// Engine-provided reason.
        reason: String,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadFailed { reason } => write!(f, "model load failed: {reason}"),
        }
    }
}

impl Error for PhysicsError {}

// ── RenderError ────────────────────────────────────────────────────

/// Errors from the renderer collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderError {
    /// The scene graph could not be built for a model.
    BuildFailed {
        /// Renderer-provided reason.
        reason: String,
    },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildFailed { reason } => write!(f, "render graph build failed: {reason}"),
        }
    }
}

impl Error for RenderError {}

// ── AssetError ─────────────────────────────────────────────────────

/// Errors from asset fetching and the virtual filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetError {
    /// No asset exists at the path.
    NotFound {
        /// The requested path.
        path: String,
    },
    /// The asset exists but could not be read or written.
    Io {
        /// The path involved.
        path: String,
        /// Underlying I/O message.
        reason: String,
    },
    /// The asset is not valid UTF-8 where text was required.
    NotText {
        /// The path involved.
        path: String,
    },
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(f, "asset '{path}' not found"),
            Self::Io { path, reason } => write!(f, "asset '{path}': {reason}"),
            Self::NotText { path } => write!(f, "asset '{path}' is not valid UTF-8"),
        }
    }
}

impl Error for AssetError {}
