//! Command definitions as they appear in a policy configuration file.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully-qualified command identifier, written `group:name`.
///
/// # Examples
///
/// ```
/// use kinema_command::CommandId;
///
/// let id = CommandId::new("velocity", "lin_vel_x");
/// assert_eq!(id.to_string(), "velocity:lin_vel_x");
/// assert_eq!(CommandId::parse("velocity:lin_vel_x"), Some(id));
/// assert_eq!(CommandId::parse("no_separator"), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommandId {
    group: String,
    name: String,
}

impl CommandId {
    /// Build an id from its group and input name.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parse a `group:name` string. Returns `None` without a separator.
    pub fn parse(s: &str) -> Option<Self> {
        let (group, name) = s.split_once(':')?;
        if group.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(group, name))
    }

    /// The owning group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The input name within the group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the distinguished reset button.
    pub fn is_reset(&self) -> bool {
        self.name == RESET_COMMAND
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// Input name of the distinguished reset button.
pub const RESET_COMMAND: &str = "reset";

fn default_step() -> f64 {
    0.01
}

/// A bounded scalar input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SliderSpec {
    /// Input name within the group.
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// UI step size.
    #[serde(default = "default_step")]
    pub step: f64,
    /// Initial value.
    #[serde(default)]
    pub default: f64,
}

impl SliderSpec {
    /// A slider with the default step.
    pub fn new(name: impl Into<String>, label: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            min,
            max,
            step: default_step(),
            default,
        }
    }

    /// Same slider with a different step size.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Clamp `v` into `[min, max]`. NaN clamps to the default.
    pub fn clamp(&self, v: f64) -> f64 {
        if v.is_nan() {
            return self.default.clamp(self.min, self.max);
        }
        v.clamp(self.min, self.max)
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err("bounds must be finite".into());
        }
        if self.min > self.max {
            return Err(format!("min {} exceeds max {}", self.min, self.max));
        }
        if !self.default.is_finite() {
            return Err("default must be finite".into());
        }
        Ok(())
    }
}

/// A one-shot input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ButtonSpec {
    /// Input name within the group.
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
}

/// One input of a command group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommandInput {
    /// A bounded scalar.
    Slider(SliderSpec),
    /// A one-shot button.
    Button(ButtonSpec),
}

impl CommandInput {
    /// Input name within the group.
    pub fn name(&self) -> &str {
        match self {
            Self::Slider(s) => &s.name,
            Self::Button(b) => &b.name,
        }
    }

    /// Display label.
    pub fn label(&self) -> &str {
        match self {
            Self::Slider(s) => &s.label,
            Self::Button(b) => &b.label,
        }
    }
}

/// Schema of one command group as it appears under `commands.<name>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandGroupSpec {
    /// Inputs in registration order.
    #[serde(default)]
    pub inputs: Vec<CommandInput>,
}

impl CommandGroupSpec {
    /// Number of sliders; the length of the group's value vector.
    pub fn slider_count(&self) -> usize {
        self.inputs
            .iter()
            .filter(|i| matches!(i, CommandInput::Slider(_)))
            .count()
    }
}

/// The standard locomotion velocity command group.
///
/// Three sliders named `lin_vel_x`, `lin_vel_y`, `ang_vel_z` with step
/// 0.05; forward velocity defaults to 0.5.
pub fn velocity_command() -> (String, CommandGroupSpec) {
    let inputs = vec![
        CommandInput::Slider(
            SliderSpec::new("lin_vel_x", "Forward Velocity", -1.0, 1.0, 0.5).with_step(0.05),
        ),
        CommandInput::Slider(
            SliderSpec::new("lin_vel_y", "Lateral Velocity", -0.5, 0.5, 0.0).with_step(0.05),
        ),
        CommandInput::Slider(
            SliderSpec::new("ang_vel_z", "Yaw Rate", -1.0, 1.0, 0.0).with_step(0.05),
        ),
    ];
    ("velocity".to_string(), CommandGroupSpec { inputs })
}
