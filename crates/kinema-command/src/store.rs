//! The command store and its process-wide instance.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;

use crate::error::CommandError;
use crate::schema::{CommandGroupSpec, CommandId, CommandInput};

// ── Events ─────────────────────────────────────────────────────────

/// Notification broadcast to every subscribed listener.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandEvent {
    /// A slider value changed (after clamping).
    Changed {
        /// The slider.
        id: CommandId,
        /// The stored value.
        value: f64,
    },
    /// Every slider was restored to its default.
    Reset,
    /// A button was pressed.
    Button {
        /// The button.
        id: CommandId,
    },
}

/// Callback run synchronously when the reset button is pressed.
///
/// Runs while the store is locked; it must not access the store.
pub type ResetCallback = Box<dyn Fn() + Send>;

// ── CommandValues ──────────────────────────────────────────────────

/// Read-only snapshot of every group's slider values.
///
/// Taken once per control tick so observation components never touch
/// the live store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandValues {
    groups: IndexMap<String, Vec<f32>>,
}

impl CommandValues {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one group's values.
    pub fn insert(&mut self, group: impl Into<String>, values: Vec<f32>) {
        self.groups.insert(group.into(), values);
    }

    /// Slider values of `group`, in registration order.
    pub fn group(&self, group: &str) -> Option<&[f32]> {
        self.groups.get(group).map(Vec::as_slice)
    }
}

// ── CommandStore ───────────────────────────────────────────────────

/// Registry of command groups and the current value of every slider.
///
/// # Examples
///
/// ```
/// use kinema_command::{CommandId, CommandStore, velocity_command};
///
/// let mut store = CommandStore::new();
/// let (name, group) = velocity_command();
/// store.register_group(&name, group).unwrap();
///
/// let id = CommandId::new("velocity", "lin_vel_x");
/// assert_eq!(store.set_value(&id, 3.0).unwrap(), 1.0);
/// assert_eq!(store.group_values("velocity"), Some(vec![1.0, 0.0, 0.0]));
/// ```
#[derive(Default)]
pub struct CommandStore {
    groups: IndexMap<String, CommandGroupSpec>,
    values: IndexMap<CommandId, f64>,
    listeners: Vec<Sender<CommandEvent>>,
    reset_callback: Option<ResetCallback>,
}

impl CommandStore {
    /// An empty store with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a group.
    ///
    /// Re-registering a group drops all of its previous inputs and
    /// values; sliders start at their defaults.
    pub fn register_group(
        &mut self,
        name: &str,
        spec: CommandGroupSpec,
    ) -> Result<(), CommandError> {
        let invalid = |reason: String| CommandError::InvalidGroup {
            group: name.to_string(),
            reason,
        };
        for (i, input) in spec.inputs.iter().enumerate() {
            if input.name().is_empty() {
                return Err(invalid(format!("input {i} has an empty name")));
            }
            if spec.inputs[..i].iter().any(|o| o.name() == input.name()) {
                return Err(invalid(format!("duplicate input '{}'", input.name())));
            }
            if let CommandInput::Slider(s) = input {
                s.check()
                    .map_err(|r| invalid(format!("slider '{}': {r}", s.name)))?;
            }
        }

        self.values.retain(|id, _| id.group() != name);
        for input in &spec.inputs {
            if let CommandInput::Slider(s) = input {
                self.values
                    .insert(CommandId::new(name, &s.name), s.clamp(s.default));
            }
        }
        self.groups.insert(name.to_string(), spec);
        tracing::debug!(group = name, "registered command group");
        Ok(())
    }

    /// Registered group names, in registration order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Inputs of `group`, in registration order.
    pub fn inputs(&self, group: &str) -> Option<&[CommandInput]> {
        self.groups.get(group).map(|g| g.inputs.as_slice())
    }

    fn input(&self, id: &CommandId) -> Result<&CommandInput, CommandError> {
        self.groups
            .get(id.group())
            .and_then(|g| g.inputs.iter().find(|i| i.name() == id.name()))
            .ok_or_else(|| CommandError::UnknownCommand { id: id.to_string() })
    }

    /// Clamp `value` into the slider's range and store it.
    ///
    /// Returns the stored value.
    pub fn set_value(&mut self, id: &CommandId, value: f64) -> Result<f64, CommandError> {
        let clamped = match self.input(id)? {
            CommandInput::Slider(s) => s.clamp(value),
            CommandInput::Button(_) => {
                return Err(CommandError::WrongKind {
                    id: id.to_string(),
                    expected: "slider",
                })
            }
        };
        self.values.insert(id.clone(), clamped);
        self.broadcast(CommandEvent::Changed {
            id: id.clone(),
            value: clamped,
        });
        Ok(clamped)
    }

    /// Current value of a slider.
    pub fn value(&self, id: &CommandId) -> Option<f64> {
        self.values.get(id).copied()
    }

    /// Slider values of `group` in registration order. Buttons are
    /// excluded.
    pub fn group_values(&self, group: &str) -> Option<Vec<f64>> {
        let spec = self.groups.get(group)?;
        Some(
            spec.inputs
                .iter()
                .filter_map(|input| match input {
                    CommandInput::Slider(s) => {
                        let id = CommandId::new(group, &s.name);
                        Some(self.values.get(&id).copied().unwrap_or(s.default))
                    }
                    CommandInput::Button(_) => None,
                })
                .collect(),
        )
    }

    /// Snapshot every group's slider values as `f32`.
    pub fn snapshot(&self) -> CommandValues {
        let mut out = CommandValues::new();
        for name in self.groups.keys() {
            if let Some(values) = self.group_values(name) {
                out.insert(name.clone(), values.into_iter().map(|v| v as f32).collect());
            }
        }
        out
    }

    /// Press a button.
    ///
    /// Listeners receive [`CommandEvent::Button`]. Pressing a button
    /// named `reset` additionally runs the reset callback, if one is set.
    pub fn press(&mut self, id: &CommandId) -> Result<(), CommandError> {
        if let CommandInput::Slider(_) = self.input(id)? {
            return Err(CommandError::WrongKind {
                id: id.to_string(),
                expected: "button",
            });
        }
        self.broadcast(CommandEvent::Button { id: id.clone() });
        if id.is_reset() {
            if let Some(cb) = &self.reset_callback {
                cb();
            }
        }
        Ok(())
    }

    /// Install the callback run by the reset button, replacing any
    /// previous one.
    pub fn set_reset_callback(&mut self, callback: ResetCallback) {
        self.reset_callback = Some(callback);
    }

    /// Remove the reset callback.
    pub fn clear_reset_callback(&mut self) {
        self.reset_callback = None;
    }

    /// Subscribe a listener.
    ///
    /// Dropping the receiver unsubscribes; the store prunes it on the
    /// next broadcast.
    pub fn subscribe(&mut self) -> Receiver<CommandEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners.push(tx);
        rx
    }

    /// Number of live listeners as of the last broadcast.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Restore every slider to its default.
    pub fn reset(&mut self) {
        for (group, spec) in &self.groups {
            for input in &spec.inputs {
                if let CommandInput::Slider(s) = input {
                    self.values
                        .insert(CommandId::new(group, &s.name), s.clamp(s.default));
                }
            }
        }
        self.broadcast(CommandEvent::Reset);
    }

    /// Drop every group and value. Listeners and the reset callback
    /// are kept.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.values.clear();
    }

    fn broadcast(&mut self, event: CommandEvent) {
        let before = self.listeners.len();
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
        let pruned = before - self.listeners.len();
        if pruned > 0 {
            tracing::debug!(pruned, "dropped disconnected command listeners");
        }
    }
}

impl std::fmt::Debug for CommandStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStore")
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("values", &self.values)
            .field("listeners", &self.listeners.len())
            .field("reset_callback", &self.reset_callback.is_some())
            .finish()
    }
}

// ── Shared handle ──────────────────────────────────────────────────

/// Cloneable handle to a store shared between the UI and a runtime.
///
/// Locks are held only for the duration of a single operation.
#[derive(Clone, Debug, Default)]
pub struct SharedCommandStore(Arc<Mutex<CommandStore>>);

impl SharedCommandStore {
    /// A fresh, unshared store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the store. A poisoned lock is recovered, since every store
    /// operation leaves it consistent.
    pub fn lock(&self) -> MutexGuard<'_, CommandStore> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

static GLOBAL: OnceLock<SharedCommandStore> = OnceLock::new();

impl CommandStore {
    /// The process-wide store, created on first use.
    pub fn global() -> SharedCommandStore {
        GLOBAL.get_or_init(SharedCommandStore::new).clone()
    }

    /// Replace the process-wide store's contents with an empty store.
    ///
    /// Existing handles stay valid and observe the empty store.
    pub fn reset_global() {
        *Self::global().lock() = CommandStore::new();
    }
}
