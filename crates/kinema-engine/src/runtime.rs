//! The lockstep control loop.
//!
//! [`Runtime`] owns everything needed to run one scene with one policy:
//! a key into the shared [`SceneCache`], the bound policy, the held
//! action and at most one in-flight inference call. Each call to
//! [`tick()`](Runtime::tick) runs one control period:
//!
//! ```text
//! drain requests ─► observe ─► dispatch (if idle) ─► poll ─► substeps ─► frame
//! ```
//!
//! # Ownership model
//!
//! `Runtime` is [`Send`] but not shared. Every mutating method takes
//! `&mut self`, so a scene load can never interleave with a tick. The
//! cache owns all scene resources; the runtime holds only the active
//! [`SceneKey`] and drops it before a load asks the cache for room.
//!
//! # Inference
//!
//! Inference is polled, never awaited. A tick whose call has not
//! completed keeps applying the previous action. Results that complete
//! after a reset or a reload are discarded.
//!
//! # Observation faults
//!
//! An observation that cannot be assembled means the policy's inputs no
//! longer match what it was bound with. The runtime drops the policy,
//! records the error in [`last_error`](Runtime::last_error) and stops
//! without stepping.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use futures::FutureExt;
use kinema_cache::{CacheEntry, SceneCache, SharedSceneCache};
use kinema_command::{CommandError, CommandStore, CommandValues, SharedCommandStore};
use kinema_core::{ConfigError, InferenceFuture, ObsError, SceneKey, SimState, TickId};
use kinema_obs::ComponentRegistry;
use kinema_policy::{decimation, BehaviorRegistry, BoundPolicy, PolicyConfig};

use crate::config::RuntimeConfig;
use crate::drag::{apply_drag, DragInput};
use crate::error::LoadError;
use crate::frame::BodyFrame;
use crate::loader::{self, Backends};
use crate::metrics::TickMetrics;
use crate::requests::{ControlHandle, ControlRequest, Drained};

// Fails to compile if any field is !Send.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Runtime>();
    }
};

// ── RuntimePhase ────────────────────────────────────────────────

/// Lifecycle of a [`Runtime`].
///
/// `Idle → Loading → Running ⇄ Stopped`. A failed load ends in
/// `Stopped` with no scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimePhase {
    /// Nothing has been loaded yet.
    Idle,
    /// A load is in progress.
    Loading,
    /// Ticks advance the simulation.
    Running,
    /// Ticks do nothing until [`Runtime::start`].
    Stopped,
}

// ── Active policy ───────────────────────────────────────────────

struct InFlight {
    future: InferenceFuture,
    generation: u64,
    dispatched: TickId,
    stalled: bool,
}

struct ActivePolicy {
    bound: BoundPolicy,
    action: Vec<f32>,
    in_flight: Option<InFlight>,
}

impl ActivePolicy {
    fn new(bound: BoundPolicy) -> Self {
        Self {
            action: vec![0.0; bound.action_len()],
            bound,
            in_flight: None,
        }
    }

    /// Observe, dispatch if idle, then poll the slot once.
    ///
    /// An observation error leaves the pipeline partially advanced; the
    /// caller must drop the policy.
    fn advance(
        &mut self,
        state: &SimState,
        commands: &CommandValues,
        now: TickId,
        generation: u64,
        stall_ticks: u64,
        metrics: &mut TickMetrics,
    ) -> Result<(), ObsError> {
        let snapshot = self.bound.extract(state);
        let observations = self.bound.observe(&snapshot, &self.action, commands)?;
        if self.in_flight.is_none() {
            match self.bound.request(&observations) {
                Ok(future) => {
                    self.in_flight = Some(InFlight {
                        future,
                        generation,
                        dispatched: now,
                        stalled: false,
                    });
                    metrics.inference_dispatched = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not assemble inference inputs");
                    metrics.inference_failed = true;
                }
            }
        }
        self.poll(now, generation, stall_ticks, metrics);
        Ok(())
    }

    fn poll(&mut self, now: TickId, generation: u64, stall_ticks: u64, metrics: &mut TickMetrics) {
        let Some(slot) = self.in_flight.as_mut() else {
            return;
        };
        let Some(result) = (&mut slot.future).now_or_never() else {
            let waited = now.0.saturating_sub(slot.dispatched.0);
            if waited >= stall_ticks && !slot.stalled {
                slot.stalled = true;
                tracing::warn!(ticks = waited, "inference still in flight; holding previous action");
            }
            return;
        };
        let stale = slot.generation != generation;
        self.in_flight = None;
        match result {
            _ if stale => {
                tracing::debug!("discarding inference result dispatched before reset");
                metrics.inference_discarded = true;
            }
            Ok(outputs) => match self.bound.accept(outputs) {
                Ok(action) => {
                    self.action = action;
                    metrics.inference_adopted = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rejected inference output; holding previous action");
                    metrics.inference_failed = true;
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "inference failed; holding previous action");
                metrics.inference_failed = true;
            }
        }
    }

    fn reset(&mut self, state: &SimState, commands: &CommandValues) -> Result<(), ObsError> {
        self.action.fill(0.0);
        self.bound.reset(state, commands).map(drop)
    }
}

// ── Runtime ─────────────────────────────────────────────────────

/// Single-owner control loop for one scene and policy at a time.
///
/// # Example
///
/// ```ignore
/// let mut runtime = Runtime::new(backends, RuntimeConfig::default())?;
/// runtime.load_environment("main/assets/go1/scene.xml", Some("main/assets/go1/walk.json"))?;
/// loop {
///     runtime.tick();
///     runtime.render();
/// }
/// ```
pub struct Runtime {
    config: RuntimeConfig,
    backends: Backends,
    cache: SharedSceneCache,
    commands: SharedCommandStore,
    components: ComponentRegistry,
    behaviors: BehaviorRegistry,
    phase: RuntimePhase,
    scene: Option<SceneKey>,
    policy: Option<ActivePolicy>,
    decimation: usize,
    timestep: f64,
    drag: Option<DragInput>,
    generation: u64,
    tick: TickId,
    frame: Option<BodyFrame>,
    last_error: Option<ObsError>,
    tx: Sender<ControlRequest>,
    rx: Receiver<ControlRequest>,
}

impl Runtime {
    /// A runtime over the process-wide cache and command store, with the
    /// built-in component and behavior registries.
    pub fn new(backends: Backends, config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, rx) = crossbeam_channel::unbounded();
        Ok(Self {
            config,
            backends,
            cache: SceneCache::global(),
            commands: CommandStore::global(),
            components: ComponentRegistry::builtin(),
            behaviors: BehaviorRegistry::builtin(),
            phase: RuntimePhase::Idle,
            scene: None,
            policy: None,
            decimation: 1,
            timestep: 0.0,
            drag: None,
            generation: 0,
            tick: TickId(0),
            frame: None,
            last_error: None,
            tx,
            rx,
        })
    }

    /// Use `cache` instead of the process-wide cache.
    pub fn with_cache(mut self, cache: SharedSceneCache) -> Self {
        self.cache = cache;
        self
    }

    /// Use `commands` instead of the process-wide command store.
    pub fn with_command_store(mut self, commands: SharedCommandStore) -> Self {
        self.commands = commands;
        self
    }

    /// Resolve observation components from `components`.
    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    /// Resolve behavior modules from `behaviors`.
    pub fn with_behaviors(mut self, behaviors: BehaviorRegistry) -> Self {
        self.behaviors = behaviors;
        self
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Current lifecycle phase.
    pub fn phase(&self) -> RuntimePhase {
        self.phase
    }

    /// The active scene, if one is loaded.
    pub fn scene(&self) -> Option<&SceneKey> {
        self.scene.as_ref()
    }

    /// The configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The cache this runtime loads into.
    pub fn cache(&self) -> &SharedSceneCache {
        &self.cache
    }

    /// The command store this runtime reads.
    pub fn commands(&self) -> &SharedCommandStore {
        &self.commands
    }

    /// Ticks completed since construction. Reset ticks do not count.
    pub fn tick_id(&self) -> TickId {
        self.tick
    }

    /// Physics substeps per tick for the active scene.
    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Wall-clock length of one tick: `decimation * timestep` for the
    /// active scene, or the configured control period when none is
    /// loaded.
    pub fn control_period(&self) -> Duration {
        let scene_period = self.decimation as f64 * self.timestep;
        let secs = if self.scene.is_some() && scene_period > 0.0 {
            scene_period
        } else {
            self.config.control_dt
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    /// The bound policy, if any.
    pub fn policy(&self) -> Option<&BoundPolicy> {
        self.policy.as_ref().map(|p| &p.bound)
    }

    /// The action applied on every substep, if a policy is active.
    pub fn held_action(&self) -> Option<&[f32]> {
        self.policy.as_ref().map(|p| p.action.as_slice())
    }

    /// Whether an inference call is outstanding.
    pub fn inference_in_flight(&self) -> bool {
        self.policy
            .as_ref()
            .is_some_and(|p| p.in_flight.is_some())
    }

    /// The drag currently applied.
    pub fn drag(&self) -> Option<&DragInput> {
        self.drag.as_ref()
    }

    /// The last completed frame.
    pub fn frame(&self) -> Option<&BodyFrame> {
        self.frame.as_ref()
    }

    /// The observation fault that stopped the runtime, if any. Cleared
    /// by the next load.
    pub fn last_error(&self) -> Option<&ObsError> {
        self.last_error.as_ref()
    }

    /// A sender for requests applied at the next tick boundary.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle::new(self.tx.clone())
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Pause ticking. Returns whether the runtime was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.phase == RuntimePhase::Running;
        if was_running {
            self.phase = RuntimePhase::Stopped;
        }
        was_running
    }

    /// Resume ticking a loaded scene. Returns whether the runtime is now
    /// running.
    pub fn start(&mut self) -> bool {
        if self.phase == RuntimePhase::Stopped && self.scene.is_some() {
            self.phase = RuntimePhase::Running;
        }
        self.phase == RuntimePhase::Running
    }

    /// Switch to `scene_path`, optionally running the policy whose config
    /// is at `policy_path`.
    ///
    /// The scene's resources come from the cache when present; otherwise
    /// the least recently used scenes are evicted to make room and the
    /// scene is loaded fresh. On success the runtime is running.
    ///
    /// # Errors
    ///
    /// Any failure leaves the runtime stopped with no active scene. A
    /// scene that loaded before a policy error stays cached.
    pub fn load_environment(
        &mut self,
        scene_path: &str,
        policy_path: Option<&str>,
    ) -> Result<(), LoadError> {
        self.stop();
        self.phase = RuntimePhase::Loading;
        self.scene = None;
        self.policy = None;
        self.drag = None;
        self.frame = None;
        self.last_error = None;
        self.generation += 1;
        self.rx.try_iter().for_each(drop);

        match self.try_load(scene_path, policy_path) {
            Ok(()) => {
                self.phase = RuntimePhase::Running;
                tracing::info!(
                    scene = scene_path,
                    policy = policy_path.unwrap_or("none"),
                    decimation = self.decimation,
                    "environment loaded"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(scene = scene_path, error = %e, "environment load failed");
                self.scene = None;
                self.policy = None;
                self.frame = None;
                self.phase = RuntimePhase::Stopped;
                Err(e)
            }
        }
    }

    fn try_load(&mut self, scene_path: &str, policy_path: Option<&str>) -> Result<(), LoadError> {
        let policy_config = match policy_path {
            Some(path) => Some(PolicyConfig::from_json(
                &self.backends.assets.fetch_text(path)?,
            )?),
            None => None,
        };
        self.install_commands(policy_config.as_ref())?;

        let key = SceneKey::new(scene_path);
        let shared = self.cache.clone();
        let mut cache = shared.lock();
        if cache.has(&key) {
            tracing::debug!(scene = %key, "scene cache hit");
        } else {
            let evicted = cache.prepare_for_new_scene();
            if !evicted.is_empty() {
                tracing::debug!(scene = %key, evicted = evicted.len(), "made room for scene");
            }
            let entry = loader::load_scene(&mut cache, &self.backends, scene_path)?;
            cache.set(key.clone(), entry);
        }
        let entry = cache
            .get(&key)
            .ok_or_else(|| ConfigError::InvalidParameter {
                owner: "scene cache".into(),
                reason: format!("'{key}' was evicted during its own load"),
            })?;

        let sim = entry.sim_mut();
        let state = sim.state_mut();
        state.clear_applied_forces();
        state.ctrl.fill(0.0);
        sim.forward();
        publish_lights(entry);

        self.timestep = entry.sim().layout().timestep;
        self.decimation = decimation(self.config.control_dt, self.timestep);
        if let (Some(config), Some(path)) = (policy_config, policy_path) {
            let network = loader::sibling_path(path, &config.onnx.path);
            let bytes = self.backends.assets.fetch(&network)?;
            let session = self.backends.inference.create_session(&bytes)?;
            let bound = BoundPolicy::bind(
                config,
                entry.sim().layout(),
                session,
                &self.components,
                &self.behaviors,
                self.config.control_dt,
            )?;
            let mut policy = ActivePolicy::new(bound);
            let commands = self.commands.lock().snapshot();
            policy.bound.reset(entry.sim().state(), &commands)?;
            self.decimation = policy.bound.decimation();
            self.policy = Some(policy);
        }

        self.frame = Some(BodyFrame::capture(self.tick, entry.sim().state()));
        self.scene = Some(key);
        Ok(())
    }

    /// Replace the command store's groups with the policy's and route
    /// the reset button to this runtime.
    fn install_commands(&self, config: Option<&PolicyConfig>) -> Result<(), CommandError> {
        let mut store = self.commands.lock();
        store.clear();
        if let Some(config) = config {
            for (name, spec) in &config.commands {
                store.register_group(name, spec.clone())?;
            }
        }
        let handle = self.handle();
        store.set_reset_callback(Box::new(move || {
            handle.request_reset();
        }));
        store.reset();
        Ok(())
    }

    // ── Ticking ─────────────────────────────────────────────────

    /// Run one control period.
    ///
    /// Does nothing unless the runtime is running. A tick that processes
    /// a reset request performs the reset and publishes the initial
    /// transforms without stepping.
    pub fn tick(&mut self) -> TickMetrics {
        let started = Instant::now();
        let mut metrics = TickMetrics::default();
        if self.phase != RuntimePhase::Running {
            return metrics;
        }
        let drained = self.drain_requests();
        let Some(key) = self.scene.clone() else {
            return metrics;
        };
        let shared = self.cache.clone();
        let mut cache = shared.lock();
        let Some(entry) = cache.peek_mut(&key) else {
            tracing::warn!(scene = %key, "active scene is no longer cached; stopping");
            self.scene = None;
            self.policy = None;
            self.phase = RuntimePhase::Stopped;
            return metrics;
        };

        if drained.reset {
            self.reset_entry(entry);
            metrics.reset = true;
        }
        if let Some(drag) = drained.drag {
            self.drag = drag;
        }
        if metrics.reset {
            metrics.total_us = elapsed_us(started);
            return metrics;
        }

        if let Some(policy) = self.policy.as_mut() {
            let commands = self.commands.lock().snapshot();
            let advanced = policy.advance(
                entry.sim().state(),
                &commands,
                self.tick,
                self.generation,
                self.config.inference_timeout_ticks,
                &mut metrics,
            );
            if let Err(e) = advanced {
                metrics.observation_failed = true;
                self.fail_policy(e);
                metrics.total_us = elapsed_us(started);
                return metrics;
            }
        }

        let sim = entry.sim_mut();
        for _ in 0..self.decimation {
            let state = sim.state_mut();
            state.clear_applied_forces();
            if let Some(drag) = &self.drag {
                apply_drag(state, self.config.drag_stiffness, drag);
            }
            if let Some(policy) = &self.policy {
                policy.bound.apply(&policy.action, state);
            }
            sim.step();
        }
        metrics.substeps = self.decimation as u32;

        self.tick = TickId(self.tick.0 + 1);
        self.frame = Some(BodyFrame::capture(self.tick, sim.state()));
        metrics.total_us = elapsed_us(started);
        metrics
    }

    fn drain_requests(&self) -> Drained {
        let mut drained = Drained::default();
        for request in self.rx.try_iter() {
            drained.push(request);
        }
        drained
    }

    /// Restore the active scene's initial condition now.
    ///
    /// Clears the drag and applied forces, zeroes controls and the held
    /// action, reseeds observation history and discards any in-flight
    /// inference result. Returns `false` if no scene is active.
    pub fn reset(&mut self) -> bool {
        let Some(key) = self.scene.clone() else {
            return false;
        };
        let shared = self.cache.clone();
        let mut cache = shared.lock();
        match cache.peek_mut(&key) {
            Some(entry) => {
                self.reset_entry(entry);
                true
            }
            None => false,
        }
    }

    fn reset_entry(&mut self, entry: &mut CacheEntry) {
        let sim = entry.sim_mut();
        sim.reset();
        let state = sim.state_mut();
        state.clear_applied_forces();
        state.ctrl.fill(0.0);
        self.drag = None;
        self.generation += 1;
        let reseeded = match self.policy.as_mut() {
            Some(policy) => {
                let commands = self.commands.lock().snapshot();
                policy.reset(sim.state(), &commands)
            }
            None => Ok(()),
        };
        self.frame = Some(BodyFrame::capture(self.tick, sim.state()));
        tracing::debug!(generation = self.generation, "runtime reset");
        if let Err(e) = reseeded {
            self.fail_policy(e);
        }
    }

    /// Drop the policy after an observation fault and stop.
    fn fail_policy(&mut self, error: ObsError) {
        tracing::error!(scene = ?self.scene, error = %error, "observation failed; stopping policy");
        self.policy = None;
        self.generation += 1;
        self.phase = RuntimePhase::Stopped;
        self.last_error = Some(error);
    }

    // ── Rendering ───────────────────────────────────────────────

    /// Write the last completed frame into the active scene's render
    /// graph. Returns `false` if there is nothing to draw.
    pub fn render(&self) -> bool {
        let (Some(key), Some(frame)) = (&self.scene, &self.frame) else {
            return false;
        };
        let mut cache = self.cache.lock();
        match cache.peek_mut(key) {
            Some(entry) => {
                frame.write_to(entry.graph_mut());
                true
            }
            None => false,
        }
    }
}

fn publish_lights(entry: &mut CacheEntry) {
    let lights = entry.lights().to_vec();
    let graph = entry.graph_mut();
    for (i, light) in lights.iter().enumerate() {
        graph.set_light(i, light);
    }
}

fn elapsed_us(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("phase", &self.phase)
            .field("scene", &self.scene)
            .field("policy", &self.policy.as_ref().map(|p| &p.bound))
            .field("decimation", &self.decimation)
            .field("tick", &self.tick)
            .field("generation", &self.generation)
            .field("in_flight", &self.inference_in_flight())
            .finish_non_exhaustive()
    }
}
