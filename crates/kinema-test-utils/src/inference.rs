//! A scriptable stand-in for the inference engine.
//!
//! [`MockSession`] answers every request with a fixed action vector.
//! Recurrent outputs (any output after the first that is also an input)
//! echo the request's value plus one, so tests can see state being
//! carried between calls. A gated session holds every response until
//! the test opens the gate, which models a slow backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;

use futures::future;
use kinema_core::{
    DType, InferenceEngine, InferenceError, InferenceFuture, InferenceSession, NamedTensors,
    Tensor, TensorShape, TensorSpec,
};

/// An `f32` tensor spec.
pub fn spec(name: &str, shape: &[usize]) -> TensorSpec {
    TensorSpec {
        name: name.to_string(),
        shape: TensorShape::from_slice(shape),
        dtype: DType::F32,
    }
}

#[derive(Debug)]
struct Shared {
    calls: AtomicUsize,
    completed: AtomicUsize,
    gated: AtomicBool,
    open: AtomicBool,
    failing: AtomicBool,
    response: Mutex<Option<Vec<f32>>>,
}

/// Test-side handle to a session's behavior and counters.
#[derive(Clone, Debug)]
pub struct SessionHandle(Arc<Shared>);

impl SessionHandle {
    /// Requests started.
    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    /// Requests that produced a response (success or failure).
    pub fn completed(&self) -> usize {
        self.0.completed.load(Ordering::SeqCst)
    }

    /// Hold every response until [`open`](Self::open) is called.
    pub fn gate(&self) {
        self.0.gated.store(true, Ordering::SeqCst);
        self.0.open.store(false, Ordering::SeqCst);
    }

    /// Release held responses and stop gating.
    pub fn open(&self) {
        self.0.open.store(true, Ordering::SeqCst);
        self.0.gated.store(false, Ordering::SeqCst);
    }

    /// Make every subsequent response an error, or stop doing so.
    pub fn set_failing(&self, failing: bool) {
        self.0.failing.store(failing, Ordering::SeqCst);
    }

    /// Replace the action returned by subsequent responses.
    pub fn set_response(&self, action: Vec<f32>) {
        *self.0.response.lock().unwrap_or_else(PoisonError::into_inner) = Some(action);
    }
}

/// Mock inference session with declared I/O.
#[derive(Clone, Debug)]
pub struct MockSession {
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    shared: Arc<Shared>,
}

impl MockSession {
    /// A session answering with zeros.
    pub fn new(inputs: Vec<TensorSpec>, outputs: Vec<TensorSpec>) -> Self {
        Self {
            inputs,
            outputs,
            shared: Arc::new(Shared {
                calls: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                gated: AtomicBool::new(false),
                open: AtomicBool::new(false),
                failing: AtomicBool::new(false),
                response: Mutex::new(None),
            }),
        }
    }

    /// Answer with `action` instead of zeros.
    pub fn with_response(self, action: Vec<f32>) -> Self {
        self.handle().set_response(action);
        self
    }

    /// Start with the gate closed.
    pub fn gated(self) -> Self {
        self.handle().gate();
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle(self.shared.clone())
    }

    fn respond(&self, inputs: &NamedTensors) -> Result<NamedTensors, InferenceError> {
        if self.shared.failing.load(Ordering::SeqCst) {
            return Err(InferenceError::RunFailed {
                reason: "mock failure".into(),
            });
        }
        let response = self
            .shared
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut out = NamedTensors::new();
        for (i, spec) in self.outputs.iter().enumerate() {
            let tensor = match (i, inputs.get(&spec.name), &response) {
                (0, _, Some(action)) => Tensor::from_f32(&spec.shape, action.clone())?,
                (0, _, None) => Tensor::zeros(&spec.shape, spec.dtype),
                (_, Some(prev), _) => {
                    let next = prev
                        .as_f32()
                        .map(|v| v.iter().map(|x| x + 1.0).collect())
                        .unwrap_or_default();
                    Tensor::from_f32(prev.shape(), next)?
                }
                (_, None, _) => Tensor::zeros(&spec.shape, spec.dtype),
            };
            out.insert(spec.name.clone(), tensor);
        }
        Ok(out)
    }
}

impl InferenceSession for MockSession {
    fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn run(&self, inputs: NamedTensors) -> InferenceFuture {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        let session = self.clone();
        let held = session.shared.gated.load(Ordering::SeqCst);
        Box::pin(future::poll_fn(move |_cx| {
            if held && !session.shared.open.load(Ordering::SeqCst) {
                return Poll::Pending;
            }
            session.shared.completed.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(session.respond(&inputs))
        }))
    }
}

/// Mock inference engine that hands out clones of one session.
///
/// Clones share the session's handle, so a test can keep steering the
/// session after the runtime has created its own copy.
#[derive(Clone, Debug)]
pub struct MockInference {
    template: MockSession,
    created: Arc<AtomicUsize>,
}

impl MockInference {
    pub fn new(template: MockSession) -> Self {
        Self {
            template,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.template.handle()
    }

    /// Sessions created so far.
    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl InferenceEngine for MockInference {
    fn create_session(&self, model: &[u8]) -> Result<Box<dyn InferenceSession>, InferenceError> {
        if model.is_empty() {
            return Err(InferenceError::SessionCreation {
                reason: "empty model file".into(),
            });
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.clone()))
    }
}
