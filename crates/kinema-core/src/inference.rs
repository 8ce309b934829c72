//! Neural-inference collaborator interface and tensor types.
//!
//! Inputs and outputs are named, typed, shaped numeric tensors. A
//! session's `run` returns a boxed future so that the control loop can
//! keep stepping physics while a slow backend computes; the loop polls
//! the future without blocking once per tick.

use futures::future::BoxFuture;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::InferenceError;

/// Tensor dimensions, outermost first.
pub type TensorShape = SmallVec<[usize; 4]>;

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    /// 32-bit float.
    F32,
    /// 64-bit signed integer.
    I64,
    /// Boolean.
    Bool,
}

/// Typed tensor storage.
#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    /// 32-bit float elements.
    F32(Vec<f32>),
    /// 64-bit integer elements.
    I64(Vec<i64>),
    /// Boolean elements.
    Bool(Vec<bool>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::F32,
            Self::I64(_) => DType::I64,
            Self::Bool(_) => DType::Bool,
        }
    }
}

/// A shaped, typed block of numbers.
///
/// # Examples
///
/// ```
/// use kinema_core::Tensor;
///
/// let t = Tensor::from_f32(&[1, 3], vec![0.1, 0.2, 0.3]).unwrap();
/// assert_eq!(t.shape(), &[1, 3]);
/// assert_eq!(t.as_f32(), Some(&[0.1f32, 0.2, 0.3][..]));
///
/// assert!(Tensor::from_f32(&[2, 2], vec![0.0; 3]).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: TensorShape,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: &[usize], data: TensorData) -> Result<Self, InferenceError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            shape: SmallVec::from_slice(shape),
            data,
        })
    }

    /// Build an `f32` tensor.
    pub fn from_f32(shape: &[usize], data: Vec<f32>) -> Result<Self, InferenceError> {
        Self::new(shape, TensorData::F32(data))
    }

    /// A zero-filled tensor of the given shape and type.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let n: usize = shape.iter().product();
        let data = match dtype {
            DType::F32 => TensorData::F32(vec![0.0; n]),
            DType::I64 => TensorData::I64(vec![0; n]),
            DType::Bool => TensorData::Bool(vec![false; n]),
        };
        Self {
            shape: SmallVec::from_slice(shape),
            data,
        }
    }

    /// Dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Raw storage.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Elements as `f32`, if that is the element type.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered name → tensor map used for both inputs and outputs.
pub type NamedTensors = IndexMap<String, Tensor>;

/// Declared signature of one session input or output.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorSpec {
    /// Tensor name.
    pub name: String,
    /// Declared shape (dynamic dimensions reported as 1).
    pub shape: TensorShape,
    /// Element type.
    pub dtype: DType,
}

/// Future returned by [`InferenceSession::run`].
pub type InferenceFuture = BoxFuture<'static, Result<NamedTensors, InferenceError>>;

/// A loaded network ready to run.
pub trait InferenceSession: Send {
    /// Declared inputs.
    fn inputs(&self) -> &[TensorSpec];

    /// Declared outputs.
    fn outputs(&self) -> &[TensorSpec];

    /// Start one forward pass.
    ///
    /// The returned future owns everything it needs; it may complete
    /// immediately or several control ticks later.
    fn run(&self, inputs: NamedTensors) -> InferenceFuture;
}

/// Entry point of the neural-inference collaborator.
pub trait InferenceEngine: Send + Sync {
    /// Build a session from serialized model bytes.
    fn create_session(&self, model: &[u8]) -> Result<Box<dyn InferenceSession>, InferenceError>;
}
