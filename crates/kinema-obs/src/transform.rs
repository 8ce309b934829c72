//! Per-component affine transform `raw * scale + bias`.

use kinema_core::{ConfigError, ObsError};
use serde::{Deserialize, Serialize};

use crate::component::ObservationComponent;
use crate::frame::ObsFrame;

/// A scale or bias as written in configuration: one number for every
/// element, or one number per element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AffineParam {
    /// Broadcast to every element.
    Scalar(f32),
    /// One value per output element.
    PerElement(Vec<f32>),
}

impl AffineParam {
    fn expand(&self, size: usize, owner: &str, what: &str) -> Result<Vec<f32>, ConfigError> {
        let values = match self {
            Self::Scalar(v) => vec![*v; size],
            Self::PerElement(v) if v.len() == 1 => vec![v[0]; size],
            Self::PerElement(v) if v.len() == size => v.clone(),
            Self::PerElement(v) => {
                return Err(ConfigError::LengthMismatch {
                    field: format!("{owner}.{what}"),
                    expected: size,
                    got: v.len(),
                })
            }
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                owner: owner.to_string(),
                reason: format!("{what} must be finite"),
            });
        }
        Ok(values)
    }
}

/// Validated element-wise transform.
///
/// # Examples
///
/// ```
/// use kinema_obs::{Affine, AffineParam};
///
/// let t = Affine::new(
///     Some(&AffineParam::Scalar(2.0)),
///     Some(&AffineParam::PerElement(vec![0.0, 1.0])),
///     2,
///     "JointVelocities",
/// ).unwrap();
/// let mut v = [1.0, 1.0];
/// t.apply(&mut v);
/// assert_eq!(v, [2.0, 3.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Affine {
    scale: Vec<f32>,
    bias: Vec<f32>,
}

impl Affine {
    /// Validate `scale` and `bias` against an output of length `size`.
    ///
    /// Missing parameters default to scale 1 and bias 0.
    pub fn new(
        scale: Option<&AffineParam>,
        bias: Option<&AffineParam>,
        size: usize,
        owner: &str,
    ) -> Result<Self, ConfigError> {
        let scale = match scale {
            Some(p) => p.expand(size, owner, "scale")?,
            None => vec![1.0; size],
        };
        let bias = match bias {
            Some(p) => p.expand(size, owner, "bias")?,
            None => vec![0.0; size],
        };
        Ok(Self { scale, bias })
    }

    /// Apply in place. `values` must have the validated length.
    pub fn apply(&self, values: &mut [f32]) {
        for ((v, s), b) in values.iter_mut().zip(&self.scale).zip(&self.bias) {
            *v = *v * s + b;
        }
    }
}

/// Wraps a component with an [`Affine`] transform.
pub struct Scaled {
    inner: Box<dyn ObservationComponent>,
    affine: Affine,
}

impl Scaled {
    /// Wrap `inner`; `affine` must be validated against `inner.size()`.
    pub fn new(inner: Box<dyn ObservationComponent>, affine: Affine) -> Self {
        Self { inner, affine }
    }
}

impl ObservationComponent for Scaled {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn update(&mut self, frame: &ObsFrame<'_>) -> Result<(), ObsError> {
        self.inner.update(frame)
    }

    fn reset(&mut self, frame: &ObsFrame<'_>) -> Result<(), ObsError> {
        self.inner.reset(frame)
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        let mut out = self.inner.compute(frame);
        // Wrong lengths pass through untouched for the caller to reject.
        if out.len() == self.inner.size() {
            self.affine.apply(&mut out);
        }
        out
    }
}
