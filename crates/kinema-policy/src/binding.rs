//! Binding observation groups and recurrent state to network tensors.

use indexmap::IndexMap;
use kinema_core::{
    ConfigError, DType, InferenceError, InferenceSession, NamedTensors, Tensor, TensorShape,
    TensorSpec,
};

use crate::config::NetworkMeta;
use crate::pipeline::Observations;

#[derive(Clone, Debug, PartialEq)]
enum InputSource {
    Group { shape: TensorShape },
    Carried,
}

/// Validated mapping between a session's declared I/O and the
/// pipeline's observation groups.
///
/// Every network input is either an observation group of matching size
/// or a recurrent state: an output with the same name whose value is
/// copied into the next request unchanged. The first output key is the
/// action.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceBinding {
    inputs: Vec<(String, InputSource)>,
    out_keys: Vec<String>,
    action_len: usize,
    carried: IndexMap<String, Tensor>,
    carried_init: IndexMap<String, Tensor>,
}

fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn find<'a>(specs: &'a [TensorSpec], name: &str) -> Option<&'a TensorSpec> {
    specs.iter().find(|s| s.name == name)
}

fn binding_error(reason: String) -> ConfigError {
    ConfigError::InferenceBinding { reason }
}

impl InferenceBinding {
    /// Check `meta` against the session's declared I/O.
    ///
    /// Empty key lists in `meta` default to the session's own
    /// declarations.
    pub fn new(
        session: &dyn InferenceSession,
        meta: &NetworkMeta,
        group_sizes: &IndexMap<String, usize>,
        action_len: usize,
    ) -> Result<Self, ConfigError> {
        let declared_inputs = session.inputs();
        let declared_outputs = session.outputs();
        let in_keys: Vec<String> = if meta.in_keys.is_empty() {
            declared_inputs.iter().map(|s| s.name.clone()).collect()
        } else {
            meta.in_keys.clone()
        };
        let out_keys: Vec<String> = if meta.out_keys.is_empty() {
            declared_outputs.iter().map(|s| s.name.clone()).collect()
        } else {
            meta.out_keys.clone()
        };

        let action_key = out_keys
            .first()
            .ok_or_else(|| binding_error("network declares no outputs".into()))?;
        for key in &out_keys {
            if find(declared_outputs, key).is_none() {
                return Err(binding_error(format!("network has no output '{key}'")));
            }
        }
        if let Some(spec) = find(declared_outputs, action_key) {
            if spec.dtype != DType::F32 || numel(&spec.shape) != action_len {
                return Err(binding_error(format!(
                    "action output '{action_key}' must be {action_len} f32 values, network declares {:?} {:?}",
                    spec.dtype,
                    spec.shape.as_slice()
                )));
            }
        }

        let mut inputs = Vec::with_capacity(in_keys.len());
        let mut carried = IndexMap::new();
        for key in &in_keys {
            let spec = find(declared_inputs, key)
                .ok_or_else(|| binding_error(format!("network has no input '{key}'")))?;
            if let Some(&size) = group_sizes.get(key) {
                if spec.dtype != DType::F32 {
                    return Err(binding_error(format!("input '{key}' is not f32")));
                }
                if numel(&spec.shape) != size {
                    return Err(binding_error(format!(
                        "input '{key}' expects {} values, observation group produces {size}",
                        numel(&spec.shape)
                    )));
                }
                inputs.push((key.clone(), InputSource::Group { shape: spec.shape.clone() }));
            } else if out_keys.contains(key) && key != action_key {
                carried.insert(key.clone(), Tensor::zeros(&spec.shape, spec.dtype));
                inputs.push((key.clone(), InputSource::Carried));
            } else {
                return Err(binding_error(format!(
                    "input '{key}' is neither an observation group nor a recurrent state"
                )));
            }
        }
        for name in group_sizes.keys() {
            if !in_keys.contains(name) {
                tracing::warn!(group = %name, "observation group not consumed by the network");
            }
        }

        Ok(Self {
            inputs,
            out_keys,
            action_len,
            carried_init: carried.clone(),
            carried,
        })
    }

    /// Name of the action output.
    pub fn action_key(&self) -> &str {
        // `new` guarantees at least one output key.
        self.out_keys.first().map(String::as_str).unwrap_or_default()
    }

    /// Width of the action vector.
    pub fn action_len(&self) -> usize {
        self.action_len
    }

    /// Names of the recurrent state tensors.
    pub fn carried_names(&self) -> impl Iterator<Item = &str> {
        self.carried.keys().map(String::as_str)
    }

    /// Current value of a recurrent state tensor.
    pub fn carried(&self, name: &str) -> Option<&Tensor> {
        self.carried.get(name)
    }

    /// Build the request tensors for one inference call.
    pub fn assemble(&self, observations: &Observations) -> Result<NamedTensors, InferenceError> {
        let mut out = NamedTensors::with_capacity(self.inputs.len());
        for (name, source) in &self.inputs {
            let tensor = match source {
                InputSource::Group { shape } => {
                    let values = observations.get(name).ok_or_else(|| InferenceError::RunFailed {
                        reason: format!("no observation for input '{name}'"),
                    })?;
                    Tensor::from_f32(shape, values.clone())?
                }
                InputSource::Carried => self
                    .carried
                    .get(name)
                    .cloned()
                    .ok_or_else(|| InferenceError::MissingOutput { name: name.clone() })?,
            };
            out.insert(name.clone(), tensor);
        }
        Ok(out)
    }

    /// Take the action out of a response and store recurrent state.
    ///
    /// Either every piece of the response is accepted or none is.
    pub fn absorb(&mut self, mut outputs: NamedTensors) -> Result<Vec<f32>, InferenceError> {
        let key = self.action_key().to_string();
        let action = outputs
            .get(&key)
            .ok_or_else(|| InferenceError::MissingOutput { name: key.clone() })?;
        let values = action
            .as_f32()
            .ok_or_else(|| InferenceError::WrongType { name: key.clone() })?;
        if values.len() != self.action_len {
            return Err(InferenceError::ShapeMismatch {
                expected: self.action_len,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::RunFailed {
                reason: format!("non-finite values in '{key}'"),
            });
        }
        let action = values.to_vec();

        let mut updates = Vec::with_capacity(self.carried.len());
        for (name, current) in &self.carried {
            let next = outputs
                .swap_remove(name)
                .ok_or_else(|| InferenceError::MissingOutput { name: name.clone() })?;
            if next.len() != current.len() {
                return Err(InferenceError::ShapeMismatch {
                    expected: current.len(),
                    got: next.len(),
                });
            }
            updates.push((name.clone(), next));
        }
        for (name, tensor) in updates {
            self.carried.insert(name, tensor);
        }
        Ok(action)
    }

    /// Restore every recurrent state to zeros.
    pub fn reset(&mut self) {
        self.carried = self.carried_init.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_test_utils::inference::{spec, MockSession};

    fn sizes(pairs: &[(&str, usize)]) -> IndexMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn meta(inputs: &[&str], outputs: &[&str]) -> NetworkMeta {
        NetworkMeta {
            in_keys: inputs.iter().map(|s| s.to_string()).collect(),
            out_keys: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn recurrent_session() -> MockSession {
        MockSession::new(
            vec![spec("policy", &[1, 15]), spec("h", &[1, 4])],
            vec![spec("action", &[1, 12]), spec("h", &[1, 4])],
        )
    }

    #[test]
    fn binds_groups_and_carried_state() {
        let session = recurrent_session();
        let b = InferenceBinding::new(
            &session,
            &meta(&["policy", "h"], &["action", "h"]),
            &sizes(&[("policy", 15)]),
            12,
        )
        .unwrap();
        assert_eq!(b.action_key(), "action");
        assert_eq!(b.carried_names().collect::<Vec<_>>(), ["h"]);
        assert_eq!(b.carried("h").unwrap().as_f32(), Some(&[0.0f32; 4][..]));
    }

    #[test]
    fn empty_meta_uses_declared_names() {
        let session = recurrent_session();
        let b = InferenceBinding::new(&session, &NetworkMeta::default(), &sizes(&[("policy", 15)]), 12)
            .unwrap();
        assert_eq!(b.action_key(), "action");
    }

    #[test]
    fn size_mismatch_rejected_at_load() {
        let session = recurrent_session();
        let err = InferenceBinding::new(
            &session,
            &meta(&["policy", "h"], &["action", "h"]),
            &sizes(&[("policy", 14)]),
            12,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InferenceBinding { .. }));
    }

    #[test]
    fn unbound_input_rejected() {
        let session = recurrent_session();
        let err = InferenceBinding::new(
            &session,
            &meta(&["policy", "h"], &["action"]),
            &sizes(&[("policy", 15)]),
            12,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InferenceBinding { .. }));
    }

    #[test]
    fn action_width_checked() {
        let session = recurrent_session();
        assert!(InferenceBinding::new(
            &session,
            &meta(&["policy", "h"], &["action", "h"]),
            &sizes(&[("policy", 15)]),
            8,
        )
        .is_err());
    }

    #[test]
    fn carried_state_round_trips() {
        let session = recurrent_session();
        let mut b = InferenceBinding::new(
            &session,
            &meta(&["policy", "h"], &["action", "h"]),
            &sizes(&[("policy", 15)]),
            12,
        )
        .unwrap();

        let mut obs = Observations::new();
        obs.insert("policy".into(), vec![0.5; 15]);
        let req = b.assemble(&obs).unwrap();
        assert_eq!(req["policy"].shape(), &[1, 15]);
        assert_eq!(req["h"].as_f32(), Some(&[0.0f32; 4][..]));

        let mut resp = NamedTensors::new();
        resp.insert("action".into(), Tensor::from_f32(&[1, 12], vec![0.1; 12]).unwrap());
        resp.insert("h".into(), Tensor::from_f32(&[1, 4], vec![7.0; 4]).unwrap());
        assert_eq!(b.absorb(resp).unwrap(), vec![0.1; 12]);

        let req = b.assemble(&obs).unwrap();
        assert_eq!(req["h"].as_f32(), Some(&[7.0f32; 4][..]));

        b.reset();
        assert_eq!(b.carried("h").unwrap().as_f32(), Some(&[0.0f32; 4][..]));
    }

    #[test]
    fn bad_response_changes_nothing() {
        let session = recurrent_session();
        let mut b = InferenceBinding::new(
            &session,
            &meta(&["policy", "h"], &["action", "h"]),
            &sizes(&[("policy", 15)]),
            12,
        )
        .unwrap();
        let mut resp = NamedTensors::new();
        resp.insert("action".into(), Tensor::from_f32(&[1, 12], vec![0.1; 12]).unwrap());
        let err = b.absorb(resp).unwrap_err();
        assert_eq!(err, InferenceError::MissingOutput { name: "h".into() });

        let mut resp = NamedTensors::new();
        resp.insert("action".into(), Tensor::from_f32(&[1, 11], vec![0.1; 11]).unwrap());
        assert!(matches!(b.absorb(resp), Err(InferenceError::ShapeMismatch { .. })));
    }
}
