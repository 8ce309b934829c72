//! Fixed-depth history rings.

use kinema_core::ObsError;

use crate::component::{compute_checked, ObservationComponent};
use crate::frame::ObsFrame;

/// Flat ring of `steps` frames of `width` values, newest first.
///
/// The buffer layout is always `[t, t-1, ..., t-steps+1]`, so reading
/// it is a plain slice. Pushing shifts the buffer by one frame width and
/// writes the new frame at the front; the oldest frame falls off.
///
/// # Examples
///
/// ```
/// use kinema_obs::HistoryRing;
///
/// let mut ring = HistoryRing::new(2, 3);
/// ring.seed(&[1.0, 1.0]);
/// assert_eq!(ring.as_slice(), &[1.0; 6]);
///
/// ring.push(&[2.0, 2.0]);
/// assert_eq!(ring.as_slice(), &[2.0, 2.0, 1.0, 1.0, 1.0, 1.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRing {
    width: usize,
    steps: usize,
    buf: Vec<f32>,
}

impl HistoryRing {
    /// A zeroed ring of `steps` frames of `width` values.
    pub fn new(width: usize, steps: usize) -> Self {
        Self {
            width,
            steps,
            buf: vec![0.0; width * steps],
        }
    }

    /// Values per frame.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of frames held.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Shift by one frame and write `frame` at the front.
    ///
    /// `frame.len()` must equal `width()`.
    pub fn push(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.width);
        let len = self.buf.len();
        if len == 0 {
            return;
        }
        self.buf.copy_within(0..len - self.width, self.width);
        self.buf[..self.width].copy_from_slice(frame);
    }

    /// Overwrite every frame with `frame`.
    pub fn seed(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.width);
        for slot in self.buf.chunks_exact_mut(self.width.max(1)) {
            slot.copy_from_slice(frame);
        }
    }

    /// The whole ring, newest frame first.
    pub fn as_slice(&self) -> &[f32] {
        &self.buf
    }

    /// Frame `age` (0 = newest).
    pub fn frame(&self, age: usize) -> &[f32] {
        &self.buf[age * self.width..(age + 1) * self.width]
    }
}

/// A component wrapped in a history window of its own.
///
/// Output is the last `steps` instantaneous values of the inner
/// component, newest first.
pub struct Windowed {
    inner: Box<dyn ObservationComponent>,
    ring: HistoryRing,
}

impl Windowed {
    /// Wrap `inner` with a `steps`-deep window.
    pub fn new(inner: Box<dyn ObservationComponent>, steps: usize) -> Self {
        let ring = HistoryRing::new(inner.size(), steps);
        Self { inner, ring }
    }

    /// Window depth.
    pub fn steps(&self) -> usize {
        self.ring.steps()
    }
}

impl ObservationComponent for Windowed {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn size(&self) -> usize {
        self.ring.as_slice().len()
    }

    fn update(&mut self, frame: &ObsFrame<'_>) -> Result<(), ObsError> {
        self.inner.update(frame)?;
        let value = compute_checked(self.inner.as_ref(), frame)?;
        self.ring.push(&value);
        Ok(())
    }

    fn reset(&mut self, frame: &ObsFrame<'_>) -> Result<(), ObsError> {
        self.inner.reset(frame)?;
        let value = compute_checked(self.inner.as_ref(), frame)?;
        self.ring.seed(&value);
        Ok(())
    }

    fn compute(&self, _frame: &ObsFrame<'_>) -> Vec<f32> {
        self.ring.as_slice().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{JointVelocities, LastAction};
    use kinema_command::CommandValues;
    use kinema_core::PolicyState;
    use proptest::prelude::*;

    #[test]
    fn prev_actions_keep_newest_four() {
        let state = PolicyState::neutral(0);
        let cmds = CommandValues::new();
        let mut c = Windowed::new(Box::new(LastAction::new(8)), 4);
        assert_eq!(c.size(), 32);

        let zeros = [0.0f32; 8];
        c.reset(&ObsFrame::new(&state, &zeros, &cmds, &[])).unwrap();

        let actions: Vec<[f32; 8]> = (1..=5).map(|k| [k as f32; 8]).collect();
        for a in &actions {
            c.update(&ObsFrame::new(&state, a, &cmds, &[])).unwrap();
        }
        let out = c.compute(&ObsFrame::new(&state, &zeros, &cmds, &[]));
        let expected: Vec<f32> = [5.0, 4.0, 3.0, 2.0]
            .iter()
            .flat_map(|&k| std::iter::repeat(k).take(8))
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn reset_seeds_every_slot() {
        let mut state = PolicyState::neutral(3);
        state.joint_vel = vec![0.1, 0.2, 0.3];
        let cmds = CommandValues::new();
        let frame = ObsFrame::new(&state, &[], &cmds, &[]);
        let mut c = Windowed::new(Box::new(JointVelocities::new(3)), 5);
        c.reset(&frame).unwrap();
        let out = c.compute(&frame);
        for slot in out.chunks_exact(3) {
            assert_eq!(slot, &[0.1, 0.2, 0.3]);
        }
    }

    #[test]
    fn inner_mismatch_surfaces_on_update() {
        let state = PolicyState::neutral(0);
        let cmds = CommandValues::new();
        let mut c = Windowed::new(Box::new(LastAction::new(2)), 3);
        let err = c
            .update(&ObsFrame::new(&state, &[1.0], &cmds, &[]))
            .unwrap_err();
        assert!(matches!(err, ObsError::LengthMismatch { declared: 2, .. }));
    }

    proptest! {
        #[test]
        fn push_keeps_newest_first(
            width in 1usize..6,
            steps in 1usize..6,
            pushes in 1usize..12,
        ) {
            let mut ring = HistoryRing::new(width, steps);
            for k in 0..pushes {
                ring.push(&vec![k as f32; width]);
            }
            prop_assert_eq!(ring.as_slice().len(), width * steps);
            for age in 0..steps.min(pushes) {
                let expected = (pushes - 1 - age) as f32;
                prop_assert!(ring.frame(age).iter().all(|&v| v == expected));
            }
        }
    }
}
