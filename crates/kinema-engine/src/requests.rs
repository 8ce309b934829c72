//! Requests queued from UI callbacks and applied at the next tick
//! boundary.

use crossbeam_channel::Sender;

use crate::drag::DragInput;

/// A request for the runtime, drained at the start of each tick.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlRequest {
    /// Restore the scene's initial condition.
    Reset,
    /// Start or update a drag (`Some`), or release it (`None`).
    Drag(Option<DragInput>),
}

/// Cloneable sender for [`ControlRequest`]s.
///
/// Safe to call from any thread. Every method returns `false` once the
/// runtime has been dropped.
#[derive(Clone, Debug)]
pub struct ControlHandle {
    tx: Sender<ControlRequest>,
}

impl ControlHandle {
    pub(crate) fn new(tx: Sender<ControlRequest>) -> Self {
        Self { tx }
    }

    /// Queue a reset.
    pub fn request_reset(&self) -> bool {
        self.send(ControlRequest::Reset)
    }

    /// Start or update a drag.
    pub fn drag(&self, input: DragInput) -> bool {
        self.send(ControlRequest::Drag(Some(input)))
    }

    /// Release the current drag.
    pub fn release_drag(&self) -> bool {
        self.send(ControlRequest::Drag(None))
    }

    /// Queue an arbitrary request.
    pub fn send(&self, request: ControlRequest) -> bool {
        self.tx.send(request).is_ok()
    }
}

/// Net effect of a batch of drained requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Drained {
    pub reset: bool,
    /// Latest drag update, if any arrived.
    pub drag: Option<Option<DragInput>>,
}

impl Drained {
    /// Fold one request in arrival order. A reset drops any drag that
    /// arrived before it.
    pub fn push(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Reset => {
                self.reset = true;
                self.drag = Some(None);
            }
            ControlRequest::Drag(d) => self.drag = Some(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_core::BodyId;

    fn sample() -> DragInput {
        DragInput {
            body: BodyId(1),
            point: [0.0; 3],
            offset: [1.0, 0.0],
        }
    }

    #[test]
    fn handle_reports_disconnect() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = ControlHandle::new(tx);
        assert!(handle.request_reset());
        assert_eq!(rx.try_recv(), Ok(ControlRequest::Reset));
        drop(rx);
        assert!(!handle.drag(sample()));
    }

    #[test]
    fn latest_drag_wins() {
        let mut d = Drained::default();
        d.push(ControlRequest::Drag(Some(sample())));
        d.push(ControlRequest::Drag(None));
        assert_eq!(d.drag, Some(None));
        assert!(!d.reset);
    }

    #[test]
    fn reset_clears_earlier_drag_but_not_later() {
        let mut d = Drained::default();
        d.push(ControlRequest::Drag(Some(sample())));
        d.push(ControlRequest::Reset);
        assert_eq!(d.drag, Some(None));
        d.push(ControlRequest::Drag(Some(sample())));
        assert!(d.reset);
        assert_eq!(d.drag, Some(Some(sample())));
    }
}
