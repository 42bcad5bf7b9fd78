//! Opaque cancellation handles (spec.md §4.7, §4.8).

/// A one-shot, idempotent-on-drop cleanup action: invoking it removes a
/// signal listener or drops a registered continuation. A pending event
/// holds a list of these and runs them when it fires or is destroyed
/// (spec.md §5, "all other cancelers owned by the pending event are
/// invoked as part of its destruction").
///
/// Grounded on `original_source/src/os/event/canceler.hh`, here as a
/// `FnOnce` closure wrapper rather than a virtual-base handle.
pub struct Canceler {
    action: Option<Box<dyn FnOnce()>>,
}

impl Canceler {
    pub fn new<F: FnOnce() + 'static>(action: F) -> Self {
        Canceler {
            action: Some(Box::new(action)),
        }
    }

    /// Runs the cancellation action. A no-op if already run.
    pub fn cancel(mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl Drop for Canceler {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}
