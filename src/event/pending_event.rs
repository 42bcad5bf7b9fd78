//! A single `expect()` call's bookkeeping while it waits to fire.
//!
//! Grounded on `original_source/src/os/event/awaiter.cc`'s `pending_event`.

use std::time::{Duration, Instant};

use crate::canceler::Canceler;
use crate::promise::Promise;
use crate::result::Trial;
use crate::trigger::Trigger;

/// Tracks one outstanding [`crate::event::Awaiter::expect`] call: the
/// file-descriptor triggers it is waiting on, the earliest deadline among
/// its timeout triggers (if any), and the [`Promise`] that delivers
/// whichever [`Trigger`] fires first.
///
/// Dropping a `PendingEvent` drops its [`Canceler`]s, which removes any
/// signal listeners or user-provided-future continuations it installed.
/// There is no explicit destructor, matching
/// `pending_event::~pending_event`'s loop over `m_cancelers` exactly
/// because `Vec<Canceler>`'s own `Drop` already does that.
pub struct PendingEvent {
    deadline: Option<Instant>,
    requested_timeout: Duration,
    fd_triggers: Vec<Trigger>,
    promise: Option<Promise<Trigger>>,
    cancelers: Vec<Canceler>,
}

impl PendingEvent {
    pub(crate) fn new(promise: Promise<Trigger>) -> Self {
        PendingEvent {
            deadline: None,
            requested_timeout: Trigger::NO_DEADLINE,
            fd_triggers: Vec::new(),
            promise: Some(promise),
            cancelers: Vec::new(),
        }
    }

    /// Narrows this event's timeout to the smaller of its current value and
    /// `requested` (spec.md §4.6: the tightest of several timeout triggers
    /// in one `expect()` call wins).
    pub(crate) fn narrow_timeout(&mut self, requested: Duration) {
        self.requested_timeout = self.requested_timeout.min(requested);
    }

    /// The smallest requested timeout across this event's triggers.
    /// [`Trigger::NO_DEADLINE`] if none were given.
    pub(crate) fn requested_timeout(&self) -> Duration {
        self.requested_timeout
    }

    pub(crate) fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn add_fd_trigger(&mut self, trigger: Trigger) {
        self.fd_triggers.push(trigger);
    }

    pub(crate) fn fd_triggers(&self) -> &[Trigger] {
        &self.fd_triggers
    }

    pub(crate) fn add_canceler(&mut self, canceler: Canceler) {
        self.cancelers.push(canceler);
    }

    /// Whether this event has already been resolved.
    pub(crate) fn has_fired(&self) -> bool {
        self.promise.is_none()
    }

    /// Resolves this event with `trigger`. A no-op if already fired.
    /// Mirrors `pending_event::fire`'s `if (!has_fired())` guard, which
    /// matters because two independent triggers within one `expect()` set
    /// (e.g. a readable FD and a signal) can race to fire the same event.
    pub(crate) fn fire(&mut self, trigger: Trigger) {
        if let Some(promise) = self.promise.take() {
            promise.set_result(Trial::from_value(trigger));
        }
    }

    /// Resolves this event with an error, e.g. an out-of-range file
    /// descriptor discovered while building the kernel wait arguments.
    pub(crate) fn fail(&mut self, error: anyhow::Error) {
        if let Some(promise) = self.promise.take() {
            promise.fail(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::make_promise_future_pair;

    #[test]
    fn fire_resolves_the_future_exactly_once() {
        let (promise, future) = make_promise_future_pair::<Trigger>();
        let mut event = PendingEvent::new(promise);
        assert!(!event.has_fired());

        event.fire(Trigger::Signal(libc::SIGUSR1));
        assert!(event.has_fired());

        event.fire(Trigger::Timeout(Duration::ZERO));

        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let seen2 = seen.clone();
        future.then_void(move |t| *seen2.borrow_mut() = Some(format!("{:?}", t.unwrap_value())));
        assert_eq!(seen.borrow().as_deref(), Some("Signal(10)"));
    }

    #[test]
    fn narrow_timeout_keeps_the_smallest_requested_value() {
        let (promise, _future) = make_promise_future_pair::<Trigger>();
        let mut event = PendingEvent::new(promise);
        event.narrow_timeout(Duration::from_secs(5));
        event.narrow_timeout(Duration::from_secs(1));
        event.narrow_timeout(Duration::from_secs(9));
        assert_eq!(event.requested_timeout(), Duration::from_secs(1));
    }
}
