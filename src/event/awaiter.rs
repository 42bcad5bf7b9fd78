//! The proactor loop: wait for declarative trigger sets (spec.md §4.6, §6.1).
//!
//! Grounded on `original_source/src/os/event/awaiter.cc`'s `awaiter_impl`.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use libc::c_int;

use crate::config::AwaiterConfig;
use crate::error::AwaiterError;
use crate::event::pending_event::PendingEvent;
use crate::event::pselect_api::{FdSet, PselectApi, SystemPselect, MAX_FD};
use crate::future::Future;
use crate::promise::make_promise_future_pair;
use crate::signaling::HandlerConfiguration;
use crate::trigger::{Trigger, UserProvidedTrigger};

/// Waits on declarative sets of timeouts, file descriptors, signals, and
/// user-provided futures, resolving a [`Future<Trigger>`] per `expect()`
/// call and driving them all forward from [`Awaiter::await_events`].
///
/// One `Awaiter` owns exactly one [`HandlerConfiguration`] and one
/// [`PselectApi`]; it is not `Sync`. `Rc`/`RefCell` throughout assume a
/// single cooperative thread, matching spec.md §5.
pub struct Awaiter {
    api: Box<dyn PselectApi>,
    handler_configuration: Rc<HandlerConfiguration>,
    pending_events: RefCell<Vec<Rc<RefCell<PendingEvent>>>>,
}

impl Awaiter {
    /// An awaiter backed by the real OS kernel wait primitive and signal
    /// API, configured from the environment.
    pub fn new() -> Self {
        Self::with_config(AwaiterConfig::from_env())
    }

    /// As [`Awaiter::new`], with explicit configuration.
    pub fn with_config(config: AwaiterConfig) -> Self {
        Awaiter {
            api: Box::new(SystemPselect::new()),
            handler_configuration: HandlerConfiguration::new(),
            pending_events: RefCell::new(Vec::with_capacity(config.pending_events_hint)),
        }
    }

    /// An awaiter over custom [`PselectApi`] and [`HandlerConfiguration`]
    /// implementations, used by tests to avoid touching real file
    /// descriptors or signal dispositions.
    pub fn with_api_and_handlers(
        api: Box<dyn PselectApi>,
        handler_configuration: Rc<HandlerConfiguration>,
        config: AwaiterConfig,
    ) -> Self {
        Awaiter {
            api,
            handler_configuration,
            pending_events: RefCell::new(Vec::with_capacity(config.pending_events_hint)),
        }
    }

    /// Registers interest in a set of triggers, returning a future that
    /// resolves to whichever one fires first. An empty trigger set returns
    /// a future that never resolves: there is nothing to wait for and
    /// nothing ever will fire it, matching `expectImpl`'s early return of
    /// an unresolved pair.
    pub fn expect(&self, triggers: Vec<Trigger>) -> Future<Trigger> {
        let (promise, future) = make_promise_future_pair();
        if triggers.is_empty() {
            return future;
        }

        let event = Rc::new(RefCell::new(PendingEvent::new(promise)));
        for trigger in triggers {
            self.register_trigger(&event, trigger);
        }

        let now = self.api.now();
        let requested = event.borrow().requested_timeout();
        let deadline = if requested == Trigger::NO_DEADLINE {
            None
        } else {
            now.checked_add(requested)
        };
        event.borrow_mut().set_deadline(deadline);

        self.pending_events.borrow_mut().push(event);
        future
    }

    /// Runs the event loop until every outstanding `expect()` future has
    /// resolved. Returns once `self` has nothing left pending.
    pub fn await_events(&self) {
        loop {
            if self.pending_events.borrow().is_empty() {
                break;
            }

            let now = self.api.now();
            self.fire_timeouts(now);

            let (mut read, mut write, mut error, fd_bound) = self.build_pselect_arguments();

            if self.remove_fired_events() {
                continue;
            }

            let timeout = self.duration_to_next_timeout(now);
            let mask = self.handler_configuration.mask_for_pselect();

            let result = self.api.pselect(
                fd_bound,
                Some(&mut read),
                Some(&mut write),
                Some(&mut error),
                timeout,
                mask.as_ref(),
            );

            // Pending signals are dispatched whether or not the wait
            // succeeded: a signal can have interrupted it.
            self.handler_configuration.call_handlers();

            match result {
                Ok(()) => {
                    self.apply_pselect_result(&read, &write, &error);
                    self.remove_fired_events();
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::warn!("awaiter: pselect failed: {e}");
                }
            }
        }
    }

    fn register_trigger(&self, event: &Rc<RefCell<PendingEvent>>, trigger: Trigger) {
        match trigger {
            Trigger::Timeout(duration) => event.borrow_mut().narrow_timeout(duration),
            Trigger::ReadableFd(_) | Trigger::WritableFd(_) | Trigger::ErrorFd(_) => {
                event.borrow_mut().add_fd_trigger(trigger);
            }
            Trigger::Signal(signal) => self.register_signal_trigger(signal, event),
            Trigger::UserProvided(inner) => Self::register_user_provided_trigger(inner, event),
        }
    }

    fn register_signal_trigger(&self, signal: c_int, event: &Rc<RefCell<PendingEvent>>) {
        let weak = Rc::downgrade(event);
        let registration = self.handler_configuration.add_handler(signal, move |n| {
            if let Some(event) = weak.upgrade() {
                event.borrow_mut().fire(Trigger::Signal(n));
            }
        });
        match registration {
            Ok(canceler) => event.borrow_mut().add_canceler(canceler),
            Err(err) => event.borrow_mut().fail(err.into()),
        }
    }

    fn register_user_provided_trigger(
        trigger: UserProvidedTrigger,
        event: &Rc<RefCell<PendingEvent>>,
    ) {
        match trigger {
            UserProvidedTrigger::Pending(inner) => {
                let weak = Rc::downgrade(event);
                inner.then_void(move |result| {
                    if let Some(event) = weak.upgrade() {
                        event.borrow_mut().fire(Trigger::UserProvided(UserProvidedTrigger::Fired(result)));
                    }
                });
            }
            fired @ UserProvidedTrigger::Fired(_) => {
                event.borrow_mut().fire(Trigger::UserProvided(fired));
            }
        }
    }

    fn fire_timeouts(&self, now: Instant) {
        for event_rc in self.pending_events.borrow().iter() {
            let mut event = event_rc.borrow_mut();
            if event.has_fired() {
                continue;
            }
            if let Some(deadline) = event.deadline() {
                if deadline <= now {
                    let timeout = event.requested_timeout();
                    event.fire(Trigger::Timeout(timeout));
                }
            }
        }
    }

    /// Builds the FD sets for the next `pselect` call, failing in place any
    /// event whose FD exceeds [`MAX_FD`] rather than aborting the whole
    /// build. Mirrors `pselect_argument::add_or_fire`'s per-event
    /// try/catch around FD-set construction.
    fn build_pselect_arguments(&self) -> (FdSet, FdSet, FdSet, c_int) {
        let mut read = FdSet::empty();
        let mut write = FdSet::empty();
        let mut error = FdSet::empty();
        let mut fd_bound: c_int = 0;

        for event_rc in self.pending_events.borrow().iter() {
            let mut event = event_rc.borrow_mut();
            if event.has_fired() {
                continue;
            }

            let mut overflow = None;
            for trigger in event.fd_triggers() {
                let fd = trigger
                    .file_descriptor()
                    .expect("fd_triggers only holds FD-bearing variants");
                if fd > MAX_FD {
                    overflow = Some(AwaiterError::TooManyOpenFiles { fd, max: MAX_FD });
                    break;
                }
                fd_bound = fd_bound.max(fd + 1);
                match trigger {
                    Trigger::ReadableFd(_) => read.insert(fd),
                    Trigger::WritableFd(_) => write.insert(fd),
                    Trigger::ErrorFd(_) => error.insert(fd),
                    _ => unreachable!(),
                }
            }

            if let Some(err) = overflow {
                event.fail(err.into());
            }
        }

        (read, write, error, fd_bound)
    }

    fn apply_pselect_result(&self, read: &FdSet, write: &FdSet, error: &FdSet) {
        for event_rc in self.pending_events.borrow().iter() {
            let mut event = event_rc.borrow_mut();
            if event.has_fired() {
                continue;
            }

            let fired = event.fd_triggers().iter().find_map(|trigger| {
                let matched = match trigger {
                    Trigger::ReadableFd(fd) => read.contains(*fd),
                    Trigger::WritableFd(fd) => write.contains(*fd),
                    Trigger::ErrorFd(fd) => error.contains(*fd),
                    _ => false,
                };
                matched.then(|| match trigger {
                    Trigger::ReadableFd(fd) => Trigger::ReadableFd(*fd),
                    Trigger::WritableFd(fd) => Trigger::WritableFd(*fd),
                    Trigger::ErrorFd(fd) => Trigger::ErrorFd(*fd),
                    _ => unreachable!(),
                })
            });

            if let Some(trigger) = fired {
                event.fire(trigger);
            }
        }
    }

    fn duration_to_next_timeout(&self, now: Instant) -> Option<Duration> {
        let mut min: Option<Duration> = None;
        for event_rc in self.pending_events.borrow().iter() {
            let event = event_rc.borrow();
            if let Some(deadline) = event.deadline() {
                let remaining = deadline.saturating_duration_since(now);
                min = Some(min.map_or(remaining, |m| m.min(remaining)));
            }
        }
        min
    }

    fn remove_fired_events(&self) -> bool {
        let mut events = self.pending_events.borrow_mut();
        let before = events.len();
        events.retain(|event| !event.borrow().has_fired());
        events.len() != before
    }
}

impl Default for Awaiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "test-support"))]
mod tests {
    use super::*;
    use crate::event::test_support::PselectApiStub;

    #[test]
    fn expect_with_no_triggers_never_resolves() {
        let awaiter = Awaiter::with_api_and_handlers(
            Box::new(PselectApiStub::new()),
            HandlerConfiguration::with_api(Box::new(crate::signaling::test_support::FakeSignalApi::new())),
            AwaiterConfig::default(),
        );
        let future = awaiter.expect(Vec::new());
        let resolved = Rc::new(RefCell::new(false));
        let resolved2 = resolved.clone();
        future.then_void(move |_| *resolved2.borrow_mut() = true);
        awaiter.await_events();
        assert!(!*resolved.borrow());
    }

    #[test]
    fn a_single_timeout_trigger_fires_after_the_clock_advances() {
        let stub = PselectApiStub::new();
        let awaiter = Awaiter::with_api_and_handlers(
            Box::new(stub),
            HandlerConfiguration::with_api(Box::new(crate::signaling::test_support::FakeSignalApi::new())),
            AwaiterConfig::default(),
        );

        let future = awaiter.expect(vec![Trigger::Timeout(Duration::from_millis(50))]);
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        future.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));

        awaiter.await_events();
        match seen.borrow().as_ref().unwrap() {
            Trigger::Timeout(d) => assert_eq!(*d, Duration::from_millis(50)),
            other => panic!("expected a timeout trigger, got {other:?}"),
        }
    }

    #[test]
    fn the_tightest_of_two_timeouts_in_one_call_wins() {
        let stub = PselectApiStub::new();
        let awaiter = Awaiter::with_api_and_handlers(
            Box::new(stub),
            HandlerConfiguration::with_api(Box::new(crate::signaling::test_support::FakeSignalApi::new())),
            AwaiterConfig::default(),
        );

        let future = awaiter.expect(vec![
            Trigger::Timeout(Duration::from_secs(10)),
            Trigger::Timeout(Duration::from_millis(5)),
        ]);
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        future.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));

        awaiter.await_events();
        match seen.borrow().as_ref().unwrap() {
            Trigger::Timeout(d) => assert_eq!(*d, Duration::from_millis(5)),
            other => panic!("expected a timeout trigger, got {other:?}"),
        }
    }
}
