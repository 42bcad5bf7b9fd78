//! Signal-triggered events and disposition restoration (spec.md §8
//! scenario 4).
//!
//! `simulate_raise` writes to the process-wide pending-flag table
//! (spec.md §4.7), so tests here share a lock and distinct signal numbers
//! to stay independent under cargo's parallel test runner.

use posh_async::event::test_support::PselectApiStub;
use posh_async::event::Awaiter;
use posh_async::signaling::test_support::FakeSignalApi;
use posh_async::signaling::{simulate_raise, HandlerConfiguration, SignalApi};
use posh_async::{AwaiterConfig, Trigger};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Mutex;

static SIGNAL_TEST_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn a_raised_signal_resolves_the_waiting_future() {
    let _guard = SIGNAL_TEST_LOCK.lock().unwrap();

    let awaiter = Awaiter::with_api_and_handlers(
        Box::new(PselectApiStub::new()),
        HandlerConfiguration::with_api(Box::new(FakeSignalApi::new())),
        AwaiterConfig::default(),
    );

    let future = awaiter.expect(vec![Trigger::Signal(libc::SIGUSR1)]);
    let seen = Rc::new(RefCell::new(None));
    let seen2 = seen.clone();
    future.then_void(move |t| *seen2.borrow_mut() = Some(format!("{:?}", t.unwrap_value())));

    simulate_raise(libc::SIGUSR1);
    awaiter.await_events();

    assert_eq!(seen.borrow().as_deref(), Some("Signal(10)"));
}

#[test]
fn the_original_disposition_is_restored_once_the_last_listener_departs() {
    let _guard = SIGNAL_TEST_LOCK.lock().unwrap();

    let api = Rc::new(FakeSignalApi::new());
    let hc = HandlerConfiguration::with_api(Box::new(FakeApiProxy(api.clone())));
    let awaiter = Awaiter::with_api_and_handlers(
        Box::new(PselectApiStub::new()),
        hc,
        AwaiterConfig::default(),
    );

    assert!(!api.is_installed(libc::SIGUSR2));
    let future = awaiter.expect(vec![Trigger::Signal(libc::SIGUSR2)]);
    assert!(api.is_installed(libc::SIGUSR2));

    simulate_raise(libc::SIGUSR2);
    awaiter.await_events();
    let _ = future;

    assert!(!api.is_installed(libc::SIGUSR2));
}

/// Forwards to a shared [`FakeSignalApi`] so the test can inspect
/// installation state after the awaiter (which owns a `Box<dyn SignalApi>`)
/// has otherwise taken sole ownership of it.
struct FakeApiProxy(Rc<FakeSignalApi>);

impl posh_async::signaling::SignalApi for FakeApiProxy {
    fn install_trampoline(&self, signal: libc::c_int) -> std::io::Result<posh_async::signaling::Disposition> {
        self.0.install_trampoline(signal)
    }
    fn restore(&self, signal: libc::c_int, previous: posh_async::signaling::Disposition) -> std::io::Result<()> {
        self.0.restore(signal, previous)
    }
    fn block(&self, signal: libc::c_int) -> std::io::Result<()> {
        self.0.block(signal)
    }
    fn unblock(&self, signal: libc::c_int) -> std::io::Result<()> {
        self.0.unblock(signal)
    }
}
