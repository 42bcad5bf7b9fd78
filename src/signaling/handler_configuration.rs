//! The process-wide signal registry (spec.md §4.7).
//!
//! Grounded on `original_source/src/os/signaling/handler_configuration_api.cc`
//! and the trampoline dispatch in `awaiter.cc`'s `call_handlers`. Exactly one
//! [`HandlerConfiguration`] is expected per process for a given signal API,
//! matching the original's documented init/teardown discipline: the first
//! listener for a signal number installs the OS disposition and blocks the
//! signal; the last departing listener restores both.
//!
//! Blocking matters for more than bookkeeping: a signal raised outside the
//! `pselect` call would otherwise run the trampoline and set its pending
//! flag on an ordinary, unblocked disposition, then `call_handlers` would
//! have nothing to do until the next wait happens to notice it. Keeping the
//! signal blocked everywhere except inside `pselect` (which atomically
//! unblocks exactly the watched set for the duration of the call, see
//! `mask_for_pselect`) is what makes "signal arrives between `call_handlers`
//! and the next wait" impossible to lose.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use libc::c_int;

use crate::canceler::Canceler;
use crate::error::AwaiterError;
use crate::signaling::signal_number_set::SignalNumberSet;

/// One more than the highest signal number this crate tracks pending-flag
/// state for. Covers the standard signals plus the usual realtime range
/// (`SIGRTMIN..=SIGRTMAX`) on Linux.
const MAX_SIGNAL: usize = 65;

const PENDING_FALSE: AtomicBool = AtomicBool::new(false);

/// Pending-signal flags, written only by [`trampoline`] (must be
/// async-signal-safe: an atomic store and nothing else) and drained by
/// [`HandlerConfiguration::call_handlers`] from the main cooperative loop.
static PENDING: [AtomicBool; MAX_SIGNAL] = [PENDING_FALSE; MAX_SIGNAL];

extern "C" fn trampoline(signal: c_int) {
    if let Some(slot) = PENDING.get(signal as usize) {
        slot.store(true, Ordering::SeqCst);
    }
}

/// Directly sets a signal's pending flag, as the real trampoline would.
/// Exposed only for deterministic tests that simulate signal delivery
/// without raising a real one.
#[cfg(feature = "test-support")]
pub fn simulate_raise(signal: c_int) {
    if let Some(slot) = PENDING.get(signal as usize) {
        slot.store(true, Ordering::SeqCst);
    }
}

/// An opaque capture of a signal's previous disposition, returned by
/// [`SignalApi::install_trampoline`] and consumed by [`SignalApi::restore`].
pub struct Disposition(libc::sigaction);

impl Disposition {
    /// A placeholder disposition for fakes that never touch real signal
    /// dispositions at all.
    #[cfg(feature = "test-support")]
    pub(crate) fn fake() -> Self {
        Disposition(unsafe { std::mem::zeroed() })
    }
}

/// Abstraction of the OS signal-disposition and signal-mask APIs consumed by
/// [`HandlerConfiguration`] (spec.md §6.2).
///
/// Grounded on `original_source/src/os/signaling/handler_configuration_api.cc`.
pub trait SignalApi {
    /// Installs the process trampoline as the disposition for `signal`,
    /// returning an opaque token that can later restore the previous one.
    fn install_trampoline(&self, signal: c_int) -> io::Result<Disposition>;

    /// Restores a previously captured disposition.
    fn restore(&self, signal: c_int, previous: Disposition) -> io::Result<()>;

    /// Adds `signal` to the process signal mask, so it stays blocked outside
    /// of a `pselect` call.
    fn block(&self, signal: c_int) -> io::Result<()>;

    /// Removes `signal` from the process signal mask.
    fn unblock(&self, signal: c_int) -> io::Result<()>;
}

/// The real, `libc::sigaction`-backed implementation.
pub struct SystemSignalApi;

impl SignalApi for SystemSignalApi {
    fn install_trampoline(&self, signal: c_int) -> io::Result<Disposition> {
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = trampoline as usize;
            action.sa_flags = 0;
            libc::sigemptyset(&mut action.sa_mask);

            let mut previous: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signal, &action, &mut previous) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Disposition(previous))
        }
    }

    fn restore(&self, signal: c_int, previous: Disposition) -> io::Result<()> {
        unsafe {
            if libc::sigaction(signal, &previous.0, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn block(&self, signal: c_int) -> io::Result<()> {
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, signal);
            if libc::sigprocmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn unblock(&self, signal: c_int) -> io::Result<()> {
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, signal);
            if libc::sigprocmask(libc::SIG_UNBLOCK, &set, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}

struct Entry {
    original: Disposition,
    listeners: Vec<Option<Rc<dyn Fn(c_int)>>>,
}

/// Process-wide signal-number → listener-list registry, owning the captured
/// original OS disposition for each signal it manages (spec.md §4.7).
pub struct HandlerConfiguration {
    api: Box<dyn SignalApi>,
    entries: RefCell<HashMap<c_int, Entry>>,
}

impl HandlerConfiguration {
    /// A handler configuration backed by the real OS signal API.
    pub fn new() -> Rc<Self> {
        Self::with_api(Box::new(SystemSignalApi))
    }

    /// A handler configuration backed by a custom [`SignalApi`], used by
    /// tests to avoid touching real signal dispositions.
    pub fn with_api(api: Box<dyn SignalApi>) -> Rc<Self> {
        Rc::new(HandlerConfiguration {
            api,
            entries: RefCell::new(HashMap::new()),
        })
    }

    /// Registers `listener` for `signal`, installing the OS disposition on
    /// the first registration for that number. Returns a [`Canceler`] that
    /// removes the listener and, if it was the last one for that signal,
    /// restores the original disposition.
    pub fn add_handler<F>(self: &Rc<Self>, signal: c_int, listener: F) -> Result<Canceler, AwaiterError>
    where
        F: Fn(c_int) + 'static,
    {
        let index = {
            let mut entries = self.entries.borrow_mut();
            if !entries.contains_key(&signal) {
                let original = self
                    .api
                    .install_trampoline(signal)
                    .map_err(|source| AwaiterError::SignalDisposition { signal, source })?;
                self.api
                    .block(signal)
                    .map_err(|source| AwaiterError::SignalDisposition { signal, source })?;
                log::debug!("handler_configuration: installed trampoline and blocked signal {signal}");
                entries.insert(
                    signal,
                    Entry {
                        original,
                        listeners: Vec::new(),
                    },
                );
            }
            let entry = entries.get_mut(&signal).expect("just inserted or present");
            entry.listeners.push(Some(Rc::new(listener)));
            entry.listeners.len() - 1
        };

        let weak = Rc::downgrade(self);
        Ok(Canceler::new(move || {
            if let Some(hc) = weak.upgrade() {
                hc.remove_listener(signal, index);
            }
        }))
    }

    fn remove_listener(&self, signal: c_int, index: usize) {
        let now_empty = {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(&signal) {
                Some(entry) => {
                    if let Some(slot) = entry.listeners.get_mut(index) {
                        *slot = None;
                    }
                    entry.listeners.iter().all(Option::is_none)
                }
                None => false,
            }
        };
        if now_empty {
            if let Some(entry) = self.entries.borrow_mut().remove(&signal) {
                log::debug!("handler_configuration: restoring original disposition for signal {signal}");
                if let Err(e) = self.api.unblock(signal) {
                    log::warn!("handler_configuration: failed to unblock signal {signal}: {e}");
                }
                if let Err(e) = self.api.restore(signal, entry.original) {
                    log::warn!("handler_configuration: failed to restore signal {signal}: {e}");
                }
            }
        }
    }

    /// The signal mask to apply atomically while the kernel wait blocks: a
    /// full mask with every signal that has at least one listener cleared,
    /// so those signals are unblocked only for the duration of the wait.
    /// `None` means no signals are being watched, so the caller should not
    /// override the process mask at all.
    pub fn mask_for_pselect(&self) -> Option<SignalNumberSet> {
        let entries = self.entries.borrow();
        if entries.is_empty() {
            return None;
        }
        let mut mask = SignalNumberSet::full();
        for signal in entries.keys() {
            mask.remove(*signal);
        }
        Some(mask)
    }

    /// Dispatches every signal whose pending flag was set since the last
    /// call, clearing each flag before invoking its listeners. Must be
    /// called from the main cooperative loop, never from a signal handler.
    pub fn call_handlers(&self) {
        for (signal, flag) in PENDING.iter().enumerate() {
            if flag.swap(false, Ordering::SeqCst) {
                let signal = signal as c_int;
                let listeners: Vec<Rc<dyn Fn(c_int)>> = {
                    let entries = self.entries.borrow();
                    entries
                        .get(&signal)
                        .map(|e| e.listeners.iter().flatten().cloned().collect())
                        .unwrap_or_default()
                };
                for listener in listeners {
                    listener(signal);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeApi {
        installed: RefCell<std::collections::HashSet<c_int>>,
    }

    impl FakeApi {
        fn new() -> Self {
            FakeApi {
                installed: RefCell::new(std::collections::HashSet::new()),
            }
        }
    }

    impl SignalApi for FakeApi {
        fn install_trampoline(&self, signal: c_int) -> io::Result<Disposition> {
            self.installed.borrow_mut().insert(signal);
            Ok(Disposition(unsafe { std::mem::zeroed() }))
        }
        fn restore(&self, signal: c_int, _previous: Disposition) -> io::Result<()> {
            self.installed.borrow_mut().remove(&signal);
            Ok(())
        }
        fn block(&self, _signal: c_int) -> io::Result<()> {
            Ok(())
        }
        fn unblock(&self, _signal: c_int) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn add_handler_then_raise_invokes_listener() {
        let hc = HandlerConfiguration::with_api(Box::new(FakeApi::new()));
        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        let _canceler = hc.add_handler(libc::SIGUSR1, move |n| seen2.set(Some(n))).unwrap();

        simulate_raise(libc::SIGUSR1);
        hc.call_handlers();
        assert_eq!(seen.get(), Some(libc::SIGUSR1));
    }

    #[test]
    fn mask_for_pselect_excludes_watched_signals() {
        let hc = HandlerConfiguration::with_api(Box::new(FakeApi::new()));
        assert!(hc.mask_for_pselect().is_none());

        let _canceler = hc.add_handler(libc::SIGUSR2, |_| {}).unwrap();
        let mask = hc.mask_for_pselect().unwrap();
        assert!(!mask.contains(libc::SIGUSR2));
        assert!(mask.contains(libc::SIGINT));
    }

    #[test]
    fn cancel_removes_listener_and_restores_on_last_departure() {
        let hc = HandlerConfiguration::with_api(Box::new(FakeApi::new()));
        let canceler = hc.add_handler(libc::SIGUSR1, |_| {}).unwrap();
        assert!(hc.mask_for_pselect().is_some());
        canceler.cancel();
        assert!(hc.mask_for_pselect().is_none());
    }
}
