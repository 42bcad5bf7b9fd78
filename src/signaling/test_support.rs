//! Deterministic [`SignalApi`] fake for signal-handling tests.
//!
//! Grounded on `original_source/src/os/test_helper/SigactionApiFake.hh` and
//! `SignalMaskApiFake.hh`: the real dispositions are never touched, and
//! [`crate::signaling::simulate_raise`] stands in for the kernel actually
//! delivering a signal.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;

use libc::c_int;

use crate::signaling::handler_configuration::{Disposition, SignalApi};

/// A [`SignalApi`] that records which signals have a trampoline "installed"
/// without calling into `libc::sigaction` at all.
pub struct FakeSignalApi {
    installed: RefCell<HashSet<c_int>>,
}

impl FakeSignalApi {
    /// A fake with nothing installed yet.
    pub fn new() -> Self {
        FakeSignalApi {
            installed: RefCell::new(HashSet::new()),
        }
    }

    /// Whether `signal`'s trampoline is currently considered installed.
    pub fn is_installed(&self, signal: c_int) -> bool {
        self.installed.borrow().contains(&signal)
    }
}

impl Default for FakeSignalApi {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalApi for FakeSignalApi {
    fn install_trampoline(&self, signal: c_int) -> io::Result<Disposition> {
        self.installed.borrow_mut().insert(signal);
        Ok(Disposition::fake())
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
