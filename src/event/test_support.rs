//! Deterministic [`PselectApi`] fake for awaiter tests.
//!
//! Grounded on `original_source/src/os/test_helper/PselectApiStub.hh`
//! (itself paired with `FileDescriptorSetApi.hh`/`NowApiStub.hh`), simplified
//! here to state you set before the call rather than an injectable closure:
//! mark FDs ready with [`PselectApiStub::make_readable`] and friends, and the
//! stub reports exactly those as ready; if none of the requested FDs are
//! ready, it advances its [`ManualClock`] by the requested timeout, the way
//! a real wait would let that much time pass.

use std::cell::RefCell;
use std::io;
use std::time::{Duration, Instant};

use libc::c_int;

use crate::clock::{Clock, ManualClock};
use crate::event::pselect_api::{FdSet, PselectApi};
use crate::signaling::SignalNumberSet;

/// A [`PselectApi`] whose readiness and elapsed time are controlled by the
/// test rather than the kernel.
pub struct PselectApiStub {
    clock: ManualClock,
    readable: RefCell<Vec<c_int>>,
    writable: RefCell<Vec<c_int>>,
    errored: RefCell<Vec<c_int>>,
}

impl PselectApiStub {
    /// A stub with nothing ready and a clock starting at an arbitrary
    /// epoch.
    pub fn new() -> Self {
        PselectApiStub {
            clock: ManualClock::new(),
            readable: RefCell::new(Vec::new()),
            writable: RefCell::new(Vec::new()),
            errored: RefCell::new(Vec::new()),
        }
    }

    /// The manual clock backing [`PselectApi::now`], for tests that want to
    /// assert on elapsed time directly.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// From the next `pselect` call onward, report `fd` as readable if it
    /// was requested.
    pub fn make_readable(&self, fd: c_int) {
        self.readable.borrow_mut().push(fd);
    }

    /// As [`PselectApiStub::make_readable`], for writability.
    pub fn make_writable(&self, fd: c_int) {
        self.writable.borrow_mut().push(fd);
    }

    /// As [`PselectApiStub::make_readable`], for the error condition.
    pub fn make_errored(&self, fd: c_int) {
        self.errored.borrow_mut().push(fd);
    }
}

impl Default for PselectApiStub {
    fn default() -> Self {
        Self::new()
    }
}

fn narrow(requested: &mut Option<&mut FdSet>, ready: &[c_int]) -> bool {
    match requested {
        Some(set) => {
            let matches: Vec<c_int> = ready.iter().copied().filter(|fd| set.contains(*fd)).collect();
            let mut narrowed = FdSet::empty();
            for fd in &matches {
                narrowed.insert(*fd);
            }
            **set = narrowed;
            !matches.is_empty()
        }
        None => false,
    }
}

impl PselectApi for PselectApiStub {
    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn pselect(
        &self,
        _fd_bound: c_int,
        mut read_fds: Option<&mut FdSet>,
        mut write_fds: Option<&mut FdSet>,
        mut error_fds: Option<&mut FdSet>,
        timeout: Option<Duration>,
        _signal_mask: Option<&SignalNumberSet>,
    ) -> io::Result<()> {
        let readable = self.readable.borrow();
        let writable = self.writable.borrow();
        let errored = self.errored.borrow();

        let any_ready = [
            narrow(&mut read_fds, &readable),
            narrow(&mut write_fds, &writable),
            narrow(&mut error_fds, &errored),
        ]
        .into_iter()
        .any(|ready| ready);

        if !any_ready {
            if let Some(d) = timeout {
                self.clock.advance(d);
            }
        }
        Ok(())
    }
}
