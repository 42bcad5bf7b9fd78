//! A bitset of signal numbers (spec.md §3, §4.7a).
//!
//! Backed directly by `libc::sigset_t` rather than a `HashSet<i32>`: the
//! mask is handed straight to `pselect(2)`, so it needs to already be in the
//! shape the kernel expects. Grounded on
//! `original_source/src/os/signaling/signal_number_set.hh`.

use std::mem::MaybeUninit;

use libc::c_int;

/// A set of signal numbers, as passed to [`crate::event::PselectApi::pselect`]
/// and built by [`crate::signaling::HandlerConfiguration::mask_for_pselect`].
pub struct SignalNumberSet(libc::sigset_t);

impl SignalNumberSet {
    /// An empty set.
    pub fn empty() -> Self {
        unsafe {
            let mut set = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigemptyset(set.as_mut_ptr());
            SignalNumberSet(set.assume_init())
        }
    }

    /// A set containing every signal number.
    pub fn full() -> Self {
        unsafe {
            let mut set = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigfillset(set.as_mut_ptr());
            SignalNumberSet(set.assume_init())
        }
    }

    /// Adds a signal number to this set.
    pub fn insert(&mut self, signal: c_int) {
        unsafe {
            libc::sigaddset(&mut self.0, signal);
        }
    }

    /// Removes a signal number from this set.
    pub fn remove(&mut self, signal: c_int) {
        unsafe {
            libc::sigdelset(&mut self.0, signal);
        }
    }

    /// Tests whether a signal number is a member of this set.
    pub fn contains(&self, signal: c_int) -> bool {
        unsafe { libc::sigismember(&self.0, signal) == 1 }
    }

    /// A raw pointer suitable for passing to `pselect(2)`.
    pub fn as_raw(&self) -> &libc::sigset_t {
        &self.0
    }
}

impl Default for SignalNumberSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl Clone for SignalNumberSet {
    fn clone(&self) -> Self {
        SignalNumberSet(self.0)
    }
}
