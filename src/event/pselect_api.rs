//! The `pselect(2)`-class kernel wait primitive (spec.md §6.1).
//!
//! Grounded on `original_source/src/os/event/pselect_api.hh`.

use std::io;
use std::time::{Duration, Instant};

use libc::c_int;

use crate::clock::{Clock, SystemClock};
use crate::signaling::SignalNumberSet;

/// A set of file descriptors, as passed to [`PselectApi::pselect`].
///
/// Backed directly by `libc::fd_set`, since it is handed straight to
/// `pselect(2)`. Grounded on `original_source/src/os/io/file_descriptor_set.hh`.
pub struct FdSet(libc::fd_set);

impl FdSet {
    /// An empty set.
    pub fn empty() -> Self {
        unsafe {
            let mut set = std::mem::MaybeUninit::<libc::fd_set>::uninit();
            libc::FD_ZERO(set.as_mut_ptr());
            FdSet(set.assume_init())
        }
    }

    /// Adds a file descriptor to this set.
    pub fn insert(&mut self, fd: c_int) {
        unsafe { libc::FD_SET(fd, &mut self.0) }
    }

    /// Tests whether a file descriptor is a member of this set.
    pub fn contains(&self, fd: c_int) -> bool {
        unsafe { libc::FD_ISSET(fd, &self.0) }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut libc::fd_set {
        &mut self.0
    }
}

impl Default for FdSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// The largest file descriptor value [`PselectApi`] can represent, one less
/// than `FD_SETSIZE`. A trigger naming a larger FD fails with
/// [`crate::AwaiterError::TooManyOpenFiles`] (spec.md §7).
pub const MAX_FD: c_int = libc::FD_SETSIZE as c_int - 1;

/// Abstraction of the `pselect(2)` POSIX API function (spec.md §6.1).
///
/// Grounded on `original_source/src/os/event/pselect_api.hh`.
pub trait PselectApi {
    /// The current monotonic time, used for deadline arithmetic.
    fn now(&self) -> Instant;

    /// Waits for a file descriptor or signal event.
    ///
    /// `fd_bound` is one greater than the largest FD referenced by any of
    /// the three sets. `timeout` of `None` means wait indefinitely;
    /// `Some(Duration::ZERO)` means do not block. `signal_mask`, if
    /// present, is applied atomically for the duration of the wait. On
    /// success the sets are narrowed to exactly the FDs whose conditions
    /// held; on error the caller must not trust the sets' contents.
    fn pselect(
        &self,
        fd_bound: c_int,
        read_fds: Option<&mut FdSet>,
        write_fds: Option<&mut FdSet>,
        error_fds: Option<&mut FdSet>,
        timeout: Option<Duration>,
        signal_mask: Option<&SignalNumberSet>,
    ) -> io::Result<()>;
}

/// The real implementation, backed by `libc::pselect`.
pub struct SystemPselect {
    clock: SystemClock,
}

impl SystemPselect {
    /// Creates the real, OS-backed kernel wait primitive.
    pub fn new() -> Self {
        SystemPselect {
            clock: SystemClock,
        }
    }
}

impl Default for SystemPselect {
    fn default() -> Self {
        Self::new()
    }
}

impl PselectApi for SystemPselect {
    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn pselect(
        &self,
        fd_bound: c_int,
        read_fds: Option<&mut FdSet>,
        write_fds: Option<&mut FdSet>,
        error_fds: Option<&mut FdSet>,
        timeout: Option<Duration>,
        signal_mask: Option<&SignalNumberSet>,
    ) -> io::Result<()> {
        let ts = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: libc::c_long::from(d.subsec_nanos() as i32),
        });
        let ts_ptr = ts.as_ref().map_or(std::ptr::null(), |t| t as *const _);
        let mask_ptr = signal_mask.map_or(std::ptr::null(), |m| m.as_raw() as *const _);

        let read_ptr = read_fds.map_or(std::ptr::null_mut(), FdSet::as_mut_ptr);
        let write_ptr = write_fds.map_or(std::ptr::null_mut(), FdSet::as_mut_ptr);
        let error_ptr = error_fds.map_or(std::ptr::null_mut(), FdSet::as_mut_ptr);

        let rc = unsafe {
            libc::pselect(fd_bound, read_ptr, write_ptr, error_ptr, ts_ptr, mask_ptr)
        };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_set_round_trips_membership() {
        let mut set = FdSet::empty();
        assert!(!set.contains(3));
        set.insert(3);
        assert!(set.contains(3));
        assert!(!set.contains(4));
    }

    #[test]
    fn max_fd_is_one_less_than_fd_setsize() {
        assert_eq!(MAX_FD as i64, libc::FD_SETSIZE as i64 - 1);
    }
}
