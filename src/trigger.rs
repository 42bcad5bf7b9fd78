//! The event-kind sum type the awaiter recognizes (spec.md §3, §4.6).

use std::any::Any;
use std::rc::Rc;
use std::time::Duration;

use crate::future::Future;
use crate::result::Trial;

/// The state of a [`Trigger::UserProvided`] entry: it starts holding the
/// inner future supplied at `expect()` time and, once the awaiter has
/// installed its continuation and that future has produced a result,
/// becomes the fired state carrying that result.
///
/// Grounded on `original_source/src/os/event/trigger.hh`'s `user_provided`
/// variant, which is the same object before and after firing; Rust's
/// move-only `Future` can't be read twice, so the two phases are split into
/// explicit states instead.
pub enum UserProvidedTrigger {
    /// Not yet installed/settled.
    Pending(Future<Rc<dyn Any>>),
    /// The inner future produced this result.
    Fired(Trial<Rc<dyn Any>>),
}

/// One of the six things an [`crate::event::Awaiter`] can wait for.
///
/// Grounded on `original_source/src/os/event/trigger.hh`'s variant set;
/// encoded here as a plain enum rather than a tagged union with manual
/// discriminants, since Rust's `enum` already is the tagged sum the
/// original simulates with a type-tag + union.
pub enum Trigger {
    /// Fires no sooner than the given duration has elapsed. A negative
    /// duration is not representable (`Duration` is unsigned); callers
    /// clamp negative requests to zero before constructing this variant.
    Timeout(Duration),
    /// Fires when the file descriptor becomes readable.
    ReadableFd(libc::c_int),
    /// Fires when the file descriptor becomes writable.
    WritableFd(libc::c_int),
    /// Fires when the file descriptor reports an error condition.
    ErrorFd(libc::c_int),
    /// Fires when the given signal number is delivered.
    Signal(libc::c_int),
    /// Fires when the wrapped future produces a result (success or error).
    UserProvided(UserProvidedTrigger),
}

impl Trigger {
    /// `Duration::MAX` stands in for "no deadline" (spec.md §4.8's
    /// `time_point::max()` sentinel).
    pub const NO_DEADLINE: Duration = Duration::MAX;

    /// True for the FD-bearing variants.
    pub fn file_descriptor(&self) -> Option<libc::c_int> {
        match self {
            Trigger::ReadableFd(fd) | Trigger::WritableFd(fd) | Trigger::ErrorFd(fd) => Some(*fd),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Timeout(d) => f.debug_tuple("Timeout").field(d).finish(),
            Trigger::ReadableFd(fd) => f.debug_tuple("ReadableFd").field(fd).finish(),
            Trigger::WritableFd(fd) => f.debug_tuple("WritableFd").field(fd).finish(),
            Trigger::ErrorFd(fd) => f.debug_tuple("ErrorFd").field(fd).finish(),
            Trigger::Signal(n) => f.debug_tuple("Signal").field(n).finish(),
            Trigger::UserProvided(_) => f.write_str("UserProvided(..)"),
        }
    }
}
