//! The proactor: a kernel wait primitive plus the awaiter built on it
//! (spec.md §4.6, §6.1).

mod awaiter;
mod pending_event;
mod pselect_api;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use awaiter::Awaiter;
pub use pselect_api::{FdSet, PselectApi, SystemPselect, MAX_FD};
