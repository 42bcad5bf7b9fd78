//! A single-threaded dataflow core and proactor for a POSIX shell's
//! concurrency layer.
//!
//! [`Promise`]/[`Future`] are the single-producer/single-consumer
//! rendezvous this crate is built on: a [`Promise`] is written to exactly
//! once, a [`Future`] is read exactly once, and every combinator on
//! `Future` consumes `self` to express that a continuation can be chained
//! exactly once. [`SharedFuture`] relaxes the read-once rule to read-many
//! by cloning the eventual result out to every subscriber.
//!
//! [`event::Awaiter`] is the proactor built on top: `expect()` takes a
//! declarative set of [`Trigger`]s (timeouts, file descriptors, signals, or
//! another future) and returns a `Future<Trigger>` for whichever one fires
//! first; `await_events()` drives every outstanding `expect()` call to
//! resolution using a single `pselect(2)`-class kernel wait per iteration.
//!
//! Everything here assumes a single cooperative thread: there are no
//! locks and no atomics except the one async-signal-safe exception in
//! [`signaling`]'s pending-flag table, which a signal handler may touch
//! from an arbitrary point in the program.

#![deny(missing_docs)]

mod canceler;
mod clock;
mod config;
mod delay;
pub mod event;
mod error;
mod future;
mod promise;
mod result;
pub mod signaling;
mod shared_future;
mod trigger;

pub use canceler::Canceler;
pub use clock::{Clock, SystemClock};
pub use config::AwaiterConfig;
pub use error::AwaiterError;
pub use event::Awaiter;
pub use future::Future;
pub use promise::{make_promise_future_pair, Promise};
pub use result::Trial;
pub use shared_future::SharedFuture;
pub use trigger::{Trigger, UserProvidedTrigger};

#[cfg(feature = "test-support")]
pub use clock::ManualClock;
