//! The result envelope every delay carries (spec.md §4.1).
//!
//! Named `Trial` after the original implementation's `common::trial<T>`
//! rather than `Result` to avoid colliding with `std::result::Result`, which
//! it otherwise mirrors closely: exactly one of a value or an opaque error
//! is present for the lifetime of the object.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Either a successfully produced `T`, or an opaque captured error.
///
/// The error side is an [`anyhow::Error`] rather than a bespoke type: it
/// plays the same role as the original's captured `std::exception_ptr`, a
/// type-erased, displayable, arbitrary failure.
pub struct Trial<T> {
    inner: Result<T, anyhow::Error>,
}

impl<T> Trial<T> {
    /// Wraps an already-produced value.
    pub fn from_value(value: T) -> Self {
        Trial { inner: Ok(value) }
    }

    /// Wraps an already-captured error.
    pub fn from_error(error: anyhow::Error) -> Self {
        Trial { inner: Err(error) }
    }

    /// Runs `f`, capturing both a returned error and a panic as the error
    /// variant. This is how the core honors "constructing a Result from a
    /// computation that may raise is always a valid Result" (spec.md §4.1)
    /// in a language with panics instead of exceptions.
    pub fn capturing<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, anyhow::Error>,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Trial { inner: result },
            Err(payload) => Trial {
                inner: Err(anyhow::anyhow!(panic_message(payload))),
            },
        }
    }

    /// True if this trial holds a value rather than an error.
    pub fn is_ok(&self) -> bool {
        self.inner.is_ok()
    }

    /// Consumes the trial, returning the underlying `Result`.
    pub fn into_result(self) -> Result<T, anyhow::Error> {
        self.inner
    }

    /// Borrows the underlying `Result`.
    pub fn as_result(&self) -> Result<&T, &anyhow::Error> {
        self.inner.as_ref()
    }

    /// Extracts the value, re-raising the error as a panic if this trial
    /// holds one. Named `unwrap_value` rather than overloading `Deref`:
    /// the original's dereference operator re-raises on error, which in
    /// Rust is better spelled as an explicit, panicking accessor.
    pub fn unwrap_value(self) -> T {
        self.inner.unwrap()
    }

    /// The error, if any. Never panics.
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.inner.as_ref().err()
    }
}

impl<T> From<Result<T, anyhow::Error>> for Trial<T> {
    fn from(inner: Result<T, anyhow::Error>) -> Self {
        Trial { inner }
    }
}

impl<T: fmt::Debug> fmt::Debug for Trial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Ok(v) => f.debug_tuple("Trial::Value").field(v).finish(),
            Err(e) => f.debug_tuple("Trial::Error").field(e).finish(),
        }
    }
}

/// Runs `f` with panic capture, producing a `Trial<T>` directly from a
/// function that cannot itself return a `Result` (used by
/// `Promise::set_result_from`, spec.md §4.3).
pub(crate) fn capture_panic<T, F>(f: F) -> Trial<T>
where
    F: FnOnce() -> T,
{
    Trial::capturing(|| Ok(f()))
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked with a non-string payload".to_string()
    }
}
