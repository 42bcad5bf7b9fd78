//! The write-only end of a delay (spec.md §4.3).

use std::any::Any;

use crate::delay::{Delay, DelayRef};
use crate::future::Future;
use crate::result::{capture_panic, panic_message, Trial};

/// Single-ownership, write-only handle over a [`Delay`]. Consumed by
/// exactly one of its four terminal operations; there is no "detached"
/// runtime flag because the borrow checker makes using a promise twice a
/// compile error.
pub struct Promise<T> {
    delay: DelayRef<T>,
}

impl<T> Promise<T> {
    pub(crate) fn new(delay: DelayRef<T>) -> Self {
        Promise { delay }
    }

    /// Stores an already-produced result.
    pub fn set_result(self, result: Trial<T>) {
        Delay::set_result(&self.delay, result);
    }

    /// Runs `f`, storing its return value, or the captured panic if `f`
    /// unwinds. The Rust analogue of "construct T from a computation that
    /// may raise" (spec.md §4.1).
    pub fn set_result_from<F>(self, f: F)
    where
        F: FnOnce() -> T,
    {
        let result = capture_panic(f);
        Delay::set_result(&self.delay, result);
    }

    /// Stores an already-captured error directly.
    pub fn fail(self, error: anyhow::Error) {
        Delay::set_result(&self.delay, Trial::from_error(error));
    }

    /// Stores a panic payload captured by an enclosing `catch_unwind` as
    /// this promise's error. Rust has no ambient "currently propagating
    /// exception" the way the original's `fail_with_current` reads from a
    /// catch-scope, so the payload is threaded through explicitly. The
    /// caller is expected to be inside the `Err` arm of its own
    /// `catch_unwind` when it calls this.
    pub fn fail_with_current(self, payload: Box<dyn Any + Send>) {
        let message = panic_message(payload);
        Delay::set_result(&self.delay, Trial::from_error(anyhow::anyhow!(message)));
    }
}

/// Constructs a fresh delay and returns its two handles (spec.md §6.3).
pub fn make_promise_future_pair<T>() -> (Promise<T>, Future<T>) {
    let delay = Delay::new();
    (Promise::new(delay.clone()), Future::new(delay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_result_delivers_to_future_callback() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let seen = std::rc::Rc::new(std::cell::Cell::new(None));
        let seen2 = seen.clone();
        future.then_void(move |t| seen2.set(Some(t.unwrap_value())));
        promise.set_result(Trial::from_value(5));
        assert_eq!(seen.get(), Some(5));
    }

    #[test]
    fn set_result_from_captures_panic() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let seen2 = seen.clone();
        future.then_void(move |t| *seen2.borrow_mut() = Some(t.is_ok()));
        promise.set_result_from(|| panic!("boom"));
        assert_eq!(*seen.borrow(), Some(false));
    }

    #[test]
    fn fail_delivers_error() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let seen2 = seen.clone();
        future.then_void(move |t| *seen2.borrow_mut() = t.error().map(|e| e.to_string()));
        promise.fail(anyhow::anyhow!("nope"));
        assert_eq!(seen.borrow().as_deref(), Some("nope"));
    }
}
