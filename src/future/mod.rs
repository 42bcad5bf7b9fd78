//! The read-once end of a delay, and its combinators (spec.md §4.4).

use crate::delay::{Delay, DelayRef};
use crate::promise::{make_promise_future_pair, Promise};
use crate::result::{capture_panic, Trial};
use crate::shared_future::SharedFuture;

/// Single-ownership, read-once handle over a [`Delay`]. Every combinator
/// below consumes `self`: a future can be continued exactly once, which
/// Rust's ownership model enforces at compile time rather than at runtime.
pub struct Future<T> {
    delay: DelayRef<T>,
}

impl<T> Future<T> {
    pub(crate) fn new(delay: DelayRef<T>) -> Self {
        Future { delay }
    }

    pub(crate) fn delay(&self) -> &DelayRef<T> {
        &self.delay
    }
}

impl<T: 'static> Future<T> {
    /// A future that is already resolved with `value`.
    pub(crate) fn ready(value: T) -> Self {
        let (promise, future) = make_promise_future_pair();
        promise.set_result(Trial::from_value(value));
        future
    }

    /// Surrenders this future, producing a copyable, read-many
    /// [`SharedFuture`] over the same eventual result (spec.md §4.5).
    pub fn share(self) -> SharedFuture<T> {
        SharedFuture::new(self)
    }

    /// The void-return form of `then`: installs `f` as the delay's
    /// callback with no downstream produced. A panic inside `f` is not
    /// caught: there is no future to deliver the error to, matching an
    /// uncaught exception in the original's void-return continuation.
    pub fn then_void<F>(self, f: F)
    where
        F: FnOnce(Trial<T>) + 'static,
    {
        Delay::set_callback(&self.delay, Box::new(f));
    }

    /// The explicit-promise form of `then`: `f`'s return value (or the
    /// panic it raises) is delivered to `downstream`.
    pub fn then<F, R>(self, downstream: Promise<R>, f: F)
    where
        F: FnOnce(Trial<T>) -> R + 'static,
        R: 'static,
    {
        self.then_void(move |t| downstream.set_result(capture_panic(move || f(t))));
    }

    /// The future-returning form of `then`: equivalent to pairing `then`
    /// with a fresh promise/future pair and returning the future half.
    pub fn then_into<F, R>(self, f: F) -> Future<R>
    where
        F: FnOnce(Trial<T>) -> R + 'static,
        R: 'static,
    {
        let (promise, future) = make_promise_future_pair();
        self.then(promise, f);
        future
    }

    /// Success-path-only continuation. If the upstream failed, the
    /// downstream receives the same error without calling `f`.
    pub fn map<F, R>(self, f: F) -> Future<R>
    where
        F: FnOnce(T) -> R + 'static,
        R: 'static,
    {
        let (promise, future) = make_promise_future_pair();
        self.then_void(move |t| {
            let result = match t.into_result() {
                Ok(value) => capture_panic(|| f(value)),
                Err(error) => Trial::from_error(error),
            };
            promise.set_result(result);
        });
        future
    }

    /// Error-path-only continuation. If the upstream succeeded, the
    /// downstream receives the same value without calling `f`. A panic
    /// inside `f` is captured as the downstream's error.
    pub fn recover<F>(self, f: F) -> Future<T>
    where
        F: FnOnce(anyhow::Error) -> T + 'static,
    {
        let (promise, future) = make_promise_future_pair();
        self.then_void(move |t| {
            let result = match t.into_result() {
                Ok(value) => Trial::from_value(value),
                Err(error) => capture_panic(|| f(error)),
            };
            promise.set_result(result);
        });
        future
    }

    /// Installs a trivial continuation that copies this future's result
    /// into `downstream` verbatim.
    pub fn forward(self, downstream: Promise<T>) {
        self.then_void(move |t| downstream.set_result(t));
    }

    /// Wraps this future so its eventual result is delivered as the value
    /// of the returned future, itself wrapped in another future. An error
    /// on the upstream propagates to the *outer* future directly; no
    /// inner future is ever produced in that case.
    pub fn wrap(self) -> Future<Future<T>> {
        let (promise, future) = make_promise_future_pair();
        self.then_void(move |t| {
            let result = match t.into_result() {
                Ok(value) => Trial::from_value(Future::ready(value)),
                Err(error) => Trial::from_error(error),
            };
            promise.set_result(result);
        });
        future
    }

    /// As [`Future::wrap`], but the inner value is a [`SharedFuture`]
    /// instead of a plain [`Future`].
    pub fn wrap_shared(self) -> Future<SharedFuture<T>> {
        let (promise, future) = make_promise_future_pair();
        self.then_void(move |t| {
            let result = match t.into_result() {
                Ok(value) => Trial::from_value(Future::ready(value).share()),
                Err(error) => Trial::from_error(error),
            };
            promise.set_result(result);
        });
        future
    }
}

impl<T: 'static> Future<Future<T>> {
    /// Flattens a future-of-future into a single future that resolves to
    /// whichever level surfaces first; an error at either level propagates.
    pub fn unwrap(self) -> Future<T> {
        let (promise, future) = make_promise_future_pair();
        self.then_void(move |outer| match outer.into_result() {
            Ok(inner) => inner.forward(promise),
            Err(error) => promise.fail(error),
        });
        future
    }
}

impl<T: 'static + Clone> Future<SharedFuture<T>> {
    /// As [`Future::unwrap`] on `Future<Future<T>>`, but flattening a
    /// future-of-shared-future instead.
    pub fn unwrap(self) -> Future<T> {
        let (promise, future) = make_promise_future_pair();
        self.then_void(move |outer| match outer.into_result() {
            Ok(inner) => inner.forward(promise),
            Err(error) => promise.fail(error),
        });
        future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::make_promise_future_pair;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn map_applies_on_success_only() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let mapped = future.map(|v| v + 1);
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        mapped.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));
        promise.set_result(Trial::from_value(41));
        assert_eq!(*seen.borrow(), Some(42));
    }

    #[test]
    fn map_skips_f_on_error() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let mapped = future.map(|_v: i32| -> i32 { panic!("must not run") });
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        mapped.then_void(move |t| *seen2.borrow_mut() = t.error().map(|e| e.to_string()));
        promise.fail(anyhow::anyhow!("boom"));
        assert_eq!(seen.borrow().as_deref(), Some("boom"));
    }

    #[test]
    fn recover_converts_error_to_value() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let recovered = future.recover(|_e| 0);
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        recovered.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));
        promise.fail(anyhow::anyhow!("boom"));
        assert_eq!(*seen.borrow(), Some(0));
    }

    #[test]
    fn recover_leaves_success_untouched() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let recovered = future.recover(|_e| -1);
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        recovered.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));
        promise.set_result(Trial::from_value(7));
        assert_eq!(*seen.borrow(), Some(7));
    }

    #[test]
    fn map_panic_is_captured_as_error() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let mapped = future.map(|_v: i32| -> i32 { panic!("kaboom") });
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        mapped.then_void(move |t| *seen2.borrow_mut() = Some(t.is_ok()));
        promise.set_result(Trial::from_value(1));
        assert_eq!(*seen.borrow(), Some(false));
    }

    #[test]
    fn wrap_unwrap_round_trips_a_value() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let unwrapped = future.wrap().unwrap();
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        unwrapped.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));
        promise.set_result(Trial::from_value(99));
        assert_eq!(*seen.borrow(), Some(99));
    }

    #[test]
    fn wrap_sends_upstream_error_to_outer_future() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let wrapped = future.wrap();
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        wrapped.then_void(move |t| *seen2.borrow_mut() = Some(t.is_ok()));
        promise.fail(anyhow::anyhow!("boom"));
        assert_eq!(*seen.borrow(), Some(false));
    }

    #[test]
    fn wrap_shared_unwrap_round_trips_a_value() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let unwrapped = future.wrap_shared().unwrap();
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        unwrapped.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));
        promise.set_result(Trial::from_value(7));
        assert_eq!(*seen.borrow(), Some(7));
    }

    #[test]
    fn forward_copies_result_into_downstream_promise() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let (down_promise, down_future) = make_promise_future_pair::<i32>();
        future.forward(down_promise);
        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        down_future.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));
        promise.set_result(Trial::from_value(5));
        assert_eq!(*seen.borrow(), Some(5));
    }
}
