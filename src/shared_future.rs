//! The copyable, read-many end of a delay (spec.md §4.5).

use std::cell::RefCell;
use std::rc::Rc;

use crate::future::Future;
use crate::promise::{make_promise_future_pair, Promise};
use crate::result::{capture_panic, Trial};

type Listener<T> = Box<dyn FnOnce(&Trial<T>)>;

enum Inner<T> {
    /// The underlying future has not yet been subscribed to (lazy, per
    /// spec.md §4.5): `future` is taken on the first `then` call.
    Pending {
        future: Option<Future<T>>,
        listeners: Vec<Listener<T>>,
    },
    Settled(Trial<T>),
}

/// Multiple-ownership, read-many handle over a future's result. Produced
/// by [`Future::share`]. Cloning a `SharedFuture` shares the same
/// implementation wrapper; two clones compare equal.
pub struct SharedFuture<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        SharedFuture {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PartialEq for SharedFuture<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> SharedFuture<T> {
    pub(crate) fn new(future: Future<T>) -> Self {
        SharedFuture {
            inner: Rc::new(RefCell::new(Inner::Pending {
                future: Some(future),
                listeners: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> SharedFuture<T> {
    /// Registers a callback receiving a const reference to the eventual
    /// result. If the result is already settled, `f` runs immediately and
    /// synchronously; otherwise it is queued and broadcast to every
    /// registered listener the instant the underlying future resolves.
    pub fn then<F>(&self, f: F)
    where
        F: FnOnce(&Trial<T>) + 'static,
    {
        let already_settled = matches!(&*self.inner.borrow(), Inner::Settled(_));
        if already_settled {
            let inner = self.inner.borrow();
            if let Inner::Settled(result) = &*inner {
                f(result);
            }
            return;
        }

        let took_future = {
            let mut inner = self.inner.borrow_mut();
            match &mut *inner {
                Inner::Pending { future, listeners } => {
                    listeners.push(Box::new(f));
                    future.take()
                }
                Inner::Settled(_) => unreachable!("checked above"),
            }
        };
        if let Some(future) = took_future {
            let shared = self.inner.clone();
            future.then_void(move |result| Self::settle(&shared, result));
        }
    }

    fn settle(inner: &Rc<RefCell<Inner<T>>>, result: Trial<T>) {
        let listeners = match std::mem::replace(&mut *inner.borrow_mut(), Inner::Settled(result))
        {
            Inner::Pending { listeners, .. } => listeners,
            Inner::Settled(_) => unreachable!("cannot settle twice"),
        };
        let borrowed = inner.borrow();
        if let Inner::Settled(result) = &*borrowed {
            for listener in listeners {
                listener(result);
            }
        }
    }

    /// Clones the settled result into a fresh owned `Trial<T>`. A panic
    /// while cloning the success value is caught and delivered only to the
    /// caller asking for this copy; the broadcast list itself is
    /// unaffected (spec.md §9, per-callback copy failure).
    fn clone_result(result: &Trial<T>) -> Trial<T>
    where
        T: Clone,
    {
        match result.as_result() {
            Ok(value) => capture_panic(|| value.clone()),
            Err(error) => Trial::from_error(anyhow::anyhow!(error.to_string())),
        }
    }

    /// Success-path-only continuation: reads a reference to the value, no
    /// cloning required.
    pub fn map<F, R>(&self, f: F) -> Future<R>
    where
        R: 'static,
        F: FnOnce(&T) -> R + 'static,
    {
        let (promise, future) = make_promise_future_pair();
        self.then(move |result| {
            let out = match result.as_result() {
                Ok(value) => capture_panic(|| f(value)),
                Err(error) => Trial::from_error(anyhow::anyhow!(error.to_string())),
            };
            promise.set_result(out);
        });
        future
    }

    /// Error-path-only continuation. On success the value is cloned
    /// through untouched; on error `f` produces the replacement value.
    pub fn recover<F>(&self, f: F) -> Future<T>
    where
        T: Clone,
        F: FnOnce(&anyhow::Error) -> T + 'static,
    {
        let (promise, future) = make_promise_future_pair();
        self.then(move |result| {
            let out = match result.as_result() {
                Ok(value) => capture_panic(|| value.clone()),
                Err(error) => capture_panic(|| f(error)),
            };
            promise.set_result(out);
        });
        future
    }

    /// Clones the eventual result into `downstream`.
    pub fn forward(&self, downstream: Promise<T>)
    where
        T: Clone,
    {
        self.then(move |result| downstream.set_result(Self::clone_result(result)));
    }

    /// As [`Future::wrap`]: delivers a plain [`Future`] downstream holding
    /// a clone of this shared future's value; an upstream error propagates
    /// to the outer future.
    pub fn wrap(&self) -> Future<Future<T>>
    where
        T: Clone,
    {
        let (promise, future) = make_promise_future_pair();
        self.then(move |result| {
            let out = match result.as_result() {
                Ok(_) => match Self::clone_result(result).into_result() {
                    Ok(value) => Trial::from_value(Future::ready(value)),
                    Err(clone_err) => Trial::from_error(clone_err),
                },
                Err(error) => Trial::from_error(anyhow::anyhow!(error.to_string())),
            };
            promise.set_result(out);
        });
        future
    }

    /// As [`SharedFuture::wrap`], but the inner value is itself a
    /// `SharedFuture`.
    pub fn wrap_shared(&self) -> Future<SharedFuture<T>>
    where
        T: Clone,
    {
        let (promise, future) = make_promise_future_pair();
        self.then(move |result| {
            let out = match result.as_result() {
                Ok(_) => match Self::clone_result(result).into_result() {
                    Ok(value) => Trial::from_value(Future::ready(value).share()),
                    Err(clone_err) => Trial::from_error(clone_err),
                },
                Err(error) => Trial::from_error(anyhow::anyhow!(error.to_string())),
            };
            promise.set_result(out);
        });
        future
    }
}

impl<T: 'static + Clone> SharedFuture<SharedFuture<T>> {
    /// As [`Future::unwrap`] on `Future<Future<T>>`, but flattening a
    /// shared-future-of-shared-future: clones the settled inner
    /// `SharedFuture` out of the outer broadcast and forwards its eventual
    /// value. An error at either level propagates.
    pub fn unwrap(&self) -> Future<T> {
        let (promise, future) = make_promise_future_pair();
        self.then(move |outer| match outer.as_result() {
            Ok(inner) => inner.clone().forward(promise),
            Err(error) => promise.fail(anyhow::anyhow!(error.to_string())),
        });
        future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::make_promise_future_pair;
    use std::cell::RefCell as Cell;

    #[test]
    fn broadcasts_to_listeners_registered_before_settle() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let shared = future.share();
        let a = Rc::new(Cell::new(None));
        let b = Rc::new(Cell::new(None));
        let (a2, b2) = (a.clone(), b.clone());
        shared.then(move |t| *a2.borrow_mut() = Some(t.as_result().ok().copied()));
        shared.then(move |t| *b2.borrow_mut() = Some(t.as_result().ok().copied()));
        promise.set_result(Trial::from_value(10));
        assert_eq!(*a.borrow(), Some(Some(10)));
        assert_eq!(*b.borrow(), Some(Some(10)));
    }

    #[test]
    fn delivers_immediately_to_listeners_registered_after_settle() {
        let (promise, future) = make_promise_future_pair::<i32>();
        let shared = future.share();
        promise.set_result(Trial::from_value(5));
        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        shared.then(move |t| *seen2.borrow_mut() = Some(t.as_result().ok().copied()));
        assert_eq!(*seen.borrow(), Some(Some(5)));
    }

    #[test]
    fn clones_compare_equal_by_identity() {
        let (_promise, future) = make_promise_future_pair::<i32>();
        let shared = future.share();
        let clone = shared.clone();
        assert_eq!(shared, clone);

        let (_p2, f2) = make_promise_future_pair::<i32>();
        let other = f2.share();
        assert_ne!(shared, other);
    }

    #[test]
    fn map_reads_by_reference_without_cloning() {
        let (promise, future) = make_promise_future_pair::<String>();
        let shared = future.share();
        let mapped = shared.map(|s: &String| s.len());
        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        mapped.then_void(move |t| *seen2.borrow_mut() = Some(t.unwrap_value()));
        promise.set_result(Trial::from_value("hello".to_string()));
        assert_eq!(*seen.borrow(), Some(5));
    }

    #[test]
    fn unwrap_flattens_a_shared_future_of_shared_future() {
        let (inner_promise, inner_future) = make_promise_future_pair::<i32>();
        let inner_shared = inner_future.share();

        let (outer_promise, outer_future) = make_promise_future_pair::<SharedFuture<i32>>();
        let outer_shared = outer_future.share();
        let flattened = outer_shared.unwrap();

        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        flattened.then_void(move |t| seen2.set(Some(t.unwrap_value())));

        outer_promise.set_result(Trial::from_value(inner_shared));
        assert_eq!(seen.get(), None);
        inner_promise.set_result(Trial::from_value(9));
        assert_eq!(seen.get(), Some(9));
    }

    #[test]
    fn unwrap_propagates_an_outer_error() {
        let (outer_promise, outer_future) = make_promise_future_pair::<SharedFuture<i32>>();
        let outer_shared = outer_future.share();
        let flattened = outer_shared.unwrap();

        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        flattened.then_void(move |t| seen2.set(Some(t.is_ok())));

        outer_promise.fail(anyhow::anyhow!("outer failed"));
        assert_eq!(seen.get(), Some(false));
    }
}
