//! The rendezvous cell at the bottom of the stack.
//!
//! An input slot (empty / a result / a forward-source back-link) and an
//! output slot (empty / a callback / a forward-target link), firing the
//! callback the instant both are non-empty, and collapsing chains of
//! forwarded delays to O(1) live intermediates (`Delay::forward`).
//!
//! Single-threaded: the shared handle is `Rc<RefCell<Delay<T>>>`, not
//! `Arc<Mutex<..>>`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::result::Trial;

pub(crate) type Callback<T> = Box<dyn FnOnce(Trial<T>)>;
pub(crate) type DelayRef<T> = Rc<RefCell<Delay<T>>>;

enum Input<T> {
    Empty,
    Result(Trial<T>),
    ForwardSource(Weak<RefCell<Delay<T>>>),
    /// The result has already been moved into a callback. Distinct from
    /// `Empty` only to catch a second `set_result` in debug builds.
    Fired,
}

enum Output<T> {
    Empty,
    Callback(Callback<T>),
    ForwardTarget(DelayRef<T>),
    /// The callback has already been invoked, or moved upstream as part of
    /// a collapse.
    Fired,
}

/// The rendezvous between exactly one promise and exactly one future (or
/// one forward-target chain of them).
pub struct Delay<T> {
    input: Input<T>,
    output: Output<T>,
}

impl<T> Delay<T> {
    /// Creates a fresh, empty delay.
    pub fn new() -> DelayRef<T> {
        Rc::new(RefCell::new(Delay {
            input: Input::Empty,
            output: Output::Empty,
        }))
    }

    /// Sets the result. Undefined (debug-asserted) if the input is already
    /// non-empty. If the output already holds a forward-target, the result
    /// is delegated there instead of stored locally.
    pub fn set_result(this: &DelayRef<T>, result: Trial<T>) {
        let forward_target = {
            let me = this.borrow();
            debug_assert!(
                !matches!(me.input, Input::Result(_) | Input::Fired),
                "Delay::set_result called on an already-settled delay"
            );
            match &me.output {
                Output::ForwardTarget(target) => Some(target.clone()),
                _ => None,
            }
        };
        if let Some(target) = forward_target {
            log::trace!("delay: delegating set_result to forward target");
            return Delay::set_result(&target, result);
        }

        this.borrow_mut().input = Input::Result(result);
        Delay::fire_if_ready(this);
    }

    /// Sets the callback. Undefined (debug-asserted) if the output is
    /// already non-empty. If the input already holds a forward-source, the
    /// callback is redirected upstream; if the upstream delay is gone, the
    /// callback is simply dropped (spec.md §9, "forward-source is weak").
    pub fn set_callback(this: &DelayRef<T>, callback: Callback<T>) {
        let upstream = {
            let me = this.borrow();
            debug_assert!(
                !matches!(
                    me.output,
                    Output::Callback(_) | Output::ForwardTarget(_) | Output::Fired
                ),
                "Delay::set_callback called on an already-settled delay"
            );
            match &me.input {
                Input::ForwardSource(weak) => Some(weak.upgrade()),
                _ => None,
            }
        };
        match upstream {
            Some(Some(upstream)) => return Delay::set_callback(&upstream, callback),
            Some(None) => {
                log::debug!("delay: upstream promise dropped, discarding callback");
                return;
            }
            None => {}
        }

        this.borrow_mut().output = Output::Callback(callback);
        Delay::fire_if_ready(this);
    }

    fn fire_if_ready(this: &DelayRef<T>) {
        let ready = {
            let me = this.borrow();
            matches!(me.input, Input::Result(_)) && matches!(me.output, Output::Callback(_))
        };
        if !ready {
            return;
        }

        let (result, callback) = {
            let mut me = this.borrow_mut();
            let result = match std::mem::replace(&mut me.input, Input::Fired) {
                Input::Result(r) => r,
                _ => unreachable!("checked above"),
            };
            let callback = match std::mem::replace(&mut me.output, Output::Fired) {
                Output::Callback(cb) => cb,
                _ => unreachable!("checked above"),
            };
            (result, callback)
        };
        callback(result);
    }

    /// Merges `from` into `to` as if a callback on `from` simply forwarded
    /// its result to `to`'s promise, except chains built this way collapse
    /// to a single hop in O(1), so a program that chains N futures keeps
    /// O(1) live delays rather than O(N) (spec.md §4.2).
    ///
    /// Preconditions: `from`'s output and `to`'s input must both still be
    /// empty. Violating this is a contract error (debug-asserted).
    pub fn forward(mut from: DelayRef<T>, mut to: DelayRef<T>) {
        debug_assert!(!matches!(from.borrow().output, Output::Callback(_)));
        debug_assert!(!matches!(to.borrow().input, Input::Result(_)));

        // Normalize `from`: if it's itself a forward-source, its real
        // identity is the upstream delay.
        let upstream = match &from.borrow().input {
            Input::ForwardSource(weak) => Some(weak.upgrade()),
            _ => None,
        };
        if let Some(upstream) = upstream {
            match upstream {
                Some(upstream) => from = upstream,
                None => return, // upstream already gone; nothing to connect
            }
        }

        // Normalize `to`: if it's itself a forward-target, its real
        // identity is the downstream delay.
        let downstream = match &to.borrow().output {
            Output::ForwardTarget(target) => Some(target.clone()),
            _ => None,
        };
        if let Some(downstream) = downstream {
            to = downstream;
        }

        let from_has_result = matches!(from.borrow().input, Input::Result(_));
        if from_has_result {
            let result = {
                let mut me = from.borrow_mut();
                match std::mem::replace(&mut me.input, Input::Fired) {
                    Input::Result(r) => r,
                    _ => unreachable!("checked above"),
                }
            };
            return Delay::set_result(&to, result);
        }

        let to_has_callback = matches!(to.borrow().output, Output::Callback(_));
        if to_has_callback {
            let callback = {
                let mut me = to.borrow_mut();
                match std::mem::replace(&mut me.output, Output::Fired) {
                    Output::Callback(cb) => cb,
                    _ => unreachable!("checked above"),
                }
            };
            return Delay::set_callback(&from, callback);
        }

        log::trace!("delay: collapsing forward link");
        to.borrow_mut().input = Input::ForwardSource(Rc::downgrade(&from));
        from.borrow_mut().output = Output::ForwardTarget(to);
    }
}
