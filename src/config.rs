//! Tunables for the awaiter event loop.
//!
//! This is deliberately small: the core has exactly one knob worth exposing
//! (a soft cap used to pre-size the pending-event table), read from the
//! environment with a hard-coded fallback. There is no wire format and
//! nothing persists across process runs (spec.md §6).

use std::env;

const MAX_PENDING_EVENTS_VAR: &str = "POSH_ASYNC_MAX_PENDING_EVENTS";
const DEFAULT_MAX_PENDING_EVENTS: usize = 256;

/// Runtime configuration for an [`crate::event::Awaiter`].
#[derive(Debug, Clone, Copy)]
pub struct AwaiterConfig {
    /// Capacity hint for the pending-event table. Purely an allocation
    /// hint: exceeding it is not an error, just a reallocation.
    pub pending_events_hint: usize,
}

impl AwaiterConfig {
    /// Reads overrides from the environment, falling back to built-in
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let pending_events_hint = env::var(MAX_PENDING_EVENTS_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_PENDING_EVENTS);
        AwaiterConfig {
            pending_events_hint,
        }
    }
}

impl Default for AwaiterConfig {
    fn default() -> Self {
        AwaiterConfig {
            pending_events_hint: DEFAULT_MAX_PENDING_EVENTS,
        }
    }
}
