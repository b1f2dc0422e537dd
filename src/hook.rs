//! Hook registry for circuit breaker events.

use crate::state::State;
use parking_lot::RwLock;
use std::sync::Arc;

type HookFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// A registry for circuit breaker event hooks.
///
/// Hooks run on the task that drove the transition, after the breaker has
/// released its internal lock.
pub struct HookRegistry {
    on_trip: RwLock<Option<HookFn>>,
    on_probe: RwLock<Option<HookFn>>,
    on_reset: RwLock<Option<HookFn>>,
    on_failure: RwLock<Option<HookFn>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self {
            on_trip: RwLock::new(None),
            on_probe: RwLock::new(None),
            on_reset: RwLock::new(None),
            on_failure: RwLock::new(None),
        }
    }

    /// Sets the hook to call when the circuit opens, including after a failed probe.
    pub fn set_on_trip<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_trip.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when a half-open probe window begins.
    pub fn set_on_probe<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_probe.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when a breaker with recorded failures is closed.
    pub fn set_on_reset<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_reset.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call for every recorded failure.
    pub fn set_on_failure<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_failure.write() = Some(Arc::new(f));
    }

    /// Executes the appropriate hook for a state transition.
    pub fn execute_state_transition_hook(&self, to: State) {
        let slot = match to {
            State::Open => &self.on_trip,
            State::HalfOpen => &self.on_probe,
            State::Closed => &self.on_reset,
        };

        if let Some(hook) = slot.read().as_ref() {
            hook();
        }
    }

    /// Executes the failure hook.
    pub fn execute_failure_hook(&self) {
        if let Some(hook) = self.on_failure.read().as_ref() {
            hook();
        }
    }
}
