//! Proxy State
//!
//! The state enumeration, the persisted intent, and the `StateStore` that
//! owns the live value plus the observer registry.
//!
//! # Invariant
//!
//! `StateStore::set_proxy_state` is the only way the live value changes.
//! Every write notifies every registered observer synchronously, even when
//! the value did not change, so observers can re-run idempotent sync logic
//! (e.g. a UI refresh).

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Live state of the managed proxy feature.
///
/// Exactly one value is active at any time. Transitions are computed by the
/// orchestrator; nothing else writes this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Startup value; never a stable end state
    Loading,
    /// No usable authentication
    Unauthenticated,
    /// Tokens ready, connectivity test in flight
    Connecting,
    /// Proxy is up and carrying traffic
    Active,
    /// User has the feature switched off
    Inactive,
    /// Connectivity test failed; recovery timer pending
    Offline,
    /// A third-party proxy is configured on the host
    OtherProxyInUse,
    /// Authentication flow was denied or canceled
    AuthFailure,
    /// The proxy reported a generic runtime error
    ProxyError,
    /// The proxy rejected our credentials at runtime
    ProxyAuthFailed,
}

impl ProxyState {
    /// Check whether this is a sticky error state.
    ///
    /// Sticky states survive recomputation; only an explicit authentication
    /// attempt or an explicit enable/disable action clears them.
    pub fn is_sticky_error(&self) -> bool {
        matches!(
            self,
            ProxyState::AuthFailure | ProxyState::ProxyError | ProxyState::ProxyAuthFailed
        )
    }

    /// Check whether an explicit enable/disable request is honored here.
    ///
    /// From any other state the request is silently ignored.
    pub fn allows_enable_request(&self) -> bool {
        matches!(
            self,
            ProxyState::Unauthenticated
                | ProxyState::Active
                | ProxyState::Inactive
                | ProxyState::Connecting
        )
    }

    /// Check if the proxy is usable
    pub fn is_active(&self) -> bool {
        matches!(self, ProxyState::Active)
    }
}

/// Durable intent owned by the storage collaborator.
///
/// `Active`/`Inactive` are the stable intents. `Connecting` is written when
/// the user enables the feature, so a restart mid-connect re-runs the
/// connect flow instead of claiming `Active` for an untested proxy.
/// `AuthFailure` records a hard authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistedProxyState {
    Active,
    Inactive,
    Connecting,
    AuthFailure,
}

/// Receiver of proxy-state notifications.
///
/// Notifications are synchronous broadcasts; implementations must be cheap
/// and idempotent. Anything expensive belongs in a detached task that
/// re-enters the orchestrator through its serialized entry point.
pub trait ProxyStateObserver: Send + Sync {
    /// Called on every `set_proxy_state`, including same-value writes.
    fn proxy_state_changed(&self, state: ProxyState);
}

/// Owner of the live proxy state and the observer set.
///
/// The store itself is lock-per-field; callers serialize mutation through
/// the orchestrator's event queue.
pub struct StateStore {
    state: Mutex<ProxyState>,
    observers: Mutex<Vec<Arc<dyn ProxyStateObserver>>>,
}

impl StateStore {
    /// Create a store in the initial `Loading` state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProxyState::Loading),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Read the current state.
    pub fn state(&self) -> ProxyState {
        *self.state.lock().unwrap()
    }

    /// Register an observer. Valid during initialization only.
    ///
    /// Membership is a set: re-registering the same observer is a no-op.
    pub fn register_observer(&self, observer: Arc<dyn ProxyStateObserver>) {
        let mut observers = self.observers.lock().unwrap();
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return;
        }
        observers.push(observer);
    }

    /// Overwrite the state and notify every observer with the new value.
    ///
    /// The notification fan-out runs outside the state lock so observers
    /// may read the store.
    pub fn set_proxy_state(&self, next: ProxyState) {
        let previous = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, next)
        };
        debug!("Proxy state: {:?} -> {:?}", previous, next);

        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.proxy_state_changed(next);
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
