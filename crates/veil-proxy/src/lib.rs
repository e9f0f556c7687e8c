//! Veil Proxy - Managed Proxy Feature Orchestration
//!
//! Decides, from observed connectivity, third-party proxy configuration,
//! persisted user intent, and token availability, whether the
//! application-managed proxy is active, and drives the authentication and
//! retry flows needed to reach that state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Host Application                       │
//! │                                                               │
//! │  connectivity / UI / proxy errors / auth completions          │
//! │        │                                                      │
//! │        ▼                                                      │
//! │  ┌────────────┐   ┌────────────────────┐   ┌──────────────┐   │
//! │  │ EventQueue │──▶│ ProxyOrchestrator  │──▶│  StateStore  │   │
//! │  │ (FIFO gate)│   │  (state machine)   │   │ + observers  │   │
//! │  └────────────┘   └─────────┬──────────┘   └──────────────┘   │
//! │                             │                                 │
//! │              ┌──────────────┼──────────────┐                  │
//! │              ▼              ▼              ▼                  │
//! │        RetryTimer     detached tasks   collaborators          │
//! │        (recovery)    (connect test,   (auth, network,         │
//! │                       prefetch)        storage, UI, host)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Serialization**: every state-mutating trigger passes through a FIFO
//!   mutual-exclusion gate; handlers never interleave.
//! - **Computed transitions**: only the state store writes the live value,
//!   and every write notifies all observers before the handler returns.
//! - **Single retry**: at most one delayed recovery recomputation is ever
//!   pending.
//! - **Detached effects re-enter**: fire-and-forget work (the connectivity
//!   test, the post-failure UI/token pair) goes back through the gate
//!   before mutating anything.

mod collaborators;
mod config;
mod error;
mod event;
mod orchestrator;
mod queue;
mod retry;
mod state;

pub use collaborators::{
    AuthClient, HostProxyType, HostSettings, NetworkClient, StorageClient, TabId, UiClient,
};
pub use config::{ConfigError, OrchestratorConfig, DEFAULT_RETRY_DELAY_MS};
pub use error::{AuthError, ConnectivityError, OrchestratorError, SettingsError, StorageError};
pub use event::ProxyEvent;
pub use orchestrator::{Collaborators, ProxyOrchestrator, RequestInfo};
pub use queue::{EventQueue, QueueGuard};
pub use retry::RetryTimer;
pub use state::{PersistedProxyState, ProxyState, ProxyStateObserver, StateStore};
