//! Simulated collaborators
//!
//! In-memory stand-ins for the subsystems the orchestrator drives:
//! authentication, the request layer, durable storage, the UI, and the
//! host's proxy settings. Scriptable where the demo needs it (proxy
//! reachability), logging everywhere else.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use veil_proxy::{
    AuthClient, AuthError, ConnectivityError, HostProxyType, HostSettings, NetworkClient,
    PersistedProxyState, SettingsError, StorageClient, StorageError, TabId, UiClient,
};

/// The full set of simulated collaborators.
pub struct SimWorld {
    pub auth: Arc<SimAuth>,
    pub network: Arc<SimNetwork>,
    pub storage: Arc<SimStorage>,
    pub ui: Arc<SimUi>,
    pub settings: Arc<SimSettings>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            auth: Arc::new(SimAuth),
            network: Arc::new(SimNetwork::new()),
            storage: Arc::new(SimStorage::new()),
            ui: Arc::new(SimUi),
            settings: Arc::new(SimSettings),
        }
    }
}

/// Authentication provider that always succeeds.
pub struct SimAuth;

#[async_trait]
impl AuthClient for SimAuth {
    async fn authenticate(&self) -> Result<(), AuthError> {
        info!("[auth] interactive authentication");
        Ok(())
    }

    async fn maybe_generate_tokens(&self) -> Result<bool, AuthError> {
        debug!("[auth] generating tokens");
        Ok(true)
    }

    async fn reset_all_token_data(&self) -> Result<(), AuthError> {
        info!("[auth] all token data purged");
        Ok(())
    }

    async fn reset_dynamic_token_data(&self) -> Result<(), AuthError> {
        info!("[auth] dynamic token data purged");
        Ok(())
    }

    async fn manage_account_url(&self) -> Result<(), AuthError> {
        info!("[auth] opening account management page");
        Ok(())
    }

    async fn prefetch_well_known_data(&self) -> Result<(), AuthError> {
        debug!("[auth] prefetching well-known data");
        Ok(())
    }

    fn is_auth_url(&self, origin: &str) -> bool {
        origin.ends_with("accounts.example")
    }
}

/// Request layer with scriptable proxy reachability.
pub struct SimNetwork {
    reachable: AtomicBool,
}

impl SimNetwork {
    fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        info!("[network] proxy reachable: {}", reachable);
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkClient for SimNetwork {
    async fn test_proxy_connection(&self) -> Result<(), ConnectivityError> {
        if self.reachable.load(Ordering::SeqCst) {
            debug!("[network] connection test ok");
            Ok(())
        } else {
            Err(ConnectivityError::Unreachable("simulated outage".into()))
        }
    }

    async fn inactive_steps(&self) -> Result<(), ConnectivityError> {
        debug!("[network] reset to inactive defaults");
        Ok(())
    }

    async fn sync_after_connection_steps(&self) -> Result<(), ConnectivityError> {
        debug!("[network] post-connect sync");
        Ok(())
    }

    async fn increase_connection_isolation(&self) -> Result<(), ConnectivityError> {
        info!("[network] dropping pooled connections");
        Ok(())
    }

    fn token_generated(&self, token_type: &str, _token_value: &str) {
        debug!("[network] received {} token", token_type);
    }
}

/// In-memory persisted intent.
pub struct SimStorage {
    state: Mutex<PersistedProxyState>,
}

impl SimStorage {
    fn new() -> Self {
        Self {
            state: Mutex::new(PersistedProxyState::Inactive),
        }
    }
}

#[async_trait]
impl StorageClient for SimStorage {
    async fn proxy_state(&self) -> Result<PersistedProxyState, StorageError> {
        Ok(*self.state.lock().unwrap())
    }

    async fn set_proxy_state(&self, state: PersistedProxyState) -> Result<(), StorageError> {
        debug!("[storage] persisted intent {:?}", state);
        *self.state.lock().unwrap() = state;
        Ok(())
    }
}

/// UI that logs refreshes and exempts no tabs.
pub struct SimUi;

#[async_trait]
impl UiClient for SimUi {
    async fn update(&self, show_toast: bool) {
        info!("[ui] refresh (toast: {})", show_toast);
    }

    async fn after_connection_steps(&self) {
        debug!("[ui] post-connect steps");
    }

    fn is_tab_exempt(&self, _tab_id: TabId) -> bool {
        false
    }
}

/// Host with no third-party proxy configured.
pub struct SimSettings;

#[async_trait]
impl HostSettings for SimSettings {
    async fn proxy_type(&self) -> Result<HostProxyType, SettingsError> {
        Ok(HostProxyType::None)
    }
}
