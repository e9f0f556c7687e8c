//! Collaborator interfaces
//!
//! The contracts the orchestrator requires from the subsystems around it:
//! authentication, the request layer, durable storage, the UI, and the
//! host's proxy settings. Each is an object-safe async trait held as
//! `Arc<dyn …>`, so production wiring and test mocks plug in the same way.
//!
//! The orchestrator only drives these interfaces; token generation
//! internals, UI rendering, and OS-level change detection live behind them.

use crate::error::{AuthError, ConnectivityError, SettingsError, StorageError};
use crate::state::PersistedProxyState;
use async_trait::async_trait;

/// Tab identifier as reported by the host.
pub type TabId = i64;

/// Proxy configuration currently in effect on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostProxyType {
    /// No proxy configured
    None,
    /// The platform default (not a third-party override)
    System,
    /// Explicit manual proxy
    Manual,
    /// Proxy auto-config script
    AutoConfig,
    /// WPAD auto-detection
    AutoDetect,
}

impl HostProxyType {
    /// True when a third party controls proxying and we must stand down.
    pub fn is_third_party(&self) -> bool {
        matches!(
            self,
            HostProxyType::Manual | HostProxyType::AutoConfig | HostProxyType::AutoDetect
        )
    }
}

/// Authentication provider integration.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Run the interactive authentication flow.
    async fn authenticate(&self) -> Result<(), AuthError>;

    /// Ensure usable tokens exist. Returns `true` when tokens are ready.
    async fn maybe_generate_tokens(&self) -> Result<bool, AuthError>;

    /// Purge every stored token.
    async fn reset_all_token_data(&self) -> Result<(), AuthError>;

    /// Purge only short-lived token material, keeping the long-lived grant.
    async fn reset_dynamic_token_data(&self) -> Result<(), AuthError>;

    /// Open the account-management page.
    async fn manage_account_url(&self) -> Result<(), AuthError>;

    /// Warm the provider's well-known configuration cache.
    async fn prefetch_well_known_data(&self) -> Result<(), AuthError>;

    /// Whether `origin` belongs to the authentication provider.
    ///
    /// Synchronous: consulted on the per-request bypass path.
    fn is_auth_url(&self, origin: &str) -> bool;
}

/// Request-layer integration.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Probe the proxy end to end. Fails when unreachable or misconfigured.
    async fn test_proxy_connection(&self) -> Result<(), ConnectivityError>;

    /// Reset the request layer to its inactive defaults.
    async fn inactive_steps(&self) -> Result<(), ConnectivityError>;

    /// Post-connect synchronization once the proxy is confirmed up.
    async fn sync_after_connection_steps(&self) -> Result<(), ConnectivityError>;

    /// Drop pooled connections so fresh credentials take effect.
    async fn increase_connection_isolation(&self) -> Result<(), ConnectivityError>;

    /// Hand a freshly generated token to the request layer.
    ///
    /// Fire-and-forget: the caller does not wait for the credential to be
    /// applied.
    fn token_generated(&self, token_type: &str, token_value: &str);
}

/// Durable proxy-state storage.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Read the persisted intent.
    async fn proxy_state(&self) -> Result<PersistedProxyState, StorageError>;

    /// Overwrite the persisted intent.
    async fn set_proxy_state(&self, state: PersistedProxyState) -> Result<(), StorageError>;
}

/// UI integration.
#[async_trait]
pub trait UiClient: Send + Sync {
    /// Refresh the UI from the current state; `show_toast` pops a notice.
    async fn update(&self, show_toast: bool);

    /// UI work to run once the proxy is confirmed up.
    async fn after_connection_steps(&self);

    /// Whether the user exempted this tab from proxying.
    ///
    /// Synchronous: consulted on the per-request bypass path.
    fn is_tab_exempt(&self, tab_id: TabId) -> bool;
}

/// Read of the host's current proxy settings.
#[async_trait]
pub trait HostSettings: Send + Sync {
    /// The proxy configuration currently in effect.
    async fn proxy_type(&self) -> Result<HostProxyType, SettingsError>;
}
