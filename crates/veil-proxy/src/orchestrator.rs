//! Proxy Orchestrator
//!
//! The state machine that decides, from persisted intent and live external
//! signals, whether the managed proxy is active, and drives the
//! authentication and retry flows needed to get there.
//!
//! # Control flow
//!
//! Every state-mutating trigger enters through [`ProxyOrchestrator::handle_event`],
//! which funnels it through the FIFO event queue. The handler recomputes
//! state through the [`StateStore`], possibly arming the retry timer or
//! launching a detached connectivity test, and the store fans the new state
//! out to every registered observer before the handler returns.
//!
//! # Detached work
//!
//! Three operations are launched without the serialized caller waiting for
//! them: the connectivity-test kickoff, the account well-known-data
//! prefetch, and the UI-refresh/token-regeneration pair after a runtime
//! proxy auth failure. Each re-enters through the serialized gate before
//! mutating anything.

use crate::collaborators::{
    AuthClient, HostSettings, NetworkClient, StorageClient, TabId, UiClient,
};
use crate::config::OrchestratorConfig;
use crate::error::{AuthError, ConnectivityError, OrchestratorError};
use crate::event::ProxyEvent;
use crate::queue::EventQueue;
use crate::retry::RetryTimer;
use crate::state::{PersistedProxyState, ProxyState, ProxyStateObserver, StateStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// The external subsystems the orchestrator drives.
pub struct Collaborators {
    pub auth: Arc<dyn AuthClient>,
    pub network: Arc<dyn NetworkClient>,
    pub storage: Arc<dyn StorageClient>,
    pub ui: Arc<dyn UiClient>,
    pub settings: Arc<dyn HostSettings>,
}

/// Per-request context for the bypass decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestInfo {
    /// Originating tab, when the host attributes the request to one.
    pub tab_id: Option<TabId>,
}

/// The proxy-state orchestrator.
///
/// Created once per process via [`ProxyOrchestrator::new`]; collaborators
/// and observers are wired at initialization and the instance then lives
/// behind an `Arc` for the rest of the process.
pub struct ProxyOrchestrator {
    weak: Weak<ProxyOrchestrator>,
    config: OrchestratorConfig,
    queue: EventQueue,
    store: StateStore,
    retry: RetryTimer,
    auth: Arc<dyn AuthClient>,
    network: Arc<dyn NetworkClient>,
    storage: Arc<dyn StorageClient>,
    ui: Arc<dyn UiClient>,
    settings: Arc<dyn HostSettings>,
    /// Last connectivity report from the host. Mutated only inside the
    /// serialized region; assumed online until told otherwise.
    online: AtomicBool,
    /// Number of token-generation calls in flight. A count, not a flag:
    /// the detached regeneration after a proxy auth failure can overlap a
    /// serialized recomputation's generation.
    token_generation: watch::Sender<u32>,
}

impl ProxyOrchestrator {
    /// Create an orchestrator in the `Loading` state.
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators) -> Arc<Self> {
        let (token_generation, _) = watch::channel(0);
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            config,
            queue: EventQueue::new(),
            store: StateStore::new(),
            retry: RetryTimer::new(),
            auth: collaborators.auth,
            network: collaborators.network,
            storage: collaborators.storage,
            ui: collaborators.ui,
            settings: collaborators.settings,
            online: AtomicBool::new(true),
            token_generation,
        })
    }

    /// Register a state observer. Valid during initialization only.
    pub fn register_observer(&self, observer: Arc<dyn ProxyStateObserver>) {
        self.store.register_observer(observer);
    }

    /// First run: restore from persisted intent or recompute from scratch.
    ///
    /// Serialized like any other trigger, so events arriving during startup
    /// queue behind it.
    pub async fn init(&self) -> Result<(), OrchestratorError> {
        let _guard = self.queue.acquire().await;
        info!("Initializing proxy orchestrator");

        if self.storage.proxy_state().await? == PersistedProxyState::Active {
            self.store.set_proxy_state(ProxyState::Active);
            self.ui.update(false).await;
            return Ok(());
        }
        self.recompute().await?;
        Ok(())
    }

    /// The serialized entry point for every state-mutating trigger.
    ///
    /// Handler failures are logged and swallowed here so the queue always
    /// progresses to the next waiter; recoverable failures have already
    /// been converted into state transitions by the time they surface.
    pub async fn handle_event(&self, event: ProxyEvent) {
        let _guard = self.queue.acquire().await;
        debug!("Handling event: {}", event);

        if let Err(err) = self.dispatch(event).await {
            warn!("Event {} failed: {}", event, err);
        }
    }

    async fn dispatch(&self, event: ProxyEvent) -> Result<(), OrchestratorError> {
        match event {
            ProxyEvent::AuthenticationFailed => self.auth_failure().await,
            ProxyEvent::AuthenticationRequired => self.run_authentication().await,
            ProxyEvent::ConnectivityChanged { connectivity } => {
                self.connectivity_changed(connectivity).await
            }
            ProxyEvent::EnableProxy { enabled } => self.enable_proxy(enabled).await,
            ProxyEvent::ManagerAccountUrl => {
                self.auth.manage_account_url().await?;
                Ok(())
            }
            ProxyEvent::ProxyAuthenticationFailed => self.proxy_authentication_failed().await,
            ProxyEvent::ProxyGenericError => self.proxy_generic_error(),
            ProxyEvent::ProxySettingsChanged => self.proxy_settings_changed().await,
        }
    }

    /// Full recomputation: derive the state from persisted intent and live
    /// signals. Idempotent; starts from truth, never from assumptions about
    /// why it was triggered. Returns whether the state changed.
    async fn recompute(&self) -> Result<bool, OrchestratorError> {
        // A pending recovery attempt is superseded by this pass
        self.retry.cancel();

        let before = self.store.state();
        if before.is_sticky_error() {
            debug!("Recomputation skipped, sticky state {:?}", before);
            return Ok(false);
        }

        self.store.set_proxy_state(ProxyState::Unauthenticated);

        if self.settings.proxy_type().await?.is_third_party() {
            // A third-party proxy is a hard external constraint
            self.store.set_proxy_state(ProxyState::OtherProxyInUse);
        } else if self.storage.proxy_state().await? == PersistedProxyState::Inactive {
            self.store.set_proxy_state(ProxyState::Inactive);
        } else if self.generate_tokens().await? {
            self.store.set_proxy_state(ProxyState::Connecting);
            self.spawn_connection_test();
        }

        let after = self.store.state();
        if after != before {
            info!("Proxy state recomputed: {:?} -> {:?}", before, after);
            self.network.inactive_steps().await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn enable_proxy(&self, enabled: bool) -> Result<(), OrchestratorError> {
        let current = self.store.state();
        if !current.allows_enable_request() {
            debug!("Ignoring enable request ({}) in state {:?}", enabled, current);
            return Ok(());
        }

        let intent = if enabled {
            PersistedProxyState::Connecting
        } else {
            PersistedProxyState::Inactive
        };
        self.storage.set_proxy_state(intent).await?;
        self.recompute().await?;
        Ok(())
    }

    async fn run_authentication(&self) -> Result<(), OrchestratorError> {
        info!("Authentication required");
        self.store.set_proxy_state(ProxyState::Unauthenticated);

        match self.auth.authenticate().await {
            Ok(()) => {
                self.store.set_proxy_state(ProxyState::Inactive);
                self.enable_proxy(true).await
            }
            Err(err) => {
                warn!("Authentication flow failed: {}", err);
                self.auth_failure().await
            }
        }
    }

    async fn auth_failure(&self) -> Result<(), OrchestratorError> {
        self.store.set_proxy_state(ProxyState::AuthFailure);
        self.storage
            .set_proxy_state(PersistedProxyState::AuthFailure)
            .await?;
        self.auth.reset_all_token_data().await?;
        Ok(())
    }

    async fn connectivity_changed(&self, connectivity: bool) -> Result<(), OrchestratorError> {
        let was_online = self.online.swap(connectivity, Ordering::Relaxed);
        if !connectivity {
            debug!("Host reports no connectivity");
            return Ok(());
        }
        if !was_online || self.store.state() == ProxyState::Offline {
            info!("Connectivity regained, recomputing proxy state");
            self.recompute().await?;
        }
        Ok(())
    }

    async fn proxy_settings_changed(&self) -> Result<(), OrchestratorError> {
        if self.recompute().await? {
            self.ui.update(false).await;
        }
        Ok(())
    }

    async fn proxy_authentication_failed(&self) -> Result<(), OrchestratorError> {
        let current = self.store.state();
        if !matches!(current, ProxyState::Active | ProxyState::Connecting) {
            debug!("Ignoring proxy auth failure in state {:?}", current);
            return Ok(());
        }

        self.store.set_proxy_state(ProxyState::ProxyAuthFailed);
        // Pooled connections still carry the rejected credentials
        self.network.increase_connection_isolation().await?;
        self.auth.reset_dynamic_token_data().await?;

        let Some(this) = self.weak.upgrade() else {
            return Ok(());
        };
        // UI refresh and token regeneration race by design
        tokio::spawn(async move {
            let (_, tokens) = tokio::join!(this.ui.update(true), this.generate_tokens());
            match tokens {
                Ok(ready) => debug!("Token regeneration after proxy auth failure: ready={}", ready),
                Err(err) => warn!("Token regeneration failed: {}", err),
            }
        });
        Ok(())
    }

    fn proxy_generic_error(&self) -> Result<(), OrchestratorError> {
        let current = self.store.state();
        if matches!(current, ProxyState::Active | ProxyState::Connecting) {
            self.store.set_proxy_state(ProxyState::ProxyError);
        } else {
            debug!("Ignoring proxy error in state {:?}", current);
        }
        Ok(())
    }

    /// Launch the connectivity test without blocking the current handler.
    ///
    /// The recomputation that set `Connecting` returns immediately; the
    /// test's outcome re-enters through the serialized gate so it cannot
    /// race a concurrent recomputation.
    fn spawn_connection_test(&self) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        debug!("Starting proxy connection test");
        tokio::spawn(async move {
            let result = this.network.test_proxy_connection().await;
            let _guard = this.queue.acquire().await;
            if let Err(err) = this.connection_test_finished(result).await {
                warn!("Connection test follow-up failed: {}", err);
            }
        });
    }

    async fn connection_test_finished(
        &self,
        result: Result<(), ConnectivityError>,
    ) -> Result<(), OrchestratorError> {
        match result {
            Ok(()) => {
                // A disable or settings change may have landed while the
                // test was in flight; only a live connect attempt completes
                if self.store.state() == ProxyState::Connecting {
                    self.storage
                        .set_proxy_state(PersistedProxyState::Active)
                        .await?;
                    self.store.set_proxy_state(ProxyState::Active);
                    self.network.sync_after_connection_steps().await?;
                    self.ui.after_connection_steps().await;
                    info!("Proxy active");
                }
                Ok(())
            }
            Err(err) => {
                info!("Proxy connection test failed: {}", err);
                self.set_offline_and_start_recovering_timer();
                Ok(())
            }
        }
    }

    fn set_offline_and_start_recovering_timer(&self) {
        self.store.set_proxy_state(ProxyState::Offline);
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        self.retry.schedule(self.config.retry_delay(), async move {
            let _guard = this.queue.acquire().await;
            if let Err(err) = this.recompute().await {
                warn!("Recovery recomputation failed: {}", err);
            }
        });
    }

    /// Run token generation while exposing the in-flight flag to
    /// [`ProxyOrchestrator::wait_for_token_generation`].
    async fn generate_tokens(&self) -> Result<bool, AuthError> {
        self.token_generation.send_modify(|in_flight| *in_flight += 1);
        let result = self.auth.maybe_generate_tokens().await;
        self.token_generation.send_modify(|in_flight| *in_flight -= 1);
        result
    }

    // Non-serialized surface: read-only queries and fire-and-forget calls
    // that are safe to run concurrently with the event queue.

    /// Current proxy state.
    pub fn proxy_state(&self) -> ProxyState {
        self.store.state()
    }

    /// Whether a delayed recovery recomputation is pending.
    pub fn retry_pending(&self) -> bool {
        self.retry.is_armed()
    }

    /// Decide whether a request bypasses the proxy.
    ///
    /// Everything bypasses unless the proxy is `Active`; exempt tabs,
    /// authentication-provider origins, and excluded domains bypass always.
    pub fn skip_proxy(&self, request: &RequestInfo, url: &Url) -> bool {
        if !self.store.state().is_active() {
            return true;
        }
        if let Some(tab_id) = request.tab_id {
            if self.ui.is_tab_exempt(tab_id) {
                return true;
            }
        }
        if self.auth.is_auth_url(&url.origin().ascii_serialization()) {
            return true;
        }
        if let Some(host) = url.host_str() {
            if self
                .config
                .excluded_domains
                .iter()
                .any(|domain| host == domain || host.ends_with(&format!(".{domain}")))
            {
                return true;
            }
        }
        false
    }

    /// The pass-through domain list.
    pub fn excluded_domains(&self) -> &[String] {
        &self.config.excluded_domains
    }

    /// The feature panel was opened: warm the provider cache.
    ///
    /// Fire-and-forget; nothing awaits the prefetch.
    pub fn panel_shown(&self) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = this.auth.prefetch_well_known_data().await {
                debug!("Well-known data prefetch failed: {}", err);
            }
        });
    }

    /// Forward a freshly generated token to the request layer.
    pub fn token_generated(&self, token_type: &str, token_value: &str) {
        self.network.token_generated(token_type, token_value);
    }

    /// Wait until no token generation is in flight.
    ///
    /// Returns immediately when none is; with several overlapping
    /// generations, waits for the last one.
    pub async fn wait_for_token_generation(&self) {
        let mut in_flight = self.token_generation.subscribe();
        while *in_flight.borrow_and_update() > 0 {
            if in_flight.changed().await.is_err() {
                return;
            }
        }
    }
}
