//! Proxy Host
//!
//! A thin host that wires the orchestrator to simulated collaborators and
//! drives the main flows end to end: startup, enable, connect, a runtime
//! proxy auth failure, and recovery. Useful for exercising the library's
//! public surface under `RUST_LOG=debug`.

mod sim;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use veil_proxy::{
    Collaborators, OrchestratorConfig, ProxyEvent, ProxyOrchestrator, ProxyState,
    ProxyStateObserver,
};

/// Observer that mirrors every state change into the log.
struct LogObserver;

impl ProxyStateObserver for LogObserver {
    fn proxy_state_changed(&self, state: ProxyState) {
        info!("Observer: proxy state is now {:?}", state);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = OrchestratorConfig {
        retry_delay_ms: 1000,
        excluded_domains: vec!["localhost".into()],
    };
    config.validate()?;

    let world = sim::SimWorld::new();
    let orchestrator = ProxyOrchestrator::new(
        config,
        Collaborators {
            auth: world.auth.clone(),
            network: world.network.clone(),
            storage: world.storage.clone(),
            ui: world.ui.clone(),
            settings: world.settings.clone(),
        },
    );
    orchestrator.register_observer(Arc::new(LogObserver));

    info!("--- startup ---");
    orchestrator.init().await?;

    info!("--- user enables the proxy ---");
    orchestrator.handle_event(ProxyEvent::EnableProxy { enabled: true }).await;
    wait_for(&orchestrator, ProxyState::Active).await;

    info!("--- proxy rejects our credentials at runtime ---");
    orchestrator
        .handle_event(ProxyEvent::ProxyAuthenticationFailed)
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // ProxyAuthFailed is sticky; an explicit authentication attempt clears it
    info!("--- re-authenticate ---");
    orchestrator
        .handle_event(ProxyEvent::AuthenticationRequired)
        .await;
    wait_for(&orchestrator, ProxyState::Active).await;

    info!("--- user disables, then re-enables ---");
    orchestrator
        .handle_event(ProxyEvent::EnableProxy { enabled: false })
        .await;
    orchestrator.handle_event(ProxyEvent::EnableProxy { enabled: true }).await;
    wait_for(&orchestrator, ProxyState::Active).await;

    info!("--- proxy becomes unreachable, then the network recovers ---");
    world.network.set_reachable(false);
    orchestrator
        .handle_event(ProxyEvent::ProxySettingsChanged)
        .await;
    wait_for(&orchestrator, ProxyState::Offline).await;
    world.network.set_reachable(true);
    orchestrator
        .handle_event(ProxyEvent::ConnectivityChanged { connectivity: true })
        .await;
    wait_for(&orchestrator, ProxyState::Active).await;

    info!("Done; final state {:?}", orchestrator.proxy_state());
    Ok(())
}

/// Poll until the orchestrator reaches `target` (detached work settles).
async fn wait_for(orchestrator: &ProxyOrchestrator, target: ProxyState) {
    for _ in 0..100 {
        if orchestrator.proxy_state() == target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    info!(
        "Did not reach {:?}, current state {:?}",
        target,
        orchestrator.proxy_state()
    );
}
