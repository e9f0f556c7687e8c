//! Error taxonomy
//!
//! Recoverable failures are converted into proxy-state transitions before
//! they leave the orchestrator; what remains here is the vocabulary the
//! collaborator traits speak and the umbrella type the serialized handlers
//! return. Nothing escapes the event queue as an unhandled failure: the
//! dispatch boundary logs and swallows.

use thiserror::Error;

/// Authentication collaborator failures.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authentication denied")]
    Denied,

    #[error("Authentication canceled by the user")]
    Canceled,

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Authentication provider unreachable: {0}")]
    Unreachable(String),
}

/// Proxy connectivity-test failures.
#[derive(Debug, Clone, Error)]
pub enum ConnectivityError {
    #[error("Proxy unreachable: {0}")]
    Unreachable(String),

    #[error("Proxy misconfigured: {0}")]
    Misconfigured(String),
}

/// Persisted-state read/write failures.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Failed to read persisted proxy state: {0}")]
    Read(String),

    #[error("Failed to write persisted proxy state: {0}")]
    Write(String),
}

/// Host proxy-settings query failures.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    #[error("Host proxy settings unavailable: {0}")]
    Unavailable(String),
}

/// Anything a serialized event handler can fail with.
///
/// These are logged at the queue boundary, never rethrown to the trigger's
/// caller.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}
