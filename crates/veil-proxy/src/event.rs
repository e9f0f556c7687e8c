//! Serialized event surface
//!
//! The closed set of triggers dispatched through the orchestrator's
//! mutual-exclusion gate. Using an enum makes an unrecognized event a
//! compile-time impossibility instead of a runtime default case.

use std::fmt;

/// A trigger that mutates the proxy state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyEvent {
    /// The authentication flow hard-failed
    AuthenticationFailed,
    /// A collaborator needs the user authenticated
    AuthenticationRequired,
    /// The host's network connectivity changed
    ConnectivityChanged { connectivity: bool },
    /// Explicit user enable/disable request
    EnableProxy { enabled: bool },
    /// The UI asked for the account-management URL
    ManagerAccountUrl,
    /// The proxy rejected our credentials at runtime
    ProxyAuthenticationFailed,
    /// The proxy reported a generic runtime error
    ProxyGenericError,
    /// The host's proxy settings changed
    ProxySettingsChanged,
}

impl fmt::Display for ProxyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyEvent::AuthenticationFailed => write!(f, "authenticationFailed"),
            ProxyEvent::AuthenticationRequired => write!(f, "authenticationRequired"),
            ProxyEvent::ConnectivityChanged { connectivity } => {
                write!(f, "connectivityChanged({connectivity})")
            }
            ProxyEvent::EnableProxy { enabled } => write!(f, "enableProxy({enabled})"),
            ProxyEvent::ManagerAccountUrl => write!(f, "managerAccountURL"),
            ProxyEvent::ProxyAuthenticationFailed => write!(f, "proxyAuthenticationFailed"),
            ProxyEvent::ProxyGenericError => write!(f, "proxyGenericError"),
            ProxyEvent::ProxySettingsChanged => write!(f, "proxySettingsChanged"),
        }
    }
}
