//! Error taxonomy for gateway management operations.
//!
//! Command-level code works in `anyhow::Result`; these variants travel inside
//! `anyhow::Error` so callers (and tests) can downcast to the specific
//! condition. Messages from the OS or external tools are carried verbatim.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A host dependency is absent. Reported by `check`, never raised by `install`.
    #[error("missing dependency: {name} ({hint})")]
    DependencyMissing { name: String, hint: String },

    #[error("cloud CLI credentials are not configured: {0}")]
    CredentialsNotConfigured(String),

    /// The named State Store key has no usable value yet.
    #[error("gateway is not configured: `{0}` is not set — run `aiotctl configure`")]
    ConfigurationMissing(&'static str),

    #[error("download of {url} failed: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("{manager} could not install packages: {message}")]
    PackageInstallFailed { manager: String, message: String },

    #[error("systemctl {action} {unit} failed: {message}")]
    SupervisorError {
        unit: String,
        action: String,
        message: String,
    },

    /// A wizard answer failed validation; the question is asked again.
    #[error("{0}")]
    InvalidAnswer(String),
}

impl GatewayError {
    /// Returns the missing key if `err` wraps a `ConfigurationMissing`.
    pub fn missing_key(err: &anyhow::Error) -> Option<&'static str> {
        match err.downcast_ref::<GatewayError>() {
            Some(GatewayError::ConfigurationMissing(key)) => Some(*key),
            _ => None,
        }
    }
}
