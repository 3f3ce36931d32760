//! Error types for the certificate login flow.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::types::PivSlot;

/// Result type for login operations
pub type LoginResult<T> = Result<T, LoginError>;

/// Coarse error taxonomy used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Hardware,
    Input,
    Network,
    Protocol,
    Persistence,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration error",
            ErrorCategory::Hardware => "hardware error",
            ErrorCategory::Input => "input error",
            ErrorCategory::Network => "network error",
            ErrorCategory::Protocol => "protocol error",
            ErrorCategory::Persistence => "persistence error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comprehensive error types for the login flow
#[derive(Error, Debug, miette::Diagnostic)]
pub enum LoginError {
    #[error("VAULT_ADDR is not set")]
    #[diagnostic(
        code(vault_login::config::missing_endpoint),
        help("export VAULT_ADDR=https://vault.example.com:8200 or pass --vault-addr")
    )]
    MissingEndpoint,

    #[error("Invalid Vault address: {0}")]
    #[diagnostic(code(vault_login::config::invalid_endpoint))]
    InvalidEndpoint(String),

    #[error("Failed to read CA certificate {}: {reason}", .path.display())]
    #[diagnostic(
        code(vault_login::config::trust_anchor_read),
        help("check VAULT_CACERT / --ca-cert")
    )]
    TrustAnchorReadError { path: PathBuf, reason: String },

    #[error("No usable CA certificate in {source_name}: {reason}")]
    #[diagnostic(
        code(vault_login::config::trust_anchor_parse),
        help("the CA bundle must contain at least one PEM encoded certificate")
    )]
    TrustAnchorParseError { source_name: String, reason: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(vault_login::config::invalid))]
    ConfigurationError(String),

    #[error("No YubiKey detected")]
    #[diagnostic(
        code(vault_login::hardware::no_token),
        help("insert the YubiKey and make sure the PC/SC service (pcscd) is running")
    )]
    NoTokenDetected,

    #[error("Failed to open any of {candidates} smart card reader(s): {last_error}")]
    #[diagnostic(code(vault_login::hardware::open_failed))]
    NoTokenOpened { candidates: usize, last_error: String },

    #[error("No certificate found in PIV slot {slot}")]
    #[diagnostic(code(vault_login::hardware::certificate_not_found))]
    CertificateNotFound { slot: PivSlot },

    #[error("Certificate error: {0}")]
    #[diagnostic(code(vault_login::hardware::certificate))]
    CertificateParseError(String),

    #[error("Unsupported key algorithm: {0}")]
    #[diagnostic(code(vault_login::hardware::unsupported_key))]
    UnsupportedKeyAlgorithm(String),

    #[error(
        "PIN verification failed{}",
        .retries_remaining.map(|n| format!(" ({n} attempts remaining)")).unwrap_or_default()
    )]
    #[diagnostic(
        code(vault_login::hardware::authentication_failed),
        help("repeated failures block the PIN; unblock it with the PUK")
    )]
    AuthenticationFailed { retries_remaining: Option<u8> },

    #[error("No usable private key in PIV slot {slot}: {reason}")]
    #[diagnostic(code(vault_login::hardware::key_unavailable))]
    KeyUnavailable { slot: PivSlot, reason: String },

    #[error("Private key in PIV slot {slot} does not match the slot certificate")]
    #[diagnostic(code(vault_login::hardware::key_mismatch))]
    KeyMismatch { slot: PivSlot },

    #[error("YubiKey error: {0}")]
    #[diagnostic(code(vault_login::hardware::token))]
    TokenError(String),

    #[error("Failed to read PIN: {0}")]
    #[diagnostic(
        code(vault_login::input),
        help("run the command from an interactive terminal")
    )]
    InputError(String),

    #[error("Network error: {0}")]
    #[diagnostic(code(vault_login::network))]
    NetworkError(String),

    #[error("TLS error: {0}")]
    #[diagnostic(code(vault_login::network::tls))]
    TlsError(String),

    #[error(
        "Vault login failed: {status}{}",
        .body.as_ref().map(|b| format!("\nResponse body: {b}")).unwrap_or_default()
    )]
    #[diagnostic(code(vault_login::protocol::rejected))]
    LoginRejected { status: String, body: Option<String> },

    #[error("Failed to parse login response: {0}")]
    #[diagnostic(code(vault_login::protocol::parse))]
    ResponseParseError(String),

    #[error("No client token in login response: {0}")]
    #[diagnostic(code(vault_login::protocol::token_missing))]
    TokenExtractionError(String),

    #[error("Unable to determine the home directory")]
    #[diagnostic(code(vault_login::persistence::home))]
    HomeDirUnavailable,

    #[error("Failed to write token to {}: {reason}", .path.display())]
    #[diagnostic(code(vault_login::persistence::write))]
    WriteError { path: PathBuf, reason: String },
}

impl LoginError {
    /// Taxonomy bucket of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoginError::MissingEndpoint
            | LoginError::InvalidEndpoint(_)
            | LoginError::TrustAnchorReadError { .. }
            | LoginError::TrustAnchorParseError { .. }
            | LoginError::ConfigurationError(_) => ErrorCategory::Configuration,
            LoginError::NoTokenDetected
            | LoginError::NoTokenOpened { .. }
            | LoginError::CertificateNotFound { .. }
            | LoginError::CertificateParseError(_)
            | LoginError::UnsupportedKeyAlgorithm(_)
            | LoginError::AuthenticationFailed { .. }
            | LoginError::KeyUnavailable { .. }
            | LoginError::KeyMismatch { .. }
            | LoginError::TokenError(_) => ErrorCategory::Hardware,
            LoginError::InputError(_) => ErrorCategory::Input,
            LoginError::NetworkError(_) | LoginError::TlsError(_) => ErrorCategory::Network,
            LoginError::LoginRejected { .. }
            | LoginError::ResponseParseError(_)
            | LoginError::TokenExtractionError(_) => ErrorCategory::Protocol,
            LoginError::HomeDirUnavailable | LoginError::WriteError { .. } => {
                ErrorCategory::Persistence
            }
        }
    }
}

/// Render an error together with its `source()` chain.
///
/// reqwest and rustls keep the interesting part (refused connection, bad
/// certificate) in the source chain rather than in `Display`.
#[must_use]
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

impl From<reqwest::Error> for LoginError {
    fn from(error: reqwest::Error) -> Self {
        LoginError::NetworkError(error_chain(&error))
    }
}

impl From<rustls::Error> for LoginError {
    fn from(error: rustls::Error) -> Self {
        LoginError::TlsError(error.to_string())
    }
}

#[cfg(feature = "pcsc-backend")]
impl From<yubikey::Error> for LoginError {
    fn from(error: yubikey::Error) -> Self {
        match error {
            yubikey::Error::WrongPin { tries } => LoginError::AuthenticationFailed {
                retries_remaining: Some(tries),
            },
            yubikey::Error::PinLocked => LoginError::AuthenticationFailed {
                retries_remaining: Some(0),
            },
            other => LoginError::TokenError(other.to_string()),
        }
    }
}
