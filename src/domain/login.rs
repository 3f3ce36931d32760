//! Vault certificate-auth wire types.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::infra::error::{LoginError, LoginResult};

/// Body of `POST /v1/auth/cert/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    /// Certificate role name; empty lets Vault pick the matching role.
    pub name: String,
}

impl LoginRequest {
    #[must_use]
    pub fn new(role: Option<&str>) -> Self {
        Self {
            name: role.unwrap_or_default().to_string(),
        }
    }
}

/// Typed view of the login response. Everything but `auth` is ignored.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub auth: Option<AuthBlock>,
}

/// The `auth` object of a login response.
#[derive(Debug, Deserialize)]
pub struct AuthBlock {
    pub client_token: Option<String>,
    #[serde(default)]
    pub lease_duration: Option<serde_json::Value>,
    #[serde(default)]
    pub renewable: Option<serde_json::Value>,
    #[serde(default)]
    pub policies: Option<serde_json::Value>,
}

impl LoginResponse {
    /// Parse a response body and pull out the client token.
    ///
    /// Malformed JSON is a [`LoginError::ResponseParseError`]; well-formed JSON
    /// without a usable `auth.client_token` is a [`LoginError::TokenExtractionError`].
    pub fn parse(body: &[u8]) -> LoginResult<(Self, ClientToken)> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| LoginError::ResponseParseError(e.to_string()))?;

        // serde maps JSON arrays onto structs too, so the shape is checked first
        let auth = value
            .as_object()
            .and_then(|root| root.get("auth"))
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| LoginError::TokenExtractionError("missing \"auth\" object".to_string()))?;
        let token = auth
            .get("client_token")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .map(ClientToken::new)
            .ok_or_else(|| {
                LoginError::TokenExtractionError("missing \"auth.client_token\"".to_string())
            })?;

        let response: LoginResponse = serde_json::from_value(value)
            .map_err(|e| LoginError::TokenExtractionError(e.to_string()))?;
        Ok((response, token))
    }

    /// Lease duration in seconds, when the server sent a number.
    #[must_use]
    pub fn lease_duration(&self) -> Option<u64> {
        self.auth
            .as_ref()?
            .lease_duration
            .as_ref()?
            .as_u64()
    }

    #[must_use]
    pub fn renewable(&self) -> Option<bool> {
        self.auth.as_ref()?.renewable.as_ref()?.as_bool()
    }

    /// Policy names, skipping any non-string entries.
    #[must_use]
    pub fn policies(&self) -> Vec<String> {
        self.auth
            .as_ref()
            .and_then(|a| a.policies.as_ref())
            .and_then(|p| p.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|p| p.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Vault client token. Wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientToken(Zeroizing<String>);

impl ClientToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientToken([REDACTED])")
    }
}

/// Result of a successful login exchange.
#[derive(Debug)]
pub struct LoginOutcome {
    /// HTTP status line, e.g. `200 OK`.
    pub status: String,
    pub token: ClientToken,
    pub lease_duration: Option<u64>,
    pub renewable: Option<bool>,
    pub policies: Vec<String>,
}
