//! Vault HTTP client adapter.
//! Performs the certificate-auth login exchange over an already configured
//! (mutual TLS) reqwest client. Single attempt, no retries.

use crate::domain::login::{LoginOutcome, LoginRequest, LoginResponse};
use crate::domain::types::VaultAddr;
use crate::infra::error::{LoginError, LoginResult};

/// HTTP adapter for `POST /v1/auth/cert/login`.
pub struct VaultLoginClient {
    http: reqwest::Client,
    login_url: String,
}

impl VaultLoginClient {
    /// Create a login client over `http` for the server at `addr`.
    #[must_use]
    pub fn new(http: reqwest::Client, addr: &VaultAddr) -> Self {
        Self {
            http,
            login_url: addr.login_url(),
        }
    }

    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Log in with the given certificate role (empty when `None`).
    pub async fn login(&self, role: Option<&str>) -> LoginResult<LoginOutcome> {
        let request = LoginRequest::new(role);
        log::info!(
            "POST {} (role: {})",
            self.login_url,
            if request.name.is_empty() {
                "<any>"
            } else {
                &request.name
            }
        );

        let resp = self
            .http
            .post(&self.login_url)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        log::debug!("login response status: {status}");

        let body = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            return Err(LoginError::LoginRejected {
                status: status.to_string(),
                body: (!body.is_empty()).then_some(body),
            });
        }

        let (response, token) = LoginResponse::parse(&body)?;
        let outcome = LoginOutcome {
            status: status.to_string(),
            token,
            lease_duration: response.lease_duration(),
            renewable: response.renewable(),
            policies: response.policies(),
        };
        if let Some(lease) = outcome.lease_duration {
            log::info!("token lease duration: {lease}s");
        }
        if let Some(renewable) = outcome.renewable {
            log::info!("token renewable: {renewable}");
        }
        if !outcome.policies.is_empty() {
            log::info!("token policies: {}", outcome.policies.join(", "));
        }
        Ok(outcome)
    }
}
