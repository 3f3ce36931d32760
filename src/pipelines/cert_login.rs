//! `CertLoginPipeline` runs the certificate login end to end.
//!
//! Token session, PIN, identity, unlock, mutual TLS client, login exchange
//! and token persistence run strictly in that order. The first failure
//! aborts the run and the token is released on every path.

use std::fmt;
use std::path::PathBuf;

use crate::adapters::backend::TokenProvider;
use crate::adapters::vault_http_client::VaultLoginClient;
use crate::infra::config::LoginSettings;
use crate::infra::error::LoginResult;
use crate::services::{
    build_client, prompt_pin, read_identity, unlock, PinSource, TokenSession, TokenStore,
    TrustAnchors,
};

/// Progress through the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoginStage {
    Start,
    TokenOpened,
    PinAcquired,
    IdentityExtracted,
    CapabilityUnlocked,
    ClientBuilt,
    LoginSucceeded,
    TokenPersisted,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStage::Start => "start",
            LoginStage::TokenOpened => "token opened",
            LoginStage::PinAcquired => "PIN acquired",
            LoginStage::IdentityExtracted => "identity extracted",
            LoginStage::CapabilityUnlocked => "signing capability unlocked",
            LoginStage::ClientBuilt => "TLS client built",
            LoginStage::LoginSucceeded => "login succeeded",
            LoginStage::TokenPersisted => "token persisted",
        };
        f.write_str(name)
    }
}

/// Summary of a successful login.
#[derive(Debug, Clone)]
pub struct CertLoginReport {
    /// HTTP status line of the login response.
    pub status: String,
    pub token_path: PathBuf,
    pub used_default_pin: bool,
    pub reader: String,
    pub serial: u32,
    pub subject: String,
    pub lease_duration: Option<u64>,
    pub policies: Vec<String>,
}

pub struct CertLoginPipeline<'a> {
    settings: LoginSettings,
    provider: &'a mut dyn TokenProvider,
    pin_source: &'a mut dyn PinSource,
    stage: LoginStage,
}

impl<'a> CertLoginPipeline<'a> {
    pub fn new(
        settings: LoginSettings,
        provider: &'a mut dyn TokenProvider,
        pin_source: &'a mut dyn PinSource,
    ) -> Self {
        Self {
            settings,
            provider,
            pin_source,
            stage: LoginStage::Start,
        }
    }

    /// Last stage reached by [`Self::run`].
    #[must_use]
    pub fn stage(&self) -> LoginStage {
        self.stage
    }

    #[must_use]
    pub fn settings(&self) -> &LoginSettings {
        &self.settings
    }

    /// Authenticate with the slot certificate, optionally naming a role.
    pub async fn run(&mut self, role: Option<&str>) -> LoginResult<CertLoginReport> {
        self.advance(LoginStage::Start);
        let store = match &self.settings.token_path {
            Some(path) => TokenStore::with_path(path),
            None => TokenStore::new()?,
        };
        // A configured CA bundle must be usable before the token is touched
        let file_anchors = self
            .settings
            .ca_cert
            .as_deref()
            .map(TrustAnchors::from_pem_file)
            .transpose()?;

        let session = TokenSession::open(&mut *self.provider)?;
        self.advance(LoginStage::TokenOpened);

        let acquisition = prompt_pin(&mut *self.pin_source)?;
        self.advance(LoginStage::PinAcquired);

        let slot = self.settings.slot;
        let identity = read_identity(&session, slot)?;
        self.advance(LoginStage::IdentityExtracted);

        let key = unlock(
            &session,
            &identity,
            slot,
            &acquisition.pin,
            self.settings.verify_key_binding,
        )?;
        let used_default_pin = acquisition.used_default;
        drop(acquisition);
        self.advance(LoginStage::CapabilityUnlocked);

        let anchors = file_anchors.unwrap_or_else(TrustAnchors::platform);
        let client = build_client(&identity, key, &anchors, self.settings.timeout)?;
        self.advance(LoginStage::ClientBuilt);

        let outcome = VaultLoginClient::new(client, &self.settings.vault_addr)
            .login(role)
            .await?;
        self.advance(LoginStage::LoginSucceeded);

        let reader = session.reader().to_string();
        let serial = session.serial();
        session.close();

        let token_path = store.persist(&outcome.token)?;
        self.advance(LoginStage::TokenPersisted);

        Ok(CertLoginReport {
            status: outcome.status,
            token_path,
            used_default_pin,
            reader,
            serial,
            subject: identity.subject(),
            lease_duration: outcome.lease_duration,
            policies: outcome.policies,
        })
    }

    fn advance(&mut self, stage: LoginStage) {
        log::debug!("login stage: {stage}");
        self.stage = stage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::soft_token::{
        journal_events, Journal, SoftIdentity, SoftToken, SoftTokenProvider, TestPki, TokenEvent,
    };
    use crate::domain::types::VaultAddr;
    use crate::infra::error::LoginError;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use warp::Filter;
    use zeroize::Zeroizing;

    struct FixedPin(&'static str);

    impl PinSource for FixedPin {
        fn read_secret(&mut self, _prompt: &str) -> LoginResult<Zeroizing<String>> {
            Ok(Zeroizing::new(self.0.to_string()))
        }
        fn notify(&mut self, _message: &str) {}
    }

    type Bodies = Arc<Mutex<Vec<serde_json::Value>>>;

    /// Vault stand-in requiring a client certificate from the test CA.
    fn spawn_vault(
        pki: &TestPki,
        status: u16,
        reply: serde_json::Value,
    ) -> (SocketAddr, Bodies, Arc<AtomicUsize>) {
        let bodies = Bodies::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let (seen, counter) = (bodies.clone(), hits.clone());
        let route = warp::post()
            .and(warp::path!("v1" / "auth" / "cert" / "login"))
            .and(warp::body::json())
            .map(move |body: serde_json::Value| {
                counter.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(body);
                warp::reply::with_status(
                    warp::reply::json(&reply),
                    warp::http::StatusCode::from_u16(status).unwrap(),
                )
            });
        let (addr, server) = warp::serve(route)
            .tls()
            .cert(pki.server_cert_pem.as_bytes())
            .key(pki.server_key_pem.as_bytes())
            .client_auth_required(pki.ca_pem.as_bytes())
            .bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (addr, bodies, hits)
    }

    fn settings_for(addr: SocketAddr, dir: &Path, pki: &TestPki) -> LoginSettings {
        let ca_path = dir.join("ca.pem");
        std::fs::write(&ca_path, &pki.ca_pem).unwrap();
        let mut settings =
            LoginSettings::new(VaultAddr::new(format!("https://127.0.0.1:{}", addr.port())).unwrap());
        settings.ca_cert = Some(ca_path);
        settings.token_path = Some(dir.join(".vault-token"));
        settings
    }

    fn released(journal: &Journal) -> bool {
        journal_events(journal).last() == Some(&TokenEvent::Released)
    }

    #[tokio::test]
    async fn logs_in_and_persists_token() {
        let pki = TestPki::generate();
        let (addr, bodies, _) = spawn_vault(
            &pki,
            200,
            serde_json::json!({"auth": {"client_token": "abc123", "lease_duration": 2764800, "policies": ["default"]}}),
        );
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(addr, dir.path(), &pki);

        let mut provider = SoftTokenProvider::single(SoftToken::new(&pki.client, "123456"));
        let journal = provider.journal();
        let mut pin = FixedPin("");
        let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin);

        let report = pipeline.run(Some("dev")).await.unwrap();
        assert_eq!(pipeline.stage(), LoginStage::TokenPersisted);
        assert_eq!(report.status, "200 OK");
        assert!(report.used_default_pin);
        assert_eq!(report.lease_duration, Some(2_764_800));
        assert_eq!(report.policies, vec!["default"]);
        assert_eq!(report.token_path, dir.path().join(".vault-token"));
        assert_eq!(std::fs::read(&report.token_path).unwrap(), b"abc123");
        assert_eq!(
            *bodies.lock().unwrap(),
            vec![serde_json::json!({"name": "dev"})]
        );
        assert!(released(&journal));
    }

    #[tokio::test]
    async fn no_token_fails_before_network() {
        let pki = TestPki::generate();
        let (addr, _, hits) = spawn_vault(&pki, 200, serde_json::json!({}));
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(addr, dir.path(), &pki);

        let mut provider = SoftTokenProvider::empty();
        let mut pin = FixedPin("");
        let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin);

        assert!(matches!(
            pipeline.run(None).await,
            Err(LoginError::NoTokenDetected)
        ));
        assert_eq!(pipeline.stage(), LoginStage::Start);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join(".vault-token").exists());
    }

    #[tokio::test]
    async fn no_token_without_ca_bundle() {
        let pki = TestPki::generate();
        let (addr, _, hits) = spawn_vault(&pki, 200, serde_json::json!({}));
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_for(addr, dir.path(), &pki);
        settings.ca_cert = None;

        let mut provider = SoftTokenProvider::empty();
        let mut pin = FixedPin("");
        let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin);

        assert!(matches!(
            pipeline.run(None).await,
            Err(LoginError::NoTokenDetected)
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_login_writes_nothing() {
        let pki = TestPki::generate();
        let (addr, _, hits) = spawn_vault(
            &pki,
            400,
            serde_json::json!({"errors": ["invalid certificate or no client certificate supplied"]}),
        );
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(addr, dir.path(), &pki);

        let mut provider = SoftTokenProvider::single(SoftToken::new(&pki.client, "123456"));
        let journal = provider.journal();
        let mut pin = FixedPin("123456");
        let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin);

        match pipeline.run(Some("dev")).await {
            Err(LoginError::LoginRejected { status, body }) => {
                assert_eq!(status, "400 Bad Request");
                assert!(body.unwrap().contains("invalid certificate"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(pipeline.stage(), LoginStage::ClientBuilt);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join(".vault-token").exists());
        assert!(released(&journal));
    }

    #[tokio::test]
    async fn missing_client_token_writes_nothing() {
        let pki = TestPki::generate();
        let (addr, _, _) = spawn_vault(&pki, 200, serde_json::json!({"auth": {"policies": []}}));
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(addr, dir.path(), &pki);

        let mut provider = SoftTokenProvider::single(SoftToken::new(&pki.client, "123456"));
        let mut pin = FixedPin("");
        let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin);

        assert!(matches!(
            pipeline.run(None).await,
            Err(LoginError::TokenExtractionError(_))
        ));
        assert!(!dir.path().join(".vault-token").exists());
    }

    #[tokio::test]
    async fn wrong_pin_stops_before_network() {
        let pki = TestPki::generate();
        let (addr, _, hits) = spawn_vault(&pki, 200, serde_json::json!({}));
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(addr, dir.path(), &pki);

        let mut provider = SoftTokenProvider::single(SoftToken::new(&pki.client, "654321"));
        let journal = provider.journal();
        let mut pin = FixedPin("");
        let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin);

        match pipeline.run(None).await {
            Err(LoginError::AuthenticationFailed { retries_remaining }) => {
                assert_eq!(retries_remaining, Some(2));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(pipeline.stage(), LoginStage::IdentityExtracted);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(released(&journal));
    }

    #[tokio::test]
    async fn invalid_trust_anchor_fails_before_token_and_network() {
        let pki = TestPki::generate();
        let (addr, _, hits) = spawn_vault(&pki, 200, serde_json::json!({}));
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_for(addr, dir.path(), &pki);
        let bad_ca = dir.path().join("empty.pem");
        std::fs::write(&bad_ca, "").unwrap();
        settings.ca_cert = Some(bad_ca);

        let identity = SoftIdentity::self_signed("operator");
        let mut provider = SoftTokenProvider::single(SoftToken::new(&identity, "123456"));
        let journal = provider.journal();
        let mut pin = FixedPin("");
        let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin);

        assert!(matches!(
            pipeline.run(None).await,
            Err(LoginError::TrustAnchorParseError { .. })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!journal_events(&journal)
            .iter()
            .any(|e| matches!(e, TokenEvent::OpenAttempt(_))));
    }
}
