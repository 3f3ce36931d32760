//! Mutual TLS client assembly.
//!
//! Provides client-side TLS configuration using rustls 0.23 with the `ring`
//! provider. The client certificate comes from the token and the matching
//! private key stays there: rustls reaches it through [`TokenSigningKey`].
//!
//! Trust anchors are either a PEM bundle (sole root set) or the platform
//! trust store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::ResolvesClientCert;
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, RootCertStore, SignatureScheme};

use crate::domain::constants;
use crate::domain::identity::IdentityCertificate;
use crate::infra::error::{LoginError, LoginResult};
use crate::services::unlock::TokenSigningKey;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TrustSource {
    File(PathBuf),
    Inline(String),
    Platform,
}

/// Root certificates used to authenticate the Vault server.
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    roots: RootCertStore,
    source: TrustSource,
}

impl TrustAnchors {
    /// Load a PEM bundle from `path`; its certificates are the only roots.
    ///
    /// # Errors
    ///
    /// [`LoginError::TrustAnchorReadError`] if the file cannot be read and
    /// [`LoginError::TrustAnchorParseError`] if it holds no usable certificate.
    pub fn from_pem_file(path: &Path) -> LoginResult<Self> {
        let pem = std::fs::read(path).map_err(|e| LoginError::TrustAnchorReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let roots = parse_pem_roots(&pem, &path.display().to_string())?;
        log::info!(
            "Loaded {} CA certificate(s) from {}",
            roots.len(),
            path.display()
        );
        Ok(Self {
            roots,
            source: TrustSource::File(path.to_path_buf()),
        })
    }

    /// Parse PEM certificates held in memory.
    ///
    /// # Errors
    ///
    /// [`LoginError::TrustAnchorParseError`] if `pem` holds no usable certificate.
    pub fn from_pem(pem: &[u8], source_name: &str) -> LoginResult<Self> {
        Ok(Self {
            roots: parse_pem_roots(pem, source_name)?,
            source: TrustSource::Inline(source_name.to_string()),
        })
    }

    /// The operating system trust store.
    ///
    /// An empty store is not an error here; the server certificate then
    /// fails verification during the handshake.
    #[must_use]
    pub fn platform() -> Self {
        let result = rustls_native_certs::load_native_certs();
        for error in &result.errors {
            log::debug!("Platform trust store: {error}");
        }
        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(result.certs);
        log::debug!("Platform trust store: {added} root(s) loaded, {ignored} ignored");
        if added == 0 {
            log::warn!("Platform trust store has no usable root certificates; set VAULT_CACERT");
        }
        Self {
            roots,
            source: TrustSource::Platform,
        }
    }

    /// Load from `path` when given, otherwise from the platform store.
    ///
    /// # Errors
    ///
    /// Only a configured `path` can fail; see [`Self::from_pem_file`].
    pub fn load(path: Option<&Path>) -> LoginResult<Self> {
        match path {
            Some(path) => Self::from_pem_file(path),
            None => Ok(Self::platform()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Where the roots came from, for diagnostics.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.source {
            TrustSource::File(path) => path.display().to_string(),
            TrustSource::Inline(name) => name.clone(),
            TrustSource::Platform => "platform trust store".to_string(),
        }
    }
}

fn parse_pem_roots(pem: &[u8], source_name: &str) -> LoginResult<RootCertStore> {
    let parse_error = |reason: String| LoginError::TrustAnchorParseError {
        source_name: source_name.to_string(),
        reason,
    };

    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(|e| parse_error(e.to_string()))?;
    if certs.is_empty() {
        return Err(parse_error("no PEM certificates found".to_string()));
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        log::warn!("Ignored {ignored} unparsable certificate(s) in {source_name}");
    }
    if added == 0 {
        return Err(parse_error("no valid X.509 certificates".to_string()));
    }
    Ok(roots)
}

/// Presents the token certificate whenever the server asks for one.
#[derive(Debug)]
pub struct TokenCertResolver {
    certified_key: Arc<CertifiedKey>,
}

impl TokenCertResolver {
    #[must_use]
    pub fn new(identity: &IdentityCertificate, key: TokenSigningKey) -> Self {
        let chain = vec![CertificateDer::from(identity.der().to_vec())];
        Self {
            certified_key: Arc::new(CertifiedKey::new(chain, Arc::new(key))),
        }
    }
}

impl ResolvesClientCert for TokenCertResolver {
    fn resolve(
        &self,
        root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        log::debug!(
            "Server requested a client certificate ({} CA hint(s), schemes {sigschemes:?})",
            root_hint_subjects.len()
        );
        Some(Arc::clone(&self.certified_key))
    }

    fn has_certs(&self) -> bool {
        true
    }
}

/// rustls client configuration presenting the token identity.
///
/// # Errors
///
/// Returns [`LoginError::TlsError`] if rustls rejects the configuration.
pub fn build_tls_config(
    identity: &IdentityCertificate,
    key: TokenSigningKey,
    anchors: &TrustAnchors,
) -> LoginResult<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(anchors.roots.clone())
        .with_client_cert_resolver(Arc::new(TokenCertResolver::new(identity, key)));
    Ok(config)
}

/// HTTP client performing mutual TLS with the token identity.
///
/// No idle connections are kept, so nothing outlives the login.
///
/// # Errors
///
/// Returns error if the TLS configuration or the HTTP client cannot be built.
pub fn build_client(
    identity: &IdentityCertificate,
    key: TokenSigningKey,
    anchors: &TrustAnchors,
    timeout: Duration,
) -> LoginResult<reqwest::Client> {
    let tls = build_tls_config(identity, key, anchors)?;
    log::debug!(
        "Building HTTP client (trust: {}, timeout: {}s)",
        anchors.description(),
        timeout.as_secs()
    );
    let client = reqwest::Client::builder()
        .use_preconfigured_tls(tls)
        .timeout(timeout)
        .pool_max_idle_per_host(0)
        .user_agent(constants::USER_AGENT)
        .build()?;
    Ok(client)
}
