//! In-memory PIV token backed by a software P-256 key.
//!
//! Stands in for a `YubiKey` in unit tests. Every interaction is appended to
//! a shared journal so tests can assert on ordering and release after the
//! token itself has been dropped.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, SanType,
};

use crate::adapters::backend::{BackendType, PivBackend, TokenProvider};
use crate::domain::constants::PIV_PIN_MAX_LEN;
use crate::domain::identity::KeyAlgorithm;
use crate::domain::types::{PivPin, PivSlot};
use crate::infra::error::{LoginError, LoginResult};

/// Observable token interactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    OpenAttempt(String),
    PinVerified,
    PinRejected,
    CertificateRead(PivSlot),
    Signed(PivSlot),
    Released,
}

pub type Journal = Arc<Mutex<Vec<TokenEvent>>>;

pub fn journal_events(journal: &Journal) -> Vec<TokenEvent> {
    journal.lock().unwrap().clone()
}

/// Software PIV token.
pub struct SoftToken {
    pin: String,
    retries: u8,
    slot: PivSlot,
    certificate: Option<Vec<u8>>,
    key: Option<SigningKey>,
    serial: u32,
    journal: Journal,
}

impl SoftToken {
    /// Token with `identity` in slot 9a, unlocked by `pin`.
    pub fn new(identity: &SoftIdentity, pin: &str) -> Self {
        Self {
            pin: pin.to_string(),
            retries: 3,
            slot: PivSlot::AUTHENTICATION,
            certificate: Some(identity.cert_der.clone()),
            key: Some(identity.signing_key()),
            serial: 12_345_678,
            journal: Journal::default(),
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn without_certificate(mut self) -> Self {
        self.certificate = None;
        self
    }

    pub fn without_key(mut self) -> Self {
        self.key = None;
        self
    }

    /// Replace the slot key so it no longer matches the certificate.
    pub fn with_key(mut self, other: &SoftIdentity) -> Self {
        self.key = Some(other.signing_key());
        self
    }

    pub fn with_certificate_bytes(mut self, der: Vec<u8>) -> Self {
        self.certificate = Some(der);
        self
    }

    fn record(&self, event: TokenEvent) {
        self.journal.lock().unwrap().push(event);
    }
}

impl PivBackend for SoftToken {
    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }

    fn verify_pin(&mut self, pin: &PivPin) -> LoginResult<()> {
        if pin.as_bytes().len() > PIV_PIN_MAX_LEN {
            self.record(TokenEvent::PinRejected);
            return Err(LoginError::AuthenticationFailed {
                retries_remaining: None,
            });
        }
        if self.retries == 0 {
            self.record(TokenEvent::PinRejected);
            return Err(LoginError::AuthenticationFailed {
                retries_remaining: Some(0),
            });
        }
        if pin.as_bytes() == self.pin.as_bytes() {
            self.retries = 3;
            self.record(TokenEvent::PinVerified);
            Ok(())
        } else {
            self.retries -= 1;
            self.record(TokenEvent::PinRejected);
            Err(LoginError::AuthenticationFailed {
                retries_remaining: Some(self.retries),
            })
        }
    }

    fn read_certificate(&mut self, slot: PivSlot) -> LoginResult<Option<Vec<u8>>> {
        self.record(TokenEvent::CertificateRead(slot));
        if slot != self.slot {
            return Ok(None);
        }
        Ok(self.certificate.clone())
    }

    fn sign_raw(
        &mut self,
        slot: PivSlot,
        algorithm: KeyAlgorithm,
        input: &[u8],
    ) -> LoginResult<Vec<u8>> {
        let key = match (&self.key, algorithm) {
            (Some(key), KeyAlgorithm::EccP256) if slot == self.slot => key,
            _ => {
                return Err(LoginError::KeyUnavailable {
                    slot,
                    reason: "no key in slot".to_string(),
                })
            }
        };
        let signature: Signature = key.sign_prehash(input).map_err(|e| {
            LoginError::TokenError(format!("software signing failed: {e}"))
        })?;
        self.record(TokenEvent::Signed(slot));
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn serial(&self) -> u32 {
        self.serial
    }
}

impl Drop for SoftToken {
    fn drop(&mut self) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(TokenEvent::Released);
        }
    }
}

/// Provider over a fixed list of readers; `None` entries fail to open.
pub struct SoftTokenProvider {
    readers: Vec<(String, Option<SoftToken>)>,
    journal: Journal,
}

impl SoftTokenProvider {
    pub fn empty() -> Self {
        Self {
            readers: Vec::new(),
            journal: Journal::default(),
        }
    }

    pub fn single(token: SoftToken) -> Self {
        Self::empty().with_reader("Yubico YubiKey OTP+FIDO+CCID 00", Some(token))
    }

    pub fn with_reader(mut self, name: &str, token: Option<SoftToken>) -> Self {
        let token = token.map(|t| t.with_journal(self.journal.clone()));
        self.readers.push((name.to_string(), token));
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl TokenProvider for SoftTokenProvider {
    fn list_readers(&mut self) -> LoginResult<Vec<String>> {
        Ok(self.readers.iter().map(|(name, _)| name.clone()).collect())
    }

    fn open(&mut self, name: &str) -> LoginResult<Box<dyn PivBackend>> {
        self.journal
            .lock()
            .unwrap()
            .push(TokenEvent::OpenAttempt(name.to_string()));
        let slot = self
            .readers
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, token)| token.take());
        match slot {
            Some(token) => Ok(Box::new(token)),
            None => Err(LoginError::TokenError(format!(
                "Failed to open reader '{name}': not a YubiKey"
            ))),
        }
    }
}

/// Client certificate and its PKCS#8 private key.
pub struct SoftIdentity {
    pub cert_der: Vec<u8>,
    pub key_pkcs8: Vec<u8>,
}

impl SoftIdentity {
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_pkcs8_der(&self.key_pkcs8).unwrap()
    }

    /// Self-signed P-256 identity.
    pub fn self_signed(common_name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let params = client_params(common_name);
        let cert = params.self_signed(&key).unwrap();
        Self {
            cert_der: cert.der().to_vec(),
            key_pkcs8: key.serialize_der(),
        }
    }
}

fn client_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    params
}

/// Private CA with a `localhost`/`127.0.0.1` server certificate and a client identity.
pub struct TestPki {
    pub ca_der: Vec<u8>,
    pub ca_pem: String,
    pub server_cert_der: Vec<u8>,
    pub server_cert_pem: String,
    pub server_key_pkcs8: Vec<u8>,
    pub server_key_pem: String,
    pub client: SoftIdentity,
}

impl TestPki {
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "vault test ca");
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let server_key = KeyPair::generate().unwrap();
        let mut server_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        server_params
            .distinguished_name
            .push(DnType::CommonName, "localhost");
        server_params.subject_alt_names = vec![
            SanType::DnsName("localhost".try_into().unwrap()),
            SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        ];
        server_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let server_cert = server_params
            .signed_by(&server_key, &ca_cert, &ca_key)
            .unwrap();

        let client_key = KeyPair::generate().unwrap();
        let client_cert = client_params("vault operator")
            .signed_by(&client_key, &ca_cert, &ca_key)
            .unwrap();

        Self {
            ca_der: ca_cert.der().to_vec(),
            ca_pem: ca_cert.pem(),
            server_cert_der: server_cert.der().to_vec(),
            server_cert_pem: server_cert.pem(),
            server_key_pkcs8: server_key.serialize_der(),
            server_key_pem: server_key.serialize_pem(),
            client: SoftIdentity {
                cert_der: client_cert.der().to_vec(),
                key_pkcs8: client_key.serialize_der(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::IdentityCertificate;

    #[test]
    fn wrong_pin_counts_down_then_blocks() {
        let identity = SoftIdentity::self_signed("operator");
        let mut token = SoftToken::new(&identity, "654321");
        let wrong = PivPin::new("000000").unwrap();

        for expected in [2u8, 1, 0] {
            match token.verify_pin(&wrong) {
                Err(LoginError::AuthenticationFailed { retries_remaining }) => {
                    assert_eq!(retries_remaining, Some(expected));
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert!(token
            .verify_pin(&PivPin::new("654321").unwrap())
            .is_err());
    }

    #[test]
    fn certificate_round_trips_through_identity_parser() {
        let pki = TestPki::generate();
        let mut token = SoftToken::new(&pki.client, "123456");
        let der = token
            .read_certificate(PivSlot::AUTHENTICATION)
            .unwrap()
            .unwrap();
        let identity = IdentityCertificate::from_der(&der).unwrap();
        assert_eq!(identity.key_algorithm(), KeyAlgorithm::EccP256);
        assert!(identity.issuer().contains("vault test ca"));
    }

    #[test]
    fn release_is_journaled() {
        let identity = SoftIdentity::self_signed("operator");
        let mut provider = SoftTokenProvider::single(SoftToken::new(&identity, "123456"));
        let journal = provider.journal();
        let name = provider.list_readers().unwrap().remove(0);
        let backend = provider.open(&name).unwrap();
        drop(backend);
        assert_eq!(
            journal_events(&journal),
            vec![TokenEvent::OpenAttempt(name), TokenEvent::Released]
        );
    }
}
