//! Domain constants for PIV slots, the Vault login protocol and PKCS#1 encoding.
//! Keep this intentionally small; only broadly reused literals should live here.

// === PIV ===

/// PIV Authentication slot (9a)
pub const PIV_SLOT_AUTHENTICATION: u8 = 0x9a;

/// PIV Digital Signature slot (9c)
pub const PIV_SLOT_SIGNATURE: u8 = 0x9c;

/// PIV Key Management slot (9d)
pub const PIV_SLOT_KEY_MANAGEMENT: u8 = 0x9d;

/// PIV Card Authentication slot (9e)
pub const PIV_SLOT_CARD_AUTHENTICATION: u8 = 0x9e;

/// Factory default PIV PIN
pub const DEFAULT_PIN: &str = "123456";

/// Longest PIN the PIV card edge accepts
pub const PIV_PIN_MAX_LEN: usize = 8;

// === Vault ===

/// Certificate auth method login path, relative to the Vault address
pub const CERT_LOGIN_PATH: &str = "/v1/auth/cert/login";

/// Token helper file read by the Vault CLI, relative to the home directory
pub const TOKEN_FILE_NAME: &str = ".vault-token";

/// Environment variable holding the Vault address
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";

/// Environment variable holding the CA bundle path
pub const ENV_VAULT_CACERT: &str = "VAULT_CACERT";

/// Default network timeout for the login request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// User agent sent with the login request
pub const USER_AGENT: &str = concat!("vault-yubikey-login/", env!("CARGO_PKG_VERSION"));

// === PKCS#1 DigestInfo prefixes (RFC 8017, section 9.2, note 1) ===

/// DER `DigestInfo` header for SHA-256, followed by the 32 digest bytes
pub const DIGEST_INFO_SHA256: &[u8] = &[
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];

/// DER `DigestInfo` header for SHA-384, followed by the 48 digest bytes
pub const DIGEST_INFO_SHA384: &[u8] = &[
    0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02,
    0x05, 0x00, 0x04, 0x30,
];

/// DER `DigestInfo` header for SHA-512, followed by the 64 digest bytes
pub const DIGEST_INFO_SHA512: &[u8] = &[
    0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03,
    0x05, 0x00, 0x04, 0x40,
];

// === Public key algorithm OIDs ===

/// rsaEncryption (1.2.840.113549.1.1.1)
pub const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

/// id-ecPublicKey (1.2.840.10045.2.1)
pub const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

/// secp256r1 / prime256v1 (1.2.840.10045.3.1.7)
pub const OID_SECP256R1: &str = "1.2.840.10045.3.1.7";

/// secp384r1 (1.3.132.0.34)
pub const OID_SECP384R1: &str = "1.3.132.0.34";
