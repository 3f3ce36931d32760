//! Test environment helpers.
//!
//! Hardware tests read `YUBICO_PIN`, `VAULT_ADDR` and `VAULT_CACERT`. When the
//! tests run from an IDE these may only exist in a repository-root `.env`
//! file, so that file is merged into the process environment.
//!
//! Values already present in the process environment are **not** overwritten.

use std::env;
use std::fs;
use std::path::Path;

/// Load `KEY=VALUE` lines from `<repo>/.env` if the file exists.
///
/// Blank lines and `#` comments are skipped; surrounding quotes are removed.
pub fn load_dotenv_if_present() {
    let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        env::set_var(key, value);
    }
}

/// The PIN for hardware tests, defaulting to the factory PIN.
pub fn yubico_pin() -> String {
    load_dotenv_if_present();
    env::var("YUBICO_PIN").unwrap_or_else(|_| "123456".to_string())
}
