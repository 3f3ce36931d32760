//! Configuration management infrastructure.
//!
//! This module provides optional configuration file support and resolves the
//! effective login settings from command line, environment and file.
//! Precedence: command line > environment > config file > defaults.

use crate::domain::constants;
use crate::domain::types::{PivSlot, VaultAddr};
use crate::infra::error::{LoginError, LoginResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginConfiguration {
    /// Vault server address, used when `VAULT_ADDR` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_addr: Option<String>,

    /// CA bundle for the Vault server, used when `VAULT_CACERT` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// PIV slot holding the client certificate and key
    pub piv_slot: u8,

    /// Network timeout for the login request
    pub request_timeout_seconds: u64,

    /// Prove that the slot key matches the certificate before connecting
    pub verify_key_binding: bool,

    /// Where to write the client token instead of `~/.vault-token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,
}

impl Default for LoginConfiguration {
    fn default() -> Self {
        Self {
            vault_addr: None,
            ca_cert: None,
            piv_slot: constants::PIV_SLOT_AUTHENTICATION,
            request_timeout_seconds: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            verify_key_binding: true,
            token_path: None,
        }
    }
}

impl LoginConfiguration {
    /// Validate configuration values
    pub fn validate(&self) -> LoginResult<()> {
        PivSlot::new(self.piv_slot)?;

        if self.request_timeout_seconds == 0 {
            return Err(LoginError::ConfigurationError(
                "request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(addr) = non_empty(self.vault_addr.as_deref()) {
            VaultAddr::new(addr)?;
        }

        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("vault-yubikey-login").join("config.toml")
        } else {
            // Fallback to current directory
            PathBuf::from("vault-yubikey-login.toml")
        }
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file, or defaults when there is no file
    pub fn load_or_default(&self) -> LoginResult<LoginConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration file at {}, using defaults",
                self.config_path.display()
            );
            Ok(LoginConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> LoginResult<LoginConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            LoginError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: LoginConfiguration = toml::from_str(&content).map_err(|e| {
            LoginError::ConfigurationError(format!(
                "Failed to parse config file {}: {e}",
                self.config_path.display()
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &LoginConfiguration) -> LoginResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoginError::ConfigurationError(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            LoginError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            LoginError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Write a default configuration file.
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub fn init(&self, force: bool) -> LoginResult<LoginConfiguration> {
        if self.config_path.exists() && !force {
            return Err(LoginError::ConfigurationError(format!(
                "Configuration file {} already exists (use --force to overwrite)",
                self.config_path.display()
            )));
        }
        let config = LoginConfiguration::default();
        self.save(&config)?;
        Ok(config)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Values given on the command line; `None` defers to lower layers.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub vault_addr: Option<String>,
    pub ca_cert: Option<PathBuf>,
    pub slot: Option<PivSlot>,
    pub timeout_seconds: Option<u64>,
    pub token_path: Option<PathBuf>,
    pub skip_key_check: bool,
}

/// Effective settings for one login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSettings {
    pub vault_addr: VaultAddr,
    pub ca_cert: Option<PathBuf>,
    pub slot: PivSlot,
    pub timeout: Duration,
    pub verify_key_binding: bool,
    pub token_path: Option<PathBuf>,
}

impl LoginSettings {
    /// Settings for `vault_addr` with every other value at its default.
    #[must_use]
    pub fn new(vault_addr: VaultAddr) -> Self {
        Self {
            vault_addr,
            ca_cert: None,
            slot: PivSlot::default(),
            timeout: Duration::from_secs(constants::DEFAULT_REQUEST_TIMEOUT_SECS),
            verify_key_binding: true,
            token_path: None,
        }
    }

    /// Merge command line, environment (through `env`) and file values.
    ///
    /// # Errors
    ///
    /// [`LoginError::MissingEndpoint`] if no layer provides a Vault address,
    /// [`LoginError::ConfigurationError`] for a zero timeout.
    pub fn resolve(
        config: &LoginConfiguration,
        overrides: &SettingsOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> LoginResult<Self> {
        let env_addr = env(constants::ENV_VAULT_ADDR);
        let addr = overrides
            .vault_addr
            .as_deref()
            .or_else(|| non_empty(env_addr.as_deref()))
            .or_else(|| non_empty(config.vault_addr.as_deref()))
            .ok_or(LoginError::MissingEndpoint)?;
        let vault_addr = VaultAddr::new(addr)?;

        let ca_cert = overrides
            .ca_cert
            .clone()
            .or_else(|| {
                non_empty(env(constants::ENV_VAULT_CACERT).as_deref()).map(PathBuf::from)
            })
            .or_else(|| config.ca_cert.clone());

        let slot = match overrides.slot {
            Some(slot) => slot,
            None => PivSlot::new(config.piv_slot)?,
        };

        let timeout_seconds = overrides
            .timeout_seconds
            .unwrap_or(config.request_timeout_seconds);
        if timeout_seconds == 0 {
            return Err(LoginError::ConfigurationError(
                "timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            vault_addr,
            ca_cert,
            slot,
            timeout: Duration::from_secs(timeout_seconds),
            verify_key_binding: config.verify_key_binding && !overrides.skip_key_check,
            token_path: overrides
                .token_path
                .clone()
                .or_else(|| config.token_path.clone()),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Process environment lookup for [`LoginSettings::resolve`].
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
