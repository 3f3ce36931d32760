//! Vault YubiKey login CLI
//!
//! Authenticates to Vault with the certificate in a YubiKey PIV slot and
//! stores the resulting client token for the Vault CLI.

use clap::{ArgAction, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use vault_yubikey_login::{
    infra::config::process_env,
    services::TerminalPinSource,
    CertLoginPipeline, ConfigManager, LoginConfiguration, LoginError, LoginResult,
    LoginSettings, PivSlot, SettingsOverrides,
};

#[derive(Parser)]
#[command(name = "vault-yubikey-login")]
#[command(about = "Log in to Vault with a YubiKey PIV certificate over mutual TLS")]
#[command(long_about = "
Vault YubiKey Login - certificate authentication with a hardware token

EXAMPLES:
    # Log in with the certificate in slot 9a, letting Vault pick the role
    vault-yubikey-login cert

    # Log in to a specific certificate role
    vault-yubikey-login cert web-admins

    # Use a private CA and another slot
    vault-yubikey-login cert --ca-cert /etc/vault/ca.pem --slot 9c

    # Write a default configuration file
    vault-yubikey-login config init

SLOT REFERENCE:
    9a = Authentication (default)
    9c = Digital Signature
    9d = Key Management
    9e = Card Authentication

ENVIRONMENT VARIABLES:
    VAULT_ADDR      Vault server address (required unless configured)
    VAULT_CACERT    CA bundle used to verify the Vault server
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with the certificate stored on the YubiKey
    Cert {
        /// Certificate role to log in to (Vault picks one when omitted)
        #[arg(value_name = "ROLE")]
        role: Option<String>,

        /// PIV slot holding the certificate and key
        #[arg(short, long, value_name = "SLOT_ID")]
        slot: Option<String>,

        /// Vault server address (overrides VAULT_ADDR)
        #[arg(long, value_name = "URL")]
        vault_addr: Option<String>,

        /// CA bundle for the Vault server (overrides VAULT_CACERT)
        #[arg(long, value_name = "FILE")]
        ca_cert: Option<PathBuf>,

        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Write the token here instead of ~/.vault-token
        #[arg(long, value_name = "FILE")]
        token_path: Option<PathBuf>,

        /// Skip the check that the slot key matches the certificate
        #[arg(long)]
        skip_key_check: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

/// Parameters for the cert command
struct CertCommandArgs {
    role: Option<String>,
    slot: Option<String>,
    vault_addr: Option<String>,
    ca_cert: Option<PathBuf>,
    timeout: Option<u64>,
    token_path: Option<PathBuf>,
    skip_key_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the result lines, so stay quiet unless asked
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };

    match cli.command {
        Commands::Cert {
            role,
            slot,
            vault_addr,
            ca_cert,
            timeout,
            token_path,
            skip_key_check,
        } => {
            let args = CertCommandArgs {
                role,
                slot,
                vault_addr,
                ca_cert,
                timeout,
                token_path,
                skip_key_check,
            };
            handle_cert_command(args, &manager, cli.config.is_some())
                .await
                .map_err(with_category)?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(config_cmd, &manager, cli.config.is_some())?;
        }
    }

    Ok(())
}

/// Prefix the diagnostic with the error category; code and help are kept.
fn with_category(error: LoginError) -> miette::Report {
    let category = error.category();
    miette::Report::new(error).wrap_err(category.to_string())
}

/// An explicitly named file must exist; the default one is optional.
fn load_config(manager: &ConfigManager, explicit: bool) -> LoginResult<LoginConfiguration> {
    if explicit {
        manager.load()
    } else {
        manager.load_or_default()
    }
}

async fn handle_cert_command(
    args: CertCommandArgs,
    manager: &ConfigManager,
    explicit_config: bool,
) -> LoginResult<()> {
    let config = load_config(manager, explicit_config)?;
    let overrides = SettingsOverrides {
        vault_addr: args.vault_addr,
        ca_cert: args.ca_cert,
        slot: args.slot.as_deref().map(str::parse::<PivSlot>).transpose()?,
        timeout_seconds: args.timeout,
        token_path: args.token_path,
        skip_key_check: args.skip_key_check,
    };
    let settings = LoginSettings::resolve(&config, &overrides, process_env)?;
    log::info!("Vault address: {}", settings.vault_addr);

    let mut provider = token_provider()?;
    let mut pin_source = TerminalPinSource;
    let mut pipeline = CertLoginPipeline::new(settings, &mut provider, &mut pin_source);
    let report = pipeline.run(args.role.as_deref()).await?;

    log::info!(
        "Logged in as '{}' with YubiKey {} (serial {})",
        report.subject,
        report.reader,
        report.serial
    );
    println!("Response Status: {}", report.status);
    println!("Token saved to {}", report.token_path.display());
    Ok(())
}

#[cfg(feature = "pcsc-backend")]
fn token_provider() -> LoginResult<vault_yubikey_login::PcscTokenProvider> {
    Ok(vault_yubikey_login::PcscTokenProvider::new())
}

#[cfg(not(feature = "pcsc-backend"))]
fn token_provider() -> LoginResult<NoBackend> {
    log::warn!("Built without the 'pcsc-backend' feature; no YubiKey can be found");
    Ok(NoBackend)
}

/// Provider that never sees a reader.
#[cfg(not(feature = "pcsc-backend"))]
struct NoBackend;

#[cfg(not(feature = "pcsc-backend"))]
impl vault_yubikey_login::TokenProvider for NoBackend {
    fn list_readers(&mut self) -> LoginResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn open(
        &mut self,
        _name: &str,
    ) -> LoginResult<Box<dyn vault_yubikey_login::PivBackend>> {
        Err(LoginError::NoTokenDetected)
    }
}

fn handle_config_command(
    command: ConfigCommands,
    manager: &ConfigManager,
    explicit: bool,
) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(manager, explicit).map_err(with_category)?;
            let path = manager.config_path();
            if path.exists() {
                println!("# {}", path.display());
            } else {
                println!("# {} (not found, showing defaults)", path.display());
            }
            print!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
            for name in ["VAULT_ADDR", "VAULT_CACERT"] {
                if let Some(value) = process_env(name) {
                    println!("# {name}={value} (environment, takes precedence)");
                }
            }
        }
        ConfigCommands::Init { force } => {
            manager.init(force).map_err(with_category)?;
            println!("Configuration written to {}", manager.config_path().display());
        }
        ConfigCommands::Path => {
            println!("{}", manager.config_path().display());
        }
    }
    Ok(())
}
