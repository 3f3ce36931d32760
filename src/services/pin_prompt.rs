//! PIN acquisition.
//!
//! Reads the PIV PIN without echo. An empty answer selects the manufacturer
//! default PIN.

use std::io::Write;

use zeroize::Zeroizing;

use crate::domain::types::PivPin;
use crate::infra::error::{LoginError, LoginResult};

/// Prompt shown before reading the PIN.
pub const PIN_PROMPT: &str = "Enter PIN (Press Enter to use the default PIN): ";

/// Notice shown when the default PIN is selected.
pub const DEFAULT_PIN_NOTICE: &str = "No PIN provided, using default PIN";

/// Where the PIN comes from.
pub trait PinSource {
    /// Show `prompt` and read one line without echo.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::InputError`] when nothing can be read.
    fn read_secret(&mut self, prompt: &str) -> LoginResult<Zeroizing<String>>;

    /// Show an informational message to the operator.
    fn notify(&mut self, message: &str);
}

/// Reads from the controlling terminal via `rpassword`; messages go to stderr.
#[derive(Debug, Default)]
pub struct TerminalPinSource;

impl PinSource for TerminalPinSource {
    fn read_secret(&mut self, prompt: &str) -> LoginResult<Zeroizing<String>> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{prompt}")
            .and_then(|()| stderr.flush())
            .map_err(|e| LoginError::InputError(e.to_string()))?;
        rpassword::read_password()
            .map(Zeroizing::new)
            .map_err(|e| LoginError::InputError(e.to_string()))
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// PIN chosen for unlock.
#[derive(Debug)]
pub struct PinAcquisition {
    pub pin: PivPin,
    pub used_default: bool,
}

/// Ask `source` for the PIN, falling back to the default on empty input.
///
/// # Errors
///
/// Returns [`LoginError::InputError`] if the terminal cannot be read.
pub fn prompt_pin(source: &mut dyn PinSource) -> LoginResult<PinAcquisition> {
    let raw = source.read_secret(PIN_PROMPT)?;
    let entered = raw.trim_end_matches(['\r', '\n']);

    if entered.is_empty() {
        source.notify(DEFAULT_PIN_NOTICE);
        log::debug!("Using default PIN");
        return Ok(PinAcquisition {
            pin: PivPin::default_pin(),
            used_default: true,
        });
    }

    Ok(PinAcquisition {
        pin: PivPin::new(entered)?,
        used_default: false,
    })
}
