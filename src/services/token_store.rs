//! Client token persistence.
//!
//! Writes the token to the Vault CLI token helper file (`~/.vault-token`).
//! The file is replaced atomically and is readable by the owner only.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::constants;
use crate::domain::login::ClientToken;
use crate::infra::error::{LoginError, LoginResult};

/// Destination of the persisted client token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// `<home>/.vault-token`.
    ///
    /// # Errors
    ///
    /// [`LoginError::HomeDirUnavailable`] if there is no home directory.
    pub fn new() -> LoginResult<Self> {
        let home = dirs::home_dir().ok_or(LoginError::HomeDirUnavailable)?;
        Ok(Self::with_path(home.join(constants::TOKEN_FILE_NAME)))
    }

    /// Store at an explicit path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file content with exactly the token bytes.
    ///
    /// # Errors
    ///
    /// [`LoginError::WriteError`] if the file cannot be written.
    pub fn persist(&self, token: &ClientToken) -> LoginResult<PathBuf> {
        let write_error = |reason: String| LoginError::WriteError {
            path: self.path.clone(),
            reason,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".vault-token.")
            .tempfile_in(dir)
            .map_err(|e| write_error(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))
                .map_err(|e| write_error(e.to_string()))?;
        }

        tmp.write_all(token.expose().as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| write_error(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| write_error(e.error.to_string()))?;

        log::debug!("Token written to {}", self.path.display());
        Ok(self.path.clone())
    }
}
