//! Token session service.
//!
//! Opens the first usable PIV token from a [`TokenProvider`] and owns it
//! until the session is closed or dropped. Signing handles given to the TLS
//! layer share the backend but become inert once the session is released.

use std::sync::{Arc, Mutex};

use crate::adapters::backend::{BackendType, PivBackend, TokenProvider};
use crate::infra::error::{LoginError, LoginResult};

type SharedBackend = Arc<Mutex<Option<Box<dyn PivBackend>>>>;

/// Exclusive ownership of one opened token.
pub struct TokenSession {
    backend: SharedBackend,
    reader: String,
    serial: u32,
    backend_type: BackendType,
}

impl TokenSession {
    /// Open the first candidate reported by `provider` that opens.
    ///
    /// # Errors
    ///
    /// [`LoginError::NoTokenDetected`] when there are no candidates and
    /// [`LoginError::NoTokenOpened`] when every candidate failed.
    pub fn open(provider: &mut dyn TokenProvider) -> LoginResult<Self> {
        let readers = provider.list_readers()?;
        if readers.is_empty() {
            return Err(LoginError::NoTokenDetected);
        }
        log::debug!("Found {} smart card reader(s)", readers.len());

        let mut last_error = None;
        for name in &readers {
            match provider.open(name) {
                Ok(backend) => {
                    let serial = backend.serial();
                    let backend_type = backend.backend_type();
                    log::info!("Using YubiKey '{name}' (serial {serial}, {backend_type})");
                    return Ok(Self {
                        backend: Arc::new(Mutex::new(Some(backend))),
                        reader: name.clone(),
                        serial,
                        backend_type,
                    });
                }
                Err(e) => {
                    log::debug!("Skipping reader '{name}': {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(LoginError::NoTokenOpened {
            candidates: readers.len(),
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    #[must_use]
    pub fn reader(&self) -> &str {
        &self.reader
    }

    #[must_use]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    #[must_use]
    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    /// Shared handle for components that outlive a borrow of the session.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle(Arc::clone(&self.backend))
    }

    /// Run `f` against the open backend.
    pub fn with_backend<R>(
        &self,
        f: impl FnOnce(&mut dyn PivBackend) -> LoginResult<R>,
    ) -> LoginResult<R> {
        with_shared(&self.backend, f)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        is_open(&self.backend)
    }

    /// Release the token. Further use of any handle fails.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let taken = match self.backend.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            drop(taken);
            log::debug!("Released YubiKey '{}'", self.reader);
        }
    }
}

impl Drop for TokenSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("reader", &self.reader)
            .field("serial", &self.serial)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Reference to a session's backend.
#[derive(Clone)]
pub struct SessionHandle(SharedBackend);

impl SessionHandle {
    /// Run `f` against the backend, failing once the session is closed.
    pub fn with_backend<R>(
        &self,
        f: impl FnOnce(&mut dyn PivBackend) -> LoginResult<R>,
    ) -> LoginResult<R> {
        with_shared(&self.0, f)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        is_open(&self.0)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

fn with_shared<R>(
    backend: &SharedBackend,
    f: impl FnOnce(&mut dyn PivBackend) -> LoginResult<R>,
) -> LoginResult<R> {
    let mut guard = backend
        .lock()
        .map_err(|_| LoginError::TokenError("token session lock poisoned".to_string()))?;
    match guard.as_mut() {
        Some(backend) => f(backend.as_mut()),
        None => Err(LoginError::TokenError("token session is closed".to_string())),
    }
}

fn is_open(backend: &SharedBackend) -> bool {
    backend.lock().map(|g| g.is_some()).unwrap_or(false)
}
