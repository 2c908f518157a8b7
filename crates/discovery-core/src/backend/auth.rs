//! Authentication collaborator.
//!
//! Token issuance and refresh belong to the auth service. The engine only
//! asks one question before every discovery call: is the caller
//! authenticated?

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CoreError;

/// Keyring entry holding the bearer token.
pub const TOKEN_KEY: &str = "access_token";
/// Environment variable that overrides the stored token.
pub const TOKEN_ENV: &str = "DISCOVERY_TOKEN";

pub trait AuthGate: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

/// Shared, switchable authentication flag.
#[derive(Debug, Clone)]
pub struct AuthFlag(Arc<AtomicBool>);

impl AuthFlag {
    pub fn new(authenticated: bool) -> Self {
        Self(Arc::new(AtomicBool::new(authenticated)))
    }

    pub fn set(&self, authenticated: bool) {
        self.0.store(authenticated, Ordering::SeqCst);
    }
}

impl Default for AuthFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AuthGate for AuthFlag {
    fn is_authenticated(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "daily-discovery";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Resolve the bearer token: `DISCOVERY_TOKEN` first, then the keyring.
pub fn load_token() -> Result<Option<String>, CoreError> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Ok(Some(token.trim().to_string()));
        }
    }
    Ok(keyring_store::get(TOKEN_KEY)?)
}

pub fn store_token(token: &str) -> Result<(), CoreError> {
    keyring_store::set(TOKEN_KEY, token)?;
    Ok(())
}

pub fn clear_token() -> Result<(), CoreError> {
    keyring_store::delete(TOKEN_KEY)?;
    Ok(())
}
