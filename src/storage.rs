//! Admin API credentials in the OS credential store.
//!
//! On Windows this uses the Credential Manager (via the `keyring` crate), on
//! macOS the Keychain, and on Linux the kernel keyutils store.

use keyring::Entry;
use tracing::{info, warn};

use crate::config::DashboardConfig;

const SERVICE_NAME: &str = "admin-dashboard";

pub const KEY_BASE_URL: &str = "admin_api_url";
pub const KEY_API_KEY: &str = "admin_api_key";

const ALL_KEYS: &[&str] = &[KEY_BASE_URL, KEY_API_KEY];

/// Retrieve a single credential. Returns `None` when the entry does not
/// exist or the platform store is unavailable.
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw).filter(|v| !v.trim().is_empty()),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

pub fn set_credential(key: &str, value: &str) -> Result<(), keyring::Error> {
    Entry::new(SERVICE_NAME, key)?.set_password(value)
}

/// Delete a credential. Silently succeeds if the entry does not exist.
pub fn delete_credential(key: &str) -> Result<(), keyring::Error> {
    match Entry::new(SERVICE_NAME, key)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Persist the URL and API key of a resolved configuration.
pub fn save_config(config: &DashboardConfig) -> Result<(), keyring::Error> {
    set_credential(KEY_BASE_URL, &config.base_url)?;
    set_credential(KEY_API_KEY, &config.api_key)?;
    info!(base_url = %config.base_url, "admin credentials stored");
    Ok(())
}

/// Remove every stored credential.
pub fn clear_all() -> Result<(), keyring::Error> {
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    info!("admin credentials cleared");
    Ok(())
}
