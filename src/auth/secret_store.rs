use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "rs_mail_filter";

/// Environment variable checked before the keyring.
pub const PASSWORD_ENV: &str = "RS_MAIL_FILTER_PASSWORD";

/// Save the IMAP password (or app password) for `address` in the OS keyring.
pub fn save_password(address: &str, secret: &str) -> Result<()> {
    Entry::new(SERVICE, address)?
        .set_password(secret)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

pub fn load_password(address: &str) -> Result<Option<String>> {
    match Entry::new(SERVICE, address)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Remove a stored password. Missing entries are not an error.
pub fn delete_password(address: &str) -> Result<()> {
    match Entry::new(SERVICE, address)?.delete_credential() {
        Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Password from the environment, then the keyring.
pub fn lookup_password(address: &str) -> Result<Option<String>> {
    if let Ok(v) = std::env::var(PASSWORD_ENV)
        && !v.is_empty()
    {
        return Ok(Some(v));
    }
    load_password(address)
}
