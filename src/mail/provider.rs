use std::fmt;
use std::str::FromStr;

use crate::error::{FetchError, Result};

pub const IMAPS_PORT: u16 = 993;

/// IMAP service to connect to. Every variant is reached over implicit TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Gmail,
    Outlook,
    Custom { host: String, port: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Name-only selector, as typed by a user or read from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gmail,
    Outlook,
    Custom,
}

impl FromStr for ProviderKind {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Ok(ProviderKind::Gmail),
            "outlook" | "office365" | "hotmail" => Ok(ProviderKind::Outlook),
            "custom" => Ok(ProviderKind::Custom),
            other => Err(FetchError::InvalidProvider(format!(
                "unknown provider {other:?} (expected gmail, outlook or custom)"
            ))),
        }
    }
}

impl Provider {
    /// Resolve a provider name. Unknown names are treated as custom servers
    /// and need an explicit host; the port defaults to 993.
    pub fn resolve(name: &str, host: Option<&str>, port: Option<u16>) -> Result<Self> {
        let kind = name.parse::<ProviderKind>().unwrap_or(ProviderKind::Custom);
        match kind {
            ProviderKind::Gmail => Ok(Provider::Gmail),
            ProviderKind::Outlook => Ok(Provider::Outlook),
            ProviderKind::Custom => {
                let host = host
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| {
                        FetchError::InvalidProvider(format!(
                            "provider {name:?} needs an explicit IMAP host"
                        ))
                    })?;
                Ok(Provider::Custom {
                    host: host.to_string(),
                    port: port.unwrap_or(IMAPS_PORT),
                })
            }
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Provider::Gmail => Endpoint {
                host: "imap.gmail.com".into(),
                port: IMAPS_PORT,
            },
            Provider::Outlook => Endpoint {
                host: "outlook.office365.com".into(),
                port: IMAPS_PORT,
            },
            Provider::Custom { host, port } => Endpoint {
                host: host.clone(),
                port: *port,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
            Provider::Custom { .. } => "custom",
        }
    }

    /// Advice shown next to a rejected login.
    pub fn auth_hint(&self) -> &'static str {
        match self {
            Provider::Gmail => {
                "Gmail requires IMAP to be enabled and an App Password instead of the account password."
            }
            Provider::Outlook => {
                "Outlook/Office365 may have Basic Auth disabled; try an App Password or use demo mode."
            }
            Provider::Custom { .. } => "Check the address, password and IMAP access for this server.",
        }
    }

    pub fn known() -> [Provider; 2] {
        [Provider::Gmail, Provider::Outlook]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.endpoint())
    }
}

/// Login material for one fetch.
#[derive(Clone)]
pub struct Credentials {
    pub provider: Provider,
    pub address: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
