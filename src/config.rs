use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mail::imap_client::DEFAULT_TIMEOUT;
use crate::mail::parser::DEFAULT_PREVIEW_CHARS;
use crate::mail::provider::Provider;

const TEMPLATE: &str = r#"# rs_mail_filter configuration. Every key is optional.

# gmail, outlook or custom
# provider = "gmail"
# address = "you@example.com"

# Only used by the custom provider.
# imap_host = "imap.example.com"
# imap_port = 993

# timeout_secs = 30
# preview_chars = 200

# Use generated data instead of a real mailbox.
# demo = false
# demo_count = 500
"#;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub address: Option<String>,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub preview_chars: Option<usize>,
    pub demo: Option<bool>,
    pub demo_count: Option<usize>,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn preview_chars(&self) -> usize {
        self.preview_chars.unwrap_or(DEFAULT_PREVIEW_CHARS)
    }

    /// Resolve the configured provider, defaulting to Gmail.
    pub fn provider(&self) -> crate::error::Result<Provider> {
        self.provider_with(None, None, None)
    }

    /// Resolve the provider with explicit values taking precedence over the
    /// file. A host without a provider name means a custom server.
    pub fn provider_with(
        &self,
        name: Option<&str>,
        host: Option<&str>,
        port: Option<u16>,
    ) -> crate::error::Result<Provider> {
        let name = match (name, host) {
            (Some(name), _) => name,
            (None, Some(_)) => "custom",
            (None, None) => match (&self.provider, &self.imap_host) {
                (Some(name), _) => name.as_str(),
                (None, Some(_)) => "custom",
                (None, None) => "gmail",
            },
        };
        Provider::resolve(
            name,
            host.or(self.imap_host.as_deref()),
            port.or(self.imap_port),
        )
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("rs_mail_filter"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load the default config file, writing a commented template on first run.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, TEMPLATE)?;
        info!("created template config at {}", path.display());
        return Ok(Config::default());
    }
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&s).with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let cfg: Config = toml::from_str(TEMPLATE).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.preview_chars(), DEFAULT_PREVIEW_CHARS);
        assert_eq!(cfg.provider().unwrap(), Provider::Gmail);
    }

    #[test]
    fn reads_custom_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "provider = \"custom\"\nimap_host = \"mail.example.org\"\nimap_port = 1993\ntimeout_secs = 5\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(
            cfg.provider().unwrap().endpoint().to_string(),
            "mail.example.org:1993"
        );
    }

    #[test]
    fn host_flag_without_provider_selects_custom_server() {
        let cfg = Config::default();
        let provider = cfg
            .provider_with(None, Some("imap.fastmail.com"), None)
            .unwrap();
        assert_eq!(provider.endpoint().to_string(), "imap.fastmail.com:993");

        let cfg = Config {
            provider: Some("outlook".into()),
            ..Config::default()
        };
        let provider = cfg
            .provider_with(None, Some("imap.fastmail.com"), Some(1993))
            .unwrap();
        assert_eq!(provider.endpoint().to_string(), "imap.fastmail.com:1993");
    }

    #[test]
    fn flags_override_file_values() {
        let cfg = Config {
            provider: Some("custom".into()),
            imap_host: Some("mail.example.org".into()),
            ..Config::default()
        };
        assert_eq!(cfg.provider_with(Some("gmail"), None, None).unwrap(), Provider::Gmail);
        assert_eq!(
            cfg.provider_with(None, None, Some(2993)).unwrap().endpoint().to_string(),
            "mail.example.org:2993"
        );

        let host_only = Config {
            imap_host: Some("mail.example.org".into()),
            ..Config::default()
        };
        assert_eq!(
            host_only.provider().unwrap().endpoint().to_string(),
            "mail.example.org:993"
        );
        assert_eq!(Config::default().provider().unwrap(), Provider::Gmail);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_from(&dir.path().join("nope.toml")).is_err());
    }
}
