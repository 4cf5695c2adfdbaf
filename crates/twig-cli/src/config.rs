//! User configuration file.

use crate::commands::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use twig_git::HttpOptions;
use twig_storage::{CompressionLevel, Signature};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TWIG_CONFIG";

/// Contents of `config.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Commit identity.
    pub user: UserConfig,
    /// HTTP transport settings.
    pub http: HttpConfig,
    /// Object storage settings.
    pub core: CoreConfig,
}

/// `[user]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    /// Author and committer name.
    pub name: Option<String>,
    /// Author and committer email.
    pub email: Option<String>,
    /// UTC offset written into commits, `[+-]HHMM`.
    pub timezone: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: None,
            email: None,
            timezone: "+0000".to_string(),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// `User-Agent` header sent to remotes.
    pub user_agent: String,
    /// Request timeout in seconds; unset waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: HttpOptions::default().user_agent,
            timeout_secs: None,
        }
    }
}

/// `[core]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Zlib level for new objects.
    pub compression: CompressionLevel,
}

impl Config {
    /// Loads the config file.
    ///
    /// `explicit` (from `--config`) wins over `$TWIG_CONFIG`, which wins
    /// over the per-user config directory. A missing file means defaults,
    /// except when it was named with `--config`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => (PathBuf::from(path), false),
                None => match default_path() {
                    Some(path) => (path, false),
                    None => return Ok(Self::default()),
                },
            },
        };

        if !path.exists() {
            if required {
                return Err(CliError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config = Self::parse(&contents)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parses and validates config file contents.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| CliError::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !is_utc_offset(&self.user.timezone) {
            return Err(CliError::Config(format!(
                "user.timezone must look like +HHMM or -HHMM, got {:?}",
                self.user.timezone
            )));
        }
        Ok(())
    }

    /// Builds the commit signature for `timestamp`.
    pub fn signature(&self, timestamp: i64) -> Result<Signature> {
        let (Some(name), Some(email)) = (&self.user.name, &self.user.email) else {
            return Err(CliError::Config(
                "user.name and user.email must be set to create commits".to_string(),
            ));
        };
        Ok(Signature::new(
            name.as_str(),
            email.as_str(),
            timestamp,
            self.user.timezone.as_str(),
        ))
    }

    /// HTTP transport options.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.http.user_agent.clone(),
            timeout: self.http.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// `<config dir>/twig/config.toml`.
fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("twig").join("config.toml"))
}

fn is_utc_offset(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || !matches!(bytes[0], b'+' | b'-') {
        return false;
    }
    if !bytes[1..].iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hours = (bytes[1] - b'0') * 10 + (bytes[2] - b'0');
    let minutes = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    hours <= 23 && minutes <= 59
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.user.timezone, "+0000");
        assert_eq!(config.core.compression, CompressionLevel::Default);
        assert!(config.http.user_agent.starts_with("twig/"));
        assert!(config.http_options().timeout.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = Config::parse(
            r#"
            [user]
            name = "Ada Lovelace"
            email = "ada@example.com"
            timezone = "-0130"

            [http]
            user_agent = "custom/1.0"
            timeout_secs = 30

            [core]
            compression = "best"
            "#,
        )
        .unwrap();

        assert_eq!(config.user.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(config.core.compression, CompressionLevel::Best);
        assert_eq!(config.http_options().timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.http_options().user_agent, "custom/1.0");

        let signature = config.signature(1_700_000_000).unwrap();
        assert_eq!(
            signature.to_string(),
            "Ada Lovelace <ada@example.com> 1700000000 -0130"
        );
    }

    #[test]
    fn test_invalid_timezone() {
        for tz in ["0800", "+8", "+2400", "+0060", "UTC+1"] {
            let contents = format!("[user]\ntimezone = \"{}\"\n", tz);
            assert!(
                matches!(Config::parse(&contents), Err(CliError::Config(_))),
                "{tz}"
            );
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            Config::parse("[core]\ncompresion = \"fast\"\n"),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_signature_requires_identity() {
        let config = Config::parse("[user]\nname = \"Only Name\"\n").unwrap();
        assert!(matches!(config.signature(0), Err(CliError::Config(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[core]\ncompression = \"fast\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.core.compression, CompressionLevel::Fast);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.user.name = Some("Round Trip".to_string());
        config.core.compression = CompressionLevel::None;

        let toml = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&toml).unwrap(), config);
    }
}
