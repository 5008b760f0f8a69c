//! Configuration types for cmdlet-replay

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::matcher::{RequestValidator, DEFAULT_CLIENT_TOKEN};
use crate::{ReplayError, Result};

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Record mode: forward to the live service and capture sessions
    Record,
    /// Replay mode: serve from recorded sessions
    Replay,
}

impl Mode {
    /// Check if mode is Record
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Mode::Record)
    }

    /// Check if mode is Replay
    #[must_use]
    pub fn is_replay(&self) -> bool {
        matches!(self, Mode::Replay)
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Operating mode
    pub mode: Mode,
    /// Session collection file
    pub session_file: PathBuf,
    /// Mock server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Live service settings (record mode)
    #[serde(default)]
    pub live: Option<LiveConfig>,
    /// Default matching settings
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Mock server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Path prefix stripped from incoming requests
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn default_prefix() -> String {
    "/".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            prefix: default_prefix(),
        }
    }
}

/// Live service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Base URI requests are resolved against
    pub target: String,
}

/// Matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Client identifier required in the user-agent
    #[serde(default = "default_client_token")]
    pub client_token: String,
}

fn default_client_token() -> String {
    DEFAULT_CLIENT_TOKEN.to_string()
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            client_token: default_client_token(),
        }
    }
}

impl MatchingConfig {
    /// Validator given to newly recorded sessions
    #[must_use]
    pub fn default_validator(&self) -> RequestValidator {
        RequestValidator::user_agent_token(self.client_token.clone())
    }
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Maximum response body size in bytes
    pub max_response_size: usize,
    /// Maximum headers per request
    pub max_headers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 16 * 1024 * 1024,   // 16 MB
            max_response_size: 256 * 1024 * 1024, // 256 MB
            max_headers: 128,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ReplayError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.session_file.as_os_str().is_empty() {
            return Err(ReplayError::ConfigError(
                "session_file cannot be empty".to_string(),
            ));
        }

        if let Some(parent) = self.session_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ReplayError::ConfigError(format!(
                    "Session directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        if !self.server.prefix.starts_with('/') {
            return Err(ReplayError::ConfigError(format!(
                "Server prefix must start with '/': {}",
                self.server.prefix
            )));
        }

        match (&self.mode, &self.live) {
            (Mode::Record, None) => {
                return Err(ReplayError::ConfigError(
                    "Record mode requires a [live] target".to_string(),
                ));
            }
            (_, Some(live)) if live.target.is_empty() => {
                return Err(ReplayError::ConfigError(
                    "live.target cannot be empty".to_string(),
                ));
            }
            _ => {}
        }

        if self.matching.client_token.is_empty() {
            return Err(ReplayError::ConfigError(
                "matching.client_token cannot be empty".to_string(),
            ));
        }

        if self.limits.max_request_size == 0
            || self.limits.max_response_size == 0
            || self.limits.max_headers == 0
        {
            return Err(ReplayError::ConfigError(
                "Resource limits must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            mode = "record"
            session_file = "/tmp/cmdlets.mock"

            [live]
            target = "https://management.example.com"

            [server]
            bind = "127.0.0.1:8443"
            prefix = "/mock/"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.mode, Mode::Record);
        assert_eq!(config.server.bind.port(), 8443);
        assert_eq!(config.server.prefix, "/mock/");
        assert_eq!(config.matching.client_token, DEFAULT_CLIENT_TOKEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r#"
            mode = "replay"
            session_file = "/tmp/cmdlets.mock"
        "#;
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Replay);
        assert_eq!(config.server.prefix, "/");
        assert_eq!(config.limits.max_headers, 128);
        assert_eq!(
            config.matching.default_validator(),
            RequestValidator::default()
        );
    }

    #[test]
    fn test_record_requires_live_target() {
        let config_toml = r#"
            mode = "record"
            session_file = "/tmp/cmdlets.mock"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_session_directory() {
        let config_toml = r#"
            mode = "replay"
            session_file = "/nonexistent-dir-for-tests/cmdlets.mock"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_prefix() {
        let config_toml = r#"
            mode = "replay"
            session_file = "/tmp/cmdlets.mock"
            [server]
            prefix = "mock"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.validate().is_err());
    }
}
