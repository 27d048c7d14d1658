//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable that opts in to automatic firmware asset download
pub const AUTO_FWASSETS_ENV: &str = "VDEV_AUTO_DOWNLOAD_FWASSETS";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub remediation: RemediationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the provisioning API (without the `/v1` suffix)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token sent with every API request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Timeout for API requests in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_token: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Settings for automatic firmware asset remediation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationConfig {
    /// Download and register missing firmware assets automatically.
    /// Off unless explicitly enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum number of remediation rounds before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Overall time budget for remediation in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_elapsed_secs: Option<u64>,
    /// Abort a firmware asset download after this many seconds without data
    #[serde(default = "default_download_idle_timeout")]
    pub download_idle_timeout_secs: u64,
    /// Hard cap on a single download in seconds (no cap when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_download_secs: Option<u64>,
    /// Directory for downloaded assets (platform temp dir when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            max_elapsed_secs: None,
            download_idle_timeout_secs: default_download_idle_timeout(),
            max_download_secs: None,
            scratch_dir: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_download_idle_timeout() -> u64 {
    120
}

impl RemediationConfig {
    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_secs.map(Duration::from_secs)
    }

    pub fn download_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.download_idle_timeout_secs)
    }

    /// Total download limit. Firmware images can be several GB, so none by default.
    pub fn max_download(&self) -> Option<Duration> {
        self.max_download_secs.map(Duration::from_secs)
    }

    /// Directory scratch files are created in
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Config {
    /// Apply overrides from the process environment.
    ///
    /// Called once at startup; the resulting value is what the provisioner
    /// is constructed with.
    pub fn apply_env(&mut self) {
        let value = std::env::var(AUTO_FWASSETS_ENV).ok();
        self.apply_auto_fwassets(value.as_deref());
    }

    fn apply_auto_fwassets(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        match parse_flag(value) {
            Some(enabled) => {
                info!(
                    var = AUTO_FWASSETS_ENV,
                    enabled,
                    "Firmware asset remediation set from environment"
                );
                self.remediation.enabled = enabled;
            }
            None => {
                warn!(
                    var = AUTO_FWASSETS_ENV,
                    value = %value,
                    "Ignoring unrecognized boolean value"
                );
            }
        }
    }
}

/// Parse a boolean-like setting ("1", "true", "yes", "on" and their negatives)
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        service: ServiceConfig {
            endpoint: "https://app.example.com/api".to_string(),
            api_token: Some("replace-me".to_string()),
            timeout_secs: default_timeout(),
        },
        remediation: RemediationConfig {
            max_elapsed_secs: Some(1800),
            ..RemediationConfig::default()
        },
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(!config.remediation.enabled);
        assert_eq!(config.remediation.max_attempts, 5);
        assert_eq!(config.remediation.max_elapsed(), None);
        assert_eq!(config.remediation.download_idle_timeout(), Duration::from_secs(120));
        assert_eq!(config.remediation.max_download(), None);
        assert_eq!(config.service.timeout_secs, 30);
    }

    #[test]
    fn test_parse_sections() {
        let config: Config = toml::from_str(
            r#"
            [service]
            endpoint = "https://vdev.example.com/api"
            api_token = "secret"

            [remediation]
            enabled = true
            max_attempts = 2
            max_elapsed_secs = 60
            download_idle_timeout_secs = 15
            max_download_secs = 7200
            scratch_dir = "/var/tmp/vdev"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.endpoint, "https://vdev.example.com/api");
        assert_eq!(config.service.api_token.as_deref(), Some("secret"));
        assert!(config.remediation.enabled);
        assert_eq!(config.remediation.max_attempts, 2);
        assert_eq!(config.remediation.max_elapsed(), Some(Duration::from_secs(60)));
        assert_eq!(config.remediation.download_idle_timeout(), Duration::from_secs(15));
        assert_eq!(config.remediation.max_download(), Some(Duration::from_secs(7200)));
        assert_eq!(config.remediation.scratch_dir(), PathBuf::from("/var/tmp/vdev"));
    }

    #[test]
    fn test_parse_flag() {
        for v in ["1", "true", "TRUE", "yes", " on "] {
            assert_eq!(parse_flag(v), Some(true), "{}", v);
        }
        for v in ["0", "false", "no", "off", ""] {
            assert_eq!(parse_flag(v), Some(false), "{}", v);
        }
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();

        config.apply_auto_fwassets(None);
        assert!(!config.remediation.enabled);

        config.apply_auto_fwassets(Some("true"));
        assert!(config.remediation.enabled);

        // Garbage leaves the current value alone
        config.apply_auto_fwassets(Some("sometimes"));
        assert!(config.remediation.enabled);

        config.apply_auto_fwassets(Some("0"));
        assert!(!config.remediation.enabled);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(!config.remediation.enabled);
    }

    #[test]
    fn test_save_and_load_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vdev.toml");
        save_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.service.endpoint, "https://app.example.com/api");
        assert!(!config.remediation.enabled);
        assert_eq!(config.remediation.max_elapsed_secs, Some(1800));
    }
}
