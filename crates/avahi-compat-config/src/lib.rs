#![deny(unsafe_code)]

//! Configuration loading and validation for avahi-compat.
//!
//! Loads a TOML file into [`AppConfig`]. Every field has a default, so an
//! empty file (or no file at all) yields a configuration that talks to the
//! system `systemd-resolved` instance and publishes into `/run/systemd/dnssd`.
//!
//! ## TOML Example
//!
//! ```toml
//! [resolved]
//! socket_path = "/run/systemd/resolve/io.systemd.Resolve"
//!
//! [browse]
//! initial_wait_ms = 1000
//! poll_slice_ms = 100
//!
//! [publish]
//! dnssd_dir = "/run/systemd/dnssd"
//! reload = "busctl"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Connection to the resolver daemon.
    #[serde(default)]
    pub resolved: ResolvedConfig,

    /// Browse subscription timing.
    #[serde(default)]
    pub browse: BrowseConfig,

    /// Publishing through `.dnssd` files.
    #[serde(default)]
    pub publish: PublishConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── [resolved] ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Path of the `io.systemd.Resolve` Varlink socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// How long to wait for the socket connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound for one resolve or record call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connect_timeout_ms: default_connect_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl ResolvedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/systemd/resolve/io.systemd.Resolve")
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

// ── [browse] ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Upper bound on how long `attach` waits for the first batch.
    #[serde(default = "default_initial_wait_ms")]
    pub initial_wait_ms: u64,

    /// Slice length used while polling during that wait.
    #[serde(default = "default_poll_slice_ms")]
    pub poll_slice_ms: u64,

    /// Delay before re-opening an expired subscription.
    #[serde(default = "default_resubscribe_delay_ms")]
    pub resubscribe_delay_ms: u64,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            initial_wait_ms: default_initial_wait_ms(),
            poll_slice_ms: default_poll_slice_ms(),
            resubscribe_delay_ms: default_resubscribe_delay_ms(),
        }
    }
}

impl BrowseConfig {
    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms)
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }
}

fn default_initial_wait_ms() -> u64 {
    1_000
}

fn default_poll_slice_ms() -> u64 {
    100
}

fn default_resubscribe_delay_ms() -> u64 {
    100
}

// ── [publish] ─────────────────────────────────────────────────────────

/// How the resolver daemon is told to re-read `.dnssd` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// Call `ReloadDNSSD` on the resolver's bus interface via `busctl`.
    Busctl,
    /// Write files only.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Directory the daemon reads `.dnssd` service declarations from.
    #[serde(default = "default_dnssd_dir")]
    pub dnssd_dir: PathBuf,

    #[serde(default = "default_reload")]
    pub reload: ReloadMode,

    /// `busctl` binary used by [`ReloadMode::Busctl`].
    #[serde(default = "default_busctl_path")]
    pub busctl_path: PathBuf,

    #[serde(default = "default_reload_timeout_ms")]
    pub reload_timeout_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dnssd_dir: default_dnssd_dir(),
            reload: default_reload(),
            busctl_path: default_busctl_path(),
            reload_timeout_ms: default_reload_timeout_ms(),
        }
    }
}

impl PublishConfig {
    pub fn reload_timeout(&self) -> Duration {
        Duration::from_millis(self.reload_timeout_ms)
    }
}

fn default_dnssd_dir() -> PathBuf {
    PathBuf::from("/run/systemd/dnssd")
}

fn default_reload() -> ReloadMode {
    ReloadMode::Busctl
}

fn default_busctl_path() -> PathBuf {
    PathBuf::from("busctl")
}

fn default_reload_timeout_ms() -> u64 {
    5_000
}

// ── [logging] ─────────────────────────────────────────────────────────

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolved.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "resolved.socket_path must not be empty".to_string(),
            ));
        }
        if self.resolved.connect_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "resolved.connect_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.resolved.call_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "resolved.call_timeout_ms must be non-zero".to_string(),
            ));
        }

        if self.browse.initial_wait_ms == 0 {
            return Err(ConfigError::Validation(
                "browse.initial_wait_ms must be non-zero".to_string(),
            ));
        }
        if self.browse.poll_slice_ms == 0 || self.browse.poll_slice_ms > self.browse.initial_wait_ms
        {
            return Err(ConfigError::Validation(format!(
                "browse.poll_slice_ms must be in 1..={}, got {}",
                self.browse.initial_wait_ms, self.browse.poll_slice_ms
            )));
        }

        if self.publish.dnssd_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "publish.dnssd_dir must not be empty".to_string(),
            ));
        }
        if self.publish.reload == ReloadMode::Busctl {
            if self.publish.busctl_path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "publish.busctl_path is required when publish.reload is \"busctl\""
                        .to_string(),
                ));
            }
            if self.publish.reload_timeout_ms == 0 {
                return Err(ConfigError::Validation(
                    "publish.reload_timeout_ms must be non-zero".to_string(),
                ));
            }
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(
            config.resolved.socket_path,
            PathBuf::from("/run/systemd/resolve/io.systemd.Resolve")
        );
        assert_eq!(config.browse.initial_wait(), Duration::from_secs(1));
        assert_eq!(config.browse.poll_slice(), Duration::from_millis(100));
        assert_eq!(config.publish.dnssd_dir, PathBuf::from("/run/systemd/dnssd"));
        assert_eq!(config.publish.reload, ReloadMode::Busctl);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [resolved]
            socket_path = "/tmp/resolve.sock"
            connect_timeout_ms = 500
            call_timeout_ms = 3000

            [browse]
            initial_wait_ms = 250
            poll_slice_ms = 50
            resubscribe_delay_ms = 10

            [publish]
            dnssd_dir = "/tmp/dnssd"
            reload = "none"

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.resolved.socket_path, PathBuf::from("/tmp/resolve.sock"));
        assert_eq!(config.resolved.connect_timeout(), Duration::from_millis(500));
        assert_eq!(config.resolved.call_timeout(), Duration::from_secs(3));
        assert_eq!(config.browse.initial_wait_ms, 250);
        assert_eq!(config.browse.resubscribe_delay(), Duration::from_millis(10));
        assert_eq!(config.publish.dnssd_dir, PathBuf::from("/tmp/dnssd"));
        assert_eq!(config.publish.reload, ReloadMode::None);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_empty_socket_path() {
        let toml = r#"
            [resolved]
            socket_path = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeouts() {
        assert!(AppConfig::parse("[resolved]\nconnect_timeout_ms = 0\n").is_err());
        assert!(AppConfig::parse("[resolved]\ncall_timeout_ms = 0\n").is_err());
        assert!(AppConfig::parse("[browse]\ninitial_wait_ms = 0\n").is_err());
    }

    #[test]
    fn test_validation_rejects_slice_longer_than_wait() {
        let toml = r#"
            [browse]
            initial_wait_ms = 100
            poll_slice_ms = 200
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("poll_slice_ms"));
    }

    #[test]
    fn test_validation_rejects_unknown_reload_mode() {
        let toml = r#"
            [publish]
            reload = "dbus-magic"
        "#;
        assert!(matches!(AppConfig::parse(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_busctl_path_only_required_for_busctl() {
        let none = r#"
            [publish]
            reload = "none"
            busctl_path = ""
        "#;
        assert!(AppConfig::parse(none).is_ok());

        let busctl = r#"
            [publish]
            reload = "busctl"
            busctl_path = ""
        "#;
        assert!(AppConfig::parse(busctl).is_err());
    }

    #[test]
    fn test_config_serializes_back_to_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[publish]"));
        assert_eq!(AppConfig::parse(&text).unwrap(), config);
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("avahi-compat.toml");
        tokio::fs::write(&path, b"[publish]\ndnssd_dir = \"/tmp/x\"\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.publish.dnssd_dir, PathBuf::from("/tmp/x"));
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
