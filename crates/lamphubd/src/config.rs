//! Hub configuration.
//!
//! Values are layered, later layers winning:
//! 1. Compiled defaults ([`HubConfig::default`])
//! 2. An optional TOML file
//! 3. `LAMPHUB_*` environment variables
//! 4. Command-line flags (applied by the binary)
//!
//! ```toml
//! host = "0.0.0.0"
//! device_port = 8765
//! http_port = 8080
//! display_port = 8766
//! heartbeat_interval_ms = 5000
//! heartbeat_timeout_ms = 5000
//! on_parse_failure = "use_default"
//!
//! [tasks]
//! device = "Rectangle"
//! brightness = 80
//! color = "Blue"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use lamphub_protocol::ParseFailurePolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default device channel port
pub const DEFAULT_DEVICE_PORT: u16 = 8765;

/// Default operator HTTP + WebSocket port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default display WebSocket port
pub const DEFAULT_DISPLAY_PORT: u16 = 8766;

/// Default heartbeat interval and reply timeout (5 seconds each)
pub const DEFAULT_HEARTBEAT_MS: u64 = 5_000;

/// Time a new device connection has to announce its name
const DEFAULT_REGISTRATION_TIMEOUT_MS: u64 = 30_000;

/// Outbound messages buffered per observer before drops start
const DEFAULT_OBSERVER_QUEUE: usize = 64;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "LAMPHUB_";

/// Complete hub configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Address every listener binds to
    pub host: String,

    /// Port of the device WebSocket channel
    pub device_port: u16,

    /// Port of the operator HTTP API and its `/ws` observer stream
    pub http_port: u16,

    /// Port of the display `/ws` stream
    pub display_port: u16,

    /// Sleep between heartbeat probes
    pub heartbeat_interval_ms: u64,

    /// How long a device has to answer a probe
    pub heartbeat_timeout_ms: u64,

    /// How long a new device connection may stay silent before registering
    pub registration_timeout_ms: u64,

    /// Per-observer outbound queue capacity
    pub observer_queue: usize,

    /// Handling of operator commands that do not parse
    pub on_parse_failure: ParseFailurePolicy,

    /// Targets the task checklist is scored against
    pub tasks: TaskTargets,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            device_port: DEFAULT_DEVICE_PORT,
            http_port: DEFAULT_HTTP_PORT,
            display_port: DEFAULT_DISPLAY_PORT,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_MS,
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_MS,
            registration_timeout_ms: DEFAULT_REGISTRATION_TIMEOUT_MS,
            observer_queue: DEFAULT_OBSERVER_QUEUE,
            on_parse_failure: ParseFailurePolicy::default(),
            tasks: TaskTargets::default(),
        }
    }
}

/// Device state the checklist expects the user to reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskTargets {
    pub device: String,
    pub brightness: i64,
    pub color: String,
}

impl Default for TaskTargets {
    fn default() -> Self {
        Self {
            device: "Rectangle".to_string(),
            brightness: 80,
            color: "Blue".to_string(),
        }
    }
}

impl HubConfig {
    /// Parses a TOML document over the compiled defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: HubConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: None,
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file over the compiled defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let config: HubConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads defaults, the optional file, then process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `LAMPHUB_*` overrides using the given lookup.
    ///
    /// The lookup receives full variable names such as `LAMPHUB_HTTP_PORT`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let key = format!("{ENV_PREFIX}{suffix}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = var("HOST") {
            self.host = value;
        }
        if let Some((key, value)) = var("DEVICE_PORT") {
            self.device_port = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = var("HTTP_PORT") {
            self.http_port = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = var("DISPLAY_PORT") {
            self.display_port = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = var("HEARTBEAT_INTERVAL_MS") {
            self.heartbeat_interval_ms = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = var("HEARTBEAT_TIMEOUT_MS") {
            self.heartbeat_timeout_ms = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = var("ON_PARSE_FAILURE") {
            self.on_parse_failure = parse_env(&key, &value)?;
        }

        self.validate()
    }

    /// Rejects values the hub cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.heartbeat_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.observer_queue == 0 {
            return Err(ConfigError::Invalid {
                field: "observer_queue",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    /// `host:port` of the device listener.
    pub fn device_addr(&self) -> String {
        format!("{}:{}", self.host, self.device_port)
    }

    /// `host:port` of the operator HTTP listener.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// `host:port` of the display listener.
    pub fn display_addr(&self) -> String {
        format!("{}:{}", self.host, self.display_port)
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key: key.to_string(),
        error: e.to_string(),
    })
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config{}: {error}", path.as_ref().map(|p| format!(" file {}", p.display())).unwrap_or_default())]
    Parse { path: Option<PathBuf>, error: String },

    #[error("Invalid value in {key}: {error}")]
    Env { key: String, error: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_match_wire_ports() {
        let config = HubConfig::default();
        assert_eq!(config.device_port, 8765);
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.display_port, 8766);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_timeout(), Duration::from_secs(5));
        assert_eq!(config.on_parse_failure, ParseFailurePolicy::UseDefault);
        assert_eq!(config.tasks.device, "Rectangle");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HubConfig::from_toml_str(
            r#"
            http_port = 9000
            on_parse_failure = "reject"

            [tasks]
            color = "Red"
            "#,
        )
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.device_port, DEFAULT_DEVICE_PORT);
        assert_eq!(config.on_parse_failure, ParseFailurePolicy::Reject);
        assert_eq!(config.tasks.color, "Red");
        assert_eq!(config.tasks.brightness, 80);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = HubConfig::from_toml_str("http_prot = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let err = HubConfig::from_toml_str("heartbeat_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("heartbeat_timeout_ms"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LAMPHUB_HOST", "127.0.0.1"),
            ("LAMPHUB_DEVICE_PORT", "9765"),
            ("LAMPHUB_HEARTBEAT_INTERVAL_MS", "250"),
            ("LAMPHUB_ON_PARSE_FAILURE", "reject"),
        ]
        .into_iter()
        .collect();

        let mut config = HubConfig::default();
        config
            .apply_env_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.device_port, 9765);
        assert_eq!(config.heartbeat_interval_ms, 250);
        assert_eq!(config.on_parse_failure, ParseFailurePolicy::Reject);
        assert_eq!(config.device_addr(), "127.0.0.1:9765");
    }

    #[test]
    fn test_env_bad_value() {
        let mut config = HubConfig::default();
        let err = config
            .apply_env_from(|key| (key == "LAMPHUB_HTTP_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("LAMPHUB_HTTP_PORT"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "display_port = 9766").unwrap();

        let config = HubConfig::from_file(file.path()).unwrap();
        assert_eq!(config.display_port, 9766);
    }

    #[test]
    fn test_missing_file() {
        let err = HubConfig::from_file(Path::new("/nonexistent/lamphub.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
