use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod validation;

/// Top-level registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub server: ServerConfig,
    pub log_level: String,
    pub heartbeat: HeartbeatConfig,
    pub notifier: NotifierConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log_level: "info".to_string(),
            heartbeat: HeartbeatConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

/// Listen address of the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Heartbeat monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,

    /// Sleep between ticks
    #[serde(with = "duration_serde")]
    pub interval: Duration,

    /// Probe attempts per registration per tick
    pub attempts: u32,

    /// Backoff between attempts
    #[serde(with = "duration_serde")]
    pub retry_delay: Duration,

    /// Deadline for a single probe
    #[serde(with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Probe registrations concurrently within a tick
    pub parallel: bool,

    /// How long an evicted registration's status stays visible
    #[serde(with = "duration_serde")]
    pub status_retention: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3),
            attempts: 3,
            retry_delay: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(2),
            parallel: true,
            status_retention: Duration::from_secs(300),
        }
    }
}

/// Patch delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Deadline for one delivery (fanout and sync alike)
    #[serde(with = "duration_serde")]
    pub delivery_timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: RegistryConfig = if content.trim().is_empty() {
            RegistryConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

// Durations are written as "3s", "500ms" or "1m"
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // "ms" before "s" since "ms" ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            let millis: u64 = num.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num) = s.strip_suffix('s') {
            let secs: u64 = num.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num.trim().parse().map_err(|_| format!("Invalid duration: {}", s))?;
            mins.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| format!("Invalid duration: {}", s))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RegistryConfig::load_from_string("").unwrap();

        assert_eq!(config.server.address(), "127.0.0.1:3000");
        assert_eq!(config.log_level, "info");
        assert!(config.heartbeat.enabled);
        assert_eq!(config.heartbeat.interval, Duration::from_secs(3));
        assert_eq!(config.heartbeat.attempts, 3);
        assert_eq!(config.heartbeat.retry_delay, Duration::from_secs(1));
        assert_eq!(config.notifier.delivery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_config() {
        let yaml = r#"
server:
  port: 4100
heartbeat:
  interval: 500ms
  retry_delay: 2s
  parallel: false
notifier:
  delivery_timeout: 1m
"#;
        let config = RegistryConfig::load_from_string(yaml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.heartbeat.interval, Duration::from_millis(500));
        assert_eq!(config.heartbeat.retry_delay, Duration::from_secs(2));
        assert_eq!(config.heartbeat.attempts, 3);
        assert!(!config.heartbeat.parallel);
        assert_eq!(config.notifier.delivery_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let err = RegistryConfig::load_from_string("heartbeat:\n  interval: soon\n").unwrap_err();
        assert!(format!("{:#}", err).contains("Duration must end with"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(duration_serde::parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(duration_serde::parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(duration_serde::parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(duration_serde::parse_duration("xs").is_err());
    }

    #[test]
    fn test_oversized_minutes_are_rejected() {
        let huge = format!("{}m", u64::MAX / 30);
        let err = duration_serde::parse_duration(&huge).unwrap_err();
        assert!(err.starts_with("Invalid duration"));

        let err = RegistryConfig::load_from_string(&format!("heartbeat:\n  interval: {}\n", huge))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid duration"));
    }

    #[test]
    fn test_duration_round_trip_through_yaml() {
        let mut config = RegistryConfig::default();
        config.heartbeat.retry_delay = Duration::from_millis(750);

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("750ms"));
        assert!(yaml.contains("3s"));

        let decoded = RegistryConfig::load_from_string(&yaml).unwrap();
        assert_eq!(decoded.heartbeat.retry_delay, Duration::from_millis(750));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level: debug\nserver:\n  host: 0.0.0.0\n  port: 3100").unwrap();

        let config = RegistryConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.address(), "0.0.0.0:3100");
    }

    #[test]
    fn test_missing_file() {
        let err = RegistryConfig::load_from_file("/nonexistent/roster.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
