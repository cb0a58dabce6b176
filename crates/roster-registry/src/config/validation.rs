use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &RegistryConfig) -> Result<()> {
    validate_server_config(&config.server)?;
    validate_log_level(&config.log_level)?;
    validate_heartbeat_config(&config.heartbeat)?;
    validate_notifier_config(&config.notifier)?;
    Ok(())
}

fn validate_server_config(server: &ServerConfig) -> Result<()> {
    if server.host.trim().is_empty() {
        return Err(anyhow!("Server host cannot be empty"));
    }

    if server.port == 0 {
        return Err(anyhow!("Port must be between 1 and 65535, got: {}", server.port));
    }

    Ok(())
}

fn validate_log_level(level: &str) -> Result<()> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}

fn validate_heartbeat_config(heartbeat: &HeartbeatConfig) -> Result<()> {
    if heartbeat.attempts == 0 {
        return Err(anyhow!("Heartbeat attempts must be at least 1"));
    }

    if heartbeat.interval.is_zero() {
        return Err(anyhow!("Heartbeat interval must be greater than 0"));
    }

    if heartbeat.probe_timeout.is_zero() {
        return Err(anyhow!("Heartbeat probe timeout must be greater than 0"));
    }

    Ok(())
}

fn validate_notifier_config(notifier: &NotifierConfig) -> Result<()> {
    if notifier.delivery_timeout.is_zero() {
        return Err(anyhow!("Notifier delivery timeout must be greater than 0"));
    }
    Ok(())
}
