//! Control-plane configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the step-cancel acknowledgement timeout,
/// in whole seconds.
pub const ENV_STEP_CANCEL_ACK_TIMEOUT_SECS: &str = "CAPSTAN_STEP_CANCEL_ACK_TIMEOUT_SECS";

const DEFAULT_STEP_CANCEL_ACK_TIMEOUT_SECS: u64 = 30;

fn default_step_cancel_ack_timeout() -> Duration {
    Duration::from_secs(DEFAULT_STEP_CANCEL_ACK_TIMEOUT_SECS)
}

/// Tunable parameters of the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneConfig {
    /// How long `cancel_step` waits for the worker to acknowledge receipt of
    /// the cancel event before reporting a dispatch failure.
    ///
    /// The wait is always bounded; there is no way to configure an unbounded
    /// wait.
    #[serde(with = "humantime_serde", default = "default_step_cancel_ack_timeout")]
    pub step_cancel_ack_timeout: Duration,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            step_cancel_ack_timeout: default_step_cancel_ack_timeout(),
        }
    }
}

impl ControlPlaneConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value is not a
    /// positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration with a custom environment source.
    ///
    /// This entry point is test-friendly and accepts a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value is not a
    /// positive integer.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ack_timeout_secs = parse_positive_u64_env(
            &get_env,
            ENV_STEP_CANCEL_ACK_TIMEOUT_SECS,
            DEFAULT_STEP_CANCEL_ACK_TIMEOUT_SECS,
        )?;

        Ok(Self {
            step_cancel_ack_timeout: Duration::from_secs(ack_timeout_secs),
        })
    }

    /// Sets the step-cancel acknowledgement timeout.
    #[must_use]
    pub const fn with_step_cancel_ack_timeout(mut self, timeout: Duration) -> Self {
        self.step_cancel_ack_timeout = timeout;
        self
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_thirty_seconds() {
        let config = ControlPlaneConfig::default();
        assert_eq!(config.step_cancel_ack_timeout, Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_timeout() -> Result<()> {
        let config = ControlPlaneConfig::from_env_with(|key| {
            (key == ENV_STEP_CANCEL_ACK_TIMEOUT_SECS).then(|| "5".to_string())
        })?;
        assert_eq!(config.step_cancel_ack_timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn missing_env_uses_default() -> Result<()> {
        let config = ControlPlaneConfig::from_env_with(|_| None)?;
        assert_eq!(config, ControlPlaneConfig::default());
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = ControlPlaneConfig::from_env_with(|_| Some("0".to_string()));
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn garbage_timeout_is_rejected() {
        let result = ControlPlaneConfig::from_env_with(|_| Some("soon".to_string()));
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn builder_overrides_timeout() {
        let config =
            ControlPlaneConfig::default().with_step_cancel_ack_timeout(Duration::from_millis(250));
        assert_eq!(config.step_cancel_ack_timeout, Duration::from_millis(250));
    }
}
