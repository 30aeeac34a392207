use std::time::Duration;

use mailrun_common::ConfigError;
use serde::{Deserialize, Serialize};

const fn default_delay() -> u64 {
    1
}

/// Most relays cap a session at 5000 messages; stay under it.
const fn default_session_limit() -> usize {
    4900
}

const fn default_rotation_cooldown() -> u64 {
    5
}

/// Pacing and session rotation for a dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Pause after every attempted send (in seconds).
    ///
    /// Default: 1 second
    #[serde(default = "default_delay")]
    pub delay_secs: u64,

    /// Successful sends allowed on one session before it is replaced.
    ///
    /// Default: 4900
    #[serde(default = "default_session_limit")]
    pub session_limit: usize,

    /// Pause between closing a full session and opening the next (in seconds).
    ///
    /// Default: 5 seconds
    #[serde(default = "default_rotation_cooldown")]
    pub rotation_cooldown_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay(),
            session_limit: default_session_limit(),
            rotation_cooldown_secs: default_rotation_cooldown(),
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    #[must_use]
    pub const fn rotation_cooldown(&self) -> Duration {
        Duration::from_secs(self.rotation_cooldown_secs)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the session limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "session_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.delay(), Duration::from_secs(1));
        assert_eq!(config.session_limit, 4900);
        assert_eq!(config.rotation_cooldown(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document() {
        let config: DispatchConfig = ron::from_str("(session_limit: 10)").unwrap();
        assert_eq!(config.session_limit, 10);
        assert_eq!(config.delay_secs, 1);
        assert_eq!(config.rotation_cooldown_secs, 5);
    }

    #[test]
    fn test_zero_session_limit_is_invalid() {
        let config = DispatchConfig {
            session_limit: 0,
            ..DispatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "session_limit",
                ..
            })
        ));
    }
}
