use crate::error::SettingsError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Runtime tuning, read from an optional TOML file. Every key has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tuning {
    pub lane_capacity: usize,
    pub lane_send_timeout_ms: u64,
    pub outbound_capacity: usize,
    pub fetch_timeout_secs: u64,
    pub correlation_ttl_secs: u64,
    pub token_length: usize,
    pub oauth_scope: String,
    pub bot_link: Option<String>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            lane_capacity: 64,
            lane_send_timeout_ms: 2_000,
            outbound_capacity: 256,
            fetch_timeout_secs: 30,
            correlation_ttl_secs: 600,
            token_length: 32,
            oauth_scope: "repo".to_string(),
            bot_link: None,
        }
    }
}

impl Tuning {
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|err| SettingsError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let tuning: Self = toml::from_str(content).map_err(|err| SettingsError::Invalid {
            message: err.to_string(),
        })?;
        tuning.validate()?;
        Ok(tuning)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.lane_capacity == 0 || self.outbound_capacity == 0 {
            return Err(SettingsError::Invalid {
                message: "queue capacities must be positive".to_string(),
            });
        }
        if self.token_length < 16 {
            return Err(SettingsError::Invalid {
                message: "token_length must be at least 16".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                message: "fetch_timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn lane_send_timeout(&self) -> Duration {
        Duration::from_millis(self.lane_send_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn correlation_ttl(&self) -> Duration {
        Duration::from_secs(self.correlation_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(Tuning::parse("").unwrap(), Tuning::default());
    }

    #[test]
    fn overrides_selected_keys() {
        let tuning = Tuning::parse("lane_capacity = 8\nfetch_timeout_secs = 5\n").unwrap();
        assert_eq!(tuning.lane_capacity, 8);
        assert_eq!(tuning.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(tuning.outbound_capacity, 256);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(Tuning::parse("lane_capcity = 8").is_err());
        assert!(Tuning::parse("token_length = 4").is_err());
        assert!(Tuning::parse("lane_capacity = 0").is_err());
    }

    #[test]
    fn missing_path_is_default() {
        assert_eq!(Tuning::load(None).unwrap(), Tuning::default());
    }
}
