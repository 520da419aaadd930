//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Daemon settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Spaced-repetition tunables
    #[serde(default)]
    pub scheduler: RawSchedulerConfig,

    /// Default sizes for due/study queries
    #[serde(default)]
    pub selection: RawSelectionConfig,

    /// Review write behaviour
    #[serde(default)]
    pub review: RawReviewConfig,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for the card database
    pub data_dir: Option<PathBuf>,

    /// Per-client request budget
    pub requests_per_second: Option<u32>,
}

/// Scheduler tunables. Anything left out uses the built-in default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSchedulerConfig {
    pub initial_ease: Option<f64>,
    pub minimum_ease: Option<f64>,
    pub maximum_ease: Option<f64>,
    pub forgot_penalty: Option<f64>,
    pub hard_penalty: Option<f64>,
    pub easy_bonus: Option<f64>,
    pub hard_multiplier: Option<f64>,
    pub relearn_interval_days: Option<u32>,
    pub maximum_interval_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSelectionConfig {
    pub due_default_limit: Option<u32>,
    pub study_default_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawReviewConfig {
    /// Attempts at the compare-and-swap write before reporting a conflict
    pub max_attempts: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_sections() {
        let toml_str = r#"
            config_version = 1

            [service]
            socket_path = "/tmp/fd.sock"
            requests_per_second = 10

            [scheduler]
            initial_ease = 2.3
            relearn_interval_days = 1

            [selection]
            study_default_limit = 25

            [review]
            max_attempts = 5
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.socket_path, Some(PathBuf::from("/tmp/fd.sock")));
        assert_eq!(config.scheduler.initial_ease, Some(2.3));
        assert_eq!(config.scheduler.relearn_interval_days, Some(1));
        assert!(config.scheduler.minimum_ease.is_none());
        assert_eq!(config.selection.study_default_limit, Some(25));
        assert_eq!(config.review.max_attempts, Some(5));
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.service.data_dir.is_none());
        assert!(config.selection.due_default_limit.is_none());
    }
}
