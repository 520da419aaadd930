//! Validated settings structures

use crate::schema::{
    RawConfig, RawReviewConfig, RawSchedulerConfig, RawSelectionConfig, RawServiceConfig,
};
use std::path::PathBuf;

/// Validated configuration ready for use by the daemon and the engine
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub scheduler: SchedulerParams,
    pub selection: SelectionDefaults,
    pub review: ReviewPolicy,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            scheduler: SchedulerParams::from_raw(&raw.scheduler),
            selection: SelectionDefaults::from_raw(&raw.selection),
            review: ReviewPolicy::from_raw(&raw.review),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub requests_per_second: u32,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            socket_path: raw.socket_path.unwrap_or(defaults.socket_path),
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            requests_per_second: raw
                .requests_per_second
                .unwrap_or(defaults.requests_per_second),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: flashdeck_util::socket_path_without_env(),
            data_dir: flashdeck_util::data_dir_without_env(),
            requests_per_second: 30,
        }
    }
}

/// Tunables of the SM-2 style review update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerParams {
    /// Ease given to a brand-new card
    pub initial_ease: f64,
    /// Floor that stops ease from collapsing after repeated lapses
    pub minimum_ease: f64,
    /// Ceiling that bounds drift after long easy streaks
    pub maximum_ease: f64,
    /// Ease lost on "forgot"
    pub forgot_penalty: f64,
    /// Ease lost on "hard"
    pub hard_penalty: f64,
    /// Ease gained on "easy"
    pub easy_bonus: f64,
    /// Interval growth on "hard"
    pub hard_multiplier: f64,
    /// Interval after a lapse (0 or 1 day)
    pub relearn_interval_days: u32,
    /// Longest interval ever scheduled
    pub maximum_interval_days: u32,
}

impl SchedulerParams {
    pub const DEFAULT_INITIAL_EASE: f64 = 2.5;
    pub const DEFAULT_MINIMUM_EASE: f64 = 1.3;
    pub const DEFAULT_MAXIMUM_EASE: f64 = 3.0;
    pub const DEFAULT_MAXIMUM_INTERVAL_DAYS: u32 = 36_500;

    pub fn from_raw(raw: &RawSchedulerConfig) -> Self {
        let d = Self::default();
        Self {
            initial_ease: raw.initial_ease.unwrap_or(d.initial_ease),
            minimum_ease: raw.minimum_ease.unwrap_or(d.minimum_ease),
            maximum_ease: raw.maximum_ease.unwrap_or(d.maximum_ease),
            forgot_penalty: raw.forgot_penalty.unwrap_or(d.forgot_penalty),
            hard_penalty: raw.hard_penalty.unwrap_or(d.hard_penalty),
            easy_bonus: raw.easy_bonus.unwrap_or(d.easy_bonus),
            hard_multiplier: raw.hard_multiplier.unwrap_or(d.hard_multiplier),
            relearn_interval_days: raw.relearn_interval_days.unwrap_or(d.relearn_interval_days),
            maximum_interval_days: raw.maximum_interval_days.unwrap_or(d.maximum_interval_days),
        }
    }
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            initial_ease: Self::DEFAULT_INITIAL_EASE,
            minimum_ease: Self::DEFAULT_MINIMUM_EASE,
            maximum_ease: Self::DEFAULT_MAXIMUM_EASE,
            forgot_penalty: 0.2,
            hard_penalty: 0.05,
            easy_bonus: 0.05,
            hard_multiplier: 1.2,
            relearn_interval_days: 0,
            maximum_interval_days: Self::DEFAULT_MAXIMUM_INTERVAL_DAYS,
        }
    }
}

/// Default query sizes when the client omits `limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionDefaults {
    pub due_default_limit: u32,
    pub study_default_limit: u32,
}

impl SelectionDefaults {
    fn from_raw(raw: &RawSelectionConfig) -> Self {
        let d = Self::default();
        Self {
            due_default_limit: raw.due_default_limit.unwrap_or(d.due_default_limit),
            study_default_limit: raw.study_default_limit.unwrap_or(d.study_default_limit),
        }
    }
}

impl Default for SelectionDefaults {
    fn default() -> Self {
        Self {
            due_default_limit: 20,
            study_default_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPolicy {
    pub max_attempts: u32,
}

impl ReviewPolicy {
    fn from_raw(raw: &RawReviewConfig) -> Self {
        Self {
            max_attempts: raw.max_attempts.unwrap_or(Self::default().max_attempts),
        }
    }
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}
