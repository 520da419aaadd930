//! Configuration validation

use crate::schema::RawConfig;
use crate::settings::{ReviewPolicy, SchedulerParams, SelectionDefaults};
use thiserror::Error;

/// Bounds shared with the selectors' limit clamping
pub const MIN_QUERY_LIMIT: u32 = 1;
pub const MAX_QUERY_LIMIT: u32 = 100;

/// Upper bound for the review retry budget
pub const MAX_REVIEW_ATTEMPTS: u32 = 10;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("scheduler.{field}: {message}")]
    SchedulerError { field: &'static str, message: String },

    #[error("selection.{field}: {message}")]
    SelectionError { field: &'static str, message: String },

    #[error("review.max_attempts: {0}")]
    ReviewError(String),

    #[error("service: {0}")]
    ServiceError(String),
}

/// Validate a raw configuration.
///
/// Checks the effective values, so omitted fields are validated against the
/// defaults they will take.
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_scheduler(&SchedulerParams::from_raw(&config.scheduler)));

    let selection = SelectionDefaults {
        due_default_limit: config
            .selection
            .due_default_limit
            .unwrap_or(SelectionDefaults::default().due_default_limit),
        study_default_limit: config
            .selection
            .study_default_limit
            .unwrap_or(SelectionDefaults::default().study_default_limit),
    };
    for (field, value) in [
        ("due_default_limit", selection.due_default_limit),
        ("study_default_limit", selection.study_default_limit),
    ] {
        if !(MIN_QUERY_LIMIT..=MAX_QUERY_LIMIT).contains(&value) {
            errors.push(ValidationError::SelectionError {
                field,
                message: format!("{value} is outside {MIN_QUERY_LIMIT}..={MAX_QUERY_LIMIT}"),
            });
        }
    }

    let attempts = config
        .review
        .max_attempts
        .unwrap_or(ReviewPolicy::default().max_attempts);
    if !(1..=MAX_REVIEW_ATTEMPTS).contains(&attempts) {
        errors.push(ValidationError::ReviewError(format!(
            "{attempts} is outside 1..={MAX_REVIEW_ATTEMPTS}"
        )));
    }

    if config.service.requests_per_second == Some(0) {
        errors.push(ValidationError::ServiceError(
            "requests_per_second must be at least 1".into(),
        ));
    }

    errors
}

fn validate_scheduler(params: &SchedulerParams) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut fail = |field: &'static str, message: String| {
        errors.push(ValidationError::SchedulerError { field, message });
    };

    let floats = [
        ("initial_ease", params.initial_ease),
        ("minimum_ease", params.minimum_ease),
        ("maximum_ease", params.maximum_ease),
        ("forgot_penalty", params.forgot_penalty),
        ("hard_penalty", params.hard_penalty),
        ("easy_bonus", params.easy_bonus),
        ("hard_multiplier", params.hard_multiplier),
    ];
    if let Some((field, _)) = floats.iter().find(|(_, v)| !v.is_finite()) {
        fail(*field, "must be a finite number".into());
        return errors;
    }

    if params.minimum_ease < 1.0 {
        fail("minimum_ease", format!("{} is below 1.0", params.minimum_ease));
    }
    if params.minimum_ease > params.maximum_ease {
        fail(
            "minimum_ease",
            format!(
                "{} exceeds maximum_ease {}",
                params.minimum_ease, params.maximum_ease
            ),
        );
    } else if !(params.minimum_ease..=params.maximum_ease).contains(&params.initial_ease) {
        fail(
            "initial_ease",
            format!(
                "{} is outside {}..={}",
                params.initial_ease, params.minimum_ease, params.maximum_ease
            ),
        );
    }

    for (field, value) in [
        ("forgot_penalty", params.forgot_penalty),
        ("hard_penalty", params.hard_penalty),
        ("easy_bonus", params.easy_bonus),
    ] {
        if value < 0.0 {
            fail(field, format!("{value} is negative"));
        }
    }

    if params.hard_multiplier < 1.0 {
        fail("hard_multiplier", format!("{} is below 1.0", params.hard_multiplier));
    }
    if params.relearn_interval_days > 1 {
        fail(
            "relearn_interval_days",
            format!("{} must be 0 or 1", params.relearn_interval_days),
        );
    }
    if params.maximum_interval_days == 0
        || params.maximum_interval_days > SchedulerParams::DEFAULT_MAXIMUM_INTERVAL_DAYS
    {
        fail(
            "maximum_interval_days",
            format!(
                "{} is outside 1..={}",
                params.maximum_interval_days,
                SchedulerParams::DEFAULT_MAXIMUM_INTERVAL_DAYS
            ),
        );
    }

    errors
}
