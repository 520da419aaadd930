//! Config validation CLI tool
//!
//! Validates a flashdeckd configuration file and reports any errors.

use flashdeck_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a flashdeckd configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match flashdeck_config::load_config(&config_path) {
        Ok(settings) => {
            let s = &settings.scheduler;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", flashdeck_config::CURRENT_CONFIG_VERSION);
            println!("  Socket: {}", settings.service.socket_path.display());
            println!("  Data dir: {}", settings.service.data_dir.display());
            println!(
                "  Ease: initial {} (range {}..={})",
                s.initial_ease, s.minimum_ease, s.maximum_ease
            );
            println!(
                "  Adjustments: forgot -{}, hard -{}, easy +{}",
                s.forgot_penalty, s.hard_penalty, s.easy_bonus
            );
            println!(
                "  Intervals: hard x{}, relearn {}d, max {}d",
                s.hard_multiplier, s.relearn_interval_days, s.maximum_interval_days
            );
            println!(
                "  Default limits: due {}, study {}",
                settings.selection.due_default_limit, settings.selection.study_default_limit
            );
            println!("  Review attempts: {}", settings.review.max_attempts);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                flashdeck_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                flashdeck_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                flashdeck_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                flashdeck_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        flashdeck_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
