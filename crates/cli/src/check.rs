//! The `validate` and `health` commands over published feed files.

use std::process::ExitCode;
use std::time::{Duration, SystemTime};

use noticefeed_client::{Health, check_health, validate_feed};
use noticefeed_core::{AppConfig, SourceConfig};

/// Structural check of every selected feed. Fails if any is missing or invalid.
pub fn validate(config: &AppConfig, sources: &[&SourceConfig]) -> ExitCode {
    let mut failed = 0usize;

    for source in sources {
        let path = config.output_path(source);
        match validate_feed(&path) {
            Ok(summary) => {
                tracing::info!(source = %source.id, path = %path.display(), items = summary.items, "feed valid");
                println!("{:<24} OK ({} items)", source.id, summary.items);
            }
            Err(e) => {
                failed += 1;
                tracing::error!(source = %source.id, path = %path.display(), error = %e, "feed invalid");
                println!("{:<24} INVALID: {e}", source.id);
            }
        }
    }

    exit_code(failed)
}

/// Freshness check of every selected feed against its `health_max_age_hours`.
pub fn health(config: &AppConfig, sources: &[&SourceConfig], now: SystemTime) -> ExitCode {
    let mut failed = 0usize;

    for source in sources {
        let path = config.output_path(source);
        let max_age = Duration::from_secs(source.health_max_age_hours.saturating_mul(3600));
        let health = check_health(&path, max_age, now);

        let line = match &health {
            Health::Fresh { items, age } => format!("OK ({items} items, updated {}m ago)", age.as_secs() / 60),
            Health::Stale { age, max_age } => {
                format!("STALE (updated {}h ago, limit {}h)", age.as_secs() / 3600, max_age.as_secs() / 3600)
            }
            Health::Empty => "EMPTY (no items)".to_string(),
            Health::Missing => format!("MISSING ({})", path.display()),
            Health::Invalid(reason) => format!("INVALID: {reason}"),
        };

        if health.is_ok() {
            tracing::info!(source = %source.id, status = %line, "feed healthy");
        } else {
            failed += 1;
            tracing::error!(source = %source.id, status = %line, "feed unhealthy");
        }
        println!("{:<24} {line}", source.id);
    }

    exit_code(failed)
}

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
