//! Checks run on a loaded `AppConfig` before any source is touched.
//!
//! Field names in errors follow the TOML shape, e.g. `sources[aust].url`.

use std::collections::HashSet;

use crate::config::{AppConfig, ExtractorSpec, SourceConfig};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - no sources are configured, or two share an id or cache key
    /// - any source fails [`SourceConfig::validate`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.sources.is_empty() {
            return Err(ConfigError::Missing {
                field: "sources".into(),
                hint: "add at least one [[sources]] table to the config file".into(),
            });
        }

        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for source in &self.sources {
            if !ids.insert(source.id.as_str()) {
                return Err(invalid("sources.id", format!("duplicate source id '{}'", source.id)));
            }
            if !keys.insert(source.cache_key()) {
                return Err(invalid("sources.cache_key", format!("duplicate cache key '{}'", source.cache_key())));
            }
            source.validate()?;
        }

        Ok(())
    }
}

impl SourceConfig {
    /// Validate a single source definition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("sources[{}].{}", self.id, name);

        if self.id.trim().is_empty() {
            return Err(invalid("sources.id", "must not be empty"));
        }
        if !self.cache_key().chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(invalid(field("cache_key"), "may only contain ASCII letters, digits, '-', '_' and '.'"));
        }

        check_http_url(&self.url).map_err(|reason| invalid(field("url"), reason))?;
        if let Some(link) = &self.feed.link {
            check_http_url(link).map_err(|reason| invalid(field("feed.link"), reason))?;
        }
        if let Some(self_url) = &self.feed.self_url {
            check_http_url(self_url).map_err(|reason| invalid(field("feed.self_url"), reason))?;
        }

        if self.feed.title.trim().is_empty() {
            return Err(invalid(field("feed.title"), "must not be empty"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(invalid(field("output"), "must not be empty"));
        }
        if self.max_items == 0 {
            return Err(invalid(field("max_items"), "must be at least 1"));
        }
        if self.forced_refresh_days == 0 {
            return Err(invalid(field("forced_refresh_days"), "must be at least 1"));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(invalid(field("utc_offset_hours"), "must be between -12 and 14"));
        }
        if self.retry.attempts == 0 {
            return Err(invalid(field("retry.attempts"), "must be at least 1"));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(invalid(field("retry.base_delay_ms"), "must be at least 1ms"));
        }

        let formats = match &self.extractor {
            ExtractorSpec::Cards(cards) => {
                if cards.item.trim().is_empty() || cards.title.trim().is_empty() {
                    return Err(invalid(field("extractor"), "item and title selectors are required"));
                }
                &cards.date_formats
            }
            ExtractorSpec::Table(layout) => &layout.date_formats,
        };
        if formats.is_empty() {
            return Err(invalid(field("extractor.date_formats"), "must list at least one format"));
        }

        Ok(())
    }
}

fn check_http_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("unsupported scheme: {scheme}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_sources;

    fn with_source(f: impl FnOnce(&mut SourceConfig)) -> AppConfig {
        let mut config = AppConfig::default();
        f(&mut config.sources[0]);
        config
    }

    fn invalid_field(result: Result<(), ConfigError>) -> String {
        match result {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(invalid_field(config.validate()), "max_bytes");
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(config.validate()), "timeout_ms");

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(invalid_field(config.validate()), "timeout_ms");

        let config = AppConfig { timeout_ms: 100, max_bytes: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(invalid_field(config.validate()), "user_agent");
    }

    #[test]
    fn test_validate_no_sources() {
        let config = AppConfig { sources: Vec::new(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let mut sources = default_sources();
        sources[1].id = sources[0].id.clone();
        let config = AppConfig { sources, ..Default::default() };
        assert_eq!(invalid_field(config.validate()), "sources.id");
    }

    #[test]
    fn test_validate_duplicate_cache_keys() {
        let mut sources = default_sources();
        sources[1].cache_key = Some("aust".into());
        let config = AppConfig { sources, ..Default::default() };
        assert_eq!(invalid_field(config.validate()), "sources.cache_key");
    }

    #[test]
    fn test_validate_cache_key_charset() {
        let config = with_source(|s| s.cache_key = Some("../escape".into()));
        assert_eq!(invalid_field(config.validate()), "sources[aust].cache_key");
    }

    #[test]
    fn test_validate_source_url() {
        let config = with_source(|s| s.url = "ftp://aust.edu/notice".into());
        assert_eq!(invalid_field(config.validate()), "sources[aust].url");

        let config = with_source(|s| s.url = "not a url".into());
        assert_eq!(invalid_field(config.validate()), "sources[aust].url");
    }

    #[test]
    fn test_validate_source_limits() {
        let config = with_source(|s| s.max_items = 0);
        assert_eq!(invalid_field(config.validate()), "sources[aust].max_items");

        let config = with_source(|s| s.forced_refresh_days = 0);
        assert_eq!(invalid_field(config.validate()), "sources[aust].forced_refresh_days");

        let config = with_source(|s| s.retry.attempts = 0);
        assert_eq!(invalid_field(config.validate()), "sources[aust].retry.attempts");

        let config = with_source(|s| s.retry.base_delay_ms = 0);
        assert_eq!(invalid_field(config.validate()), "sources[aust].retry.base_delay_ms");

        let config = with_source(|s| s.utc_offset_hours = 20);
        assert_eq!(invalid_field(config.validate()), "sources[aust].utc_offset_hours");
    }

    #[test]
    fn test_validate_empty_feed_title() {
        let config = with_source(|s| s.feed.title = "  ".into());
        assert_eq!(invalid_field(config.validate()), "sources[aust].feed.title");
    }

    #[test]
    fn test_validate_date_formats_required() {
        let config = with_source(|s| {
            if let ExtractorSpec::Cards(cards) = &mut s.extractor {
                cards.date_formats.clear();
            }
        });
        assert_eq!(invalid_field(config.validate()), "sources[aust].extractor.date_formats");
    }
}
