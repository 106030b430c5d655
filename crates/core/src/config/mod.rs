//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NOTICEFEED_*)
//! 2. TOML config file (`--config` or NOTICEFEED_CONFIG_FILE)
//! 3. Built-in defaults, including the default source list

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod source;
mod validation;

pub use source::{
    Backoff, CardSelectors, DateSource, ExtractorSpec, FeedMeta, RetryConfig, SourceConfig, TableLayout,
    default_sources,
};
pub use validation::ConfigError;

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NOTICEFEED_*)
/// 2. TOML config file
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding per-source cache records and the run lock.
    ///
    /// Set via NOTICEFEED_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Base directory for relative feed output paths.
    ///
    /// Set via NOTICEFEED_OUTPUT_DIR environment variable.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via NOTICEFEED_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via NOTICEFEED_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via NOTICEFEED_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Set via NOTICEFEED_LOG_FORMAT environment variable (`text` or `json`).
    #[serde(default)]
    pub log_format: LogFormat,

    /// Age in seconds after which a leftover run lock is taken over.
    ///
    /// Set via NOTICEFEED_LOCK_STALE_SECS environment variable.
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,

    /// Boards to syndicate, processed in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".noticefeed")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_user_agent() -> String {
    concat!("Mozilla/5.0 (compatible; noticefeed/", env!("CARGO_PKG_VERSION"), ")").into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_lock_stale_secs() -> u64 {
    3_600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            log_format: LogFormat::default(),
            lock_stale_secs: default_lock_stale_secs(),
            sources: default_sources(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }

    /// Resolve a source's feed path against `output_dir`.
    pub fn output_path(&self, source: &SourceConfig) -> PathBuf {
        if source.output.is_absolute() { source.output.clone() } else { self.output_dir.join(&source.output) }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `NOTICEFEED_`
    /// 2. TOML file from `config_file`, else from `NOTICEFEED_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read or parsed
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let env_file = std::env::var("NOTICEFEED_CONFIG_FILE").ok().map(PathBuf::from);
        if let Some(path) = config_file.map(Path::to_path_buf).or(env_file) {
            if !path.exists() {
                return Err(ConfigError::Missing {
                    field: "config_file".into(),
                    hint: format!("{} does not exist", path.display()),
                });
            }
            figment = figment.merge(Toml::file(&path));
        }

        figment = figment.merge(
            Env::prefixed("NOTICEFEED_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Restrict the run to the given source ids, preserving configured order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if an id is not configured.
    pub fn select_sources(&self, ids: &[String]) -> Result<Vec<&SourceConfig>, ConfigError> {
        if let Some(unknown) = ids.iter().find(|id| !self.sources.iter().any(|s| &s.id == *id)) {
            return Err(ConfigError::Invalid { field: "source".into(), reason: format!("unknown source id '{unknown}'") });
        }

        Ok(self
            .sources
            .iter()
            .filter(|s| ids.is_empty() || ids.contains(&s.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from(".noticefeed"));
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.user_agent.contains("noticefeed/"));
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_output_path_relative_and_absolute() {
        let mut config = AppConfig { output_dir: PathBuf::from("/srv/feeds"), ..Default::default() };
        assert_eq!(config.output_path(&config.sources[0]), PathBuf::from("/srv/feeds/feed.xml"));

        config.sources[0].output = PathBuf::from("/tmp/aust.xml");
        assert_eq!(config.output_path(&config.sources[0]), PathBuf::from("/tmp/aust.xml"));
    }

    #[test]
    fn test_select_sources() {
        let config = AppConfig::default();
        assert_eq!(config.select_sources(&[]).unwrap().len(), 2);

        let picked = config.select_sources(&["shed-scholarship".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "shed-scholarship");

        let result = config.select_sources(&["nope".to_string()]);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "source"));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "noticefeed.toml",
                r#"
                cache_dir = "state"
                timeout_ms = 5000

                [[sources]]
                id = "dept"
                url = "https://dept.example.edu/notices"
                output = "dept.xml"
                max_items = 20

                [sources.feed]
                title = "Department notices"
                description = "Notices from the department"

                [sources.extractor]
                kind = "table"
                link_column = 4
                "#,
            )?;
            jail.set_env("NOTICEFEED_TIMEOUT_MS", "7000");
            jail.set_env("NOTICEFEED_LOG_FORMAT", "json");

            let config = AppConfig::load(Some(Path::new("noticefeed.toml"))).expect("config loads");
            assert_eq!(config.cache_dir, PathBuf::from("state"));
            assert_eq!(config.timeout_ms, 7000);
            assert_eq!(config.log_format, LogFormat::Json);
            assert_eq!(config.sources.len(), 1);

            let source = &config.sources[0];
            assert_eq!(source.max_items, 20);
            assert_eq!(source.forced_refresh_days, 7);
            assert_eq!(source.retry, RetryConfig::default());
            match &source.extractor {
                ExtractorSpec::Table(layout) => {
                    assert_eq!(layout.link_column, 4);
                    assert_eq!(layout.title_column, 1);
                }
                other => panic!("unexpected extractor: {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_file() {
        figment::Jail::expect_with(|_jail| {
            let result = AppConfig::load(Some(Path::new("absent.toml")));
            assert!(matches!(result, Err(ConfigError::Missing { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_load_defaults_without_file() {
        figment::Jail::expect_with(|_jail| {
            let config = AppConfig::load(None).expect("defaults load");
            assert_eq!(config.sources, default_sources());
            Ok(())
        });
    }
}
