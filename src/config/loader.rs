//! Configuration Loader
//!
//! Layers an optional TOML file under `POLLER__*` environment overrides and
//! validates the result. `DATABASE_URL`, when present, wins over both.

use super::error::{ConfigResult, ConfigurationError};
use super::PollerConfig;
use crate::constants::{CONFIG_ENV_PREFIX, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: PollerConfig,
    environment: String,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from_file(path.as_deref())
    }

    /// Load configuration from an explicit file, or the default location when `None`.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load_from_file(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = Self::build(Some((&file, required)), None)?;
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }
        config.validate()?;

        let source_file = file.exists().then_some(file);
        info!(
            environment = %environment,
            config_file = ?source_file,
            batch_size = config.scheduler.batch_size,
            max_concurrency = config.worker_pool.max_concurrency,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_file,
        }))
    }

    /// Wrap an already-built configuration (tests, embedders)
    pub fn from_config(config: PollerConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            source_file: None,
        }))
    }

    /// Merge file and environment sources into a [`PollerConfig`].
    ///
    /// `env_source` replaces the process environment, which keeps tests
    /// independent of the variables set around them.
    pub(crate) fn build(
        file: Option<(&Path, bool)>,
        env_source: Option<HashMap<String, String>>,
    ) -> ConfigResult<PollerConfig> {
        let mut builder = Config::builder();

        if let Some((path, required)) = file {
            if required && !path.exists() {
                return Err(ConfigurationError::FileNotFound(
                    path.display().to_string(),
                ));
            }
            debug!(path = %path.display(), required, "Adding configuration file source");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        let environment = Environment::with_prefix(CONFIG_ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(env_source);
        builder = builder.add_source(environment);

        let config = builder.build()?.try_deserialize::<PollerConfig>()?;
        Ok(config)
    }

    /// `POLLER_ENV`, then `APP_ENV`, then "development"
    pub fn detect_environment() -> String {
        crate::logging::get_environment()
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_optional_file_yields_defaults() {
        let config = ConfigManager::build(
            Some((Path::new("/nonexistent/poller.toml"), false)),
            Some(HashMap::new()),
        )
        .unwrap();
        assert_eq!(config.scheduler.max_delay_ms, 5000);
        assert_eq!(config.publisher.queue_name, "live_events_scores");
    }

    #[test]
    fn test_missing_required_file_is_an_error() {
        let err = ConfigManager::build(
            Some((Path::new("/nonexistent/poller.toml"), true)),
            Some(HashMap::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::FileNotFound(_)));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = toml_file(
            r#"
[scheduler]
batch_size = 25

[tasks]
execution_interval_seconds = 5
"#,
        );
        let config = ConfigManager::build(Some((file.path(), true)), Some(HashMap::new())).unwrap();
        assert_eq!(config.scheduler.batch_size, 25);
        assert_eq!(config.scheduler.min_delay_ms, 100);
        assert_eq!(config.tasks.execution_interval_seconds, 5);
        assert_eq!(config.tasks.in_flight_timeout_seconds, 30);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("[worker_pool]\nmax_concurrency = 4\n");
        let env = HashMap::from([
            (
                "POLLER__WORKER_POOL__MAX_CONCURRENCY".to_string(),
                "32".to_string(),
            ),
            (
                "POLLER__SCORE_API__BASE_URL".to_string(),
                "http://scores.internal".to_string(),
            ),
        ]);
        let config = ConfigManager::build(Some((file.path(), true)), Some(env)).unwrap();
        assert_eq!(config.worker_pool.max_concurrency, 32);
        assert_eq!(config.score_api.base_url, "http://scores.internal");
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let file = toml_file("[scheduler]\nbatch_size = \"lots\"\n");
        let err = ConfigManager::build(Some((file.path(), true)), Some(HashMap::new())).unwrap_err();
        assert!(matches!(err, ConfigurationError::ParseError(_)));
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = PollerConfig::default();
        config.scheduler.batch_size = 0;
        assert!(ConfigManager::from_config(config).is_err());
    }
}
