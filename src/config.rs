//! Contains configuration options for the search client
//! and the diagnostics it emits

use crate::request_log::RequestLogConfig;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use sloggers::terminal::TerminalLoggerConfig;

/// Configuration object loaded upon startup
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Configuration {
    /// URL of the Elasticsearch instance to search
    pub url: String,
    /// How failed requests are retried
    pub retry: RetryPolicy,
    /// Logging configuration (for client diagnostic logs, not the request log)
    pub logging: TerminalLoggerConfig,
    /// Request log; requests are not logged if omitted
    pub request_log: Option<RequestLogConfig>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:9200"),
            retry: RetryPolicy::default(),
            logging: TerminalLoggerConfig::default(),
            request_log: None,
        }
    }
}

impl Configuration {
    /// Attempts to load the config from the file, called once at startup
    pub fn try_load(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref();
        Self::load(config::File::with_name(path))
            .context(format!("Could not load config from {}", path))
    }

    fn load<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        // Use config to load the values and merge with the environment
        let mut settings = config::Config::default();
        settings
            .merge(source)
            .context("Could not read in config source")?
            // Add in settings from the environment (with a prefix of SEARCH_DSL)
            // Eg.. `SEARCH_DSL_RETRY__MAX_RETRIES=2 ./target/architus-search-dsl`
            // would set the `retry.max_retries` key to 2
            .merge(config::Environment::with_prefix("SEARCH_DSL").separator("__"))
            .context("could not merge in values from the environment")?;
        let config = settings
            .try_into()
            .context("loading the Configuration struct from the merged config failed")?;
        Ok(config)
    }
}
