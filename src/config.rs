//! Service configuration.
//!
//! Sources, later overriding earlier:
//! 1. built-in defaults,
//! 2. an optional YAML file,
//! 3. environment variables prefixed `OBJECTS`, nested with `__`
//!    (e.g. `OBJECTS__RUNTIME__BATCH_MAX_OPS=64`).

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::{paginate::PageRequest, runtime::handle::RuntimeConfig};

/// Environment prefix for overrides.
pub const CONFIG_ENV_PREFIX: &str = "OBJECTS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] ::config::ConfigError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Page size when the caller sends no usable `limit`.
    pub default_limit: usize,
    /// Upper bound applied to any caller `limit`.
    pub max_limit: usize,
    /// Store pages fetched at most per filtered request.
    pub max_filter_pages: usize,
    /// Items per store page while filtering.
    pub filter_page_size: usize,
    /// SQLite journal location; in-memory when unset.
    pub db_path: Option<PathBuf>,
    pub runtime: RuntimeConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 100,
            max_filter_pages: 10,
            filter_page_size: 100,
            db_path: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
        }
        let cfg: ServiceConfig = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(ConfigError::Invalid("limits must be positive".to_string()));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        if self.max_filter_pages == 0 || self.filter_page_size == 0 {
            return Err(ConfigError::Invalid(
                "filter paging must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sizing of one list request returning up to `limit` items.
    pub fn page_request(&self, limit: usize) -> PageRequest {
        PageRequest {
            limit,
            page_size: self.filter_page_size,
            max_pages: self.max_filter_pages,
        }
    }
}
