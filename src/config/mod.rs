//! Configuration for egrul-ingest

mod logging;
mod pipeline;
mod registry;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use pipeline::{LinksConfig, PoolConfig, StoreConfig};
pub use registry::{InputConfig, RegistryConfig};

use crate::extract::{encoding_for_label, Registry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;
use url::Url;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "egrul-ingest.toml";

/// Environment variable selecting the registry (`egrul` / `egrip`)
pub const ENV_REGISTRY_TYPE: &str = "REGISTRY_TYPE";

/// Environment variable requesting a store reset before the run
pub const ENV_DROP_DATABASE: &str = "DROP_DATABASE";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `REGISTRY_TYPE` and `DROP_DATABASE` from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup(ENV_REGISTRY_TYPE) {
            self.registry.kind = kind
                .parse::<Registry>()
                .map_err(|e| anyhow::anyhow!("{}: {}", ENV_REGISTRY_TYPE, e))?;
        }
        if let Some(flag) = lookup(ENV_DROP_DATABASE) {
            match flag.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => self.store.drop_existing = true,
                "false" | "0" | "no" | "" => self.store.drop_existing = false,
                other => warn!("Ignoring {}={:?}", ENV_DROP_DATABASE, other),
            }
        }
        Ok(())
    }

    /// Validate all configuration fields.
    ///
    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if encoding_for_label(&self.registry.encoding).is_none() {
            errors.push(format!("unknown encoding '{}'", self.registry.encoding));
        }

        if self.input.member_extension.trim().is_empty() {
            errors.push("member_extension must not be empty".to_string());
        }

        if self.store.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }
        if self.store.batch_size == 0 {
            errors.push("batch_size must be positive".to_string());
        }

        if self.links.file_size == 0 {
            errors.push("links file_size must be positive".to_string());
        }
        match Url::parse(&self.links.hostname) {
            Ok(url) if url.cannot_be_a_base() => {
                errors.push(format!("links hostname '{}' cannot be a base URL", self.links.hostname));
            }
            Ok(_) => {}
            Err(e) => {
                errors.push(format!("links hostname '{}' is not a URL: {}", self.links.hostname, e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }

    /// Resolved member encoding
    pub fn encoding(&self) -> Result<&'static encoding_rs::Encoding> {
        encoding_for_label(&self.registry.encoding)
            .ok_or_else(|| anyhow::anyhow!("unknown encoding '{}'", self.registry.encoding))
    }
}
