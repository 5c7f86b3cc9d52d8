//! Layered configuration.
//!
//! Settings are merged with `figment`, later sources winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `MIPCACHE_*` environment variables, nested with `__`
//!    (e.g. `MIPCACHE_SWEEP__WORKERS=4`)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "MIPCACHE_";

/// Budget used when the amount of system memory can't be determined.
pub const FALLBACK_CACHE_BYTES: u64 = 512 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub sweep: SweepConfig,
}

/// Image cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Byte budget of the tile store. Unset means a quarter of system memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
}

impl CacheConfig {
    /// The configured budget, or the memory-derived default.
    #[must_use]
    pub fn budget(&self) -> u64 {
        self.max_bytes.unwrap_or_else(default_cache_budget)
    }
}

/// Stale file sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Removal workers. Unset means the available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Seconds to wait for submitted removals.
    pub drain_timeout_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: None,
            drain_timeout_secs: 24 * 60 * 60,
        }
    }
}

/// A quarter of total system memory.
#[must_use]
pub fn default_cache_budget() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    match sys.total_memory() {
        0 => FALLBACK_CACHE_BYTES,
        total => total / 4,
    }
}

impl Config {
    /// Load the configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Fails if an explicitly given file doesn't exist, if a file isn't
    /// valid TOML, or if a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
        }
        let file = path.map(Path::to_path_buf).or_else(Self::default_path);
        let config: Self = Self::figment(file.as_deref())
            .extract()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// The provider chain used by [`load`](Self::load).
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Reading config from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Platform config path, e.g. `~/.config/mipcache/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "mipcache", "mipcache")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject values no component can work with.
    ///
    /// # Errors
    ///
    /// Fails when the drain timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.sweep.drain_timeout_secs == 0 {
            bail!("sweep.drain_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Fails if the configuration can't be serialized.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }
}
