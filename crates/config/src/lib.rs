//! Configuration loading and platform directory discovery.
//!
//! Settings are merged in layers: compiled defaults, then `folio.toml` in
//! the platform config directory, then `FOLIO_*` environment variables.
//! Later layers win.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "folio.toml";
const ENV_PREFIX: &str = "FOLIO_";

/// Application-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory downloaded books are cached into. When unset, the
    /// platform cache directory is used.
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(dirs) = project_dirs() {
            figment = figment.merge(Toml::file(dirs.config_dir().join(CONFIG_FILENAME)));
        } else {
            tracing::warn!("no platform config directory; using defaults and environment only");
        }
        extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load configuration from an explicit file instead of the platform
    /// config directory. Environment variables still apply on top.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX));
        extract(figment)
    }

    /// The effective cache directory: the configured one, or the platform
    /// cache directory.
    ///
    /// # Errors
    /// [`Discovery`](ErrorKind::Discovery) when nothing is configured and
    /// the platform convention cannot be resolved.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        match project_dirs() {
            Some(dirs) => Ok(dirs.cache_dir().to_path_buf()),
            None => exn::bail!(ErrorKind::Discovery),
        }
    }
}

fn extract(figment: Figment) -> Result<Config> {
    match figment.extract() {
        Ok(config) => Ok(config),
        Err(e) => exn::bail!(ErrorKind::Malformed(e.to_string())),
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "folio")
}
