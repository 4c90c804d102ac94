//! Engine Configuration
//!
//! A JSON file with every field optional. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{services_or_default, DefaultCatalog, JsonFileCatalog, ServiceCatalog, ServiceCatalogEntry};
use crate::coords::{MarginPolicy, DEFAULT_TAG_MARGIN};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_tag_margin")]
    pub tag_margin: f64,
    #[serde(default = "default_debounce_ms")]
    pub lookup_debounce_ms: u64,
    #[serde(default = "default_min_digits")]
    pub lookup_min_digits: usize,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

fn default_tag_margin() -> f64 { DEFAULT_TAG_MARGIN }
fn default_debounce_ms() -> u64 { 500 }
fn default_min_digits() -> usize { 9 }
fn default_storage_dir() -> PathBuf { PathBuf::from("estimates") }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tag_margin: default_tag_margin(),
            lookup_debounce_ms: default_debounce_ms(),
            lookup_min_digits: default_min_digits(),
            catalog_path: None,
            storage_dir: default_storage_dir(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn margin_policy(&self) -> MarginPolicy {
        MarginPolicy::new(self.tag_margin)
    }

    pub fn lookup_debounce(&self) -> Duration {
        Duration::from_millis(self.lookup_debounce_ms)
    }

    /// Configured catalog file if any, else the built-in set.
    pub fn catalog(&self) -> Box<dyn ServiceCatalog> {
        match &self.catalog_path {
            Some(path) => Box::new(JsonFileCatalog::new(path)),
            None => Box::new(DefaultCatalog),
        }
    }

    pub fn services(&self) -> Vec<ServiceCatalogEntry> {
        services_or_default(self.catalog().as_ref())
    }
}
