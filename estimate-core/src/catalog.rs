//! Service Catalog - Remote or Built-in, Chosen at the Call Site
//!
//! The pricing engine never knows where catalog entries came from.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

pub type ServiceKey = String;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Body,
    Paint,
    Glass,
    Mechanical,
    Detailing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCatalogEntry {
    pub key: ServiceKey,
    pub name_local: String,
    #[serde(default)]
    pub name_alt: Option<String>,
    #[serde(default)]
    pub category: Category,
    pub base_price: f64,
}

/// Source of service entries.
pub trait ServiceCatalog {
    fn name(&self) -> &'static str;
    fn all_services(&self) -> Result<Vec<ServiceCatalogEntry>, CatalogError>;
}

/// Catalog exported to a JSON file (an array of entries).
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ServiceCatalog for JsonFileCatalog {
    fn name(&self) -> &'static str { "json_file" }

    fn all_services(&self) -> Result<Vec<ServiceCatalogEntry>, CatalogError> {
        let content = fs::read_to_string(&self.path)?;
        let entries: Vec<ServiceCatalogEntry> = serde_json::from_str(&content)?;
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        debug!(path = %self.path.display(), count = entries.len(), "loaded service catalog");
        Ok(entries)
    }
}

/// Hard-coded catalog used whenever the primary source fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCatalog;

impl ServiceCatalog for DefaultCatalog {
    fn name(&self) -> &'static str { "default" }

    fn all_services(&self) -> Result<Vec<ServiceCatalogEntry>, CatalogError> {
        Ok(default_services())
    }
}

fn entry(key: &str, name: &str, category: Category, base_price: f64) -> ServiceCatalogEntry {
    ServiceCatalogEntry {
        key: key.to_string(),
        name_local: name.to_string(),
        name_alt: None,
        category,
        base_price,
    }
}

pub fn default_services() -> Vec<ServiceCatalogEntry> {
    vec![
        entry("dent_repair", "Dent repair", Category::Body, 150.0),
        entry("bumper_repair", "Bumper repair", Category::Body, 200.0),
        entry("panel_replacement", "Panel replacement", Category::Body, 350.0),
        entry("paint_panel", "Panel painting", Category::Paint, 250.0),
        entry("paint_touch_up", "Paint touch-up", Category::Paint, 80.0),
        entry("windshield_replacement", "Windshield replacement", Category::Glass, 400.0),
        entry("headlight_restoration", "Headlight restoration", Category::Detailing, 60.0),
        entry("polishing", "Polishing", Category::Detailing, 100.0),
        entry("suspension_check", "Suspension check", Category::Mechanical, 90.0),
    ]
}

/// Try the primary catalog, fall back to the built-in set on any failure.
pub fn services_or_default(primary: &dyn ServiceCatalog) -> Vec<ServiceCatalogEntry> {
    match primary.all_services() {
        Ok(entries) => entries,
        Err(e) => {
            warn!(source = primary.name(), error = %e, "service catalog unavailable, using defaults");
            default_services()
        }
    }
}

/// Find an entry by key.
pub fn find_service<'a>(entries: &'a [ServiceCatalogEntry], key: &str) -> Option<&'a ServiceCatalogEntry> {
    entries.iter().find(|e| e.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl ServiceCatalog for Offline {
        fn name(&self) -> &'static str { "offline" }

        fn all_services(&self) -> Result<Vec<ServiceCatalogEntry>, CatalogError> {
            Err(CatalogError::Unavailable("no network".into()))
        }
    }

    #[test]
    fn test_fallback_on_failure() {
        let entries = services_or_default(&Offline);
        assert_eq!(entries, default_services());
    }

    #[test]
    fn test_json_file_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"key": "wrap", "nameLocal": "Vinyl wrap", "category": "paint", "basePrice": 900}]"#,
        )
        .unwrap();

        let entries = services_or_default(&JsonFileCatalog::new(&path));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "wrap");
        assert_eq!(entries[0].category, Category::Paint);
        assert_eq!(entries[0].base_price, 900.0);
    }

    #[test]
    fn test_missing_or_empty_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFileCatalog::new(dir.path().join("nope.json"));
        assert!(matches!(missing.all_services(), Err(CatalogError::Io(_))));

        let empty_path = dir.path().join("empty.json");
        fs::write(&empty_path, "[]").unwrap();
        let empty = JsonFileCatalog::new(&empty_path);
        assert!(matches!(empty.all_services(), Err(CatalogError::Empty)));
        assert_eq!(services_or_default(&empty).len(), default_services().len());
    }

    #[test]
    fn test_find_service() {
        let entries = default_services();
        assert_eq!(find_service(&entries, "polishing").unwrap().base_price, 100.0);
        assert!(find_service(&entries, "teleport").is_none());
    }
}
