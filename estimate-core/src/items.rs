//! Line Items, Photos and Damage Tags

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{ServiceCatalogEntry, ServiceKey};
use crate::coords::PositionFraction;
use crate::money::{apply_discount, non_negative};

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// `unit_price × quantity × (1 − discount/100)`, never negative.
pub fn line_total(unit_price: f64, quantity: f64, discount_percent: f64) -> f64 {
    apply_discount(non_negative(unit_price) * non_negative(quantity), discount_percent)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItem {
    pub id: String,
    pub key: ServiceKey,
    pub name_local: String,
    #[serde(default)]
    pub name_alt: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub discount_percent: f64,
    /// Set when the line was created by tagging a photo.
    #[serde(default)]
    pub tag_id: Option<String>,
}

impl ServiceLineItem {
    /// One unit at the catalog base price.
    pub fn from_catalog(entry: &ServiceCatalogEntry) -> Self {
        Self {
            id: new_id(),
            key: entry.key.clone(),
            name_local: entry.name_local.clone(),
            name_alt: entry.name_alt.clone(),
            quantity: 1.0,
            unit_price: entry.base_price,
            discount_percent: 0.0,
            tag_id: None,
        }
    }

    pub fn raw_total(&self) -> f64 {
        non_negative(self.unit_price) * non_negative(self.quantity)
    }

    pub fn line_total(&self) -> f64 {
        line_total(self.unit_price, self.quantity, self.discount_percent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartLineItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_local: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub discount_percent: f64,
}

impl PartLineItem {
    pub fn new(name: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            name_local: None,
            quantity: non_negative(quantity),
            unit_price,
            discount_percent: 0.0,
        }
    }

    pub fn raw_total(&self) -> f64 {
        non_negative(self.unit_price) * non_negative(self.quantity)
    }

    pub fn line_total(&self) -> f64 {
        line_total(self.unit_price, self.quantity, self.discount_percent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DamageTag {
    pub id: String,
    pub photo_id: String,
    pub position: PositionFraction,
    pub service_key: ServiceKey,
    pub service_name_local: String,
    pub unit_price_at_tagging: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub tags: Vec<DamageTag>,
}

impl Photo {
    pub fn new(uri: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            uri: uri.into(),
            label: label.into(),
            tags: vec![],
        }
    }

    /// Anything that is not already an http(s) URL still needs uploading.
    pub fn is_local(&self) -> bool {
        !(self.uri.starts_with("http://") || self.uri.starts_with("https://"))
    }
}
