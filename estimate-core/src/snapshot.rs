//! Estimate Snapshot Builder - Single Entry Point to Persistence
//!
//! CRITICAL: build MUST call validate internally. No bypass.
//! Building is pure: the same draft and timestamp give the same record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::aggregate::GroupedServiceLine;
use crate::coords::PositionFraction;
use crate::draft::EstimateDraft;
use crate::hashing::compute_record_hash;
use crate::items::{PartLineItem, Photo};
use crate::money::{clamp_percent, non_negative, round_currency};
use crate::validation::{ValidationResult, Validator};
use crate::{ENGINE_VERSION, MIN_RECORD_VERSION};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Validation failed: {}", .0.summary())]
    ValidationFailed(ValidationResult),

    #[error("Record version {0} is older than the minimum supported {1}")]
    IncompatibleVersion(String, String),

    #[error("Invalid record version: {0}")]
    InvalidVersion(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordService {
    pub service_key: String,
    pub service_name: String,
    pub service_name_local: String,
    pub price: f64,
    pub count: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordPart {
    pub name: String,
    pub name_local: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordTag {
    pub x: f64,
    pub y: f64,
    pub service_key: String,
    pub service_name_local: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordPhoto {
    pub url: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<RecordTag>,
}

/// The persisted estimate / invoice record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRecord {
    pub customer_name: String,
    pub customer_phone: String,
    pub car_make: String,
    pub car_model: String,
    #[serde(default)]
    pub car_make_id: Option<String>,
    #[serde(default)]
    pub car_model_id: Option<String>,
    pub plate: String,

    pub total_price: f64,
    pub services_total: f64,
    pub parts_total: f64,

    pub services: Vec<RecordService>,
    pub parts: Vec<RecordPart>,
    pub photos: Vec<RecordPhoto>,

    #[serde(rename = "services_discount_percent")]
    pub services_discount_percent: f64,
    #[serde(rename = "parts_discount_percent")]
    pub parts_discount_percent: f64,
    #[serde(rename = "global_discount_percent")]
    pub global_discount_percent: f64,

    #[serde(rename = "includeVAT")]
    pub include_vat: bool,
    pub vat_rate: f64,
    pub vat_amount: f64,
    #[serde(rename = "subtotalBeforeVAT")]
    pub subtotal_before_vat: f64,

    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub engine_version: String,
    #[serde(default)]
    pub record_hash: String,
}

impl EstimateRecord {
    /// Recompute the content hash and compare with the stored one.
    pub fn verify_hash(&self) -> Result<bool, SnapshotError> {
        let unhashed = EstimateRecord {
            record_hash: String::new(),
            ..self.clone()
        };
        Ok(compute_record_hash(&unhashed)? == self.record_hash)
    }
}

/// Reject records written by engines older than `MIN_RECORD_VERSION`.
pub fn check_record_version(record: &EstimateRecord) -> Result<(), SnapshotError> {
    let record_ver = semver::Version::parse(&record.engine_version)
        .map_err(|_| SnapshotError::InvalidVersion(record.engine_version.clone()))?;
    let min_ver = semver::Version::parse(MIN_RECORD_VERSION)
        .map_err(|_| SnapshotError::InvalidVersion(MIN_RECORD_VERSION.to_string()))?;

    if record_ver < min_ver {
        return Err(SnapshotError::IncompatibleVersion(
            record.engine_version.clone(),
            MIN_RECORD_VERSION.to_string(),
        ));
    }
    Ok(())
}

/// The snapshot builder - freezes a draft into a persisted record
pub struct SnapshotBuilder {
    validator: Validator,
    status: RecordStatus,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            validator: Validator::new(),
            status: RecordStatus::default(),
        }
    }

    pub fn with_status(status: RecordStatus) -> Self {
        Self { status, ..Self::new() }
    }

    /// This is the ONLY validation entry point for saves.
    pub fn validate(&self, draft: &EstimateDraft) -> ValidationResult {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        self.validator.validate(draft)
    }

    /// Freeze the draft at `now`.
    ///
    /// CRITICAL: This ALWAYS calls validate internally. No bypass possible.
    pub fn build(&self, draft: &EstimateDraft, now: DateTime<Utc>) -> Result<EstimateRecord, SnapshotError> {
        let validation = self.validate(draft);
        if !validation.valid {
            return Err(SnapshotError::ValidationFailed(validation));
        }

        let totals = draft.totals();
        let customer = &draft.customer;

        let mut record = EstimateRecord {
            customer_name: customer.customer_name.clone(),
            customer_phone: customer.customer_phone.trim().to_string(),
            car_make: customer.car_make.clone(),
            car_model: customer.car_model.clone(),
            car_make_id: customer.car_make_id.clone(),
            car_model_id: customer.car_model_id.clone(),
            plate: customer.plate.trim().to_string(),
            total_price: round_currency(totals.grand_total),
            services_total: round_currency(totals.services_items_total),
            parts_total: round_currency(totals.parts_items_total),
            services: draft.grouped_services().iter().map(record_service).collect(),
            parts: draft.parts.iter().map(record_part).collect(),
            photos: draft.photos.iter().map(record_photo).collect(),
            services_discount_percent: totals.services_discount_percent,
            parts_discount_percent: totals.parts_discount_percent,
            global_discount_percent: totals.global_discount_percent,
            include_vat: totals.vat_enabled,
            vat_rate: totals.vat_rate,
            vat_amount: round_currency(totals.vat_amount),
            subtotal_before_vat: round_currency(totals.subtotal_after_global_discount),
            status: self.status,
            created_at: now,
            updated_at: now,
            engine_version: ENGINE_VERSION.to_string(),
            record_hash: String::new(),
        };

        // Hash covers everything but the hash itself
        record.record_hash = compute_record_hash(&record)?;

        debug!(
            plate = %record.plate,
            total = record.total_price,
            hash = %record.record_hash,
            "built estimate snapshot"
        );
        Ok(record)
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn non_zero(percent: Option<f64>) -> Option<f64> {
    percent.map(clamp_percent).filter(|d| *d > 0.0)
}

// Drafts also arrive deserialized, so every stored number is re-clamped here
// rather than trusted from the edit operations.
fn record_service(line: &GroupedServiceLine) -> RecordService {
    RecordService {
        service_key: line.key.clone(),
        service_name: line.name_alt.clone().unwrap_or_else(|| line.key.clone()),
        service_name_local: line.name_local.clone(),
        price: round_currency(non_negative(line.total_price)),
        count: non_negative(line.total_count),
        unit_price: line.unit_price.map(|p| round_currency(non_negative(p))),
        discount: non_zero(line.discount_percent),
    }
}

fn record_part(part: &PartLineItem) -> RecordPart {
    RecordPart {
        name: part.name.clone(),
        name_local: part.name_local.clone().unwrap_or_else(|| part.name.clone()),
        quantity: non_negative(part.quantity),
        unit_price: round_currency(non_negative(part.unit_price)),
        total_price: round_currency(part.line_total()),
        discount: non_zero(Some(part.discount_percent)),
    }
}

fn record_photo(photo: &Photo) -> RecordPhoto {
    RecordPhoto {
        url: photo.uri.clone(),
        label: photo.label.clone(),
        tags: photo
            .tags
            .iter()
            .map(|t| {
                let position = PositionFraction::new(t.position.x, t.position.y);
                RecordTag {
                    x: position.x,
                    y: position.y,
                    service_key: t.service_key.clone(),
                    service_name_local: t.service_name_local.clone(),
                    price: round_currency(non_negative(t.unit_price_at_tagging)),
                }
            })
            .collect(),
    }
}
