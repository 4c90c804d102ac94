//! Estimate Core - Composition & Pricing Engine for Body Shop Estimates
//!
//! # Pipeline
//! taps -> coordinate normalizer -> damage tags -> line item aggregator
//! -> discount & VAT engine -> snapshot builder -> persisted record
//!
//! # Guarantees
//! 1. Line totals and every discount stage are clamped at 0
//! 2. Grouping is order-independent and idempotent
//! 3. Tag positions are resolution independent
//! 4. VAT is charged on the fully discounted subtotal only

pub mod money;
pub mod coords;
pub mod catalog;
pub mod items;
pub mod aggregate;
pub mod pricing;
pub mod draft;
pub mod validation;
pub mod hashing;
pub mod snapshot;
pub mod persistence;
pub mod lookup;
pub mod config;

pub use coords::{ImageGeometry, MarginPolicy, Point, PositionFraction, Rect, Size};
pub use catalog::{ServiceCatalog, ServiceCatalogEntry, Category};
pub use items::{DamageTag, PartLineItem, Photo, ServiceLineItem};
pub use aggregate::{group, group_by_key, GroupedServiceLine, TagEvent};
pub use pricing::{compute_totals, DiscountSettings, EstimateTotals, VAT_RATE};
pub use draft::{CustomerVehicle, DraftError, EstimateDraft};
pub use validation::{ValidationResult, ValidationViolation, Validator};
pub use snapshot::{EstimateRecord, RecordStatus, SnapshotBuilder, SnapshotError};
pub use persistence::{delete_estimate, save_estimate, DeleteOutcome, DirStorage, PersistError, SaveReport};
pub use lookup::{CustomerLookup, CustomerMatch, LookupDebouncer};
pub use config::EngineConfig;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_RECORD_VERSION: &str = "1.0.0";
