//! Discount & VAT Engine
//!
//! Strict evaluation order, each tier discounting a different base:
//! item -> category (services / parts) -> global -> VAT.
//! Never fails: invalid numbers degrade to 0 and every stage clamps at 0.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::items::{PartLineItem, ServiceLineItem};
use crate::money::{apply_discount, clamp_percent};

pub const VAT_RATE: f64 = 0.18;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscountSettings {
    #[serde(default)]
    pub services_discount_percent: f64,
    #[serde(default)]
    pub parts_discount_percent: f64,
    #[serde(default)]
    pub global_discount_percent: f64,
    #[serde(default)]
    pub vat_enabled: bool,
}

impl DiscountSettings {
    /// Same settings with every percent clamped into [0, 100].
    pub fn sanitized(&self) -> Self {
        Self {
            services_discount_percent: clamp_percent(self.services_discount_percent),
            parts_discount_percent: clamp_percent(self.parts_discount_percent),
            global_discount_percent: clamp_percent(self.global_discount_percent),
            vat_enabled: self.vat_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateTotals {
    /// Σ unit price × quantity, before any discount.
    pub services_raw_total: f64,
    pub parts_raw_total: f64,
    /// Σ line totals (after item discounts).
    pub services_items_total: f64,
    pub parts_items_total: f64,
    pub services_discount_percent: f64,
    pub parts_discount_percent: f64,
    pub global_discount_percent: f64,
    pub services_discounted_subtotal: f64,
    pub parts_discounted_subtotal: f64,
    pub subtotal_after_item_and_category_discounts: f64,
    pub subtotal_after_global_discount: f64,
    pub vat_enabled: bool,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub grand_total: f64,
}

impl EstimateTotals {
    pub fn raw_total(&self) -> f64 {
        self.services_raw_total + self.parts_raw_total
    }

    pub fn item_discount_savings(&self) -> f64 {
        self.raw_total() - (self.services_items_total + self.parts_items_total)
    }

    pub fn category_discount_savings(&self) -> f64 {
        (self.services_items_total + self.parts_items_total) - self.subtotal_after_item_and_category_discounts
    }

    pub fn global_discount_savings(&self) -> f64 {
        self.subtotal_after_item_and_category_discounts - self.subtotal_after_global_discount
    }

    /// Everything taken off the raw total, for display.
    pub fn total_discount_amount(&self) -> f64 {
        self.raw_total() - self.subtotal_after_global_discount
    }
}

/// Derive all totals from the current lines and settings.
pub fn compute_totals(
    services: &[ServiceLineItem],
    parts: &[PartLineItem],
    settings: &DiscountSettings,
) -> EstimateTotals {
    let settings = settings.sanitized();

    let services_raw_total: f64 = services.iter().map(|s| s.raw_total()).sum();
    let parts_raw_total: f64 = parts.iter().map(|p| p.raw_total()).sum();
    let services_items_total: f64 = services.iter().map(|s| s.line_total()).sum();
    let parts_items_total: f64 = parts.iter().map(|p| p.line_total()).sum();

    let services_discounted_subtotal = apply_discount(services_items_total, settings.services_discount_percent);
    let parts_discounted_subtotal = apply_discount(parts_items_total, settings.parts_discount_percent);
    let subtotal_after_item_and_category_discounts = services_discounted_subtotal + parts_discounted_subtotal;

    let subtotal_after_global_discount =
        apply_discount(subtotal_after_item_and_category_discounts, settings.global_discount_percent);

    let vat_amount = if settings.vat_enabled {
        subtotal_after_global_discount * VAT_RATE
    } else {
        0.0
    };
    let grand_total = subtotal_after_global_discount + vat_amount;

    debug!(
        services = services.len(),
        parts = parts.len(),
        subtotal = subtotal_after_global_discount,
        grand_total,
        "computed estimate totals"
    );

    EstimateTotals {
        services_raw_total,
        parts_raw_total,
        services_items_total,
        parts_items_total,
        services_discount_percent: settings.services_discount_percent,
        parts_discount_percent: settings.parts_discount_percent,
        global_discount_percent: settings.global_discount_percent,
        services_discounted_subtotal,
        parts_discounted_subtotal,
        subtotal_after_item_and_category_discounts,
        subtotal_after_global_discount,
        vat_enabled: settings.vat_enabled,
        vat_rate: VAT_RATE,
        vat_amount,
        grand_total,
    }
}
