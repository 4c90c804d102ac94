//! Money & Numeric Input
//!
//! User-entered prices, quantities and percents never fail to parse.
//! Anything unusable degrades to 0 so totals are always computable.
//!
//! Rounding policy: full precision everywhere inside the engine,
//! `round_currency` only at the persisted-record boundary and for display.

/// Parse a user-entered amount. Empty, non-numeric, non-finite and
/// negative input all yield 0.
pub fn parse_amount(text: &str) -> f64 {
    let cleaned = text.trim().replace(',', ".");
    match cleaned.parse::<f64>() {
        Ok(v) => non_negative(v),
        Err(_) => 0.0,
    }
}

/// Parse a percent and clamp it into [0, 100].
pub fn parse_percent(text: &str) -> f64 {
    clamp_percent(parse_amount(text))
}

/// Quantities are entered in 0.1 steps.
pub fn parse_quantity(text: &str) -> f64 {
    snap_quantity(parse_amount(text))
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Negative, NaN and infinite values collapse to 0.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

pub fn snap_quantity(value: f64) -> f64 {
    (non_negative(value) * 10.0).round() / 10.0
}

/// Apply a percent discount, clamping both the percent and the result.
pub fn apply_discount(amount: f64, percent: f64) -> f64 {
    (non_negative(amount) * (1.0 - clamp_percent(percent) / 100.0)).max(0.0)
}

/// Round to cents, half away from zero.
pub fn round_currency(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Two-decimal display string.
pub fn format_currency(value: f64) -> String {
    format!("{:.2}", round_currency(value))
}
