//! Validation System - Field-Level Rules
//!
//! Rules produce structured violations. Nothing here mutates the draft;
//! a failed validation leaves the estimate exactly as it was.

use serde::{Deserialize, Serialize};

use crate::draft::EstimateDraft;
use crate::items::PartLineItem;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationViolation {
    pub rule: String,
    pub field: String,
    pub message: String,
}

impl ValidationViolation {
    fn new(rule: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self { valid: true, violations: vec![] }
    }

    pub fn from_violations(violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }

    /// `field: message` pairs joined for a single dialog line.
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, draft: &EstimateDraft) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct PhoneRequiredRule;

impl ValidationRule for PhoneRequiredRule {
    fn name(&self) -> &'static str { "phone_required" }

    fn validate(&self, draft: &EstimateDraft) -> Vec<ValidationViolation> {
        if draft.customer.customer_phone.trim().is_empty() {
            vec![ValidationViolation::new(self.name(), "customerPhone", "Customer phone is required")]
        } else {
            vec![]
        }
    }
}

pub struct PlateRequiredRule;

impl ValidationRule for PlateRequiredRule {
    fn name(&self) -> &'static str { "plate_required" }

    fn validate(&self, draft: &EstimateDraft) -> Vec<ValidationViolation> {
        if draft.customer.plate.trim().is_empty() {
            vec![ValidationViolation::new(self.name(), "plate", "License plate is required")]
        } else {
            vec![]
        }
    }
}

pub struct PartsRule;

impl ValidationRule for PartsRule {
    fn name(&self) -> &'static str { "parts" }

    fn validate(&self, draft: &EstimateDraft) -> Vec<ValidationViolation> {
        draft
            .parts
            .iter()
            .enumerate()
            .flat_map(|(i, part)| part_violations(&format!("parts[{}].", i), &part.name, part.unit_price))
            .collect()
    }
}

/// Checks for a single part before it is added to a draft.
pub fn validate_part(part: &PartLineItem) -> ValidationResult {
    ValidationResult::from_violations(part_violations("", &part.name, part.unit_price))
}

fn part_violations(prefix: &str, name: &str, unit_price: f64) -> Vec<ValidationViolation> {
    let mut violations = vec![];
    if name.trim().is_empty() {
        violations.push(ValidationViolation::new(
            "part_name",
            format!("{}name", prefix),
            "Part name is required",
        ));
    }
    if !(unit_price.is_finite() && unit_price > 0.0) {
        violations.push(ValidationViolation::new(
            "part_price",
            format!("{}unitPrice", prefix),
            "Part price must be greater than zero",
        ));
    }
    violations
}

/// Validator orchestrates rules
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(PhoneRequiredRule),
                Box::new(PlateRequiredRule),
                Box::new(PartsRule),
            ],
        }
    }

    pub fn validate(&self, draft: &EstimateDraft) -> ValidationResult {
        let violations = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(draft))
            .collect();
        ValidationResult::from_violations(violations)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::CustomerVehicle;

    fn customer() -> CustomerVehicle {
        CustomerVehicle {
            customer_phone: "0501234567".into(),
            plate: "12-345-67".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_draft_is_valid() {
        let draft = EstimateDraft::new().with_customer(customer());
        assert_eq!(Validator::new().validate(&draft), ValidationResult::success());
    }

    #[test]
    fn test_missing_phone_and_plate() {
        let result = Validator::new().validate(&EstimateDraft::new());
        assert!(!result.valid);
        let fields: Vec<_> = result.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["customerPhone", "plate"]);
    }

    #[test]
    fn test_blank_phone_counts_as_missing() {
        let draft = EstimateDraft::new().with_customer(CustomerVehicle {
            customer_phone: "   ".into(),
            ..customer()
        });
        let result = Validator::new().validate(&draft);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule, "phone_required");
    }

    #[test]
    fn test_part_checks() {
        let bad = PartLineItem::new("  ", 1.0, 0.0);
        let result = validate_part(&bad);
        assert!(!result.valid);
        assert_eq!(result.violations.len(), 2);
        assert_eq!(result.summary(), "name: Part name is required; unitPrice: Part price must be greater than zero");

        assert!(validate_part(&PartLineItem::new("Side mirror", 1.0, 45.0)).valid);
    }
}
