//! Estimate Draft - the single estimate-in-progress
//!
//! Every edit returns a new draft; the receiver is never touched. Totals and
//! grouped lines are derived on demand and never stored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{group, GroupedServiceLine};
use crate::catalog::ServiceCatalogEntry;
use crate::coords::{ImageGeometry, MarginPolicy, Point, PositionFraction};
use crate::items::{new_id, DamageTag, PartLineItem, Photo, ServiceLineItem};
use crate::money::{clamp_percent, non_negative, snap_quantity};
use crate::pricing::{compute_totals, DiscountSettings, EstimateTotals};
use crate::validation::{validate_part, ValidationResult};

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("Photo not found: {0}")]
    PhotoNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Service line not found: {0}")]
    ServiceNotFound(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Tap is outside the rendered image")]
    TapOutsideImage,

    #[error("Invalid part: {}", .0.summary())]
    InvalidPart(ValidationResult),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerVehicle {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub car_make: String,
    #[serde(default)]
    pub car_model: String,
    #[serde(default)]
    pub car_make_id: Option<String>,
    #[serde(default)]
    pub car_model_id: Option<String>,
    #[serde(default)]
    pub plate: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateDraft {
    #[serde(default)]
    pub customer: CustomerVehicle,
    #[serde(default)]
    pub services: Vec<ServiceLineItem>,
    #[serde(default)]
    pub parts: Vec<PartLineItem>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub discounts: DiscountSettings,
}

impl EstimateDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> EstimateTotals {
        compute_totals(&self.services, &self.parts, &self.discounts)
    }

    pub fn grouped_services(&self) -> Vec<GroupedServiceLine> {
        group(&self.services)
    }

    pub fn with_customer(&self, customer: CustomerVehicle) -> Self {
        Self { customer, ..self.clone() }
    }

    pub fn with_discounts(&self, discounts: DiscountSettings) -> Self {
        Self {
            discounts: discounts.sanitized(),
            ..self.clone()
        }
    }

    // --- Services ---

    /// Adds one unit of a catalog service at its base price.
    pub fn select_service(&self, entry: &ServiceCatalogEntry) -> (Self, String) {
        let line = ServiceLineItem::from_catalog(entry);
        let id = line.id.clone();
        let mut next = self.clone();
        next.services.push(line);
        (next, id)
    }

    pub fn set_service_quantity(&self, line_id: &str, quantity: f64) -> Result<Self, DraftError> {
        self.update_service(line_id, |s| s.quantity = snap_quantity(quantity))
    }

    pub fn set_service_price(&self, line_id: &str, unit_price: f64) -> Result<Self, DraftError> {
        self.update_service(line_id, |s| s.unit_price = non_negative(unit_price))
    }

    pub fn set_service_discount(&self, line_id: &str, percent: f64) -> Result<Self, DraftError> {
        self.update_service(line_id, |s| s.discount_percent = clamp_percent(percent))
    }

    /// Removing a tag-created line also removes its tag.
    pub fn remove_service(&self, line_id: &str) -> Result<Self, DraftError> {
        let index = self
            .services
            .iter()
            .position(|s| s.id == line_id)
            .ok_or_else(|| DraftError::ServiceNotFound(line_id.to_string()))?;

        let mut next = self.clone();
        let removed = next.services.remove(index);
        if let Some(tag_id) = removed.tag_id {
            for photo in &mut next.photos {
                photo.tags.retain(|t| t.id != tag_id);
            }
        }
        Ok(next)
    }

    fn update_service(
        &self,
        line_id: &str,
        edit: impl FnOnce(&mut ServiceLineItem),
    ) -> Result<Self, DraftError> {
        let mut next = self.clone();
        let line = next
            .services
            .iter_mut()
            .find(|s| s.id == line_id)
            .ok_or_else(|| DraftError::ServiceNotFound(line_id.to_string()))?;
        edit(line);
        Ok(next)
    }

    // --- Parts ---

    /// Rejected parts leave the draft untouched.
    pub fn add_part(&self, part: PartLineItem) -> Result<(Self, String), DraftError> {
        let result = validate_part(&part);
        if !result.valid {
            return Err(DraftError::InvalidPart(result));
        }
        let id = part.id.clone();
        let mut next = self.clone();
        next.parts.push(PartLineItem {
            quantity: non_negative(part.quantity),
            discount_percent: clamp_percent(part.discount_percent),
            ..part
        });
        Ok((next, id))
    }

    pub fn set_part_quantity(&self, part_id: &str, quantity: f64) -> Result<Self, DraftError> {
        self.update_part(part_id, |p| p.quantity = non_negative(quantity))
    }

    pub fn set_part_price(&self, part_id: &str, unit_price: f64) -> Result<Self, DraftError> {
        self.update_part(part_id, |p| p.unit_price = non_negative(unit_price))
    }

    pub fn set_part_discount(&self, part_id: &str, percent: f64) -> Result<Self, DraftError> {
        self.update_part(part_id, |p| p.discount_percent = clamp_percent(percent))
    }

    pub fn remove_part(&self, part_id: &str) -> Result<Self, DraftError> {
        if !self.parts.iter().any(|p| p.id == part_id) {
            return Err(DraftError::PartNotFound(part_id.to_string()));
        }
        let mut next = self.clone();
        next.parts.retain(|p| p.id != part_id);
        Ok(next)
    }

    fn update_part(&self, part_id: &str, edit: impl FnOnce(&mut PartLineItem)) -> Result<Self, DraftError> {
        let mut next = self.clone();
        let part = next
            .parts
            .iter_mut()
            .find(|p| p.id == part_id)
            .ok_or_else(|| DraftError::PartNotFound(part_id.to_string()))?;
        edit(part);
        Ok(next)
    }

    // --- Photos & tags ---

    pub fn add_photo(&self, uri: impl Into<String>, label: impl Into<String>) -> (Self, String) {
        let photo = Photo::new(uri, label);
        let id = photo.id.clone();
        let mut next = self.clone();
        next.photos.push(photo);
        (next, id)
    }

    /// Drops the photo together with the service lines its tags created.
    pub fn remove_photo(&self, photo_id: &str) -> Result<Self, DraftError> {
        let photo = self.photo(photo_id)?;
        let tag_ids: Vec<&str> = photo.tags.iter().map(|t| t.id.as_str()).collect();

        let mut next = self.clone();
        next.services
            .retain(|s| !s.tag_id.as_deref().is_some_and(|t| tag_ids.contains(&t)));
        next.photos.retain(|p| p.id != photo_id);
        Ok(next)
    }

    pub fn set_photo_uri(&self, photo_id: &str, uri: impl Into<String>) -> Result<Self, DraftError> {
        let mut next = self.clone();
        next.photo_mut(photo_id)?.uri = uri.into();
        Ok(next)
    }

    /// Tag a damage zone from a tap in container coordinates.
    pub fn add_tag(
        &self,
        photo_id: &str,
        tap: Point,
        geometry: &ImageGeometry,
        entry: &ServiceCatalogEntry,
        price: Option<f64>,
    ) -> Result<(Self, String), DraftError> {
        let position = geometry.normalize(tap).ok_or(DraftError::TapOutsideImage)?;
        self.add_tag_at(photo_id, position, entry, price)
    }

    /// Tag at an already-normalized position. Creates the tag and the
    /// service line it stands for, priced at the tag price.
    pub fn add_tag_at(
        &self,
        photo_id: &str,
        position: PositionFraction,
        entry: &ServiceCatalogEntry,
        price: Option<f64>,
    ) -> Result<(Self, String), DraftError> {
        let unit_price = non_negative(price.unwrap_or(entry.base_price));
        let tag = DamageTag {
            id: new_id(),
            photo_id: photo_id.to_string(),
            position: PositionFraction::new(position.x, position.y),
            service_key: entry.key.clone(),
            service_name_local: entry.name_local.clone(),
            unit_price_at_tagging: unit_price,
        };
        let tag_id = tag.id.clone();

        let mut next = self.clone();
        next.photo_mut(photo_id)?.tags.push(tag);
        next.services.push(ServiceLineItem {
            unit_price,
            tag_id: Some(tag_id.clone()),
            ..ServiceLineItem::from_catalog(entry)
        });
        Ok((next, tag_id))
    }

    pub fn move_tag(
        &self,
        photo_id: &str,
        tag_id: &str,
        delta: Point,
        geometry: &ImageGeometry,
        margin: MarginPolicy,
    ) -> Result<Self, DraftError> {
        let mut next = self.clone();
        let tag = next
            .photo_mut(photo_id)?
            .tags
            .iter_mut()
            .find(|t| t.id == tag_id)
            .ok_or_else(|| DraftError::TagNotFound(tag_id.to_string()))?;
        tag.position = geometry.drag(tag.position, delta, margin);
        Ok(next)
    }

    /// Removes the tag and the service line it created.
    pub fn remove_tag(&self, photo_id: &str, tag_id: &str) -> Result<Self, DraftError> {
        if !self.photo(photo_id)?.tags.iter().any(|t| t.id == tag_id) {
            return Err(DraftError::TagNotFound(tag_id.to_string()));
        }
        let mut next = self.clone();
        next.photo_mut(photo_id)?.tags.retain(|t| t.id != tag_id);
        next.services.retain(|s| s.tag_id.as_deref() != Some(tag_id));
        Ok(next)
    }

    fn photo(&self, photo_id: &str) -> Result<&Photo, DraftError> {
        self.photos
            .iter()
            .find(|p| p.id == photo_id)
            .ok_or_else(|| DraftError::PhotoNotFound(photo_id.to_string()))
    }

    fn photo_mut(&mut self, photo_id: &str) -> Result<&mut Photo, DraftError> {
        self.photos
            .iter_mut()
            .find(|p| p.id == photo_id)
            .ok_or_else(|| DraftError::PhotoNotFound(photo_id.to_string()))
    }
}
