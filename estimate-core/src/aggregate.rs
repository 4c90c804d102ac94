//! Line Item Aggregator
//!
//! Merges every occurrence of a service key into one grouped line. Money is
//! summed per occurrence, never re-multiplied from a single unit price,
//! because occurrences may have been tagged at different ad-hoc prices.
//!
//! Output is independent of input order: buckets are keyed in a BTreeMap
//! and each bucket's amounts are summed in sorted order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::ServiceKey;
use crate::items::ServiceLineItem;
use crate::money::non_negative;

/// Anything that can be folded into a grouped service line.
pub trait Contribution {
    fn key(&self) -> &str;
    fn name_local(&self) -> &str;
    fn name_alt(&self) -> Option<&str> { None }
    fn count(&self) -> f64;
    /// Money this occurrence adds to the group.
    fn amount(&self) -> f64;
    /// Per-unit price, when the occurrence has a single one.
    fn unit_price(&self) -> Option<f64>;
    fn discount_percent(&self) -> Option<f64>;
}

/// A raw selection or tag, before grouping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagEvent {
    pub service_key: ServiceKey,
    #[serde(default)]
    pub name_local: String,
    pub unit_price: f64,
    #[serde(default = "default_count")]
    pub count: f64,
}

fn default_count() -> f64 { 1.0 }

impl TagEvent {
    pub fn new(service_key: impl Into<String>, unit_price: f64, count: f64) -> Self {
        Self {
            service_key: service_key.into(),
            name_local: String::new(),
            unit_price,
            count,
        }
    }
}

impl Contribution for TagEvent {
    fn key(&self) -> &str { &self.service_key }
    fn name_local(&self) -> &str { &self.name_local }
    fn count(&self) -> f64 { non_negative(self.count) }
    fn amount(&self) -> f64 { non_negative(self.unit_price) * non_negative(self.count) }
    fn unit_price(&self) -> Option<f64> { Some(non_negative(self.unit_price)) }
    fn discount_percent(&self) -> Option<f64> { Some(0.0) }
}

impl Contribution for ServiceLineItem {
    fn key(&self) -> &str { &self.key }
    fn name_local(&self) -> &str { &self.name_local }
    fn name_alt(&self) -> Option<&str> { self.name_alt.as_deref() }
    fn count(&self) -> f64 { non_negative(self.quantity) }
    fn amount(&self) -> f64 { self.line_total() }
    fn unit_price(&self) -> Option<f64> { Some(non_negative(self.unit_price)) }
    fn discount_percent(&self) -> Option<f64> { Some(crate::money::clamp_percent(self.discount_percent)) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupedServiceLine {
    pub key: ServiceKey,
    pub name_local: String,
    #[serde(default)]
    pub name_alt: Option<String>,
    pub total_count: f64,
    pub total_price: f64,
    /// Shared unit price, `None` when occurrences were priced differently.
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub discount_percent: Option<f64>,
}

impl Contribution for GroupedServiceLine {
    fn key(&self) -> &str { &self.key }
    fn name_local(&self) -> &str { &self.name_local }
    fn name_alt(&self) -> Option<&str> { self.name_alt.as_deref() }
    fn count(&self) -> f64 { self.total_count }
    fn amount(&self) -> f64 { self.total_price }
    fn unit_price(&self) -> Option<f64> { self.unit_price }
    fn discount_percent(&self) -> Option<f64> { self.discount_percent }
}

/// Group contributions by key.
pub fn group_by_key<T: Contribution>(items: &[T]) -> BTreeMap<ServiceKey, GroupedServiceLine> {
    let mut buckets: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    for item in items {
        buckets.entry(item.key()).or_default().push(item);
    }

    buckets
        .into_iter()
        .map(|(key, members)| (key.to_string(), merge(key, &members)))
        .collect()
}

/// Grouped lines ordered by key.
pub fn group<T: Contribution>(items: &[T]) -> Vec<GroupedServiceLine> {
    group_by_key(items).into_values().collect()
}

fn merge<T: Contribution>(key: &str, members: &[&T]) -> GroupedServiceLine {
    let name_local = members
        .iter()
        .map(|m| m.name_local())
        .filter(|n| !n.is_empty())
        .min()
        .unwrap_or(key)
        .to_string();
    let name_alt = members.iter().filter_map(|m| m.name_alt()).min().map(str::to_string);

    GroupedServiceLine {
        key: key.to_string(),
        name_local,
        name_alt,
        total_count: sorted_sum(members.iter().map(|m| m.count())),
        total_price: sorted_sum(members.iter().map(|m| m.amount())),
        unit_price: uniform(members.iter().map(|m| m.unit_price())),
        discount_percent: uniform(members.iter().map(|m| m.discount_percent())),
    }
}

/// Summation order fixed by value so shuffled input sums bit-identically.
fn sorted_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values.into_iter().reduce(|a, b| a + b).unwrap_or(0.0)
}

fn uniform(mut values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let first = values.next()??;
    for v in values {
        if v? != first {
            return None;
        }
    }
    Some(first)
}
