//! Customer Lookup by Phone
//!
//! Typing a phone number fires a lookup only once input has been quiet for
//! the debounce window. Each keystroke supersedes the pending lookup, and a
//! response that belongs to an older input is never delivered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::draft::CustomerVehicle;
use crate::persistence::PersistError;
use crate::snapshot::EstimateRecord;

/// Customer and vehicle details from the most recent prior record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerMatch {
    pub customer: CustomerVehicle,
    pub last_visit: DateTime<Utc>,
}

#[async_trait]
pub trait CustomerLookup: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<CustomerMatch>, PersistError>;
}

/// Digits only, so "050-123 4567" and "0501234567" match.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Latest record (by `updatedAt`) whose phone matches.
pub fn most_recent<'a>(
    records: impl IntoIterator<Item = &'a EstimateRecord>,
    phone: &str,
) -> Option<CustomerMatch> {
    let wanted = normalize_phone(phone);
    if wanted.is_empty() {
        return None;
    }
    records
        .into_iter()
        .filter(|r| normalize_phone(&r.customer_phone) == wanted)
        .max_by_key(|r| r.updated_at)
        .map(|r| CustomerMatch {
            customer: CustomerVehicle {
                customer_name: r.customer_name.clone(),
                customer_phone: r.customer_phone.clone(),
                car_make: r.car_make.clone(),
                car_model: r.car_model.clone(),
                car_make_id: r.car_make_id.clone(),
                car_model_id: r.car_model_id.clone(),
                plate: r.plate.clone(),
            },
            last_visit: r.updated_at,
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub phone: String,
    pub generation: u64,
    pub matched: Option<CustomerMatch>,
}

/// Debounced, cancellable lookup. Must be driven from inside a tokio runtime.
pub struct LookupDebouncer {
    lookup: Arc<dyn CustomerLookup>,
    delay: Duration,
    min_digits: usize,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<LookupResult>,
    rx: mpsc::UnboundedReceiver<LookupResult>,
}

impl LookupDebouncer {
    pub fn new(lookup: Arc<dyn CustomerLookup>, delay: Duration, min_digits: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            lookup,
            delay,
            min_digits,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            tx,
            rx,
        }
    }

    /// Debounce window and minimum digits from the engine config.
    pub fn from_config(lookup: Arc<dyn CustomerLookup>, config: &EngineConfig) -> Self {
        Self::new(lookup, config.lookup_debounce(), config.lookup_min_digits)
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drop the pending lookup, if any. Anything already in flight becomes stale.
    pub fn cancel(&mut self) -> u64 {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Phone input changed.
    pub fn input(&mut self, phone: &str) {
        let generation = self.cancel();
        let digits = normalize_phone(phone);
        if digits.len() < self.min_digits {
            return;
        }

        let lookup = Arc::clone(&self.lookup);
        let current = Arc::clone(&self.generation);
        let tx = self.tx.clone();
        let delay = self.delay;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = lookup.find_by_phone(&digits).await;

            if current.load(Ordering::SeqCst) != generation {
                debug!(phone = %digits, generation, "discarding stale lookup");
                return;
            }
            match outcome {
                Ok(matched) => {
                    let _ = tx.send(LookupResult { phone: digits, generation, matched });
                }
                Err(e) => warn!(phone = %digits, error = %e, "customer lookup failed"),
            }
        }));
    }

    /// Next result that still belongs to the latest input.
    pub async fn next_result(&mut self) -> Option<LookupResult> {
        while let Some(result) = self.rx.recv().await {
            if result.generation == self.current_generation() {
                return Some(result);
            }
            debug!(generation = result.generation, "dropping superseded lookup result");
        }
        None
    }

    /// Non-blocking variant of `next_result`.
    pub fn try_result(&mut self) -> Option<LookupResult> {
        while let Ok(result) = self.rx.try_recv() {
            if result.generation == self.current_generation() {
                return Some(result);
            }
        }
        None
    }
}

impl Drop for LookupDebouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
