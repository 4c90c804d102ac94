//! Persistence - Best-Effort Save and Three-Outcome Delete
//!
//! Saving is not transactional. Photo uploads run one after another and a
//! failed upload keeps the local reference; the external billing mirror is
//! reported but never blocks the primary record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::draft::{DraftError, EstimateDraft};
use crate::items::Photo;
use crate::lookup::{most_recent, CustomerLookup, CustomerMatch};
use crate::snapshot::{check_record_version, EstimateRecord, SnapshotBuilder, SnapshotError};
use crate::validation::ValidationResult;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Validation failed: {}", .0.summary())]
    Validation(ValidationResult),

    #[error("Snapshot error: {0}")]
    Snapshot(SnapshotError),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SnapshotError> for PersistError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::ValidationFailed(result) => PersistError::Validation(result),
            other => PersistError::Snapshot(other),
        }
    }
}

/// Primary durable store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a photo and return its stable URL.
    async fn upload_photo(&self, photo: &Photo) -> Result<String, PersistError>;
    /// Store a record and return its id.
    async fn create_record(&self, record: &EstimateRecord) -> Result<String, PersistError>;
    async fn delete_record(&self, record_id: &str) -> Result<(), PersistError>;
}

/// Optional mirror of the invoice in an external billing system.
#[async_trait]
pub trait BillingSync: Send + Sync {
    /// Returns the reference the billing system assigned.
    async fn mirror(&self, record_id: &str, record: &EstimateRecord) -> Result<String, PersistError>;
    async fn remove(&self, record_id: &str) -> Result<(), PersistError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BillingStatus {
    NotConfigured,
    Synced { reference: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub photo_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub record_id: String,
    pub record: EstimateRecord,
    pub failed_uploads: Vec<UploadFailure>,
    pub billing: BillingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// Primary record gone, billing mirror still holds a copy.
    PartiallyDeleted { mirror_error: String },
    Failed { error: String },
}

/// Validate, upload photos, freeze, store, then mirror.
///
/// Only validation and the primary `create_record` can fail the save.
pub async fn save_estimate(
    storage: &dyn Storage,
    billing: Option<&dyn BillingSync>,
    builder: &SnapshotBuilder,
    draft: &EstimateDraft,
    now: DateTime<Utc>,
) -> Result<SaveReport, PersistError> {
    // Checked before any upload so an invalid draft causes no I/O. `build`
    // validates again on the draft it actually freezes (photo URIs rewritten).
    let validation = builder.validate(draft);
    if !validation.valid {
        return Err(PersistError::Validation(validation));
    }

    let mut uploaded = draft.clone();
    let mut failed_uploads = vec![];
    for photo in draft.photos.iter().filter(|p| p.is_local()) {
        match storage.upload_photo(photo).await {
            Ok(url) => {
                debug!(photo_id = %photo.id, url = %url, "uploaded photo");
                uploaded = uploaded.set_photo_uri(&photo.id, url)?;
            }
            Err(e) => {
                warn!(photo_id = %photo.id, error = %e, "photo upload failed, keeping local reference");
                failed_uploads.push(UploadFailure {
                    photo_id: photo.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let record = builder.build(&uploaded, now)?;
    let record_id = storage.create_record(&record).await?;
    info!(record_id = %record_id, total = record.total_price, "saved estimate");

    let billing = match billing {
        None => BillingStatus::NotConfigured,
        Some(sync) => match sync.mirror(&record_id, &record).await {
            Ok(reference) => BillingStatus::Synced { reference },
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "billing mirror failed");
                BillingStatus::Failed { error: e.to_string() }
            }
        },
    };

    Ok(SaveReport {
        record_id,
        record,
        failed_uploads,
        billing,
    })
}

/// Delete from the primary store and the billing mirror independently.
pub async fn delete_estimate(
    storage: &dyn Storage,
    billing: Option<&dyn BillingSync>,
    record_id: &str,
) -> DeleteOutcome {
    let primary = storage.delete_record(record_id).await;
    let mirror = match billing {
        Some(sync) => Some(sync.remove(record_id).await),
        None => None,
    };

    let outcome = match (primary, mirror) {
        (Err(e), _) => DeleteOutcome::Failed { error: e.to_string() },
        (Ok(()), Some(Err(e))) => DeleteOutcome::PartiallyDeleted { mirror_error: e.to_string() },
        (Ok(()), _) => DeleteOutcome::Deleted,
    };
    info!(record_id, ?outcome, "delete estimate");
    outcome
}

/// Records as `<id>.json` files, photos copied under `photos/`.
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, record_id: &str) -> Result<PathBuf, PersistError> {
        // ids are uuids; anything else cannot name a record
        let id = Uuid::parse_str(record_id).map_err(|_| PersistError::NotFound(record_id.to_string()))?;
        Ok(self.root.join(format!("{}.json", id)))
    }

    pub async fn load_record(&self, record_id: &str) -> Result<EstimateRecord, PersistError> {
        let path = self.record_path(record_id)?;
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PersistError::NotFound(record_id.to_string()),
            _ => PersistError::Io(e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every readable record; unreadable files are skipped.
    pub async fn list_records(&self) -> Result<Vec<(String, EstimateRecord)>, PersistError> {
        let mut records = vec![];
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match self.load_record(&id).await {
                Ok(record) => records.push((id, record)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl Storage for DirStorage {
    async fn upload_photo(&self, photo: &Photo) -> Result<String, PersistError> {
        let source = PathBuf::from(photo.uri.strip_prefix("file://").unwrap_or(&photo.uri));
        let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
        let photos_dir = self.root.join("photos");
        tokio::fs::create_dir_all(&photos_dir).await?;

        let dest = photos_dir.join(format!("{}.{}", photo.id, ext));
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| PersistError::Upload(format!("{}: {}", source.display(), e)))?;
        Ok(format!("file://{}", dest.display()))
    }

    async fn create_record(&self, record: &EstimateRecord) -> Result<String, PersistError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let id = Uuid::new_v4().to_string();
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(self.record_path(&id)?, json).await?;
        Ok(id)
    }

    async fn delete_record(&self, record_id: &str) -> Result<(), PersistError> {
        let path = self.record_path(record_id)?;
        tokio::fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PersistError::NotFound(record_id.to_string()),
            _ => PersistError::Io(e),
        })
    }
}

#[async_trait]
impl CustomerLookup for DirStorage {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<CustomerMatch>, PersistError> {
        let records: Vec<EstimateRecord> = self
            .list_records()
            .await?
            .into_iter()
            .filter_map(|(id, record)| match check_record_version(&record) {
                Ok(()) => Some(record),
                Err(e) => {
                    warn!(record_id = %id, error = %e, "ignoring incompatible record");
                    None
                }
            })
            .collect();
        Ok(most_recent(&records, phone))
    }
}
