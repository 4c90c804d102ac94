//! Estimate CLI - JSON bridge to the pricing engine
//!
//! Commands: catalog, quote, validate, snapshot, save, delete, lookup, tag, move-tag
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use estimate_core::{
    delete_estimate, save_estimate, CustomerLookup, DeleteOutcome, DirStorage, EngineConfig, EstimateDraft,
    ImageGeometry, PersistError, Point, SnapshotBuilder, SnapshotError,
    catalog::find_service,
    money::format_currency,
};

#[derive(Parser)]
#[command(name = "estimate-cli")]
#[command(about = "Estimate CLI - Body Shop Composition & Pricing Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to engine config file
    #[arg(short, long, default_value = "estimate.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog services
    Catalog,

    /// Price a draft
    Quote {
        /// JSON payload (EstimateDraft)
        #[arg(short, long)]
        payload: String,
    },

    /// Validate a draft
    Validate {
        /// JSON payload (EstimateDraft)
        #[arg(short, long)]
        payload: String,
    },

    /// Build the record a save would store, without storing it
    Snapshot {
        /// JSON payload (EstimateDraft)
        #[arg(short, long)]
        payload: String,
    },

    /// Save a draft into the storage directory
    Save {
        /// JSON payload (EstimateDraft)
        #[arg(short, long)]
        payload: String,
    },

    /// Delete a stored record
    Delete {
        /// Record id
        #[arg(short, long)]
        id: String,
    },

    /// Most recent stored customer for a phone number
    Lookup {
        /// Phone number
        #[arg(short, long)]
        phone: String,
    },

    /// Tag a damage zone on a photo
    Tag {
        /// JSON payload (TagRequest)
        #[arg(short, long)]
        payload: String,
    },

    /// Drag an existing tag, kept inside the configured margin
    MoveTag {
        /// JSON payload (MoveTagRequest)
        #[arg(short, long)]
        payload: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagRequest {
    draft: EstimateDraft,
    photo_id: String,
    geometry: ImageGeometry,
    tap: Point,
    service_key: String,
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveTagRequest {
    draft: EstimateDraft,
    photo_id: String,
    tag_id: String,
    geometry: ImageGeometry,
    delta: Point,
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => println!(r#"{{"error": "Failed to serialize output: {}"}}"#, e),
    }
}

fn parse_draft(payload: &str) -> Result<EstimateDraft, ExitCode> {
    parse_payload(payload)
}

fn parse_payload<T: DeserializeOwned>(payload: &str) -> Result<T, ExitCode> {
    serde_json::from_str(payload).map_err(|e| {
        emit(&serde_json::json!({ "success": false, "error": format!("Invalid payload: {}", e) }));
        ExitCode::FAILURE
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match EngineConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load config: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &config).await {
        Ok(code) | Err(code) => code,
    }
}

async fn run(command: Commands, config: &EngineConfig) -> Result<ExitCode, ExitCode> {
    let builder = SnapshotBuilder::new();
    let storage = DirStorage::new(&config.storage_dir);

    match command {
        Commands::Catalog => {
            emit(&config.services());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Quote { payload } => {
            let draft = parse_draft(&payload)?;
            let totals = draft.totals();
            emit(&serde_json::json!({
                "totals": totals,
                "groupedServices": draft.grouped_services(),
                "totalDiscountAmount": totals.total_discount_amount(),
                "display": {
                    "subtotal": format_currency(totals.subtotal_after_global_discount),
                    "vat": format_currency(totals.vat_amount),
                    "grandTotal": format_currency(totals.grand_total),
                },
            }));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { payload } => {
            let draft = parse_draft(&payload)?;
            let result = builder.validate(&draft);
            emit(&result);
            if result.valid {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2))
            }
        }

        Commands::Snapshot { payload } => {
            let draft = parse_draft(&payload)?;
            match builder.build(&draft, Utc::now()) {
                Ok(record) => {
                    emit(&serde_json::json!({ "success": true, "record": record }));
                    Ok(ExitCode::SUCCESS)
                }
                Err(SnapshotError::ValidationFailed(result)) => {
                    emit(&serde_json::json!({ "success": false, "validation": result }));
                    Ok(ExitCode::from(2))
                }
                Err(e) => {
                    emit(&serde_json::json!({ "success": false, "error": e.to_string() }));
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Save { payload } => {
            let draft = parse_draft(&payload)?;
            match save_estimate(&storage, None, &builder, &draft, Utc::now()).await {
                Ok(report) => {
                    emit(&serde_json::json!({ "success": true, "report": report }));
                    Ok(ExitCode::SUCCESS)
                }
                Err(PersistError::Validation(result)) => {
                    emit(&serde_json::json!({ "success": false, "validation": result }));
                    Ok(ExitCode::from(2))
                }
                Err(e) => {
                    emit(&serde_json::json!({ "success": false, "error": e.to_string() }));
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Delete { id } => {
            let outcome = delete_estimate(&storage, None, &id).await;
            emit(&outcome);
            match outcome {
                DeleteOutcome::Deleted => Ok(ExitCode::SUCCESS),
                DeleteOutcome::PartiallyDeleted { .. } | DeleteOutcome::Failed { .. } => Ok(ExitCode::FAILURE),
            }
        }

        Commands::Lookup { phone } => match storage.find_by_phone(&phone).await {
            Ok(found) => {
                emit(&serde_json::json!({ "success": true, "match": found }));
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                emit(&serde_json::json!({ "success": false, "error": e.to_string() }));
                Ok(ExitCode::FAILURE)
            }
        },

        Commands::Tag { payload } => {
            let request: TagRequest = parse_payload(&payload)?;
            let services = config.services();
            let Some(entry) = find_service(&services, &request.service_key) else {
                emit(&serde_json::json!({
                    "success": false,
                    "error": format!("Unknown service: {}", request.service_key),
                }));
                return Ok(ExitCode::FAILURE);
            };
            match request.draft.add_tag(&request.photo_id, request.tap, &request.geometry, entry, request.price) {
                Ok((draft, tag_id)) => {
                    emit(&serde_json::json!({ "success": true, "tagId": tag_id, "draft": draft }));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    emit(&serde_json::json!({ "success": false, "error": e.to_string() }));
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::MoveTag { payload } => {
            let request: MoveTagRequest = parse_payload(&payload)?;
            let margin = config.margin_policy();
            match request.draft.move_tag(&request.photo_id, &request.tag_id, request.delta, &request.geometry, margin) {
                Ok(draft) => {
                    emit(&serde_json::json!({ "success": true, "draft": draft }));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    emit(&serde_json::json!({ "success": false, "error": e.to_string() }));
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
