use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use migrate_core::{ItemStatus, MigrationItem, ProgressLedger};
use migrate_logging::{migrate_info, migrate_warn};

use crate::persist::{atomic_write, PersistError};

pub const STATE_FILENAME: &str = "migration_state.json";

/// State persistence failures are fatal: without durable progress tracking
/// the pipeline cannot guarantee idempotent resume.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to persist migration state: {0}")]
    Persist(#[from] PersistError),
    #[error("failed to encode migration state: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to remove stale state file: {0}")]
    Remove(std::io::Error),
}

// On-disk mirror of the ledger. Kept separate from the core types so the
// file schema stays stable even when in-memory shapes evolve.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedItem {
    id: String,
    old_url: String,
    #[serde(default)]
    new_url: Option<String>,
    status: String,
    #[serde(default)]
    permanent: bool,
    #[serde(default)]
    error: Option<String>,
    updated_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    started_at: String,
    updated_at: String,
    #[serde(default)]
    completed_at: Option<String>,
    total_items: usize,
    processed_count: usize,
    success_count: usize,
    failed_count: usize,
    skipped_count: usize,
    items: Vec<PersistedItem>,
}

/// Durable store for the progress ledger, one JSON file per migration.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(STATE_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted ledger. A missing file means a fresh start; a
    /// corrupt file is logged and treated the same way rather than blocking
    /// the run.
    pub fn load(&self) -> Option<ProgressLedger> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                migrate_warn!("failed to read state from {}: {err}", self.path.display());
                return None;
            }
        };

        let state: PersistedState = match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                migrate_warn!("failed to parse state from {}: {err}", self.path.display());
                return None;
            }
        };

        let items = state
            .items
            .into_iter()
            .map(|item| {
                let status = parse_status(&item.status, item.permanent);
                (
                    item.id,
                    MigrationItem {
                        old_url: item.old_url,
                        new_url: item.new_url,
                        status,
                        error: item.error,
                        updated_at: item.updated_at,
                    },
                )
            })
            .collect();

        let ledger = ProgressLedger::from_parts(
            state.started_at,
            state.completed_at,
            state.total_items,
            items,
        );
        let summary = ledger.summary();
        migrate_info!(
            "loaded state from {}: {}/{} processed",
            self.path.display(),
            summary.processed,
            summary.total
        );
        Some(ledger)
    }

    /// Persist the ledger atomically. Called after every processed item to
    /// bound data loss on a crash.
    pub fn save(&self, ledger: &ProgressLedger, now: &str) -> Result<(), StateError> {
        let summary = ledger.summary();
        let state = PersistedState {
            started_at: ledger.started_at().to_string(),
            updated_at: now.to_string(),
            completed_at: ledger.completed_at().map(str::to_string),
            total_items: summary.total,
            processed_count: summary.processed,
            success_count: summary.succeeded,
            failed_count: summary.failed,
            skipped_count: summary.skipped,
            items: ledger
                .items()
                .map(|(id, item)| PersistedItem {
                    id: id.clone(),
                    old_url: item.old_url.clone(),
                    new_url: item.new_url.clone(),
                    status: item.status.as_str().to_string(),
                    permanent: matches!(item.status, ItemStatus::Failed { permanent: true }),
                    error: item.error.clone(),
                    updated_at: item.updated_at.clone(),
                })
                .collect(),
        };

        let encoded = serde_json::to_string_pretty(&state)?;
        atomic_write(&self.path, encoded.as_bytes())?;
        Ok(())
    }

    /// Delete any existing state file, for non-resume runs starting fresh.
    pub fn reset(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                migrate_info!("removed previous state file {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StateError::Remove(err)),
        }
    }
}

fn parse_status(status: &str, permanent: bool) -> ItemStatus {
    match status {
        "uploaded" => ItemStatus::Uploaded,
        "failed" => ItemStatus::Failed { permanent },
        "skipped" => ItemStatus::Skipped,
        // Unknown statuses from a future schema degrade to pending, which
        // only means the item is re-attempted.
        _ => ItemStatus::Pending,
    }
}
