//! Migration orchestrator: drives rows through transform, download, upload
//! and durable progress tracking, one item at a time.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use migrate_core::{
    delivery_url, extract_image_id, parse_transform_params, ItemOutcome, MappingRecord,
    ProductRow, ProgressLedger, ProgressSummary,
};
use migrate_engine::{
    final_result_path, item_identity, read_input_csv, write_final_result_csv, write_mapping_csv,
    CsvError, Downloader, StateError, StateStore, UploadError, UploadErrorKind, Uploader,
};
use migrate_logging::{migrate_debug, migrate_error, migrate_info, migrate_warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    /// Directory holding the state file and output CSVs.
    pub output_dir: PathBuf,
    pub mapping_output: PathBuf,
    pub scratch_dir: PathBuf,
    pub dry_run: bool,
    pub resume: bool,
    /// Maximum number of pending items to attempt this run.
    pub batch_size: Option<usize>,
    /// Direct-URL mode: the provider fetches server-side, no local download.
    pub upload_from_url: bool,
    /// Delete the scratch file after a successful upload.
    pub clean_downloads: bool,
    pub cloud_name: String,
    pub folder: String,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("input error: {0}")]
    Input(#[from] CsvError),
    #[error("state persistence error: {0}")]
    State(#[from] StateError),
    #[error("fatal provider error: {0}")]
    FatalUpload(UploadError),
}

#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub summary: ProgressSummary,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Run the migration end to end. Per-item failures are recorded and do not
/// halt the batch; auth/quota and state-persistence failures abort with
/// already-processed items safely persisted.
pub async fn run_migration(
    options: &RunOptions,
    downloader: &dyn Downloader,
    uploader: &dyn Uploader,
) -> Result<RunReport, RunError> {
    let rows = read_input_csv(&options.input)?;
    let store = StateStore::new(&options.output_dir);

    let mut ledger = if options.resume {
        match store.load() {
            Some(mut ledger) => {
                let reset = ledger.reset_retryable(&now_rfc3339());
                if reset > 0 {
                    migrate_info!("resume: {reset} previously failed items queued for retry");
                }
                ledger
            }
            None => {
                migrate_info!("resume requested but no previous state found, starting fresh");
                ProgressLedger::new(now_rfc3339())
            }
        }
    } else {
        if !options.dry_run {
            store.reset()?;
        }
        ProgressLedger::new(now_rfc3339())
    };
    ledger.set_total(rows.len());

    if options.dry_run {
        return dry_run(options, &rows, &ledger);
    }

    // Fail fast on bad credentials before touching any item.
    uploader.ping().await.map_err(RunError::FatalUpload)?;

    let mut attempted = 0usize;
    for (index, row) in rows.iter().enumerate() {
        if let Some(cap) = options.batch_size {
            if attempted >= cap {
                migrate_info!("batch cap of {cap} reached, leaving the rest pending");
                break;
            }
        }

        let Some(old_url) = row.image_url() else {
            let item_id = item_identity(index, row.label());
            if ledger.is_done(&item_id) {
                continue;
            }
            migrate_warn!("no image URL for row {} ({})", index, row.label());
            ledger.begin(&item_id, "", &now_rfc3339());
            ledger.record(
                &item_id,
                ItemOutcome::Skipped {
                    reason: "no image URL".to_string(),
                },
                &now_rfc3339(),
            );
            store.save(&ledger, &now_rfc3339())?;
            // Skips do no provider work, so they don't consume the cap.
            continue;
        };

        let item_id = item_identity(index, old_url);
        if ledger.is_done(&item_id) {
            migrate_debug!("skipping already processed item {item_id}");
            continue;
        }

        ledger.begin(&item_id, old_url, &now_rfc3339());
        attempted += 1;

        match process_item(options, downloader, uploader, row, old_url).await {
            Ok(new_url) => {
                migrate_info!("migrated {} -> {new_url}", row.label());
                ledger.record(&item_id, ItemOutcome::Uploaded { new_url }, &now_rfc3339());
            }
            Err(ItemFailure::Permanent(error)) => {
                migrate_error!("permanent failure for {old_url}: {error}");
                ledger.record(
                    &item_id,
                    ItemOutcome::Failed {
                        error,
                        permanent: true,
                    },
                    &now_rfc3339(),
                );
            }
            Err(ItemFailure::Retryable(error)) => {
                migrate_error!("failed {old_url}: {error} (retryable on next resume)");
                ledger.record(
                    &item_id,
                    ItemOutcome::Failed {
                        error,
                        permanent: false,
                    },
                    &now_rfc3339(),
                );
            }
            Err(ItemFailure::Fatal(error)) => {
                // Leave the item pending so the next resume picks it up.
                migrate_error!("fatal provider error, aborting run: {error}");
                store.save(&ledger, &now_rfc3339())?;
                write_outputs(options, &ledger);
                log_summary(&ledger);
                return Err(RunError::FatalUpload(error));
            }
        }
        store.save(&ledger, &now_rfc3339())?;
    }

    if ledger.summary().remaining == 0 {
        ledger.mark_complete(&now_rfc3339());
    }
    store.save(&ledger, &now_rfc3339())?;
    write_mapping_csv(&options.mapping_output, &ledger.mappings())?;
    // A failed result copy must not discard the finished migration, the
    // mapping file already holds every outcome.
    let result_path = final_result_path(&options.output_dir, &options.input);
    if let Err(err) =
        write_final_result_csv(&options.input, &result_path, &ledger.successful_mappings())
    {
        migrate_warn!("could not write augmented result csv: {err}");
    }
    log_summary(&ledger);

    Ok(RunReport {
        summary: ledger.summary(),
    })
}

enum ItemFailure {
    /// Recorded as failed, never re-attempted (malformed URL, rejected
    /// content).
    Permanent(String),
    /// Recorded as failed, re-attempted on the next resume.
    Retryable(String),
    /// Aborts the whole run (auth/quota).
    Fatal(UploadError),
}

async fn process_item(
    options: &RunOptions,
    downloader: &dyn Downloader,
    uploader: &dyn Uploader,
    row: &ProductRow,
    old_url: &str,
) -> Result<String, ItemFailure> {
    let image_id =
        extract_image_id(old_url).map_err(|err| ItemFailure::Permanent(err.to_string()))?;
    let params = parse_transform_params(old_url);

    let scratch_path = if options.upload_from_url {
        None
    } else {
        migrate_debug!("downloading {} for {}", old_url, row.label());
        let path = downloader
            .download(old_url, &options.scratch_dir)
            .await
            .map_err(|err| ItemFailure::Retryable(err.to_string()))?;
        Some(path)
    };

    let upload_result = match &scratch_path {
        Some(path) => uploader.upload_file(path, &image_id).await,
        None => uploader.upload_from_url(old_url, &image_id).await,
    };
    let asset = upload_result.map_err(|err| {
        if err.is_fatal() {
            ItemFailure::Fatal(err)
        } else if err.kind == UploadErrorKind::Content {
            ItemFailure::Permanent(err.to_string())
        } else {
            ItemFailure::Retryable(err.to_string())
        }
    })?;

    if options.clean_downloads {
        if let Some(path) = scratch_path {
            if let Err(err) = std::fs::remove_file(&path) {
                migrate_warn!("could not remove scratch file {}: {err}", path.display());
            }
        }
    }

    migrate_debug!("provider asset: {}", asset.public_id);
    Ok(delivery_url(
        &options.cloud_name,
        &options.folder,
        &image_id,
        &params,
    ))
}

/// Dry run: transform and validate every not-yet-done row, write a mapping
/// preview, and leave the state file untouched.
fn dry_run(
    options: &RunOptions,
    rows: &[ProductRow],
    ledger: &ProgressLedger,
) -> Result<RunReport, RunError> {
    let mut preview = Vec::new();
    let mut summary = ProgressSummary {
        total: rows.len(),
        ..ProgressSummary::default()
    };

    let mut attempted = 0usize;
    for (index, row) in rows.iter().enumerate() {
        if let Some(cap) = options.batch_size {
            if attempted >= cap {
                break;
            }
        }
        let Some(old_url) = row.image_url() else {
            summary.processed += 1;
            summary.skipped += 1;
            continue;
        };
        if ledger.is_done(&item_identity(index, old_url)) {
            continue;
        }
        attempted += 1;
        summary.processed += 1;
        match extract_image_id(old_url) {
            Ok(image_id) => {
                let params = parse_transform_params(old_url);
                let new_url =
                    delivery_url(&options.cloud_name, &options.folder, &image_id, &params);
                migrate_info!("[dry run] {} -> {new_url}", row.label());
                summary.succeeded += 1;
                preview.push(MappingRecord {
                    old_url: old_url.to_string(),
                    new_url,
                    status: "planned".to_string(),
                    error: String::new(),
                });
            }
            Err(err) => {
                migrate_warn!("[dry run] invalid row {}: {err}", row.label());
                summary.failed += 1;
                preview.push(MappingRecord {
                    old_url: old_url.to_string(),
                    new_url: String::new(),
                    status: "failed".to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
    summary.remaining = summary.total.saturating_sub(summary.processed);

    write_mapping_csv(&options.mapping_output, &preview)?;
    migrate_info!(
        "dry run complete: {} planned, {} invalid, {} skipped",
        summary.succeeded,
        summary.failed,
        summary.skipped
    );
    Ok(RunReport { summary })
}

fn write_outputs(options: &RunOptions, ledger: &ProgressLedger) {
    if let Err(err) = write_mapping_csv(&options.mapping_output, &ledger.mappings()) {
        migrate_warn!("could not write mapping csv: {err}");
    }
    let result_path = final_result_path(&options.output_dir, &options.input);
    if let Err(err) =
        write_final_result_csv(&options.input, &result_path, &ledger.successful_mappings())
    {
        migrate_warn!("could not write augmented result csv: {err}");
    }
}

fn log_summary(ledger: &ProgressLedger) {
    let summary = ledger.summary();
    migrate_info!(
        "migration summary: total {}, processed {}, uploaded {}, failed {}, skipped {}, remaining {}",
        summary.total,
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.remaining
    );
    for (url, error) in ledger.sample_failures(5) {
        migrate_info!("  failed: {url}: {error}");
    }
}
