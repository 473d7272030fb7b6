use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use migrate_core::{MappingRecord, ProductRow};
use migrate_logging::{migrate_info, migrate_warn};

use crate::persist::{atomic_write, PersistError};

/// Column appended to the augmented copy of the input CSV.
const NEW_URL_COLUMN: &str = "New Image Link";
/// Marker written for rows that did not reach `uploaded`.
const UNMIGRATED_MARKER: &str = "PENDING/FAILED";

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("input csv not found: {0}")]
    MissingInput(PathBuf),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("output write failed: {0}")]
    Persist(#[from] PersistError),
}

/// Read the input product CSV into ordered rows, preserving every column.
///
/// Headers are trimmed and stripped of a UTF-8 BOM; cell values are trimmed
/// the way the legacy exports need.
pub fn read_input_csv(path: &Path) -> Result<Vec<ProductRow>, CsvError> {
    if !path.exists() {
        return Err(CsvError::MissingInput(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let columns = headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let value = record.get(index).unwrap_or("").trim().to_string();
                (header.clone(), value)
            })
            .collect();
        rows.push(ProductRow::new(columns));
    }

    migrate_info!("read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Write `mapping.csv`: one `old_url, new_url, status, error` row per
/// attempted item, atomically replaced on every call.
pub fn write_mapping_csv(path: &Path, mappings: &[MappingRecord]) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["old_url", "new_url", "status", "error"])?;
    for mapping in mappings {
        writer.write_record([
            mapping.old_url.as_str(),
            mapping.new_url.as_str(),
            mapping.status.as_str(),
            mapping.error.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| CsvError::Io(err.into_error()))?;
    atomic_write(path, &bytes)?;
    migrate_info!("wrote {} mappings to {}", mappings.len(), path.display());
    Ok(())
}

/// Path of the augmented result file for a given input:
/// `{output_dir}/Final_Result_{input_stem}.csv`.
pub fn final_result_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    output_dir.join(format!("Final_Result_{stem}.csv"))
}

/// Write a copy of the input CSV with a `New Image Link` column appended:
/// the new URL for migrated rows, a marker for everything else.
pub fn write_final_result_csv(
    input: &Path,
    output: &Path,
    successes: &BTreeMap<String, String>,
) -> Result<(), CsvError> {
    let rows = read_input_csv(input)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header_written = false;
    for row in &rows {
        if !header_written {
            let mut header: Vec<&str> =
                row.columns().iter().map(|(name, _)| name.as_str()).collect();
            header.push(NEW_URL_COLUMN);
            writer.write_record(&header)?;
            header_written = true;
        }
        let new_url = row
            .image_url()
            .and_then(|url| successes.get(url))
            .map(String::as_str)
            .unwrap_or(UNMIGRATED_MARKER);
        let mut record: Vec<&str> =
            row.columns().iter().map(|(_, value)| value.as_str()).collect();
        record.push(new_url);
        writer.write_record(&record)?;
    }

    if !header_written {
        migrate_warn!("input {} has no data rows, skipping result copy", input.display());
        return Ok(());
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| CsvError::Io(err.into_error()))?;
    atomic_write(output, &bytes)?;
    migrate_info!("wrote augmented result to {}", output.display());
    Ok(())
}
