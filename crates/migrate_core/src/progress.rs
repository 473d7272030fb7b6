use std::collections::BTreeMap;

/// Per-item processing status.
///
/// `Uploaded` is terminal. `Failed { permanent: true }` is terminal too
/// (malformed source URLs cannot succeed on retry); a non-permanent failure
/// becomes `Pending` again when the next resume run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Uploaded,
    Failed { permanent: bool },
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Uploaded => "uploaded",
            ItemStatus::Failed { .. } => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }
}

/// Result of one processing attempt, applied to the ledger exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Uploaded { new_url: String },
    Failed { error: String, permanent: bool },
    Skipped { reason: String },
}

/// One migration item derived from an input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationItem {
    pub old_url: String,
    pub new_url: Option<String>,
    pub status: ItemStatus,
    pub error: Option<String>,
    /// RFC 3339 timestamp of the last transition, supplied by the caller;
    /// the ledger itself never reads a clock.
    pub updated_at: String,
}

/// Output row for `mapping.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRecord {
    pub old_url: String,
    pub new_url: String,
    pub status: String,
    pub error: String,
}

/// Aggregate progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSummary {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub remaining: usize,
}

/// Pure progress state: item id -> migration item, plus run metadata.
///
/// This is the sole durability boundary of a run; the engine's state store
/// serializes it after every processed item. All methods are side-effect
/// free so transitions can be tested without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressLedger {
    // Item ids embed the row position, so BTreeMap order is input order.
    items: BTreeMap<String, MigrationItem>,
    total: usize,
    started_at: String,
    completed_at: Option<String>,
}

impl ProgressLedger {
    pub fn new(started_at: impl Into<String>) -> Self {
        Self {
            started_at: started_at.into(),
            ..Self::default()
        }
    }

    /// Rebuild a ledger from persisted items (state store load path).
    pub fn from_parts(
        started_at: String,
        completed_at: Option<String>,
        total: usize,
        items: Vec<(String, MigrationItem)>,
    ) -> Self {
        Self {
            items: items.into_iter().collect(),
            total,
            started_at,
            completed_at,
        }
    }

    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    pub fn completed_at(&self) -> Option<&str> {
        self.completed_at.as_deref()
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Register an item as pending if the ledger has not seen it yet.
    pub fn begin(&mut self, item_id: &str, old_url: &str, now: &str) {
        self.items
            .entry(item_id.to_string())
            .or_insert_with(|| MigrationItem {
                old_url: old_url.to_string(),
                new_url: None,
                status: ItemStatus::Pending,
                error: None,
                updated_at: now.to_string(),
            });
    }

    /// True when the item needs no further work: uploaded, permanently
    /// failed, or skipped.
    pub fn is_done(&self, item_id: &str) -> bool {
        matches!(
            self.items.get(item_id).map(|item| &item.status),
            Some(ItemStatus::Uploaded)
                | Some(ItemStatus::Failed { permanent: true })
                | Some(ItemStatus::Skipped)
        )
    }

    /// True when the item was attempted in some run (any non-pending state).
    pub fn is_attempted(&self, item_id: &str) -> bool {
        !matches!(
            self.items.get(item_id).map(|item| &item.status),
            None | Some(ItemStatus::Pending)
        )
    }

    /// Apply a processing outcome. An `uploaded` item is never mutated
    /// again, whatever outcome a buggy caller reports for it.
    pub fn record(&mut self, item_id: &str, outcome: ItemOutcome, now: &str) {
        let Some(item) = self.items.get_mut(item_id) else {
            return;
        };
        if item.status == ItemStatus::Uploaded {
            return;
        }
        item.updated_at = now.to_string();
        match outcome {
            ItemOutcome::Uploaded { new_url } => {
                item.status = ItemStatus::Uploaded;
                item.new_url = Some(new_url);
                item.error = None;
            }
            ItemOutcome::Failed { error, permanent } => {
                item.status = ItemStatus::Failed { permanent };
                item.error = Some(error);
            }
            ItemOutcome::Skipped { reason } => {
                item.status = ItemStatus::Skipped;
                item.error = Some(reason);
            }
        }
    }

    /// Return transient failures to `pending` so a resume run re-attempts
    /// them. Permanent failures stay terminal.
    pub fn reset_retryable(&mut self, now: &str) -> usize {
        let mut reset = 0;
        for item in self.items.values_mut() {
            if item.status == (ItemStatus::Failed { permanent: false }) {
                item.status = ItemStatus::Pending;
                item.error = None;
                item.updated_at = now.to_string();
                reset += 1;
            }
        }
        reset
    }

    pub fn mark_complete(&mut self, now: &str) {
        self.completed_at = Some(now.to_string());
    }

    pub fn items(&self) -> impl Iterator<Item = (&String, &MigrationItem)> {
        self.items.iter()
    }

    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary {
            total: self.total.max(self.items.len()),
            ..ProgressSummary::default()
        };
        for item in self.items.values() {
            match item.status {
                ItemStatus::Pending => {}
                ItemStatus::Uploaded => {
                    summary.processed += 1;
                    summary.succeeded += 1;
                }
                ItemStatus::Failed { .. } => {
                    summary.processed += 1;
                    summary.failed += 1;
                }
                ItemStatus::Skipped => {
                    summary.processed += 1;
                    summary.skipped += 1;
                }
            }
        }
        summary.remaining = summary.total.saturating_sub(summary.processed);
        summary
    }

    /// Terminal mapping records in input order, one per attempted item.
    pub fn mappings(&self) -> Vec<MappingRecord> {
        self.items
            .values()
            .filter(|item| item.status != ItemStatus::Pending)
            .map(|item| MappingRecord {
                old_url: item.old_url.clone(),
                new_url: item.new_url.clone().unwrap_or_default(),
                status: item.status.as_str().to_string(),
                error: item.error.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Successful old-url -> new-url pairs, for the augmented result CSV.
    pub fn successful_mappings(&self) -> BTreeMap<String, String> {
        self.items
            .values()
            .filter_map(|item| match (&item.status, &item.new_url) {
                (ItemStatus::Uploaded, Some(new_url)) => {
                    Some((item.old_url.clone(), new_url.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// The first few failures, for the end-of-run summary log.
    pub fn sample_failures(&self, limit: usize) -> Vec<(&str, &str)> {
        self.items
            .values()
            .filter(|item| matches!(item.status, ItemStatus::Failed { .. }))
            .take(limit)
            .map(|item| {
                (
                    item.old_url.as_str(),
                    item.error.as_deref().unwrap_or("unknown"),
                )
            })
            .collect()
    }
}
