//! Migration core: pure URL transformation, row model and progress ledger.
mod progress;
mod row;
mod transform;

pub use progress::{
    ItemOutcome, ItemStatus, MappingRecord, MigrationItem, ProgressLedger, ProgressSummary,
};
pub use row::ProductRow;
pub use transform::{
    delivery_url, extract_image_id, file_extension, original_image_url, parse_transform_params,
    TransformError,
};
