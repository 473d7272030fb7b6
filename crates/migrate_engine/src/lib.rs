//! Migration engine: network I/O, durable state and CSV handling.
mod csv_io;
mod download;
mod ident;
mod persist;
mod retry;
mod state;
mod upload;

pub use csv_io::{final_result_path, read_input_csv, write_final_result_csv, write_mapping_csv, CsvError};
pub use download::{DownloadError, DownloadSettings, Downloader, HttpDownloader};
pub use ident::item_identity;
pub use persist::{atomic_write, ensure_dir, PersistError};
pub use retry::{retry_with_backoff, BackoffSchedule};
pub use state::{StateError, StateStore, STATE_FILENAME};
pub use upload::{
    CloudinaryUploader, ProviderCredentials, UploadError, UploadErrorKind, UploadedAsset, Uploader,
};
