//! Logging initialization for the migration binary.
//!
//! Logs go to the terminal and to a per-run file under `./logs/`.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOGS_DIR: &str = "logs";

/// Initialize the combined terminal + file logger at the requested level.
///
/// A file logger that cannot be created (read-only filesystem, etc.) is
/// skipped with a warning on stderr rather than failing the run.
pub fn initialize(level: LevelFilter) {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(file_logger) = create_file_logger(level, config) {
        loggers.push(file_logger);
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    if let Err(err) = std::fs::create_dir_all(LOGS_DIR) {
        eprintln!("Warning: could not create {LOGS_DIR}/: {err}");
        return None;
    }
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = PathBuf::from(LOGS_DIR).join(format!("migration_{stamp}.log"));
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: could not create log file at {log_path:?}: {err}");
            None
        }
    }
}
