#![deny(missing_docs)]
//! Logging facade for the migration workspace.
//!
//! Every crate logs through the `migrate_*` macros below so call sites stay
//! uniform even if the backend changes; `initialize_for_tests` gives test
//! binaries a terminal logger without fighting over the global logger slot.

/// Emit a trace-level message through the `log` facade.
#[macro_export]
macro_rules! migrate_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Emit a debug-level message through the `log` facade.
#[macro_export]
macro_rules! migrate_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Emit an info-level message through the `log` facade.
#[macro_export]
macro_rules! migrate_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Emit a warn-level message through the `log` facade.
#[macro_export]
macro_rules! migrate_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Emit an error-level message through the `log` facade.
#[macro_export]
macro_rules! migrate_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Set up a terminal logger for test binaries.
///
/// Repeated calls are harmless: only the first initialization wins.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Debug builds get debug-level output, release test runs stay at info.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test may have installed the logger first; that is fine.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
