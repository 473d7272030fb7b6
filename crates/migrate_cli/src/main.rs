use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use migrate_cli::{config, logging, run};
use migrate_engine::{CloudinaryUploader, DownloadSettings, HttpDownloader};
use migrate_logging::{migrate_error, migrate_info};

const OUTPUT_DIR: &str = "output";
const DOWNLOADS_DIR: &str = "downloads";

/// Migrate legacy CDN product images to the new hosting provider.
#[derive(Debug, Parser)]
#[command(name = "cdn-migrate", version)]
struct Cli {
    /// Input CSV file path
    #[arg(long, short = 'i')]
    input: PathBuf,
    /// Output mapping CSV path (default: output/mapping.csv)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    /// Validate and report without uploading
    #[arg(long, short = 'n')]
    dry_run: bool,
    /// Resume from previous state
    #[arg(long, short = 'r')]
    resume: bool,
    /// Process at most N pending items this run
    #[arg(long, short = 'b')]
    batch_size: Option<usize>,
    /// Upload directly from URL (skip local download)
    #[arg(long, short = 'u')]
    url_upload: bool,
    /// Delete downloaded images after successful upload
    #[arg(long)]
    clean_downloads: bool,
    /// Tolerated number of failed items before a nonzero exit
    #[arg(long, default_value_t = 0)]
    max_failures: usize,
    /// Log verbosity
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(cli.log_level);

    let credentials = match config::load(cli.dry_run) {
        Ok(credentials) => credentials,
        Err(err) => {
            migrate_error!("{err}");
            return ExitCode::from(2);
        }
    };

    let output_dir = PathBuf::from(OUTPUT_DIR);
    let options = run::RunOptions {
        input: cli.input,
        mapping_output: cli
            .output
            .unwrap_or_else(|| output_dir.join("mapping.csv")),
        output_dir,
        scratch_dir: PathBuf::from(DOWNLOADS_DIR),
        dry_run: cli.dry_run,
        resume: cli.resume,
        batch_size: cli.batch_size,
        upload_from_url: cli.url_upload,
        clean_downloads: cli.clean_downloads,
        cloud_name: credentials.cloud_name.clone(),
        folder: credentials.folder.clone(),
    };

    let downloader = match HttpDownloader::new(DownloadSettings::default()) {
        Ok(downloader) => downloader,
        Err(err) => {
            migrate_error!("could not build http client: {err}");
            return ExitCode::from(2);
        }
    };
    let uploader = match CloudinaryUploader::new(credentials) {
        Ok(uploader) => uploader,
        Err(err) => {
            migrate_error!("could not build upload client: {err}");
            return ExitCode::from(2);
        }
    };

    // One item at a time by design: provider rate limits make concurrency
    // useless here, so a current-thread runtime is all the pipeline needs.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            migrate_error!("could not start runtime: {err}");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run::run_migration(&options, &downloader, &uploader)) {
        Ok(report) => {
            if report.summary.failed > cli.max_failures {
                migrate_info!(
                    "{} failed items exceed the allowed {}",
                    report.summary.failed,
                    cli.max_failures
                );
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            migrate_error!("migration aborted: {err}");
            ExitCode::from(2)
        }
    }
}
