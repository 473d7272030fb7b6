//! Provider configuration from the environment.
//!
//! Credentials are read from `config.env` in the working directory when
//! present, falling back to `.env` and the process environment.

use std::path::Path;

use migrate_engine::ProviderCredentials;
use migrate_logging::migrate_debug;

const DEFAULT_FOLDER: &str = "product-images";
/// Cloud-name placeholder for dry runs without credentials, so generated
/// preview URLs are obviously not live.
const DRY_RUN_CLOUD: &str = "CLOUD";

/// Load provider credentials. For a dry run missing values are tolerated
/// (no network call will be made); otherwise every credential is required.
pub fn load(dry_run: bool) -> Result<ProviderCredentials, String> {
    if Path::new("config.env").exists() {
        let _ = dotenvy::from_filename("config.env");
        migrate_debug!("loaded environment from config.env");
    } else {
        let _ = dotenvy::dotenv();
    }

    let mut credentials = ProviderCredentials {
        cloud_name: env_or_default("CLOUDINARY_CLOUD_NAME"),
        api_key: env_or_default("CLOUDINARY_API_KEY"),
        api_secret: env_or_default("CLOUDINARY_API_SECRET"),
        folder: std::env::var("CLOUDINARY_FOLDER").unwrap_or_else(|_| DEFAULT_FOLDER.to_string()),
    };

    if dry_run {
        if credentials.cloud_name.is_empty() {
            credentials.cloud_name = DRY_RUN_CLOUD.to_string();
        }
        return Ok(credentials);
    }

    let mut missing = Vec::new();
    if credentials.cloud_name.is_empty() {
        missing.push("CLOUDINARY_CLOUD_NAME");
    }
    if credentials.api_key.is_empty() {
        missing.push("CLOUDINARY_API_KEY");
    }
    if credentials.api_secret.is_empty() {
        missing.push("CLOUDINARY_API_SECRET");
    }
    if missing.is_empty() {
        Ok(credentials)
    } else {
        Err(format!(
            "missing required configuration: {} (set them in config.env)",
            missing.join(", ")
        ))
    }
}

fn env_or_default(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}
