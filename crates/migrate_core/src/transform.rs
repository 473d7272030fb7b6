use std::fmt;

use url::Url;

/// Failure to derive an image identity from a legacy URL.
///
/// Malformed URLs are a permanent condition: the orchestrator records them
/// as failed and never retries them on later resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    MalformedUrl { url: String, reason: String },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::MalformedUrl { url, reason } => {
                write!(f, "malformed url {url}: {reason}")
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Transform directives recognized in legacy CDN URLs.
///
/// Anything outside this set (metadata hints, sharpening, etc.) is dropped;
/// the delivery URL falls back to documented defaults instead.
const RECOGNIZED_PARAMS: &[&str] = &["w", "h", "q", "quality", "f", "fit"];

/// Parse transform parameters from a legacy CDN URL.
///
/// Two URL shapes appear in production data:
/// - query form: `{base}/{path}/{id}.png?w=270&q=70&fit=scale-down`
/// - path form: `{base}/cdn-cgi/image/w=270,q=70,fit=scale-down/{path}/{id}.png`
///
/// Returns recognized `(key, value)` pairs in source order. An unparseable
/// URL yields an empty list; parameter extraction never fails on its own.
pub fn parse_transform_params(raw: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Some(segment) = cdn_cgi_segment(raw) {
        for pair in segment.split(',') {
            if let Some((key, value)) = pair.split_once('=') {
                push_recognized(&mut params, key, value);
            }
        }
        return params;
    }

    if let Ok(parsed) = Url::parse(raw) {
        for (key, value) in parsed.query_pairs() {
            push_recognized(&mut params, &key, &value);
        }
    }
    params
}

fn push_recognized(params: &mut Vec<(String, String)>, key: &str, value: &str) {
    let key = key.trim();
    let value = value.trim();
    if RECOGNIZED_PARAMS.contains(&key) && !value.is_empty() {
        params.push((key.to_string(), value.to_string()));
    }
}

/// The `param1=a,param2=b` segment of a `/cdn-cgi/image/{params}/{path}` URL.
fn cdn_cgi_segment(raw: &str) -> Option<&str> {
    let (_, rest) = raw.split_once("/cdn-cgi/image/")?;
    let (segment, _) = rest.split_once('/')?;
    Some(segment)
}

/// The image path after any transform segment, without a leading slash.
fn image_path(raw: &str) -> Result<String, TransformError> {
    if let Some((_, rest)) = raw.split_once("/cdn-cgi/image/") {
        if let Some((_, path)) = rest.split_once('/') {
            return Ok(path.to_string());
        }
    }
    let parsed = Url::parse(raw).map_err(|err| TransformError::MalformedUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    Ok(parsed.path().trim_start_matches('/').to_string())
}

/// Extract the stable image identifier: the filename stem of the last path
/// segment.
pub fn extract_image_id(raw: &str) -> Result<String, TransformError> {
    let path = image_path(raw)?;
    let path = path.split('?').next().unwrap_or(&path);
    let filename = path.rsplit('/').next().unwrap_or(path);
    let stem = match filename.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => filename,
    };
    if stem.is_empty() {
        return Err(TransformError::MalformedUrl {
            url: raw.to_string(),
            reason: "no image identifier in path".to_string(),
        });
    }
    Ok(stem.to_string())
}

/// Build the URL of the untransformed image for downloading.
///
/// Drops the `cdn-cgi/image/...` segment or the transform query parameters
/// so the origin serves the original bytes. The parsed URL is mutated in
/// place, keeping scheme, authority (including any port) and encoding
/// intact.
pub fn original_image_url(raw: &str) -> Result<String, TransformError> {
    let mut parsed = Url::parse(raw).map_err(|err| TransformError::MalformedUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    let path = image_path(raw)?;
    let path = path.split('?').next().unwrap_or(&path);
    parsed.set_path(path);
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

/// File extension of the image path, defaulting to `png`.
pub fn file_extension(raw: &str) -> String {
    let path = match image_path(raw) {
        Ok(path) => path,
        Err(_) => raw.to_string(),
    };
    let path = path.split('?').next().unwrap_or(&path);
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => ext.to_ascii_lowercase(),
        _ => "png".to_string(),
    }
}

/// Build the provider delivery URL:
/// `https://res.cloudinary.com/{cloud}/image/upload/{transform}/{folder}/{id}`.
///
/// Source parameters map onto provider syntax in a fixed order
/// (`w_`, `h_`, `q_`, `f_`, `c_`), with `f_auto,c_scale` defaults applied
/// when the source value is absent or unrecognized.
pub fn delivery_url(
    cloud_name: &str,
    folder: &str,
    image_id: &str,
    params: &[(String, String)],
) -> String {
    let transform = transform_string(params);
    format!("https://res.cloudinary.com/{cloud_name}/image/upload/{transform}/{folder}/{image_id}")
}

fn transform_string(params: &[(String, String)]) -> String {
    let lookup = |wanted: &str| {
        params
            .iter()
            .find(|(key, _)| key == wanted)
            .map(|(_, value)| value.as_str())
    };

    let mut parts = Vec::new();
    if let Some(width) = lookup("w") {
        parts.push(format!("w_{width}"));
    }
    if let Some(height) = lookup("h") {
        parts.push(format!("h_{height}"));
    }
    if let Some(quality) = lookup("q").or_else(|| lookup("quality")) {
        parts.push(format!("q_{quality}"));
    }
    let format_value = lookup("f").unwrap_or("auto");
    parts.push(format!("f_{format_value}"));
    parts.push(format!("c_{}", crop_mode(lookup("fit"))));
    parts.join(",")
}

/// Map the legacy `fit` directive onto a provider crop mode.
fn crop_mode(fit: Option<&str>) -> &'static str {
    match fit {
        Some("cover") | Some("crop") => "fill",
        Some("contain") => "fit",
        // `scale-down`, `scale`, absent, or unrecognized all scale.
        _ => "scale",
    }
}
