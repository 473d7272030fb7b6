use sha2::{Digest, Sha256};

/// Stable item identity for resume tracking: row position plus a short URL
/// hash. The input CSV carries no reliable id column, so identity holds as
/// long as the input file itself is unchanged between runs; a reordered
/// input is a new migration.
pub fn item_identity(row_index: usize, url: &str) -> String {
    format!("row{row_index:05}-{}", short_hash(url))
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
