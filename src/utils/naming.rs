use std::ffi::OsStr;
use std::path::Path;

use uuid::Uuid;

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;

/// Generates a storage key for an uploaded file.
///
/// Only the extension of `original` is kept; the rest of the key is a random
/// v4 UUID, so concurrent callers never need to coordinate.
pub fn generate_file_name(original: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), get_extension(original))
}

fn get_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(OsStr::to_str)
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}
