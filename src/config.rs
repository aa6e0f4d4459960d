use crate::sanitize::extension_of;
use std::collections::BTreeSet;

/// Default cap on a single upload request: 250 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 250 * 1024 * 1024;

/// Upload limits fixed at startup and handed to the upload path.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_upload_size: u64,
    /// Permitted lowercase extensions, or `None` to accept any.
    pub allowed_extensions: Option<BTreeSet<String>>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            allowed_extensions: None,
        }
    }
}

impl UploadConfig {
    pub fn new(max_upload_size: u64, extensions: &[String]) -> Self {
        Self {
            max_upload_size,
            allowed_extensions: normalize_extensions(extensions),
        }
    }

    /// Case-insensitive allow-list check on an already sanitized name.
    pub fn allows(&self, name: &str) -> bool {
        match &self.allowed_extensions {
            None => true,
            Some(allowed) => allowed.contains(&extension_of(name)),
        }
    }
}

/// Lowercases and strips leading dots; an empty list means "allow all".
fn normalize_extensions(extensions: &[String]) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}
