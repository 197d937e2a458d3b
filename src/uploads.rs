//! Attachment storage on the local filesystem.
//!
//! Files are keyed by their sanitized original name. Two uploads that
//! sanitize to the same name share one file; the later write wins.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Write `contents` under the sanitized form of `original_name` and
    /// return the stored name, or `None` when nothing usable is left of it.
    pub async fn save(&self, original_name: &str, contents: &[u8]) -> std::io::Result<Option<String>> {
        let Some(name) = sanitize_filename(original_name) else {
            debug!(original_name, "attachment name sanitized to nothing; skipped");
            return Ok(None);
        };
        tokio::fs::write(self.root.join(&name), contents).await?;
        Ok(Some(name))
    }

    /// Delete a stored file. A file that is already gone is not an error,
    /// and other failures are logged rather than returned.
    pub async fn remove(&self, name: &str) {
        let Some(name) = sanitize_filename(name) else {
            return;
        };
        match tokio::fs::remove_file(self.root.join(&name)).await {
            Ok(()) => debug!(file = %name, "attachment removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(file = %name, "attachment already missing")
            }
            Err(err) => warn!(file = %name, error = %err, "failed to remove attachment"),
        }
    }
}

/// Reduce a client supplied filename to a safe flat name: path parts become
/// separators, whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]`
/// is dropped and leading or trailing dots and underscores are trimmed.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let flattened: String = raw
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        return None;
    }

    let stem = trimmed.split('.').next().unwrap_or_default().to_ascii_uppercase();
    if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        return Some(format!("_{trimmed}"));
    }

    Some(trimmed.to_owned())
}
