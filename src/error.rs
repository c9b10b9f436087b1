use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by load/save. Everything else (out-of-range offsets,
/// malformed UTF-8) is clamped or stepped over instead of failing, so an
/// editor keeps accepting keystrokes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("document has no backing file path")]
    NoPath,
}
