//! Recent screenshot history: the last few captures, copied into a private
//! directory and indexed by a JSON file that survives restarts.
//!
//! [`store::CaptureStore`] owns the directory, the index file and the in-memory
//! list. [`worker`] runs it on a dedicated thread so that captures, deletions
//! and reads coming from different places are handled one at a time.

mod index;
mod record;
mod store;
pub mod worker;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use index::{IndexFile, INDEX_FILE_NAME};
pub use record::{capture_id, unique_capture_id, ScreenshotRecord};
pub use store::{read_stored, CaptureStore, MAX_RETAINED};
pub use worker::{create_history_state, HistoryEvent, HistoryRequest, HistoryState};

/// Errors surfaced by the history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Index file is not a valid record list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Stored screenshot not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("No screenshot with id {0}")]
    UnknownId(String),
    #[error("Path is outside the screenshot store: {}", .0.display())]
    OutsideStore(PathBuf),
    #[error("Failed to initialize screenshot store at {}: {source}", .path.display())]
    Init { path: PathBuf, source: io::Error },
    #[error("History worker is not running")]
    WorkerGone,
}
