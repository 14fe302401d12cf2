//! Persistent index: the full record list as one JSON file.
//!
//! Every save rewrites the whole list. The new content goes to a sibling
//! temporary file first and is renamed over the index, so a crash mid-write
//! leaves either the old or the new list on disk, never a truncated one.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{HistoryError, ScreenshotRecord};

pub const INDEX_FILE_NAME: &str = "recent_screenshots.json";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct IndexFile {
    path: PathBuf,
}

impl IndexFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Index file living in `dir` under the default name.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(INDEX_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    /// Reads the stored list. A missing file is a first run, not an error.
    pub fn load(&self) -> Result<Vec<ScreenshotRecord>, HistoryError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Index file does not exist, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let records: Vec<ScreenshotRecord> = serde_json::from_str(&data)?;
        debug!(path = %self.path.display(), count = records.len(), "Index loaded");
        Ok(records)
    }

    /// Replaces the stored list with `records`.
    pub fn save(&self, records: &[ScreenshotRecord]) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(records)?;
        let temp_path = self.temp_path();

        let write_result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = write_result {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(error = %cleanup, path = %temp_path.display(), "Failed to remove temp index file");
                }
            }
            return Err(e.into());
        }

        debug!(path = %self.path.display(), count = records.len(), "Index saved");
        Ok(())
    }

    /// Removes a temporary file left behind by an interrupted save.
    pub fn remove_stale_temp(&self) {
        let temp_path = self.temp_path();
        match fs::remove_file(&temp_path) {
            Ok(()) => debug!(path = %temp_path.display(), "Removed stale temp index file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %temp_path.display(), "Failed to remove stale temp index file"),
        }
    }
}
