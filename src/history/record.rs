//! Screenshot records and capture id generation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::capture;

const STORED_FILE_PREFIX: &str = "screenshot_";
const DEFAULT_EXTENSION: &str = "png";

/// One retained capture. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    pub id: String,
    /// Copy owned by the store.
    pub path: PathBuf,
    /// Where the capture event said the file was. May no longer exist.
    pub original_path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl ScreenshotRecord {
    pub fn new(id: String, path: PathBuf, original_path: PathBuf, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            path,
            original_path,
            timestamp,
        }
    }
}

/// Formats `now` as a file-name-safe id, e.g. `2026-10-19T15-58-01-123Z`.
pub fn capture_id(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(&[':', '.'][..], "-")
}

/// Returns an id for `now` that `taken` reports as free, adding `-1`, `-2`, ...
/// when several captures land in the same millisecond.
pub fn unique_capture_id(now: DateTime<Utc>, mut taken: impl FnMut(&str) -> bool) -> String {
    let base = capture_id(now);
    if !taken(&base) {
        return base;
    }
    let mut n: u32 = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// File name for the stored copy of a capture: `screenshot_<id>.<ext>`.
pub(crate) fn stored_file_name(id: &str, source: &Path) -> String {
    let ext = if capture::is_screenshot_file(source) {
        source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    } else {
        DEFAULT_EXTENSION.to_string()
    };
    format!("{STORED_FILE_PREFIX}{id}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 58, 1).unwrap() + chrono::Duration::milliseconds(123)
    }

    #[test]
    fn test_capture_id_is_filesystem_safe() {
        let id = capture_id(instant());
        assert_eq!(id, "2026-10-19T15-58-01-123Z");
        assert!(!id.contains(':'));
        assert!(!id.contains('.'));
    }

    #[test]
    fn test_unique_capture_id_appends_counter() {
        let base = capture_id(instant());
        let used = [base.clone(), format!("{base}-1")];
        let id = unique_capture_id(instant(), |c| used.iter().any(|u| u == c));
        assert_eq!(id, format!("{base}-2"));
    }

    #[test]
    fn test_stored_file_name_keeps_image_extension() {
        assert_eq!(
            stored_file_name("abc", Path::new("/tmp/Shot.JPG")),
            "screenshot_abc.jpg"
        );
        assert_eq!(
            stored_file_name("abc", Path::new("/tmp/shot.bmp")),
            "screenshot_abc.png"
        );
        assert_eq!(stored_file_name("abc", Path::new("/tmp/shot")), "screenshot_abc.png");
    }

    #[test]
    fn test_record_serializes_with_original_field_names() {
        let record = ScreenshotRecord::new(
            "id-1".to_string(),
            PathBuf::from("/store/screenshot_id-1.png"),
            PathBuf::from("/home/me/Desktop/shot.png"),
            instant(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "id-1");
        assert_eq!(json["path"], "/store/screenshot_id-1.png");
        assert_eq!(json["originalPath"], "/home/me/Desktop/shot.png");
        assert!(json["timestamp"].as_str().unwrap().starts_with("2026-10-19T15:58:01.123"));
    }
}
