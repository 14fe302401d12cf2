//! Helpers for whatever feeds captures into the history: recognising
//! screenshot files and finding where the OS puts them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

const SCREENSHOT_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// True for `png`, `jpg` and `jpeg` files, in any letter case.
pub fn is_screenshot_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SCREENSHOT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Most recently modified screenshot file directly inside `folder`.
pub fn latest_screenshot(folder: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, folder = %folder.display(), "Cannot read screenshot folder");
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_screenshot_file(path))
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

/// Folder the platform screenshot tool saves into by default.
pub fn default_screenshot_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;

    #[cfg(target_os = "macos")]
    return Some(home.join("Desktop"));

    #[cfg(target_os = "windows")]
    return Some(home.join("Pictures").join("Screenshots"));

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let pictures = dirs::picture_dir().unwrap_or_else(|| home.join("Pictures"));
        if pictures.exists() {
            Some(pictures)
        } else {
            Some(home)
        }
    }
}
