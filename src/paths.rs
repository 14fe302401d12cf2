//! Path utilities for the application data directory and runtime files.

use std::env;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "snapframe";
const STORAGE_DIR_NAME: &str = "screenshots";
const SOCKET_FILE_NAME: &str = "snapframe.sock";

/// Environment variable that overrides the application data directory.
pub const HOME_ENV: &str = "SNAPFRAME_HOME";

/// Gets the base application data directory.
///
/// `$SNAPFRAME_HOME` when set, otherwise the platform data dir:
/// - Linux: `~/.local/share/snapframe`
/// - macOS: `~/Library/Application Support/snapframe`
/// - Windows: `%APPDATA%\snapframe`
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    if let Ok(home) = env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or("Could not determine data directory: no data or home directory available")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Gets the default screenshot storage directory: `<app data>/screenshots`
pub fn get_storage_dir() -> Result<PathBuf, String> {
    Ok(get_app_data_dir()?.join(STORAGE_DIR_NAME))
}

/// Returns the path where the capture socket is bound.
/// Prefers XDG_RUNTIME_DIR, then /run/user/{uid}, then /tmp/snapframe-{uid}.sock.
#[cfg(unix)]
pub fn socket_path() -> PathBuf {
    socket_candidates()
        .into_iter()
        .find(|candidate| candidate.parent().is_some_and(|parent| parent.exists()))
        .unwrap_or_else(|| PathBuf::from(format!("/tmp/snapframe-{}.sock", current_uid())))
}

#[cfg(not(unix))]
pub fn socket_path() -> PathBuf {
    PathBuf::from(SOCKET_FILE_NAME)
}

/// Every place a running instance may have bound its socket, in preference order.
#[cfg(unix)]
pub fn socket_candidates() -> Vec<PathBuf> {
    let uid = current_uid();
    let mut candidates = Vec::new();
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            candidates.push(PathBuf::from(runtime_dir).join(SOCKET_FILE_NAME));
        }
    }
    candidates.push(PathBuf::from(format!("/run/user/{uid}")).join(SOCKET_FILE_NAME));
    candidates.push(PathBuf::from(format!("/tmp/snapframe-{uid}.sock")));
    candidates.dedup();
    candidates
}

#[cfg(not(unix))]
pub fn socket_candidates() -> Vec<PathBuf> {
    Vec::new()
}

#[cfg(unix)]
fn current_uid() -> u32 {
    std::fs::metadata("/proc/self")
        .map(|meta| std::os::unix::fs::MetadataExt::uid(&meta))
        .unwrap_or(0)
}
