//! Persistent configuration handling for snapframe.
//!
//! Persists configuration in a JSON file:
//! `~/.config/snapframe/config.json` (or `$SNAPFRAME_HOME/config.json`).

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::capture;
use crate::history::MAX_RETAINED;
use crate::paths;
use crate::style::FrameStyle;

const APP_CONFIG_DIR_NAME: &str = "snapframe";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
    #[error("No data directory available: {0}")]
    NoDataDir(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Some(Self::Error),
            "WARN" | "WARNING" => Some(Self::Warn),
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            "TRACE" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    max_retained: Option<usize>,
    #[serde(default)]
    storage_dir: Option<PathBuf>,
    #[serde(default)]
    screenshot_dir: Option<PathBuf>,
    #[serde(default)]
    style: Option<FrameStyle>,
}

/// Configuration with every default filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub log_level: LogLevel,
    pub max_retained: usize,
    pub storage_dir: PathBuf,
    pub screenshot_dir: Option<PathBuf>,
    pub style: FrameStyle,
}

impl Settings {
    fn resolve(raw: RawConfig) -> Result<Self, ConfigError> {
        let storage_dir = match raw.storage_dir.filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => paths::get_storage_dir().map_err(ConfigError::NoDataDir)?,
        };
        Ok(Self {
            log_level: raw
                .log_level
                .as_deref()
                .and_then(LogLevel::from_str)
                .unwrap_or_default(),
            max_retained: raw.max_retained.unwrap_or(MAX_RETAINED).max(1),
            storage_dir,
            screenshot_dir: raw
                .screenshot_dir
                .filter(|p| !p.as_os_str().is_empty())
                .or_else(capture::default_screenshot_dir),
            style: raw.style.unwrap_or_default().clamped(),
        })
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(home) = env::var(paths::HOME_ENV) {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home).join(CONFIG_FILE_NAME));
        }
    }
    let path = config_dir()?
        .join(APP_CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    Some(path)
}

fn ensure_config_dir_exists(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn load_raw_config_from(path: &Path) -> Result<RawConfig, ConfigError> {
    if !path.exists() {
        debug!(?path, "Config file does not exist, using defaults");
        return Ok(RawConfig::default());
    }

    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    debug!(?path, "Config loaded");
    Ok(cfg)
}

fn save_raw_config_to(path: &Path, mut cfg: RawConfig) -> Result<(), ConfigError> {
    ensure_config_dir_exists(path)?;
    cfg.log_level = cfg.log_level.filter(|s| !s.is_empty());
    cfg.storage_dir = cfg.storage_dir.filter(|p| !p.as_os_str().is_empty());
    cfg.screenshot_dir = cfg.screenshot_dir.filter(|p| !p.as_os_str().is_empty());

    let data = serde_json::to_string_pretty(&cfg)?;
    fs::write(path, data)?;
    debug!(?path, "Config saved");
    Ok(())
}

fn load_or_default_config(path: &Path) -> RawConfig {
    match load_raw_config_from(path) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = ?err, "Failed to load existing config, starting fresh");
            RawConfig::default()
        }
    }
}

/// Loads settings from `path`. An unreadable or malformed file falls back to
/// defaults; only an unresolvable storage directory is an error.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    Settings::resolve(load_or_default_config(path))
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    match config_path() {
        Some(path) => load_settings_from(&path),
        None => {
            debug!("No config_dir available, using defaults only");
            Settings::resolve(RawConfig::default())
        }
    }
}

/// Log level from the config file, read before logging is set up.
pub fn load_log_level() -> LogLevel {
    let Some(path) = config_path() else {
        return LogLevel::Info;
    };
    match load_raw_config_from(&path) {
        Ok(cfg) => cfg
            .log_level
            .as_deref()
            .and_then(LogLevel::from_str)
            .unwrap_or(LogLevel::Info),
        Err(err) => {
            eprintln!("Config: failed to load config, using default log level: {err:?}");
            LogLevel::Info
        }
    }
}

pub fn save_log_level_to(path: &Path, level: LogLevel) -> Result<(), ConfigError> {
    debug!(?level, "Saving log level");
    let mut cfg = load_or_default_config(path);
    cfg.log_level = Some(level.as_str().to_string());
    save_raw_config_to(path, cfg)
}

pub fn save_log_level(level: LogLevel) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_log_level_to(&path, level).inspect_err(|err| error!(error = ?err, "Failed to save log level"))
}

pub fn save_style_to(path: &Path, style: &FrameStyle) -> Result<(), ConfigError> {
    debug!(?style, "Saving frame style");
    let mut cfg = load_or_default_config(path);
    cfg.style = Some(style.clone().clamped());
    save_raw_config_to(path, cfg)
}

pub fn save_style(style: &FrameStyle) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_style_to(&path, style).inspect_err(|err| error!(error = ?err, "Failed to save frame style"))
}
