//! snapframe: keeps the last few screenshots on disk for the framing editor.
//!
//! The history itself lives in [`history`]. Everything else here wires it to
//! configuration, logging and the single-instance socket used by the CLI.

pub mod capture;
pub mod capture_socket;
pub mod config;
pub mod history;
pub mod paths;
pub mod style;
pub mod thumbnail;

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use capture_socket::{SocketCommand, SocketError, SocketReply};
use config::{ConfigError, LogLevel, Settings};
use history::{CaptureStore, HistoryError};
use thumbnail::ThumbnailError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("No screenshot found in {}", .0.display())]
    NoScreenshot(PathBuf),
    #[error("{0}")]
    Rejected(String),
}

/// Sets up `tracing` on stderr. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter())),
        )
        .with_writer(io::stderr)
        .init();
}

pub fn open_store(settings: &Settings) -> Result<CaptureStore, HistoryError> {
    CaptureStore::open(&settings.storage_dir, settings.max_retained)
}

/// Runs `command` on the running instance if there is one, otherwise on a
/// store opened in this process.
pub fn run_command(settings: &Settings, command: SocketCommand) -> Result<SocketReply, AppError> {
    run_command_via(&paths::socket_candidates(), settings, command)
}

fn run_command_via(
    sockets: &[PathBuf],
    settings: &Settings,
    command: SocketCommand,
) -> Result<SocketReply, AppError> {
    // The running instance has its own working directory.
    let command = with_absolute_paths(command)?;
    match capture_socket::send_to_first(sockets, &command) {
        Ok(reply) => {
            debug!(command = %command.to_line(), "Handled by running instance");
            return Ok(reply);
        }
        Err(SocketError::NotRunning | SocketError::Unsupported) => {}
        Err(e) => return Err(e.into()),
    }

    let mut store = open_store(settings)?;
    Ok(execute_local(&mut store, command))
}

fn with_absolute_paths(command: SocketCommand) -> io::Result<SocketCommand> {
    Ok(match command {
        SocketCommand::Ingest(path) => SocketCommand::Ingest(std::path::absolute(path)?),
        other => other,
    })
}

/// Same replies as the running instance gives, computed against `store`.
pub fn execute_local(store: &mut CaptureStore, command: SocketCommand) -> SocketReply {
    match command {
        SocketCommand::Ingest(path) => match store.ingest(&path) {
            Ok(record) => SocketReply::Saved { record },
            Err(e) => {
                warn!(error = %e, source = %path.display(), "Screenshot ingest failed");
                SocketReply::Error {
                    message: e.to_string(),
                }
            }
        },
        SocketCommand::Delete(id) => {
            let removed = store.delete(&id).unwrap_or_else(|e| {
                warn!(error = %e, id = %id, "Screenshot delete failed");
                false
            });
            SocketReply::Deleted { removed }
        }
        SocketCommand::List => SocketReply::Records {
            records: store.list().to_vec(),
        },
        SocketCommand::Reconcile => SocketReply::Records {
            records: store.reconcile(),
        },
    }
}

/// Bytes of the screenshot `id`, from wherever the history currently lives.
pub fn load_screenshot(settings: &Settings, id: &str) -> Result<Vec<u8>, AppError> {
    load_screenshot_via(&paths::socket_candidates(), settings, id)
}

fn load_screenshot_via(sockets: &[PathBuf], settings: &Settings, id: &str) -> Result<Vec<u8>, AppError> {
    match capture_socket::send_to_first(sockets, &SocketCommand::List) {
        Ok(SocketReply::Records { records }) => {
            let record = records
                .into_iter()
                .find(|r| r.id == id)
                .ok_or_else(|| HistoryError::UnknownId(id.to_string()))?;
            // The running instance owns the store; read without opening it here.
            let dir = std::fs::canonicalize(&settings.storage_dir)?;
            Ok(history::read_stored(&dir, &record.path)?)
        }
        Ok(SocketReply::Error { message }) => Err(AppError::Rejected(message)),
        Ok(other) => Err(AppError::Rejected(format!("unexpected reply: {other:?}"))),
        Err(SocketError::NotRunning | SocketError::Unsupported) => {
            let store = open_store(settings)?;
            Ok(store.read_by_id(id)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Owns the history until the process is killed: binds the instance socket,
/// starts the history worker and prints every change as a JSON line.
#[cfg(unix)]
pub fn run_server(settings: &Settings) -> Result<(), AppError> {
    use history::worker;

    let socket = paths::socket_path();
    // Bind first so a second `serve` fails before touching the store.
    let listener = capture_socket::bind_listener(&socket)?;
    let store = open_store(settings)?;
    let state = history::create_history_state(store);

    let events = worker::subscribe(&state)?;
    std::thread::spawn(move || {
        for event in events {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to serialize history event"),
            }
        }
    });

    info!(socket = %socket.display(), storage = %settings.storage_dir.display(), "Listening for capture commands");
    capture_socket::serve(listener, state);
    Ok(())
}

#[cfg(not(unix))]
pub fn run_server(_settings: &Settings) -> Result<(), AppError> {
    Err(SocketError::Unsupported.into())
}
