//! Unix domain socket used for single-instance dispatch.
//!
//! `snapframe serve` binds the socket and owns the history. Other invocations
//! (e.g. a screenshot tool hook running `snapframe ingest <file>`) connect and
//! send one command instead of opening the store themselves, so the running
//! instance stays the only writer. The path is chosen in order:
//! `XDG_RUNTIME_DIR`, then `/run/user/{uid}`, then `/tmp/snapframe-{uid}.sock`.
//!
//! Each connection carries a single text command (`ingest <path>`,
//! `delete <id>`, `list`, `reconcile`); the client shuts down its write half
//! and reads back one JSON [`SocketReply`]. On non-Unix platforms the bridge
//! reports [`SocketError::Unsupported`] and callers run in-process.

#[cfg(unix)]
use std::io::{Read, Write};
#[cfg(unix)]
use std::net::Shutdown;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
#[cfg(unix)]
use tracing::{debug, info, warn};

use crate::history::ScreenshotRecord;
#[cfg(unix)]
use crate::history::{worker, HistoryState};

#[cfg(unix)]
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("No running instance is listening")]
    NotRunning,
    #[error("Socket already in use by another instance: {}", .0.display())]
    InUse(PathBuf),
    #[error("Socket IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed reply from running instance: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Instance bridge is not supported on this platform")]
    Unsupported,
}

/// Command sent by a client to the running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    Ingest(PathBuf),
    Delete(String),
    List,
    Reconcile,
}

impl SocketCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };
        match (verb, arg) {
            ("ingest", path) if !path.is_empty() => Some(Self::Ingest(PathBuf::from(path))),
            ("delete", id) if !id.is_empty() => Some(Self::Delete(id.to_string())),
            ("list", "") => Some(Self::List),
            ("reconcile", "") => Some(Self::Reconcile),
            _ => None,
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            Self::Ingest(path) => format!("ingest {}", path.display()),
            Self::Delete(id) => format!("delete {id}"),
            Self::List => "list".to_string(),
            Self::Reconcile => "reconcile".to_string(),
        }
    }
}

/// Reply written back by the running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SocketReply {
    Saved { record: ScreenshotRecord },
    Deleted { removed: bool },
    Records { records: Vec<ScreenshotRecord> },
    Error { message: String },
}

// --- Listener (Unix only) ---

/// Binds the socket at `path`, replacing a stale socket file left by a
/// crashed instance. Fails with [`SocketError::InUse`] if another instance
/// answers on it.
#[cfg(unix)]
pub fn bind_listener(path: &Path) -> Result<UnixListener, SocketError> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(bind_err) => {
            if !path.exists() {
                return Err(bind_err.into());
            }
            if UnixStream::connect(path).is_ok() {
                return Err(SocketError::InUse(path.to_path_buf()));
            }
            debug!(path = %path.display(), "Removing stale capture socket");
            std::fs::remove_file(path)?;
            Ok(UnixListener::bind(path)?)
        }
    }
}

#[cfg(not(unix))]
pub fn bind_listener(_path: &Path) -> Result<(), SocketError> {
    Err(SocketError::Unsupported)
}

/// Answers commands on `listener` until it fails. Blocks the calling thread.
#[cfg(unix)]
pub fn serve(listener: UnixListener, state: HistoryState) {
    for stream_result in listener.incoming() {
        let stream = match stream_result {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Capture socket accept failed");
                continue;
            }
        };
        if let Err(e) = handle_connection(stream, &state) {
            warn!(error = %e, "Capture socket request failed");
        }
    }
}

#[cfg(unix)]
fn handle_connection(mut stream: UnixStream, state: &HistoryState) -> Result<(), SocketError> {
    stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT))?;
    let mut payload = String::new();
    stream.read_to_string(&mut payload)?;

    let reply = match SocketCommand::parse(&payload) {
        Some(command) => {
            info!(command = %command.to_line(), "Capture socket command");
            execute(state, command)
        }
        None => {
            warn!(command = %payload.trim(), "Unknown capture socket command");
            SocketReply::Error {
                message: format!("unknown command: {}", payload.trim()),
            }
        }
    };

    let body = serde_json::to_vec(&reply)?;
    stream.write_all(&body)?;
    Ok(())
}

#[cfg(unix)]
fn execute(state: &HistoryState, command: SocketCommand) -> SocketReply {
    match command {
        SocketCommand::Ingest(path) if path.is_relative() => SocketReply::Error {
            message: format!("ingest path must be absolute: {}", path.display()),
        },
        SocketCommand::Ingest(path) => match worker::ingest(state, path) {
            Ok(record) => SocketReply::Saved { record },
            Err(e) => SocketReply::Error {
                message: e.to_string(),
            },
        },
        SocketCommand::Delete(id) => SocketReply::Deleted {
            removed: worker::delete_by_id(state, &id),
        },
        SocketCommand::List => SocketReply::Records {
            records: worker::list_recent(state),
        },
        SocketCommand::Reconcile => SocketReply::Records {
            records: worker::reconcile(state),
        },
    }
}

// --- Client ---

/// Sends `command` to the instance listening at `path`.
#[cfg(unix)]
pub fn send_command_to(path: &Path, command: &SocketCommand) -> Result<SocketReply, SocketError> {
    send_over(UnixStream::connect(path)?, command)
}

#[cfg(not(unix))]
pub fn send_command_to(_path: &Path, _command: &SocketCommand) -> Result<SocketReply, SocketError> {
    Err(SocketError::Unsupported)
}

#[cfg(unix)]
fn send_over(mut stream: UnixStream, command: &SocketCommand) -> Result<SocketReply, SocketError> {
    stream.write_all(command.to_line().as_bytes())?;
    stream.shutdown(Shutdown::Write)?;
    let mut body = String::new();
    stream.read_to_string(&mut body)?;
    Ok(serde_json::from_str(&body)?)
}

/// Sends `command` over the first socket in `candidates` that accepts a
/// connection.
#[cfg(unix)]
pub fn send_to_first(candidates: &[PathBuf], command: &SocketCommand) -> Result<SocketReply, SocketError> {
    for path in candidates {
        if let Ok(stream) = UnixStream::connect(path) {
            debug!(path = %path.display(), "Connected to running instance");
            return send_over(stream, command);
        }
    }
    Err(SocketError::NotRunning)
}

#[cfg(not(unix))]
pub fn send_to_first(_candidates: &[PathBuf], _command: &SocketCommand) -> Result<SocketReply, SocketError> {
    Err(SocketError::Unsupported)
}

/// Sends `command` to whichever running instance answers first.
pub fn send_to_running_instance(command: &SocketCommand) -> Result<SocketReply, SocketError> {
    send_to_first(&crate::paths::socket_candidates(), command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            SocketCommand::parse("ingest /home/me/Desktop/Screen Shot 1.png\n"),
            Some(SocketCommand::Ingest(PathBuf::from("/home/me/Desktop/Screen Shot 1.png")))
        );
        assert_eq!(
            SocketCommand::parse("delete 2026-10-19T15-58-01-123Z"),
            Some(SocketCommand::Delete("2026-10-19T15-58-01-123Z".to_string()))
        );
        assert_eq!(SocketCommand::parse(" list "), Some(SocketCommand::List));
        assert_eq!(SocketCommand::parse("reconcile"), Some(SocketCommand::Reconcile));
        assert_eq!(SocketCommand::parse("ingest"), None);
        assert_eq!(SocketCommand::parse("list extra"), None);
        assert_eq!(SocketCommand::parse("explode"), None);
    }

    #[test]
    fn test_to_line_parses_back() {
        for command in [
            SocketCommand::Ingest(PathBuf::from("/tmp/a b.png")),
            SocketCommand::Delete("id-1".to_string()),
            SocketCommand::List,
        ] {
            assert_eq!(SocketCommand::parse(&command.to_line()), Some(command));
        }
    }

    #[test]
    fn test_reply_json_shape() {
        let json = serde_json::to_value(SocketReply::Deleted { removed: true }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "deleted", "removed": true}));
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_over_socket() {
        use crate::history::{create_history_state, CaptureStore, MAX_RETAINED};
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let store = CaptureStore::open(tmp.path().join("store"), MAX_RETAINED).unwrap();
        let state = create_history_state(store);
        let sock = tmp.path().join("test.sock");
        let listener = bind_listener(&sock).unwrap();
        std::thread::spawn(move || serve(listener, state));

        let src = tmp.path().join("shot.png");
        std::fs::write(&src, "png").unwrap();

        let reply = send_command_to(&sock, &SocketCommand::Ingest(src)).unwrap();
        let SocketReply::Saved { record } = reply else {
            panic!("unexpected reply: {reply:?}");
        };

        let listed = send_command_to(&sock, &SocketCommand::List).unwrap();
        assert_eq!(listed, SocketReply::Records { records: vec![record.clone()] });

        let deleted = send_command_to(&sock, &SocketCommand::Delete(record.id.clone())).unwrap();
        assert_eq!(deleted, SocketReply::Deleted { removed: true });

        assert!(matches!(bind_listener(&sock), Err(SocketError::InUse(_))));
    }

    #[cfg(unix)]
    fn serve_in(tmp: &tempfile::TempDir) -> PathBuf {
        use crate::history::{create_history_state, CaptureStore, MAX_RETAINED};

        let store = CaptureStore::open(tmp.path().join("store"), MAX_RETAINED).unwrap();
        let state = create_history_state(store);
        let sock = tmp.path().join("snapframe.sock");
        let listener = bind_listener(&sock).unwrap();
        std::thread::spawn(move || serve(listener, state));
        sock
    }

    #[cfg(unix)]
    #[test]
    fn test_send_to_first_skips_dead_sockets_and_answers_promptly() {
        use std::time::{Duration, Instant};

        let tmp = tempfile::TempDir::new().unwrap();
        let sock = serve_in(&tmp);
        let candidates = vec![tmp.path().join("nobody.sock"), sock];

        for _ in 0..3 {
            let started = Instant::now();
            let reply = send_to_first(&candidates, &SocketCommand::List).unwrap();
            assert_eq!(reply, SocketReply::Records { records: vec![] });
            assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        }

        assert!(matches!(
            send_to_first(&candidates[..1], &SocketCommand::List),
            Err(SocketError::NotRunning)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_ingest_path_is_refused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock = serve_in(&tmp);

        let reply = send_command_to(&sock, &SocketCommand::Ingest(PathBuf::from("shot.png"))).unwrap();
        assert!(matches!(reply, SocketReply::Error { ref message } if message.contains("absolute")));
        assert_eq!(
            send_command_to(&sock, &SocketCommand::List).unwrap(),
            SocketReply::Records { records: vec![] }
        );
    }
}
