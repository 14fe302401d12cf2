//! History worker: one thread owns the [`CaptureStore`] and handles requests
//! in the order they arrive, so two captures landing back to back never
//! interleave. [`HistoryState`] is the Sender half handed to everyone else.

use std::path::PathBuf;
use std::sync::mpsc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{CaptureStore, HistoryError, ScreenshotRecord};

/// Notification sent to subscribers after the history changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HistoryEvent {
    Saved(ScreenshotRecord),
    Evicted(String),
    Deleted(String),
    /// Removed by reconcile: its file vanished or the bound shrank.
    Dropped(String),
}

/// Request to the history worker thread.
#[derive(Debug)]
pub enum HistoryRequest {
    Ingest(PathBuf, mpsc::SyncSender<Result<ScreenshotRecord, HistoryError>>),
    List(mpsc::SyncSender<Vec<ScreenshotRecord>>),
    Read(PathBuf, mpsc::SyncSender<Result<Vec<u8>, HistoryError>>),
    Delete(String, mpsc::SyncSender<Result<bool, HistoryError>>),
    Reconcile(mpsc::SyncSender<Vec<ScreenshotRecord>>),
    Subscribe(mpsc::Sender<HistoryEvent>),
    Shutdown,
}

/// Sender to the history worker. The worker owns the store on its thread.
pub type HistoryState = mpsc::Sender<HistoryRequest>;

/// Spawn the history worker around an opened store and return the channel sender.
pub fn create_history_state(store: CaptureStore) -> HistoryState {
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        info!(dir = %store.dir().display(), "History worker started");
        let mut store = store;
        let mut subscribers: Vec<mpsc::Sender<HistoryEvent>> = Vec::new();

        while let Ok(req) = rx.recv() {
            match req {
                HistoryRequest::Ingest(source, resp) => {
                    let result = store.ingest_evicting(&source);
                    match &result {
                        Ok((record, evicted)) => {
                            for old in evicted {
                                notify(&mut subscribers, HistoryEvent::Evicted(old.id.clone()));
                            }
                            notify(&mut subscribers, HistoryEvent::Saved(record.clone()));
                        }
                        Err(e) => {
                            warn!(error = %e, source = %source.display(), "Screenshot ingest failed");
                        }
                    }
                    let _ = resp.send(result.map(|(record, _)| record));
                }
                HistoryRequest::List(resp) => {
                    let _ = resp.send(store.list().to_vec());
                }
                HistoryRequest::Read(path, resp) => {
                    let _ = resp.send(store.read(&path));
                }
                HistoryRequest::Delete(id, resp) => {
                    let result = store.delete(&id);
                    if let Ok(true) | Err(_) = result {
                        // An Err still removed the record from memory.
                        notify(&mut subscribers, HistoryEvent::Deleted(id));
                    }
                    let _ = resp.send(result);
                }
                HistoryRequest::Reconcile(resp) => {
                    let before: Vec<String> = store.list().iter().map(|r| r.id.clone()).collect();
                    let kept = store.reconcile();
                    for id in before {
                        if !kept.iter().any(|r| r.id == id) {
                            notify(&mut subscribers, HistoryEvent::Dropped(id));
                        }
                    }
                    let _ = resp.send(kept);
                }
                HistoryRequest::Subscribe(listener) => {
                    subscribers.push(listener);
                }
                HistoryRequest::Shutdown => break,
            }
        }
        info!("History worker stopped");
    });

    tx
}

fn notify(subscribers: &mut Vec<mpsc::Sender<HistoryEvent>>, event: HistoryEvent) {
    subscribers.retain(|s| s.send(event.clone()).is_ok());
}

/// Sends `make(reply)` to the worker and waits for the reply.
fn request<T>(
    state: &HistoryState,
    make: impl FnOnce(mpsc::SyncSender<T>) -> HistoryRequest,
) -> Option<T> {
    let (resp_tx, resp_rx) = mpsc::sync_channel(0);
    if state.send(make(resp_tx)).is_err() {
        return None;
    }
    resp_rx.recv().ok()
}

pub fn ingest(state: &HistoryState, source: impl Into<PathBuf>) -> Result<ScreenshotRecord, HistoryError> {
    let source = source.into();
    request(state, |resp| HistoryRequest::Ingest(source, resp)).unwrap_or(Err(HistoryError::WorkerGone))
}

/// Current history, newest first. Empty if the worker is gone.
pub fn list_recent(state: &HistoryState) -> Vec<ScreenshotRecord> {
    request(state, HistoryRequest::List).unwrap_or_else(|| {
        warn!("History worker disconnected, reporting empty history");
        Vec::new()
    })
}

pub fn read_bytes(state: &HistoryState, stored_path: impl Into<PathBuf>) -> Result<Vec<u8>, HistoryError> {
    let path = stored_path.into();
    request(state, |resp| HistoryRequest::Read(path, resp)).unwrap_or(Err(HistoryError::WorkerGone))
}

/// Deletes a capture by id. `false` when nothing was removed or removal failed.
pub fn delete_by_id(state: &HistoryState, id: &str) -> bool {
    let id_owned = id.to_string();
    match request(state, |resp| HistoryRequest::Delete(id_owned, resp)) {
        Some(Ok(removed)) => removed,
        Some(Err(e)) => {
            warn!(error = %e, id, "Screenshot delete failed");
            false
        }
        None => {
            warn!(id, "History worker disconnected, delete dropped");
            false
        }
    }
}

pub fn reconcile(state: &HistoryState) -> Vec<ScreenshotRecord> {
    request(state, HistoryRequest::Reconcile).unwrap_or_default()
}

/// Registers a listener for history changes.
pub fn subscribe(state: &HistoryState) -> Result<mpsc::Receiver<HistoryEvent>, HistoryError> {
    let (tx, rx) = mpsc::channel();
    state
        .send(HistoryRequest::Subscribe(tx))
        .map_err(|_| HistoryError::WorkerGone)?;
    Ok(rx)
}

/// Best-effort entry point for capture events: failures are logged and dropped.
pub fn handle_capture_event(state: &HistoryState, source: impl Into<PathBuf>) -> Option<ScreenshotRecord> {
    let source = source.into();
    debug!(source = %source.display(), "Capture event received");
    match ingest(state, source.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, source = %source.display(), "Dropping capture event");
            None
        }
    }
}

pub fn shutdown(state: &HistoryState) {
    let _ = state.send(HistoryRequest::Shutdown);
}
