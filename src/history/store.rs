//! Capture store: copies new captures into the private directory, keeps the
//! newest-first list bounded, and repairs the index against the disk on open.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::record::stored_file_name;
use super::{unique_capture_id, HistoryError, IndexFile, ScreenshotRecord};

/// Default number of captures kept.
pub const MAX_RETAINED: usize = 5;

/// Owner of the screenshot directory, its index file and the in-memory list.
///
/// Nothing else creates or deletes files in the directory. The list is
/// newest first and never longer than `max_retained`.
#[derive(Debug)]
pub struct CaptureStore {
    dir: PathBuf,
    index: IndexFile,
    records: Vec<ScreenshotRecord>,
    max_retained: usize,
}

impl CaptureStore {
    /// Opens (creating if needed) the store in `dir` and reconciles its index.
    ///
    /// Only a directory that cannot be created is an error; a missing or
    /// corrupt index just means an empty history.
    pub fn open(dir: impl Into<PathBuf>, max_retained: usize) -> Result<Self, HistoryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| HistoryError::Init {
            path: dir.clone(),
            source,
        })?;
        let dir = fs::canonicalize(&dir).map_err(|source| HistoryError::Init {
            path: dir.clone(),
            source,
        })?;

        let index = IndexFile::in_dir(&dir);
        index.remove_stale_temp();

        let mut store = Self {
            dir,
            index,
            records: Vec::new(),
            max_retained: max_retained.max(1),
        };
        store.reconcile();
        info!(
            dir = %store.dir.display(),
            count = store.records.len(),
            max_retained = store.max_retained,
            "Screenshot store opened"
        );
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    /// Current history, newest first.
    pub fn list(&self) -> &[ScreenshotRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ScreenshotRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Reloads the index and drops every record the disk no longer backs.
    ///
    /// Never fails: an unreadable index degrades to an empty history. The
    /// repaired list is written back so the fix survives a restart.
    pub fn reconcile(&mut self) -> Vec<ScreenshotRecord> {
        let (loaded, writable) = match self.index.load() {
            Ok(records) => (records, true),
            Err(HistoryError::Parse(e)) => {
                warn!(error = %e, path = %self.index.path().display(), "Index file is corrupt, starting with empty history");
                (Vec::new(), true)
            }
            Err(e) => {
                // Unreadable, not corrupt: keep the file as is.
                warn!(error = %e, path = %self.index.path().display(), "Failed to read index file, starting with empty history");
                (Vec::new(), false)
            }
        };

        let loaded_count = loaded.len();
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(loaded_count);
        for record in loaded {
            if !seen.insert(record.id.clone()) {
                warn!(id = %record.id, "Duplicate screenshot id in index, dropping older entry");
                continue;
            }
            if !record.path.starts_with(&self.dir) {
                warn!(id = %record.id, path = %record.path.display(), "Indexed screenshot is outside the store, dropping record");
                continue;
            }
            if !record.path.is_file() {
                info!(id = %record.id, path = %record.path.display(), "Screenshot file not found, dropping record");
                continue;
            }
            kept.push(record);
        }

        let evicted = split_overflow(&mut kept, self.max_retained);

        if writable {
            if let Err(e) = self.index.save(&kept) {
                warn!(error = %e, "Failed to save reconciled index");
            }
        }
        for record in &evicted {
            remove_backing_file(record);
        }

        if kept.len() != loaded_count {
            info!(before = loaded_count, after = kept.len(), "Reconciled screenshot index");
        }
        self.records = kept;
        self.records.clone()
    }

    /// Copies the capture at `source` into the store and records it.
    ///
    /// Either the copy and the index update both happen or neither does.
    pub fn ingest(&mut self, source: &Path) -> Result<ScreenshotRecord, HistoryError> {
        self.ingest_evicting(source).map(|(record, _)| record)
    }

    /// Like [`ingest`](Self::ingest), also returning the records evicted to
    /// stay within the bound.
    pub(crate) fn ingest_evicting(
        &mut self,
        source: &Path,
    ) -> Result<(ScreenshotRecord, Vec<ScreenshotRecord>), HistoryError> {
        let meta = fs::metadata(source)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", source.display()),
            )
            .into());
        }

        let now = Utc::now();
        let id = unique_capture_id(now, |candidate| {
            self.get(candidate).is_some()
                || self.dir.join(stored_file_name(candidate, source)).exists()
        });
        let stored = self.dir.join(stored_file_name(&id, source));

        if let Err(e) = fs::copy(source, &stored) {
            remove_quietly(&stored);
            warn!(error = %e, source = %source.display(), "Failed to copy screenshot into store");
            return Err(e.into());
        }

        let record = ScreenshotRecord::new(id, stored, source.to_path_buf(), now);
        let mut candidate = Vec::with_capacity(self.records.len() + 1);
        candidate.push(record.clone());
        candidate.extend(self.records.iter().cloned());
        let evicted = split_overflow(&mut candidate, self.max_retained);

        if let Err(e) = self.index.save(&candidate) {
            remove_quietly(&record.path);
            warn!(error = %e, id = %record.id, "Failed to save index, capture discarded");
            return Err(e);
        }

        self.records = candidate;
        for old in &evicted {
            info!(id = %old.id, "Evicting oldest screenshot");
            remove_backing_file(old);
        }

        info!(
            id = %record.id,
            path = %record.path.display(),
            count = self.records.len(),
            "Screenshot saved"
        );
        Ok((record, evicted))
    }

    /// Raw bytes of a stored screenshot.
    pub fn read(&self, stored_path: &Path) -> Result<Vec<u8>, HistoryError> {
        read_stored(&self.dir, stored_path)
    }

    pub fn read_by_id(&self, id: &str) -> Result<Vec<u8>, HistoryError> {
        let record = self
            .get(id)
            .ok_or_else(|| HistoryError::UnknownId(id.to_string()))?;
        self.read(&record.path)
    }

    /// Removes the record `id` and its file. Returns `false` for an unknown id.
    ///
    /// A file that cannot be deleted is left orphaned; the record goes away
    /// regardless. An `Err` means the index could not be rewritten; the
    /// record is already gone from memory and the next reconcile drops it
    /// from disk.
    pub fn delete(&mut self, id: &str) -> Result<bool, HistoryError> {
        let Some(pos) = self.records.iter().position(|r| r.id == id) else {
            debug!(id, "Delete requested for unknown screenshot");
            return Ok(false);
        };

        let record = self.records.remove(pos);
        remove_backing_file(&record);
        self.index.save(&self.records)?;
        info!(id, count = self.records.len(), "Screenshot deleted");
        Ok(true)
    }
}

/// Reads a file from the store directory `dir` (canonical) without opening
/// the store. Paths outside `dir` are refused.
pub fn read_stored(dir: &Path, stored_path: &Path) -> Result<Vec<u8>, HistoryError> {
    let path = match fs::canonicalize(stored_path) {
        Ok(real) if real.starts_with(dir) => real,
        Ok(_) => return Err(HistoryError::OutsideStore(stored_path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(if stored_path.starts_with(dir) {
                HistoryError::NotFound(stored_path.to_path_buf())
            } else {
                HistoryError::OutsideStore(stored_path.to_path_buf())
            });
        }
        Err(e) => return Err(e.into()),
    };
    fs::read(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => HistoryError::NotFound(path),
        _ => e.into(),
    })
}

/// Cuts `records` down to `max`, returning what was cut (oldest last).
fn split_overflow(records: &mut Vec<ScreenshotRecord>, max: usize) -> Vec<ScreenshotRecord> {
    if records.len() > max {
        records.split_off(max)
    } else {
        Vec::new()
    }
}

fn remove_backing_file(record: &ScreenshotRecord) {
    match fs::remove_file(&record.path) {
        Ok(()) => debug!(id = %record.id, path = %record.path.display(), "Removed screenshot file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(id = %record.id, path = %record.path.display(), "Screenshot file already gone");
        }
        Err(e) => {
            warn!(error = %e, id = %record.id, path = %record.path.display(), "Failed to remove screenshot file, leaving it orphaned");
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(error = %e, path = %path.display(), "Failed to clean up partial screenshot copy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        store_dir: PathBuf,
        source_dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let store_dir = tmp.path().join("screenshots");
            let source_dir = tmp.path().join("Desktop");
            fs::create_dir_all(&source_dir).unwrap();
            Self {
                _tmp: tmp,
                store_dir,
                source_dir,
            }
        }

        fn open(&self) -> CaptureStore {
            CaptureStore::open(&self.store_dir, MAX_RETAINED).unwrap()
        }

        fn source(&self, name: &str) -> PathBuf {
            let path = self.source_dir.join(format!("{name}.png"));
            fs::write(&path, format!("image {name}")).unwrap();
            path
        }
    }

    fn ids(store: &CaptureStore) -> Vec<String> {
        store.list().iter().map(|r| r.id.clone()).collect()
    }

    fn ingest_named(fx: &Fixture, store: &mut CaptureStore, names: &[&str]) -> Vec<ScreenshotRecord> {
        names
            .iter()
            .map(|name| store.ingest(&fx.source(name)).unwrap())
            .collect()
    }

    #[test]
    fn test_ingest_copies_bytes_and_prepends() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let src = fx.source("a");

        let record = store.ingest(&src).unwrap();

        assert!(record.path.starts_with(store.dir()));
        assert_eq!(record.original_path, src);
        assert_eq!(fs::read(&record.path).unwrap(), b"image a");
        assert_eq!(store.list(), &[record.clone()]);

        // The source can vanish without affecting the stored copy.
        fs::remove_file(&src).unwrap();
        assert_eq!(store.read(&record.path).unwrap(), b"image a");
    }

    #[test]
    fn test_scenario_eviction_and_delete() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let r = ingest_named(&fx, &mut store, &["a", "b", "c", "d", "e"]);
        let (a, b, c, d, e) = (&r[0], &r[1], &r[2], &r[3], &r[4]);

        assert_eq!(ids(&store), [&e.id, &d.id, &c.id, &b.id, &a.id].map(String::clone));

        let f = store.ingest(&fx.source("f")).unwrap();
        assert_eq!(ids(&store), [&f.id, &e.id, &d.id, &c.id, &b.id].map(String::clone));
        assert!(!a.path.exists());

        assert!(store.delete(&c.id).unwrap());
        assert_eq!(ids(&store), [&f.id, &e.id, &d.id, &b.id].map(String::clone));
        assert!(!c.path.exists());

        assert!(!store.delete(&c.id).unwrap());
        assert_eq!(ids(&store), [&f.id, &e.id, &d.id, &b.id].map(String::clone));
    }

    #[test]
    fn test_bound_holds_after_every_ingest() {
        let fx = Fixture::new();
        let mut store = fx.open();
        for i in 0..12 {
            store.ingest(&fx.source(&format!("shot{i}"))).unwrap();
            assert!(store.list().len() <= MAX_RETAINED);
        }
        assert_eq!(store.list().len(), MAX_RETAINED);

        // Only retained files (plus the index) remain on disk.
        let files = fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(files, MAX_RETAINED + 1);
    }

    #[test]
    fn test_eviction_removes_oldest_timestamp() {
        let fx = Fixture::new();
        let mut store = fx.open();
        ingest_named(&fx, &mut store, &["a", "b", "c", "d", "e"]);
        let oldest = store
            .list()
            .iter()
            .rev()
            .min_by_key(|r| r.timestamp)
            .cloned()
            .unwrap();

        store.ingest(&fx.source("f")).unwrap();

        assert!(store.get(&oldest.id).is_none());
        assert!(!oldest.path.exists());
    }

    #[test]
    fn test_rapid_captures_get_distinct_ids() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let src = fx.source("same");
        for _ in 0..MAX_RETAINED {
            store.ingest(&src).unwrap();
        }
        let unique: HashSet<_> = store.list().iter().map(|r| r.id.clone()).collect();
        assert_eq!(unique.len(), MAX_RETAINED);
    }

    #[test]
    fn test_failed_copy_leaves_index_untouched() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let kept = store.ingest(&fx.source("a")).unwrap();

        let missing = fx.source_dir.join("missing.png");
        assert!(matches!(store.ingest(&missing), Err(HistoryError::Io(_))));
        assert!(store.ingest(&fx.source_dir).is_err());

        assert_eq!(store.list(), &[kept.clone()]);
        let reopened = fx.open();
        assert_eq!(reopened.list(), &[kept]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_index_save_discards_copy() {
        let fx = Fixture::new();
        let mut store = fx.open();
        // A directory where the index file should be makes the rename fail.
        let index_path = store.dir().join(crate::history::INDEX_FILE_NAME);
        fs::remove_file(&index_path).unwrap();
        fs::create_dir_all(&index_path).unwrap();

        assert!(store.ingest(&fx.source("a")).is_err());
        assert!(store.list().is_empty());
        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_history_survives_reopen() {
        let fx = Fixture::new();
        let mut store = fx.open();
        ingest_named(&fx, &mut store, &["a", "b", "c"]);
        let before = store.list().to_vec();
        drop(store);

        let reopened = fx.open();
        assert_eq!(reopened.list(), before.as_slice());
    }

    #[test]
    fn test_reconcile_drops_dangling_record() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let r = ingest_named(&fx, &mut store, &["a", "b", "c"]);
        fs::remove_file(&r[1].path).unwrap();

        let healed = store.reconcile();

        assert_eq!(
            healed.iter().map(|x| &x.id).collect::<Vec<_>>(),
            vec![&r[2].id, &r[0].id]
        );
        let on_disk = IndexFile::in_dir(store.dir()).load().unwrap();
        assert_eq!(on_disk, healed);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let r = ingest_named(&fx, &mut store, &["a", "b", "c"]);
        fs::remove_file(&r[0].path).unwrap();

        let first = store.reconcile();
        let second = store.reconcile();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_index_starts_empty() {
        let fx = Fixture::new();
        fs::create_dir_all(&fx.store_dir).unwrap();
        fs::write(fx.store_dir.join(crate::history::INDEX_FILE_NAME), "not json").unwrap();

        let mut store = fx.open();
        assert!(store.list().is_empty());

        // The store keeps working afterwards.
        store.ingest(&fx.source("a")).unwrap();
        assert_eq!(fx.open().list().len(), 1);
    }

    #[test]
    fn test_reconcile_drops_duplicate_ids() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let r = ingest_named(&fx, &mut store, &["a"]);
        let dup = r[0].clone();
        IndexFile::in_dir(store.dir())
            .save(&[dup.clone(), dup.clone()])
            .unwrap();

        assert_eq!(store.reconcile(), vec![dup]);
    }

    #[test]
    fn test_smaller_bound_on_reopen_evicts_oldest() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let r = ingest_named(&fx, &mut store, &["a", "b", "c", "d"]);
        drop(store);

        let store = CaptureStore::open(&fx.store_dir, 2).unwrap();
        assert_eq!(ids(&store), vec![r[3].id.clone(), r[2].id.clone()]);
        assert!(!r[0].path.exists());
        assert!(!r[1].path.exists());
    }

    #[test]
    fn test_read_outside_store_is_rejected() {
        let fx = Fixture::new();
        let store = fx.open();
        let src = fx.source("a");
        assert!(matches!(store.read(&src), Err(HistoryError::OutsideStore(_))));
    }

    #[test]
    fn test_read_vanished_file_is_not_found() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let record = store.ingest(&fx.source("a")).unwrap();
        fs::remove_file(&record.path).unwrap();

        assert!(matches!(store.read(&record.path), Err(HistoryError::NotFound(_))));
        assert!(matches!(store.read_by_id("nope"), Err(HistoryError::UnknownId(_))));
    }

    #[test]
    fn test_delete_tolerates_missing_file() {
        let fx = Fixture::new();
        let mut store = fx.open();
        let record = store.ingest(&fx.source("a")).unwrap();
        fs::remove_file(&record.path).unwrap();

        assert!(store.delete(&record.id).unwrap());
        assert!(store.list().is_empty());
        assert!(fx.open().list().is_empty());
    }

    #[test]
    fn test_open_fails_when_dir_cannot_be_created() {
        let fx = Fixture::new();
        let blocker = fx.source_dir.join("file.png");
        fs::write(&blocker, "x").unwrap();
        let err = CaptureStore::open(blocker.join("screenshots"), MAX_RETAINED).unwrap_err();
        assert!(matches!(err, HistoryError::Init { .. }));
    }
}
