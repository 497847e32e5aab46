//! Persistent content-hash store for incremental builds.
//!
//! Rendering a score through the external notation editor is by far the
//! slowest step of a build, so the builder only invokes a converter when a
//! source file actually changed. This module answers the question "has this
//! file changed since I last looked at it?" across runs.
//!
//! # Design
//!
//! The store maps an absolute source path to the SHA-256 digest of its bytes.
//! It is content-based rather than mtime-based so it survives `git checkout`
//! (which resets modification times).
//!
//! | Situation                  | Store effect        | Reported     |
//! |----------------------------|---------------------|--------------|
//! | file missing               | untouched           | not modified |
//! | no record yet              | record inserted     | not modified |
//! | record with other digest   | record updated      | modified     |
//! | record with same digest    | untouched           | not modified |
//!
//! The first observation is a baseline, not a change: a freshly cloned
//! library rebuilds because its artifacts are missing, not because the store
//! is empty.
//!
//! ## Storage
//!
//! A versioned JSON file in the library base directory (`filehashes.json` by
//! default). Every insert or update is written immediately through a
//! temporary file and a rename, so an interrupted build leaves a store that
//! agrees with every check performed before the interruption. A corrupt or
//! wrong-version file loads as empty.
//!
//! ## Sharing
//!
//! All access goes through an internal mutex so parallel song builds can
//! share one store. While a store is open, an exclusive advisory lock is held
//! on a sidecar `<store>.lock` file; a second build on the same base path
//! fails with [`HashStoreError::Locked`].

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

/// Version of the store format. Bump this to invalidate every existing store
/// when the format or digest computation changes.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum HashStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Hash store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Hash store {0} is locked by another build")]
    Locked(PathBuf),
    #[error("Hash store mutex poisoned")]
    Poisoned,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    records: BTreeMap<String, String>,
}

/// Change detector backed by a JSON file of path → digest records.
#[derive(Debug)]
pub struct ContentHashStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, String>>,
    _lock: File,
}

impl ContentHashStore {
    /// Open (or create) the store at `path` and take the build lock.
    ///
    /// The store file itself is only written on the first change.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HashStoreError> {
        let path = path.into();
        let lock_path = lock_path(&path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(HashStoreError::Locked(path));
        }

        let records = load_records(&path);
        debug!(store = %path.display(), records = records.len(), "opened hash store");
        Ok(Self {
            path,
            records: Mutex::new(records),
            _lock: lock,
        })
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Report whether `file` changed since the last observation, recording
    /// its current digest.
    pub fn is_modified(&self, file: &Path) -> Result<bool, HashStoreError> {
        if !file.is_file() {
            debug!(file = %file.display(), "not hashed: file missing");
            return Ok(false);
        }
        let key = record_key(file)?;
        let digest = hash_file(file)?;

        let mut records = self.lock_records()?;
        let modified = match records.get(&key) {
            Some(previous) if *previous == digest => return Ok(false),
            Some(_) => true,
            None => false,
        };
        records.insert(key, digest);
        self.save(&records)?;
        debug!(file = %file.display(), modified, "hash recorded");
        Ok(modified)
    }

    /// The digest currently recorded for `file`, if any.
    pub fn recorded_digest(&self, file: &Path) -> Result<Option<String>, HashStoreError> {
        let key = record_key(file)?;
        Ok(self.lock_records()?.get(&key).cloned())
    }

    pub fn len(&self) -> Result<usize, HashStoreError> {
        Ok(self.lock_records()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, HashStoreError> {
        Ok(self.len()? == 0)
    }

    /// Delete every record but keep the store file.
    pub fn flush(&self) -> Result<(), HashStoreError> {
        let mut records = self.lock_records()?;
        records.clear();
        self.save(&records)
    }

    /// Delete every record and remove the store file.
    pub fn purge(&self) -> Result<(), HashStoreError> {
        let mut records = self.lock_records()?;
        records.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop records whose file no longer exists. Returns how many were removed.
    pub fn prune(&self) -> Result<usize, HashStoreError> {
        let mut records = self.lock_records()?;
        let before = records.len();
        records.retain(|key, _| Path::new(key).is_file());
        let removed = before - records.len();
        if removed > 0 {
            self.save(&records)?;
        }
        Ok(removed)
    }

    fn lock_records(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, HashStoreError> {
        self.records.lock().map_err(|_| HashStoreError::Poisoned)
    }

    fn save(&self, records: &BTreeMap<String, String>) -> Result<(), HashStoreError> {
        let file = StoreFile {
            version: STORE_VERSION,
            records: records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let temp = temp_path(&self.path);
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// Load records from disk. Missing, corrupt and wrong-version files are empty.
fn load_records(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return BTreeMap::new(),
    };
    let file: StoreFile = match serde_json::from_str(&content) {
        Ok(f) => f,
        Err(_) => return BTreeMap::new(),
    };
    if file.version != STORE_VERSION {
        return BTreeMap::new();
    }
    file.records
}

fn record_key(file: &Path) -> io::Result<String> {
    let absolute = match fs::canonicalize(file) {
        Ok(p) => p,
        Err(e) if e.kind() == io::ErrorKind::NotFound => std::path::absolute(file)?,
        Err(e) => return Err(e),
    };
    Ok(absolute.to_string_lossy().into_owned())
}

fn lock_path(store: &Path) -> PathBuf {
    let mut name = store.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    store.with_file_name(name)
}

fn temp_path(store: &Path) -> PathBuf {
    let mut name = store.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp-{}", std::process::id()));
    store.with_file_name(name)
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(tmp: &TempDir) -> ContentHashStore {
        ContentHashStore::open(tmp.path().join("filehashes.json")).unwrap()
    }

    // =========================================================================
    // Change detection
    // =========================================================================

    #[test]
    fn first_observation_is_not_modified() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let score = tmp.path().join("piano.mscx");
        fs::write(&score, "v1").unwrap();

        assert!(!store.is_modified(&score).unwrap());
        assert!(store.recorded_digest(&score).unwrap().is_some());
    }

    #[test]
    fn unchanged_file_is_not_modified() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let score = tmp.path().join("piano.mscx");
        fs::write(&score, "v1").unwrap();

        store.is_modified(&score).unwrap();
        assert!(!store.is_modified(&score).unwrap());
        assert!(!store.is_modified(&score).unwrap());
    }

    #[test]
    fn change_is_reported_exactly_once() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let score = tmp.path().join("piano.mscx");
        fs::write(&score, "v1").unwrap();
        store.is_modified(&score).unwrap();

        fs::write(&score, "v2").unwrap();
        assert!(store.is_modified(&score).unwrap());
        assert!(!store.is_modified(&score).unwrap());
    }

    #[test]
    fn missing_file_is_not_modified_and_not_recorded() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let missing = tmp.path().join("nope.mscx");

        assert!(!store.is_modified(&missing).unwrap());
        assert!(store.is_empty().unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn relative_and_absolute_paths_share_a_record() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let score = tmp.path().join("song").join("piano.mscx");
        fs::create_dir_all(score.parent().unwrap()).unwrap();
        fs::write(&score, "v1").unwrap();

        store.is_modified(&score).unwrap();
        let dotted = tmp.path().join("song").join(".").join("piano.mscx");
        assert!(!store.is_modified(&dotted).unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let score = tmp.path().join("piano.mscx");
        fs::write(&score, "v1").unwrap();
        {
            let store = open_store(&tmp);
            store.is_modified(&score).unwrap();
        }

        fs::write(&score, "v2").unwrap();
        let store = open_store(&tmp);
        assert!(store.is_modified(&score).unwrap());
    }

    #[test]
    fn corrupt_store_loads_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("filehashes.json"), "not json").unwrap();
        let store = open_store(&tmp);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn wrong_version_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "records": {{"/a/piano.mscx": "abc"}}}}"#,
            STORE_VERSION + 1
        );
        fs::write(tmp.path().join("filehashes.json"), json).unwrap();
        let store = open_store(&tmp);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let score = tmp.path().join("piano.mscx");
        fs::write(&score, "v1").unwrap();
        store.is_modified(&score).unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    // =========================================================================
    // Flush / purge / prune
    // =========================================================================

    #[test]
    fn flush_behaves_like_first_observation() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let score = tmp.path().join("piano.mscx");
        fs::write(&score, "v1").unwrap();
        store.is_modified(&score).unwrap();

        store.flush().unwrap();
        assert!(store.path().exists());
        assert!(store.is_empty().unwrap());

        fs::write(&score, "v2").unwrap();
        assert!(!store.is_modified(&score).unwrap());
    }

    #[test]
    fn flush_and_purge_are_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        store.flush().unwrap();
        store.flush().unwrap();
        store.purge().unwrap();
        store.purge().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn purge_removes_file() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let score = tmp.path().join("piano.mscx");
        fs::write(&score, "v1").unwrap();
        store.is_modified(&score).unwrap();
        assert!(store.path().exists());

        store.purge().unwrap();
        assert!(!store.path().exists());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn prune_drops_records_of_deleted_files() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let kept = tmp.path().join("kept.mscx");
        let gone = tmp.path().join("gone.mscx");
        fs::write(&kept, "k").unwrap();
        fs::write(&gone, "g").unwrap();
        store.is_modified(&kept).unwrap();
        store.is_modified(&gone).unwrap();

        fs::remove_file(&gone).unwrap();
        assert_eq!(store.prune().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.recorded_digest(&kept).unwrap().is_some());
    }

    // =========================================================================
    // Sharing
    // =========================================================================

    #[test]
    fn second_open_is_locked() {
        let tmp = TempDir::new().unwrap();
        let _first = open_store(&tmp);
        let second = ContentHashStore::open(tmp.path().join("filehashes.json"));
        assert!(matches!(second, Err(HashStoreError::Locked(_))));
    }

    #[test]
    fn lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        drop(open_store(&tmp));
        assert!(ContentHashStore::open(tmp.path().join("filehashes.json")).is_ok());
    }

    #[test]
    fn parallel_checks_record_every_file() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let files: Vec<PathBuf> = (0..8)
            .map(|i| {
                let path = tmp.path().join(format!("song{i}.mscx"));
                fs::write(&path, format!("song {i}")).unwrap();
                path
            })
            .collect();

        std::thread::scope(|scope| {
            for file in &files {
                let store = &store;
                scope.spawn(move || store.is_modified(file).unwrap());
            }
        });

        assert_eq!(store.len().unwrap(), 8);
        drop(store);
        let reopened = open_store(&tmp);
        assert_eq!(reopened.len().unwrap(), 8);
    }

    // =========================================================================
    // Hash function
    // =========================================================================

    #[test]
    fn hash_file_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.bin");
        fs::write(&path, b"hello world").unwrap();

        let h1 = hash_file(&path).unwrap();
        let h2 = hash_file(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64); // SHA-256 hex is 64 chars
    }

    #[test]
    fn hash_file_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.bin");

        fs::write(&path, b"version 1").unwrap();
        let h1 = hash_file(&path).unwrap();

        fs::write(&path, b"version 2").unwrap();
        let h2 = hash_file(&path).unwrap();

        assert_ne!(h1, h2);
    }
}
