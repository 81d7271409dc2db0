//! Source fingerprints and staleness detection
//!
//! A fingerprint records the modification time of every source file that
//! went into the last successful build of an (extension, platform) pair.
//! Comparing it against the files on disk tells whether a rebuild is due.
//!
//! Timestamps keep nanosecond resolution on both sides of the comparison,
//! so a touch within the same second as the previous build still counts.

use super::types::{BuildError, Extension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Failed to access fingerprint index {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt fingerprint index {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Modification time since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileStamp {
    pub secs: u64,
    pub nanos: u32,
}

impl FileStamp {
    /// Read the current modification time of `path`.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Io` if the file is missing or cannot be stat'ed.
    pub fn of(path: &Path) -> Result<Self, BuildError> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|e| BuildError::io(path, e))?;
        Ok(Self::from(modified))
    }
}

impl From<SystemTime> for FileStamp {
    fn from(time: SystemTime) -> Self {
        // Pre-epoch mtimes collapse to zero; they only ever compare as older
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            secs: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        }
    }
}

/// Source modification times captured for one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFingerprint {
    files: BTreeMap<PathBuf, FileStamp>,
}

impl BuildFingerprint {
    /// Stamp every file in `files`.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Io` naming the first file that cannot be stat'ed.
    pub fn capture(files: &[PathBuf]) -> Result<Self, BuildError> {
        let files = files
            .iter()
            .map(|path| FileStamp::of(path).map(|stamp| (path.clone(), stamp)))
            .collect::<Result<_, _>>()?;
        Ok(Self { files })
    }

    /// Recorded stamp for `path`
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<FileStamp> {
        self.files.get(path).copied()
    }

    /// Tracked files in path order
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `sources` differ from what this fingerprint recorded.
    ///
    /// Stale when the file set changed, a file vanished, or a file's mtime
    /// is strictly newer than its recorded stamp.
    #[must_use]
    pub fn is_stale_against(&self, sources: &[PathBuf]) -> bool {
        if sources.len() != self.files.len() {
            return true;
        }

        sources.iter().any(|path| {
            let Some(recorded) = self.files.get(path) else {
                return true;
            };
            FileStamp::of(path).map_or(true, |current| current > *recorded)
        })
    }
}

type Key = (String, String);

// On-disk shape of one store entry
#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    extension: String,
    platform: String,
    fingerprint: BuildFingerprint,
}

/// Fingerprints for every (extension, platform) built in this session
///
/// Safe to share between threads building different targets; each write
/// replaces one key under the store's lock. Optionally backed by a JSON
/// index so staleness survives process restarts.
#[derive(Debug, Default)]
pub struct FingerprintStore {
    entries: Mutex<HashMap<Key, BuildFingerprint>>,
    index: Option<PathBuf>,
}

impl FingerprintStore {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `index`, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the index exists but cannot be read or parsed.
    pub fn open(index: PathBuf) -> Result<Self, FingerprintError> {
        let entries: HashMap<Key, BuildFingerprint> = if index.exists() {
            let contents = fs::read_to_string(&index).map_err(|source| FingerprintError::Io {
                path: index.clone(),
                source,
            })?;
            let parsed: Vec<IndexEntry> =
                serde_json::from_str(&contents).map_err(|source| FingerprintError::Parse {
                    path: index.clone(),
                    source,
                })?;
            parsed
                .into_iter()
                .map(|e| ((e.extension, e.platform), e.fingerprint))
                .collect()
        } else {
            HashMap::new()
        };

        crate::debug!(
            "Loaded {} fingerprint(s) from {}",
            entries.len(),
            index.display()
        );

        Ok(Self {
            entries: Mutex::new(entries),
            index: Some(index),
        })
    }

    /// Backing index file, if persistent
    #[must_use]
    pub fn index_path(&self) -> Option<&Path> {
        self.index.as_deref()
    }

    /// Write the store to its index file. No-op for in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    pub fn save(&self) -> Result<(), FingerprintError> {
        let Some(index) = &self.index else {
            return Ok(());
        };
        let io_err = |source| FingerprintError::Io {
            path: index.clone(),
            source,
        };

        let mut entries: Vec<IndexEntry> = self
            .lock()
            .iter()
            .map(|((extension, platform), fingerprint)| IndexEntry {
                extension: extension.clone(),
                platform: platform.clone(),
                fingerprint: fingerprint.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.extension, &a.platform).cmp(&(&b.extension, &b.platform)));

        let json = serde_json::to_string_pretty(&entries).map_err(|source| {
            FingerprintError::Parse {
                path: index.clone(),
                source,
            }
        })?;

        let parent = index
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(io_err)?;
        let tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        fs::write(tmp.path(), json).map_err(io_err)?;
        tmp.persist(index).map_err(|e| io_err(e.error))?;

        Ok(())
    }

    /// Stamp `files` and make them the fingerprint for (extension, platform).
    ///
    /// Overwrites any previous fingerprint for the key.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Io` if any file is missing; the store is left
    /// unchanged in that case.
    pub fn record(
        &self,
        extension: &Extension,
        platform: &str,
        files: &[PathBuf],
    ) -> Result<BuildFingerprint, BuildError> {
        let fingerprint = BuildFingerprint::capture(files)?;
        self.commit(extension, platform, fingerprint.clone());
        Ok(fingerprint)
    }

    /// Store an already captured fingerprint for (extension, platform)
    pub fn commit(&self, extension: &Extension, platform: &str, fingerprint: BuildFingerprint) {
        self.lock()
            .insert(Self::key(extension, platform), fingerprint);
    }

    /// Whether (extension, platform) needs rebuilding.
    ///
    /// True when nothing was recorded yet or the sources changed since.
    #[must_use]
    pub fn is_stale(&self, extension: &Extension, platform: &str) -> bool {
        self.lock()
            .get(&Self::key(extension, platform))
            .is_none_or(|fingerprint| fingerprint.is_stale_against(&extension.sources))
    }

    /// Recorded fingerprint for (extension, platform)
    #[must_use]
    pub fn get(&self, extension: &Extension, platform: &str) -> Option<BuildFingerprint> {
        self.lock().get(&Self::key(extension, platform)).cloned()
    }

    /// Drop the fingerprint for (extension, platform)
    pub fn forget(&self, extension: &Extension, platform: &str) {
        self.lock().remove(&Self::key(extension, platform));
    }

    /// Drop every fingerprint of the named extension
    pub fn forget_extension(&self, name: &str) {
        self.lock().retain(|(extension, _), _| extension != name);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn key(extension: &Extension, platform: &str) -> Key {
        (extension.name.clone(), platform.to_string())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Key, BuildFingerprint>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn extension_in(dir: &TempDir, files: &[&str]) -> Extension {
        let sources = files
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, "/* source */").unwrap();
                path
            })
            .collect();
        Extension::new("extension_one", sources, dir.path().to_path_buf())
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn stale_without_fingerprint() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let store = FingerprintStore::new();

        assert!(store.is_stale(&ext, "native"));
    }

    #[test]
    fn fresh_after_record() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extconf.rb", "extension_one.c"]);
        let store = FingerprintStore::new();

        let fingerprint = store.record(&ext, "native", &ext.sources).unwrap();
        assert_eq!(fingerprint.len(), 2);
        assert!(!store.is_stale(&ext, "native"));
        // Second evaluation with nothing touched
        assert!(!store.is_stale(&ext, "native"));
    }

    #[test]
    fn keys_are_per_platform() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let store = FingerprintStore::new();

        store.record(&ext, "native", &ext.sources).unwrap();
        assert!(!store.is_stale(&ext, "native"));
        assert!(store.is_stale(&ext, "x86-mingw32"));
    }

    #[test]
    fn touched_file_is_stale() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let source = ext.sources.first().unwrap().clone();
        set_mtime(&source, SystemTime::now() - Duration::from_secs(60));

        let store = FingerprintStore::new();
        store.record(&ext, "native", &ext.sources).unwrap();

        set_mtime(&source, SystemTime::now());
        assert!(store.is_stale(&ext, "native"));
    }

    #[test]
    fn sub_second_touch_is_stale() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let source = ext.sources.first().unwrap().clone();
        let base = UNIX_EPOCH + Duration::new(1_700_000_000, 100);
        set_mtime(&source, base);

        let store = FingerprintStore::new();
        store.record(&ext, "native", &ext.sources).unwrap();

        set_mtime(&source, base + Duration::from_millis(250));
        assert!(store.is_stale(&ext, "native"));
    }

    #[test]
    fn older_mtime_is_not_stale() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let source = ext.sources.first().unwrap().clone();

        let store = FingerprintStore::new();
        store.record(&ext, "native", &ext.sources).unwrap();

        set_mtime(&source, SystemTime::now() - Duration::from_secs(3600));
        assert!(!store.is_stale(&ext, "native"));
    }

    #[test]
    fn added_file_is_stale() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let store = FingerprintStore::new();
        store.record(&ext, "native", &ext.sources).unwrap();

        let grown = extension_in(&dir, &["extension_one.c", "helper.h"]);
        assert!(store.is_stale(&grown, "native"));
    }

    #[test]
    fn removed_file_is_stale() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c", "helper.h"]);
        let store = FingerprintStore::new();
        store.record(&ext, "native", &ext.sources).unwrap();

        let shrunk = Extension::new(
            "extension_one",
            vec![dir.path().join("extension_one.c")],
            dir.path().to_path_buf(),
        );
        assert!(store.is_stale(&shrunk, "native"));
    }

    #[test]
    fn deleted_file_is_stale() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let store = FingerprintStore::new();
        store.record(&ext, "native", &ext.sources).unwrap();

        fs::remove_file(ext.sources.first().unwrap()).unwrap();
        assert!(store.is_stale(&ext, "native"));
    }

    #[test]
    fn record_missing_file_fails_and_keeps_previous() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let store = FingerprintStore::new();
        let first = store.record(&ext, "native", &ext.sources).unwrap();

        let missing = vec![dir.path().join("missing.c")];
        let err = store.record(&ext, "native", &missing).unwrap_err();
        assert!(matches!(err, BuildError::Io { ref path, .. } if path.ends_with("missing.c")));
        assert_eq!(store.get(&ext, "native"), Some(first));
    }

    #[test]
    fn forget_makes_stale() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extension_one.c"]);
        let store = FingerprintStore::new();
        store.record(&ext, "native", &ext.sources).unwrap();
        store.record(&ext, "x86-mingw32", &ext.sources).unwrap();

        store.forget(&ext, "native");
        assert!(store.is_stale(&ext, "native"));
        assert!(!store.is_stale(&ext, "x86-mingw32"));

        store.forget_extension("extension_one");
        assert!(store.is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let ext = extension_in(&dir, &["extconf.rb", "extension_one.c"]);
        let index = dir.path().join("tmp").join("kiln-fingerprints.json");

        let store = FingerprintStore::open(index.clone()).unwrap();
        assert!(store.is_empty());
        store.record(&ext, "native", &ext.sources).unwrap();
        store.save().unwrap();
        assert!(index.exists());

        let reopened = FingerprintStore::open(index).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(!reopened.is_stale(&ext, "native"));
        assert_eq!(reopened.get(&ext, "native"), store.get(&ext, "native"));
    }

    #[test]
    fn corrupt_index_is_reported() {
        let dir = TempDir::new().unwrap();
        let index = dir.path().join("kiln-fingerprints.json");
        fs::write(&index, "{ not json").unwrap();

        let err = FingerprintStore::open(index).unwrap_err();
        assert!(matches!(err, FingerprintError::Parse { .. }));
    }

    #[test]
    fn in_memory_save_is_noop() {
        let store = FingerprintStore::new();
        assert!(store.index_path().is_none());
        store.save().unwrap();
    }
}
