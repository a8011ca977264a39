//! Per-user staging of uploaded images awaiting a size choice.
//!
//! When a user uploads through the form and asks to pick an output size, the
//! raw upload is parked here until the choice arrives from the chat side.
//! Each user has at most one pending image; saving again replaces it.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── 12345/
//! │   ├── pending_image     # raw upload bytes, untouched
//! │   └── metadata.json     # {"width":5000,"height":3750,"saved_at":1700000000}
//! └── -100200/
//!     └── ...
//! ```
//!
//! An entry whose metadata is missing or unreadable is invisible to
//! [`StagingStore::get`] and is removed by the next sweep. Saves are built
//! under a hidden `.saving-*` directory and renamed into place; sweep only
//! removes those once their mtime is past the age limit. The store never
//! inspects image bytes; validation belongs to the engine.

use crate::imaging::Dimensions;
use crate::types::UserKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const IMAGE_FILENAME: &str = "pending_image";
const METADATA_FILENAME: &str = "metadata.json";
const SCRATCH_PREFIX: &str = ".saving-";

/// What comes back out of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub bytes: Vec<u8>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StagedMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    saved_at: u64,
}

impl StagedMetadata {
    fn dimensions(&self) -> Option<Dimensions> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Dimensions::new(width, height)),
            _ => None,
        }
    }
}

/// Filesystem-backed staging store rooted at one directory.
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user: UserKey) -> PathBuf {
        self.root.join(user.to_string())
    }

    /// Stage `bytes` for `user`, replacing any earlier entry.
    pub fn save(
        &self,
        user: UserKey,
        bytes: &[u8],
        dimensions: Option<Dimensions>,
    ) -> io::Result<()> {
        self.save_at(user, bytes, dimensions, SystemTime::now())
    }

    /// The entry is assembled in a hidden scratch directory and renamed into
    /// place, so a concurrent sweep never sees a half-written entry.
    pub fn save_at(
        &self,
        user: UserKey,
        bytes: &[u8],
        dimensions: Option<Dimensions>,
        now: SystemTime,
    ) -> io::Result<()> {
        let scratch = self
            .root
            .join(format!("{SCRATCH_PREFIX}{user}-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&scratch)?;

        let metadata = StagedMetadata {
            width: dimensions.map(|d| d.width),
            height: dimensions.map(|d| d.height),
            saved_at: unix_secs(now),
        };
        let written = fs::write(scratch.join(IMAGE_FILENAME), bytes)
            .and_then(|()| {
                fs::write(
                    scratch.join(METADATA_FILENAME),
                    serde_json::to_string(&metadata)?,
                )
            })
            .and_then(|()| self.delete(user))
            .and_then(|()| fs::rename(&scratch, self.user_dir(user)));
        if let Err(e) = written {
            let _ = fs::remove_dir_all(&scratch);
            return Err(e);
        }
        debug!(%user, size = bytes.len(), "staged image");
        Ok(())
    }

    /// Read the pending image for `user`, if a complete entry exists.
    pub fn get(&self, user: UserKey) -> io::Result<Option<StagedImage>> {
        let dir = self.user_dir(user);
        let Some(metadata) = read_metadata(&dir) else {
            return Ok(None);
        };
        match fs::read(dir.join(IMAGE_FILENAME)) {
            Ok(bytes) => Ok(Some(StagedImage {
                bytes,
                dimensions: metadata.dimensions(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove everything staged for `user`. Missing entries are not an error.
    pub fn delete(&self, user: UserKey) -> io::Result<()> {
        match fs::remove_dir_all(self.user_dir(user)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove entries saved more than `max_age` ago. Returns how many went.
    pub fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        self.sweep_at(SystemTime::now(), max_age)
    }

    pub fn sweep_at(&self, now: SystemTime, max_age: Duration) -> io::Result<usize> {
        let cutoff = unix_secs(now).saturating_sub(max_age.as_secs());
        let mut removed = 0;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let is_scratch = entry
                .file_name()
                .to_string_lossy()
                .starts_with(SCRATCH_PREFIX);
            let expired = if is_scratch {
                // Abandoned saves only; a live save renames its scratch away
                modified_secs(&entry)? < cutoff
            } else {
                match read_metadata(&path) {
                    Some(metadata) => metadata.saved_at < cutoff,
                    None => true,
                }
            };
            if expired {
                fs::remove_dir_all(&path)?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "swept stale staging entries");
        }
        Ok(removed)
    }
}

fn read_metadata(dir: &Path) -> Option<StagedMetadata> {
    let content = fs::read_to_string(dir.join(METADATA_FILENAME)).ok()?;
    serde_json::from_str(&content).ok()
}

fn modified_secs(entry: &fs::DirEntry) -> io::Result<u64> {
    Ok(unix_secs(entry.metadata()?.modified()?))
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, StagingStore) {
        let tmp = TempDir::new().unwrap();
        let store = StagingStore::open(tmp.path().join("staging")).unwrap();
        (tmp, store)
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn open_creates_root() {
        let (_tmp, store) = store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn save_then_get() {
        let (_tmp, store) = store();
        let dims = Dimensions::new(5000, 3750);
        store.save(UserKey(7), b"raw bytes", Some(dims)).unwrap();

        let staged = store.get(UserKey(7)).unwrap().unwrap();
        assert_eq!(staged.bytes, b"raw bytes");
        assert_eq!(staged.dimensions, Some(dims));
    }

    #[test]
    fn dimensions_are_optional() {
        let (_tmp, store) = store();
        store.save(UserKey(7), b"x", None).unwrap();
        assert_eq!(store.get(UserKey(7)).unwrap().unwrap().dimensions, None);
    }

    #[test]
    fn get_missing_is_none() {
        let (_tmp, store) = store();
        assert!(store.get(UserKey(1)).unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous() {
        let (_tmp, store) = store();
        store
            .save(UserKey(7), b"first", Some(Dimensions::new(1, 1)))
            .unwrap();
        store.save(UserKey(7), b"second", None).unwrap();

        let staged = store.get(UserKey(7)).unwrap().unwrap();
        assert_eq!(staged.bytes, b"second");
        assert_eq!(staged.dimensions, None);
    }

    #[test]
    fn users_are_isolated() {
        let (_tmp, store) = store();
        store.save(UserKey(1), b"one", None).unwrap();
        store.save(UserKey(2), b"two", None).unwrap();
        store.delete(UserKey(1)).unwrap();

        assert!(store.get(UserKey(1)).unwrap().is_none());
        assert_eq!(store.get(UserKey(2)).unwrap().unwrap().bytes, b"two");
    }

    #[test]
    fn delete_missing_is_ok() {
        let (_tmp, store) = store();
        store.delete(UserKey(99)).unwrap();
    }

    #[test]
    fn metadata_format_is_flat() {
        let (_tmp, store) = store();
        store
            .save_at(UserKey(3), b"x", Some(Dimensions::new(640, 480)), at(1_700))
            .unwrap();
        let json = fs::read_to_string(store.root().join("3").join(METADATA_FILENAME)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["width"], 640);
        assert_eq!(value["height"], 480);
        assert_eq!(value["saved_at"], 1_700);
    }

    #[test]
    fn sweep_removes_only_stale_entries() {
        let (_tmp, store) = store();
        store.save_at(UserKey(1), b"old", None, at(1_000)).unwrap();
        store.save_at(UserKey(2), b"new", None, at(4_000)).unwrap();

        let removed = store.sweep_at(at(5_000), Duration::from_secs(3600)).unwrap();

        assert_eq!(removed, 1);
        assert!(store.get(UserKey(1)).unwrap().is_none());
        assert!(store.get(UserKey(2)).unwrap().is_some());
    }

    #[test]
    fn sweep_removes_entries_without_metadata() {
        let (_tmp, store) = store();
        let orphan = store.root().join("77");
        fs::create_dir_all(&orphan).unwrap();
        fs::write(orphan.join(IMAGE_FILENAME), b"x").unwrap();

        let removed = store.sweep_at(at(0), Duration::from_secs(3600)).unwrap();

        assert_eq!(removed, 1);
        assert!(!orphan.exists());
    }

    #[test]
    fn save_leaves_no_scratch_behind() {
        let (_tmp, store) = store();
        store.save(UserKey(5), b"one", None).unwrap();
        store.save(UserKey(5), b"two", None).unwrap();

        let names: Vec<String> = fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["5".to_string()]);
    }

    #[test]
    fn sweep_spares_save_in_progress() {
        let (_tmp, store) = store();
        let scratch = store.root().join(format!("{SCRATCH_PREFIX}9-abc"));
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join(IMAGE_FILENAME), b"half written").unwrap();

        let removed = store
            .sweep_at(SystemTime::now(), Duration::from_secs(3600))
            .unwrap();

        assert_eq!(removed, 0);
        assert!(scratch.join(IMAGE_FILENAME).exists());
    }

    #[test]
    fn sweep_removes_abandoned_scratch() {
        let (_tmp, store) = store();
        let scratch = store.root().join(format!("{SCRATCH_PREFIX}9-abc"));
        fs::create_dir_all(&scratch).unwrap();

        let later = SystemTime::now() + Duration::from_secs(7200);
        let removed = store.sweep_at(later, Duration::from_secs(3600)).unwrap();

        assert_eq!(removed, 1);
        assert!(!scratch.exists());
    }

    #[test]
    fn sweep_ignores_stray_files() {
        let (_tmp, store) = store();
        fs::write(store.root().join("README"), b"not an entry").unwrap();
        assert_eq!(store.sweep_at(at(0), Duration::ZERO).unwrap(), 0);
        assert!(store.root().join("README").exists());
    }
}
