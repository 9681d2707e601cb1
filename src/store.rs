//! Durable record of which videos have already been announced.
//!
//! The store is a JSON array of id strings. Loading never fails: a missing
//! file is an empty set and a corrupt one is moved aside. Saving replaces the
//! whole file through a temporary sibling and a rename, so readers only ever
//! see a complete array.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::error::StoreError;

/// Ids of items that have been announced (or registered in bulk).
pub type SeenSet = HashSet<String>;

/// Suffix appended to a store file that could not be parsed.
const CORRUPT_SUFFIX: &str = ".corrupt.bak";

/// File-backed [`SeenSet`].
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a corrupt store file is moved to.
    pub fn quarantine_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(CORRUPT_SUFFIX);
        PathBuf::from(name)
    }

    /// Read the persisted set.
    pub fn load(&self) -> SeenSet {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no seen-videos file yet, starting empty");
                return SeenSet::new();
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "cannot read seen-videos file, starting empty");
                return SeenSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&text) {
            Ok(ids) => {
                let seen: SeenSet = ids.into_iter().collect();
                debug!(path = %self.path.display(), count = seen.len(), "loaded seen video ids");
                seen
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "seen-videos file is corrupted");
                self.quarantine();
                SeenSet::new()
            }
        }
    }

    fn quarantine(&self) {
        let backup = self.quarantine_path();
        match fs::rename(&self.path, &backup) {
            Ok(()) => warn!(backup = %backup.display(), "corrupted file moved aside"),
            Err(e) => warn!(error = %e, "could not move corrupted file aside"),
        }
    }

    /// Replace the persisted set with `seen`.
    pub fn save(&self, seen: &SeenSet) -> Result<(), StoreError> {
        let mut ids: Vec<&String> = seen.iter().collect();
        ids.sort();
        let body = serde_json::to_vec(&ids)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&body).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(path = %self.path.display(), count = seen.len(), "saved seen video ids");
        Ok(())
    }
}
