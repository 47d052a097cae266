//! Change detection for history files.
//!
//! The history database has no changelog we can consult, so a run starts by
//! hashing the frozen copy's bytes and comparing against the fingerprint
//! persisted by the previous successful run.
//!
//! Browsers keep history in WAL mode. A new visit lands in the `-wal`
//! sidecar and only reaches the main file at the next checkpoint, so the
//! sidecar is part of the fingerprint.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Result of a change check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCheck {
    pub fingerprint: String,
    pub changed: bool,
}

/// SQLite's write-ahead log path for the database at `path`.
pub fn wal_sidecar(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push("-wal");
    path.with_file_name(name)
}

/// SHA-256 of the database at `path` followed by its `-wal` sidecar when
/// one exists, hex-encoded.
pub fn fingerprint_file(path: &Path) -> Result<String, SyncError> {
    let unavailable = |source| SyncError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };
    let mut hasher = Sha256::new();
    let mut file = File::open(path).map_err(unavailable)?;
    std::io::copy(&mut file, &mut hasher).map_err(unavailable)?;

    match File::open(wal_sidecar(path)) {
        Ok(mut wal) => {
            std::io::copy(&mut wal, &mut hasher).map_err(unavailable)?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(unavailable(e)),
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Decide whether the source changed since `previous`.
pub fn should_run(path: &Path, previous: Option<&str>) -> Result<ChangeCheck, SyncError> {
    let fingerprint = fingerprint_file(path)?;
    let changed = previous != Some(fingerprint.as_str());
    Ok(ChangeCheck {
        fingerprint,
        changed,
    })
}
