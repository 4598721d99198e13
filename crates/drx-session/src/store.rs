// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-broker snapshot persistence.
//!
//! Layout: `{sessions_dir}/broker_{uuid}.json`. Writes go through a sibling
//! temp file and an atomic rename so a crash mid-write never leaves a
//! truncated snapshot behind.

use crate::{SessionError, SessionState};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// File-backed store of [`SessionState`] snapshots, one per broker.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SnapshotIo`] if the directory cannot be
    /// created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| SessionError::SnapshotIo {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Path of a broker's snapshot file.
    #[must_use]
    pub fn path_for(&self, broker_id: Uuid) -> PathBuf {
        self.root.join(format!("broker_{broker_id}.json"))
    }

    /// Persist a snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SnapshotIo`] on write or rename failure.
    pub fn save(&self, broker_id: Uuid, state: &SessionState) -> Result<(), SessionError> {
        let path = self.path_for(broker_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(state).map_err(SessionError::SnapshotCorrupt)?;
        write_file(&tmp, &json)?;
        std::fs::rename(&tmp, &path).map_err(|source| SessionError::SnapshotIo {
            path: path.display().to_string(),
            source,
        })?;
        info!(target: "drx.session", broker = %broker_id, path = %path.display(), "session snapshot saved");
        Ok(())
    }

    /// Load a broker's snapshot, if one exists.
    ///
    /// A corrupt snapshot is treated as absent (and logged): the manager
    /// will simply log in fresh and overwrite it.
    #[must_use]
    pub fn load(&self, broker_id: Uuid) -> Option<SessionState> {
        let path = self.path_for(broker_id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "drx.session", broker = %broker_id, "no session snapshot");
                return None;
            }
            Err(e) => {
                warn!(target: "drx.session", broker = %broker_id, error = %e, "snapshot unreadable");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(target: "drx.session", broker = %broker_id, error = %e, "snapshot corrupt, ignoring");
                None
            }
        }
    }

    /// `true` when a snapshot file exists for the broker.
    #[must_use]
    pub fn has_session(&self, broker_id: Uuid) -> bool {
        self.path_for(broker_id).exists()
    }

    /// Delete a broker's snapshot. Returns `true` if one was removed.
    #[must_use]
    pub fn delete(&self, broker_id: Uuid) -> bool {
        let path = self.path_for(broker_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(target: "drx.session", broker = %broker_id, "session snapshot deleted");
                true
            }
            Err(_) => false,
        }
    }

    /// Delete every broker snapshot, returning how many were removed.
    #[must_use]
    pub fn clear_all(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("broker_") && name.ends_with(".json") {
                if std::fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                }
            }
        }
        info!(target: "drx.session", removed, "cleared session snapshots");
        removed
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SessionError> {
    std::fs::write(path, bytes).map_err(|source| SessionError::SnapshotIo {
        path: path.display().to_string(),
        source,
    })
}
