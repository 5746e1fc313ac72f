//! Durable per-platform crawl progress, so a multi-hour crawl can resume
//! after interruption.

use crate::Result;
use crate::model::HostingPlatform;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_TARGET: &str = " checkpoint";

/// Sub-directory of the state dir holding one JSON document per platform.
const STATE_SUBDIR: &str = "__fetcher__";

/// Progress of one crawl. Owned exclusively by the orchestrator while the
/// crawl runs; persisted after every page; deleted on completion or on an
/// explicit start-over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCheckpoint {
    /// Next page number, offset or numeric id, depending on the adapter family.
    pub cursor: u64,
    /// Records discovered so far across all completed pages.
    pub num_fetched: u64,
    /// Ids already fetched, for the adapter family that resumes idempotently by id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seen_ids: Vec<String>,
    /// Total result count observed at crawl start, if the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl FetchCheckpoint {
    #[must_use]
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_ids.iter().any(|seen| seen == id)
    }

    pub fn record_seen(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.has_seen(&id) {
            self.seen_ids.push(id);
        }
    }
}

/// Durable key→state persistence for crawl progress, keyed by platform.
/// Absence is not an error; callers supply defaults.
pub trait CheckpointStore: Send + Sync {
    fn load(&self, platform: HostingPlatform) -> Result<Option<FetchCheckpoint>>;
    fn store(&self, platform: HostingPlatform, state: &FetchCheckpoint) -> Result<()>;
    /// Returns whether a state existed.
    fn delete(&self, platform: HostingPlatform) -> Result<bool>;
}

/// Stores one JSON document per platform under `<state_dir>/__fetcher__/`.
#[derive(Debug)]
pub struct FileCheckpointStore {
    base_path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: state_dir.as_ref().join(STATE_SUBDIR),
        }
    }

    fn path_for(&self, platform: HostingPlatform) -> PathBuf {
        self.base_path.join(format!("{platform}.json"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, platform: HostingPlatform) -> Result<Option<FetchCheckpoint>> {
        let path = self.path_for(platform);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(target: LOG_TARGET, "no stored state for fetcher '{platform}', starting from defaults");
                return Ok(None);
            }
            Err(e) => return Err(e).into_app_err_with(|| format!("unable to read checkpoint file '{}'", path.display())),
        };

        let state = serde_json::from_slice(&raw).into_app_err_with(|| format!("unable to parse checkpoint file '{}'", path.display()))?;
        Ok(Some(state))
    }

    fn store(&self, platform: HostingPlatform, state: &FetchCheckpoint) -> Result<()> {
        let path = self.path_for(platform);
        log::debug!(target: LOG_TARGET, "saving state of fetcher '{platform}' ({})", path.display());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create state directory '{}'", parent.display()))?;
        }

        let serialized = serde_json::to_vec_pretty(state).into_app_err("unable to serialize checkpoint state")?;

        // Write-then-rename, so a cancellation mid-write can never leave a
        // torn file in place of the previous checkpoint.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized).into_app_err_with(|| format!("unable to write checkpoint file '{}'", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).into_app_err_with(|| format!("unable to move checkpoint file into place at '{}'", path.display()))?;
        Ok(())
    }

    fn delete(&self, platform: HostingPlatform) -> Result<bool> {
        let path = self.path_for(platform);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!(target: LOG_TARGET, "deleted state of fetcher '{platform}' ({})", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).into_app_err_with(|| format!("unable to delete checkpoint file '{}'", path.display())),
        }
    }
}

/// In-memory store, for tests and embedders that manage durability themselves.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    states: Mutex<HashMap<HostingPlatform, FetchCheckpoint>>,
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, platform: HostingPlatform) -> Result<Option<FetchCheckpoint>> {
        Ok(self.states.lock().expect("poisoned state lock").get(&platform).cloned())
    }

    fn store(&self, platform: HostingPlatform, state: &FetchCheckpoint) -> Result<()> {
        let _ = self.states.lock().expect("poisoned state lock").insert(platform, state.clone());
        Ok(())
    }

    fn delete(&self, platform: HostingPlatform) -> Result<bool> {
        Ok(self.states.lock().expect("poisoned state lock").remove(&platform).is_some())
    }
}
