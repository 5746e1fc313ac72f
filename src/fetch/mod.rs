//! The fetch-orchestration engine: per-platform adapters discover and
//! retrieve project records, coordinate with remote rate limits, recover from
//! transient failures, and checkpoint progress so a multi-hour crawl can be
//! resumed after interruption.

pub mod checkpoint;
pub mod error;
pub mod factory;
pub mod github;
pub mod orchestrator;
pub mod oshwa;
pub mod outcome;
pub mod rate_limit;
pub mod thingiverse;
pub mod transport;
pub mod util;

pub use checkpoint::{CheckpointStore, FetchCheckpoint, FileCheckpointStore, MemoryCheckpointStore};
pub use error::FetchError;
pub use factory::FetcherFactory;
pub use orchestrator::{CancelFlag, CrawlSummary, Orchestrator, RetryPolicy};
pub use outcome::{CountingListener, FailedFetch, FetchListener, FetchOutcome, FetchedRecord};

use crate::model::{HostingPlatform, HostingUnitId};
use serde_json::Value;

/// One project identity surfaced by a discovery request, plus whatever the
/// listing call already delivered about it.
#[derive(Debug, Clone)]
pub struct DiscoveredItem {
    pub unit: HostingUnitId,
    /// In-repo manifest path, for forge adapters that download per item.
    pub path: Option<String>,
    /// Full record delivered inline by the listing call, for platforms whose
    /// listing returns records rather than references.
    pub payload: Option<Value>,
}

impl DiscoveredItem {
    pub fn reference(unit: impl Into<HostingUnitId>, path: Option<String>) -> Self {
        Self {
            unit: unit.into(),
            path,
            payload: None,
        }
    }

    pub fn inline(unit: impl Into<HostingUnitId>, payload: Value) -> Self {
        Self {
            unit: unit.into(),
            path: None,
            payload: Some(payload),
        }
    }
}

/// The result of one discovery request.
#[derive(Debug, Clone)]
pub struct DiscoveredPage {
    pub items: Vec<DiscoveredItem>,
    /// Cursor to resume from once this page is fully processed.
    pub next_cursor: u64,
    /// Total result count, when the platform reports one.
    pub total: Option<u64>,
    /// Whether this was the final page.
    pub last: bool,
}

/// Platform-specific logic that turns a discovery query or a single identity
/// into raw records. One instance drives one platform and owns its rate
/// limiters; the orchestrator owns the crawl loop around it.
#[async_trait::async_trait]
pub trait Fetcher: Send {
    /// The platform this adapter fetches from.
    fn platform(&self) -> HostingPlatform;

    /// Whether this adapter family relies on the checkpoint's seen-id list
    /// for idempotent resume.
    fn tracks_seen_ids(&self) -> bool {
        false
    }

    /// Perform one discovery request at the checkpoint's cursor, applying and
    /// updating the limiters relevant to that call class around it. Response
    /// classification is the adapter's job: a short non-final page is
    /// `IncompletePage`, a secondary-limit signal is `RateLimited`, any other
    /// non-2xx response is fatal.
    async fn discover(&mut self, checkpoint: &FetchCheckpoint) -> Result<DiscoveredPage, FetchError>;

    /// Download or extract one discovered item, validating that the payload
    /// is non-empty text.
    async fn fetch_discovered(&mut self, item: &DiscoveredItem) -> Result<FetchedRecord, FetchError>;

    /// Fetch a single project directly, bypassing discovery and checkpoints.
    async fn fetch(&mut self, unit: &HostingUnitId, path: Option<&str>) -> Result<FetchedRecord, FetchError>;
}
