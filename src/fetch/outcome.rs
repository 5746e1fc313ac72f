use crate::fetch::error::FetchError;
use crate::model::{CrawlMeta, HostingUnitId, Manifest};
use std::sync::atomic::{AtomicU64, Ordering};

/// The result of one successful fetch: identity, raw manifest payload, and
/// metadata about the crawl visit.
#[derive(Debug, Clone)]
pub struct FetchedRecord {
    pub unit: HostingUnitId,
    pub manifest: Manifest,
    pub meta: CrawlMeta,
}

/// The result of one failed fetch.
#[derive(Debug)]
pub struct FailedFetch {
    pub unit: HostingUnitId,
    pub error: FetchError,
}

/// Emitted exactly once per attempted unit.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(FetchedRecord),
    Failed(FailedFetch),
}

impl FetchOutcome {
    #[must_use]
    pub const fn unit(&self) -> &HostingUnitId {
        match self {
            Self::Fetched(record) => &record.unit,
            Self::Failed(failure) => &failure.unit,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

/// Receives every `FetchOutcome` as it is produced, e.g. to persist or report it.
pub trait FetchListener: Send + Sync {
    fn outcome(&self, outcome: &FetchOutcome);
}

/// Counts successes and failures.
#[derive(Debug, Default)]
pub struct CountingListener {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl CountingListener {
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl FetchListener for CountingListener {
    fn outcome(&self, outcome: &FetchOutcome) {
        let counter = if outcome.is_success() { &self.successes } else { &self.failures };
        let _ = counter.fetch_add(1, Ordering::Relaxed);
    }
}
