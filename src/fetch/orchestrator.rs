//! Drives one adapter through a full crawl: resume or restart from the
//! checkpoint store, page through discovery, fetch every discovered item,
//! persist progress after each page, and broadcast every outcome to the
//! registered listeners.

use crate::fetch::checkpoint::{CheckpointStore, FetchCheckpoint};
use crate::fetch::error::FetchError;
use crate::fetch::outcome::{FailedFetch, FetchListener, FetchOutcome, FetchedRecord};
use crate::fetch::{DiscoveredPage, Fetcher};
use crate::model::HostingUnitId;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;

const LOG_TARGET: &str = "    crawler";

/// Externally settable cancellation signal, checked between page iterations
/// so a shutdown can never corrupt a checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Bounds for the page-level retry machinery. The defaults mirror observed
/// code-search behavior on the reference platform; deployments can tune them
/// per platform.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// How often the same page is re-requested when it comes back short.
    pub incomplete_page_retries: u32,
    /// Cooldown after a secondary rate limit signal. These retries are not
    /// counted against the incomplete-page budget.
    pub secondary_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            incomplete_page_retries: 10,
            secondary_cooldown: Duration::from_secs(60),
        }
    }
}

/// What a finished (or interrupted) crawl did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub discovered: u64,
    pub fetched: u64,
    pub failed: u64,
    /// False when the crawl was cancelled between pages; the checkpoint is
    /// left in place for a later resume.
    pub completed: bool,
}

/// Coordinates one adapter per call; stateless across crawls, so a single
/// orchestrator can serve several platforms one after another.
pub struct Orchestrator {
    store: Arc<dyn CheckpointStore>,
    listeners: Vec<Arc<dyn FetchListener>>,
    policy: RetryPolicy,
    cancel: CancelFlag,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            listeners: Vec::new(),
            policy,
            cancel: CancelFlag::new(),
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn FetchListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch a single project, with the same listener emission and failure
    /// semantics as a crawl, but no checkpointing.
    pub async fn fetch_one(&self, fetcher: &mut dyn Fetcher, unit: &HostingUnitId, path: Option<&str>) -> Result<FetchedRecord, FetchError> {
        match fetcher.fetch(unit, path).await {
            Ok(record) => {
                self.emit(&FetchOutcome::Fetched(record.clone()));
                Ok(record)
            }
            Err(error) => {
                let outcome = FetchOutcome::Failed(FailedFetch {
                    unit: unit.clone(),
                    error,
                });
                self.emit(&outcome);
                let FetchOutcome::Failed(failure) = outcome else {
                    unreachable!("outcome was constructed as a failure above");
                };
                Err(failure.error)
            }
        }
    }

    /// Run a full discovery crawl over the adapter's platform, resuming from
    /// the stored checkpoint unless `start_over` forces a restart.
    pub async fn crawl(&self, fetcher: &mut dyn Fetcher, start_over: bool) -> Result<CrawlSummary, FetchError> {
        let platform = fetcher.platform();

        let mut checkpoint = if start_over {
            let _ = self.store.delete(platform).map_err(checkpoint_err)?;
            FetchCheckpoint::default()
        } else {
            self.store.load(platform).map_err(checkpoint_err)?.unwrap_or_default()
        };

        if checkpoint.num_fetched > 0 {
            log::info!(
                target: LOG_TARGET,
                "resuming '{platform}' crawl at cursor {} ({} records already discovered)",
                checkpoint.cursor,
                checkpoint.num_fetched
            );
        }

        let mut summary = CrawlSummary::default();
        let mut incomplete_retries = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                log::info!(target: LOG_TARGET, "'{platform}' crawl cancelled, keeping checkpoint for resume");
                return Ok(summary);
            }

            let page = match fetcher.discover(&checkpoint).await {
                Ok(page) => page,
                Err(FetchError::IncompletePage { page, got, expected }) => {
                    incomplete_retries += 1;
                    if incomplete_retries > self.policy.incomplete_page_retries {
                        return Err(FetchError::Fatal(format!(
                            "failed to fetch complete set of results from '{platform}', got only {got}/{expected} from page {page}"
                        )));
                    }
                    log::debug!(target: LOG_TARGET, "got incomplete set of results from '{platform}' page {page}, retrying...");
                    continue;
                }
                Err(FetchError::RateLimited) => {
                    log::debug!(
                        target: LOG_TARGET,
                        "hit secondary rate limit on '{platform}', now waiting {} seconds...",
                        self.policy.secondary_cooldown.as_secs()
                    );
                    tokio::time::sleep(self.policy.secondary_cooldown).await;
                    continue;
                }
                Err(err) => {
                    return Err(FetchError::Fatal(format!("failed to fetch projects from '{platform}': {err}")));
                }
            };
            incomplete_retries = 0;

            self.process_page(fetcher, &page, &mut checkpoint, &mut summary).await;

            checkpoint.cursor = page.next_cursor;
            checkpoint.num_fetched += page.items.len() as u64;
            if page.total.is_some() {
                checkpoint.total = page.total;
            }
            self.store.store(platform, &checkpoint).map_err(checkpoint_err)?;

            if page.last {
                break;
            }
        }

        let _ = self.store.delete(platform).map_err(checkpoint_err)?;
        summary.completed = true;
        log::info!(target: LOG_TARGET, "fetched {} projects from '{platform}'", summary.fetched);
        Ok(summary)
    }

    /// Fetch every item of one discovered page. A single item failure never
    /// aborts the page; it is reported to listeners and skipped.
    async fn process_page(&self, fetcher: &mut dyn Fetcher, page: &DiscoveredPage, checkpoint: &mut FetchCheckpoint, summary: &mut CrawlSummary) {
        summary.discovered += page.items.len() as u64;

        for item in &page.items {
            let id = item.unit.to_path_str();
            if fetcher.tracks_seen_ids() && checkpoint.has_seen(&id) {
                log::debug!(target: LOG_TARGET, "'{id}' already fetched, skipping");
                continue;
            }

            match fetcher.fetch_discovered(item).await {
                Ok(record) => {
                    summary.fetched += 1;
                    if fetcher.tracks_seen_ids() {
                        checkpoint.record_seen(id);
                    }
                    self.emit(&FetchOutcome::Fetched(record));
                }
                Err(error) => {
                    summary.failed += 1;
                    log::debug!(target: LOG_TARGET, "skipping '{id}': {error}");
                    self.emit(&FetchOutcome::Failed(FailedFetch {
                        unit: item.unit.clone(),
                        error,
                    }));
                }
            }
        }
    }

    fn emit(&self, outcome: &FetchOutcome) {
        for listener in &self.listeners {
            listener.outcome(outcome);
        }
    }
}

fn checkpoint_err(err: ohno::AppError) -> FetchError {
    FetchError::Checkpoint(format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::checkpoint::MemoryCheckpointStore;
    use crate::fetch::outcome::CountingListener;
    use crate::fetch::{DiscoveredItem, DiscoveredPage};
    use crate::model::{CrawlMeta, HostingPlatform, HostingUnitId, Manifest, ManifestFormat, SourcingProcedure, WebUnit};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU64;

    /// Adapter scripted from a fixed page table.
    struct ScriptedFetcher {
        platform: HostingPlatform,
        pages: Vec<Vec<&'static str>>,
        tracks_seen: bool,
        failing_items: HashSet<&'static str>,
        /// Cursor at which `discover` fails with a transient error.
        fail_discover_at: Option<u64>,
        /// `RateLimited` responses still to inject before the next real page.
        rate_limited: u32,
        discover_calls: u32,
    }

    impl ScriptedFetcher {
        fn new(platform: HostingPlatform, pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                platform,
                pages,
                tracks_seen: false,
                failing_items: HashSet::new(),
                fail_discover_at: None,
                rate_limited: 0,
                discover_calls: 0,
            }
        }

        fn unit(&self, id: &str) -> HostingUnitId {
            WebUnit::new(self.platform, id).into()
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for ScriptedFetcher {
        fn platform(&self) -> HostingPlatform {
            self.platform
        }

        fn tracks_seen_ids(&self) -> bool {
            self.tracks_seen
        }

        async fn discover(&mut self, checkpoint: &FetchCheckpoint) -> Result<DiscoveredPage, FetchError> {
            self.discover_calls += 1;
            if self.rate_limited > 0 {
                self.rate_limited -= 1;
                return Err(FetchError::RateLimited);
            }
            if self.fail_discover_at == Some(checkpoint.cursor) {
                return Err(FetchError::Transient {
                    status: Some(500),
                    message: "scripted failure".to_owned(),
                });
            }

            let cursor = usize::try_from(checkpoint.cursor).unwrap();
            let items = self.pages[cursor]
                .iter()
                .map(|id| DiscoveredItem::reference(self.unit(id), None))
                .collect();
            Ok(DiscoveredPage {
                items,
                next_cursor: checkpoint.cursor + 1,
                total: None,
                last: cursor + 1 >= self.pages.len(),
            })
        }

        async fn fetch_discovered(&mut self, item: &DiscoveredItem) -> Result<FetchedRecord, FetchError> {
            let id = item.unit.to_path_str();
            if self.failing_items.iter().any(|f| id.ends_with(f)) {
                return Err(FetchError::Payload(format!("file is empty: '{id}'")));
            }
            Ok(FetchedRecord {
                unit: item.unit.clone(),
                manifest: Manifest::new(&b"okhv = \"1.0\"\n"[..], ManifestFormat::Toml),
                meta: CrawlMeta::now(SourcingProcedure::Api, None),
            })
        }

        async fn fetch(&mut self, unit: &HostingUnitId, _path: Option<&str>) -> Result<FetchedRecord, FetchError> {
            self.fetch_discovered(&DiscoveredItem::reference(unit.clone(), None)).await
        }
    }

    /// Adapter whose pages always come back short.
    struct ShortPageFetcher {
        discover_calls: u32,
    }

    #[async_trait::async_trait]
    impl Fetcher for ShortPageFetcher {
        fn platform(&self) -> HostingPlatform {
            HostingPlatform::GithubCom
        }

        async fn discover(&mut self, checkpoint: &FetchCheckpoint) -> Result<DiscoveredPage, FetchError> {
            self.discover_calls += 1;
            Err(FetchError::IncompletePage {
                page: checkpoint.cursor.max(1),
                got: 3,
                expected: 10,
            })
        }

        async fn fetch_discovered(&mut self, _item: &DiscoveredItem) -> Result<FetchedRecord, FetchError> {
            unreachable!("discovery never succeeds");
        }

        async fn fetch(&mut self, _unit: &HostingUnitId, _path: Option<&str>) -> Result<FetchedRecord, FetchError> {
            unreachable!("not used");
        }
    }

    /// Records the identity of every emitted outcome.
    #[derive(Default)]
    struct CollectingListener {
        ids: Mutex<Vec<String>>,
    }

    impl FetchListener for CollectingListener {
        fn outcome(&self, outcome: &FetchOutcome) {
            self.ids.lock().unwrap().push(outcome.unit().to_path_str());
        }
    }

    /// Cancels the crawl once a given number of outcomes has been seen.
    struct CancellingListener {
        after: u64,
        seen: AtomicU64,
        flag: CancelFlag,
    }

    impl FetchListener for CancellingListener {
        fn outcome(&self, _outcome: &FetchOutcome) {
            if self.seen.fetch_add(1, Ordering::Relaxed) + 1 >= self.after {
                self.flag.cancel();
            }
        }
    }

    fn orchestrator(store: &Arc<MemoryCheckpointStore>) -> Orchestrator {
        Orchestrator::new(Arc::clone(store) as Arc<dyn CheckpointStore>, RetryPolicy::default())
    }

    #[tokio::test]
    async fn test_crawl_completes_and_deletes_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let counter = Arc::new(CountingListener::default());
        let orchestrator = orchestrator(&store).with_listener(Arc::clone(&counter) as Arc<dyn FetchListener>);

        let mut fetcher = ScriptedFetcher::new(HostingPlatform::OshwaOrg, vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
        let summary = orchestrator.crawl(&mut fetcher, true).await.unwrap();

        assert_eq!(summary.discovered, 5);
        assert_eq!(summary.fetched, 5);
        assert_eq!(summary.failed, 0);
        assert!(summary.completed);
        assert_eq!(counter.successes(), 5);
        // DONE deletes the checkpoint, so the next run begins fresh
        assert_eq!(store.load(HostingPlatform::OshwaOrg).unwrap(), None);
    }

    #[tokio::test]
    async fn test_item_failure_does_not_abort_the_page() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let counter = Arc::new(CountingListener::default());
        let orchestrator = orchestrator(&store).with_listener(Arc::clone(&counter) as Arc<dyn FetchListener>);

        let mut fetcher = ScriptedFetcher::new(HostingPlatform::OshwaOrg, vec![vec!["a", "broken", "c"]]);
        let _ = fetcher.failing_items.insert("broken");

        let summary = orchestrator.crawl(&mut fetcher, true).await.unwrap();
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.failed, 1);
        assert!(summary.completed);
        assert_eq!(counter.successes(), 2);
        assert_eq!(counter.failures(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_page_bound_is_enforced_exactly() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let policy = RetryPolicy {
            incomplete_page_retries: 3,
            secondary_cooldown: Duration::from_millis(1),
        };
        let orchestrator = Orchestrator::new(Arc::clone(&store) as Arc<dyn CheckpointStore>, policy);

        let mut fetcher = ShortPageFetcher { discover_calls: 0 };
        let err = orchestrator.crawl(&mut fetcher, true).await.unwrap_err();
        assert!(matches!(err, FetchError::Fatal(_)));
        // the first attempt plus exactly the configured number of retries
        assert_eq!(fetcher.discover_calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_rate_limit_retries_are_uncounted() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let policy = RetryPolicy {
            incomplete_page_retries: 0,
            secondary_cooldown: Duration::from_secs(60),
        };
        let orchestrator = Orchestrator::new(Arc::clone(&store) as Arc<dyn CheckpointStore>, policy);

        let mut fetcher = ScriptedFetcher::new(HostingPlatform::OshwaOrg, vec![vec!["a"]]);
        fetcher.rate_limited = 3;

        let summary = orchestrator.crawl(&mut fetcher, true).await.unwrap();
        assert!(summary.completed);
        assert_eq!(summary.fetched, 1);
        assert_eq!(fetcher.discover_calls, 4);
    }

    #[tokio::test]
    async fn test_fatal_page_error_keeps_checkpoint_for_resume() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let collector = Arc::new(CollectingListener::default());
        let orchestrator = orchestrator(&store).with_listener(Arc::clone(&collector) as Arc<dyn FetchListener>);

        let pages = vec![vec!["a", "b"], vec!["c", "d"], vec!["e", "f"]];
        let mut fetcher = ScriptedFetcher::new(HostingPlatform::ThingiverseCom, pages.clone());
        fetcher.tracks_seen = true;
        fetcher.fail_discover_at = Some(1);

        let err = orchestrator.crawl(&mut fetcher, true).await.unwrap_err();
        assert!(matches!(err, FetchError::Fatal(_)));

        let checkpoint = store.load(HostingPlatform::ThingiverseCom).unwrap().unwrap();
        assert_eq!(checkpoint.cursor, 1);
        assert_eq!(checkpoint.num_fetched, 2);
        assert!(checkpoint.has_seen("thingiverse.com/a"));

        // resume picks up at page 1, not page 0
        let mut fetcher = ScriptedFetcher::new(HostingPlatform::ThingiverseCom, pages);
        fetcher.tracks_seen = true;
        let summary = orchestrator.crawl(&mut fetcher, false).await.unwrap();
        assert!(summary.completed);
        assert_eq!(summary.fetched, 4);

        // union of the two partial runs equals one uninterrupted run, no duplicates
        let ids = collector.ids.lock().unwrap().clone();
        let unique: HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(unique.len(), 6);
        assert_eq!(store.load(HostingPlatform::ThingiverseCom).unwrap(), None);
    }

    #[tokio::test]
    async fn test_seen_ids_suppress_duplicate_emission_on_overlap() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let collector = Arc::new(CollectingListener::default());
        let orchestrator = orchestrator(&store).with_listener(Arc::clone(&collector) as Arc<dyn FetchListener>);

        // page 1 re-surfaces an id from page 0
        let mut fetcher = ScriptedFetcher::new(HostingPlatform::ThingiverseCom, vec![vec!["a", "b"], vec!["b", "c"]]);
        fetcher.tracks_seen = true;

        let summary = orchestrator.crawl(&mut fetcher, true).await.unwrap();
        assert_eq!(summary.fetched, 3);
        assert_eq!(collector.ids.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_between_pages_keeps_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let cancel = CancelFlag::new();
        let canceller = Arc::new(CancellingListener {
            after: 2,
            seen: AtomicU64::new(0),
            flag: cancel.clone(),
        });
        let orchestrator = orchestrator(&store)
            .with_listener(canceller as Arc<dyn FetchListener>)
            .with_cancel_flag(cancel);

        let mut fetcher = ScriptedFetcher::new(HostingPlatform::OshwaOrg, vec![vec!["a", "b"], vec!["c", "d"]]);
        let summary = orchestrator.crawl(&mut fetcher, true).await.unwrap();

        assert!(!summary.completed);
        assert_eq!(summary.fetched, 2);
        let checkpoint = store.load(HostingPlatform::OshwaOrg).unwrap().unwrap();
        assert_eq!(checkpoint.cursor, 1);
    }

    #[tokio::test]
    async fn test_start_over_discards_prior_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::default());
        store
            .store(
                HostingPlatform::OshwaOrg,
                &FetchCheckpoint {
                    cursor: 1,
                    num_fetched: 2,
                    ..Default::default()
                },
            )
            .unwrap();

        let orchestrator = orchestrator(&store);
        let mut fetcher = ScriptedFetcher::new(HostingPlatform::OshwaOrg, vec![vec!["a", "b"], vec!["c"]]);
        let summary = orchestrator.crawl(&mut fetcher, true).await.unwrap();

        // restarted from page 0, so all three records were fetched
        assert_eq!(summary.fetched, 3);
    }
}
