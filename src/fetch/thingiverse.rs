//! Fetcher for projects on Thingiverse.com.
//!
//! The search API caps results at 10'000 including paging, and the documented
//! date filters do not work, so exhaustive discovery cannot go through search.
//! Thing ids are assigned in ascending order though, so the adapter resolves
//! the newest id once per crawl and then walks every id from 1 upwards,
//! fetching each thing individually. Ids that turn out to be deleted surface
//! as `NotFound` item failures and are skipped for good: the checkpoint's
//! seen-id list makes the walk idempotent across resumes.

use crate::Result;
use crate::config::AdapterConfig;
use crate::fetch::rate_limit::CadenceLimit;
use crate::fetch::transport::HttpTransport;
use crate::fetch::util::check_payload_is_text;
use crate::fetch::{DiscoveredItem, DiscoveredPage, FetchCheckpoint, FetchError, Fetcher, FetchedRecord};
use crate::model::{CrawlMeta, HostingPlatform, HostingUnitId, Manifest, ManifestFormat, SourcingProcedure, WebUnit};
use core::time::Duration;
use serde::Deserialize;

const LOG_TARGET: &str = "thingiverse";

const API_URL: &str = "https://api.thingiverse.com";

const TRANSPORT_BACKOFF: Duration = Duration::from_secs(15);
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BATCH_SIZE: u32 = 50;
/// One request per second is the documented project-fetch limit.
const REQUEST_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct ThingSearch {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    id: u64,
}

pub struct ThingiverseFetcher {
    transport: HttpTransport,
    batch_size: u32,
    rate_limit: CadenceLimit,
    /// Newest thing id, resolved once per crawl and cached in the checkpoint.
    latest_id: Option<u64>,
}

impl ThingiverseFetcher {
    pub fn new(config: &AdapterConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(
                user_agent,
                config.access_token.as_deref(),
                config.timeout_or(DEFAULT_TIMEOUT_SECS),
                config.retries,
                TRANSPORT_BACKOFF,
            )?,
            batch_size: config.batch_size_or(DEFAULT_BATCH_SIZE),
            rate_limit: CadenceLimit::new(REQUEST_SPACING),
            latest_id: None,
        })
    }

    /// The id of the most recently published thing, which bounds the id walk.
    async fn fetch_latest_thing_id(&mut self) -> Result<u64, FetchError> {
        self.rate_limit.apply().await;
        let query = [
            ("type", "things".to_owned()),
            ("per_page", "1".to_owned()),
            ("sort", "newest".to_owned()),
        ];
        let response = self.transport.get(&format!("{API_URL}/search/"), &query, &[]).await?;
        self.rate_limit.update();

        if !response.status.is_success() {
            return Err(FetchError::Fatal(format!(
                "failed to fetch the latest thing id (HTTP {}): {}",
                response.status,
                response.body_text()
            )));
        }

        let data: ThingSearch = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::Fatal(format!("malformed search response: {e}")))?;
        let Some(hit) = data.hits.first() else {
            return Err(FetchError::Fatal("failed to fetch the latest thing id: no results".to_owned()));
        };

        log::info!(target: LOG_TARGET, "newest thing id is {}, walking all ids up to it", hit.id);
        Ok(hit.id)
    }

    async fn fetch_thing(&mut self, unit: &HostingUnitId, thing_id: &str) -> Result<FetchedRecord, FetchError> {
        log::debug!(target: LOG_TARGET, "try to fetch thing with id {thing_id}");

        self.rate_limit.apply().await;
        let url = format!("{API_URL}/things/{thing_id}");
        let response = self.transport.get(&url, &[], &[]).await?;
        self.rate_limit.update();

        match response.status.as_u16() {
            200 => {}
            // deleted or never-assigned ids are expected on an id walk
            403 | 404 => {
                return Err(FetchError::NotFound(format!("thing {thing_id} does not exist or is not public")));
            }
            _ => {
                return Err(FetchError::Transient {
                    status: Some(response.status.as_u16()),
                    message: format!("failed to fetch thing {thing_id} (HTTP {})", response.status),
                });
            }
        }

        check_payload_is_text(&response.body, &url)?;
        Ok(FetchedRecord {
            unit: unit.clone(),
            manifest: Manifest::new(response.body, ManifestFormat::Json),
            meta: CrawlMeta::now(SourcingProcedure::Api, None),
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for ThingiverseFetcher {
    fn platform(&self) -> HostingPlatform {
        HostingPlatform::ThingiverseCom
    }

    fn tracks_seen_ids(&self) -> bool {
        true
    }

    async fn discover(&mut self, checkpoint: &FetchCheckpoint) -> Result<DiscoveredPage, FetchError> {
        let latest = match self.latest_id {
            Some(id) => id,
            None => {
                // prefer the bound persisted at crawl start, so a resumed
                // crawl keeps its original extent
                let id = match checkpoint.total {
                    Some(total) => total,
                    None => self.fetch_latest_thing_id().await?,
                };
                self.latest_id = Some(id);
                id
            }
        };

        let start = checkpoint.cursor.max(1);
        if start > latest {
            return Ok(DiscoveredPage {
                items: Vec::new(),
                next_cursor: start,
                total: Some(latest),
                last: true,
            });
        }

        let end = (start + u64::from(self.batch_size) - 1).min(latest);
        log::debug!(target: LOG_TARGET, "walking thing ids {start} to {end} of {latest}");

        let items = (start..=end)
            .map(|id| DiscoveredItem::reference(WebUnit::new(HostingPlatform::ThingiverseCom, id.to_string()), None))
            .collect();
        Ok(DiscoveredPage {
            items,
            next_cursor: end + 1,
            total: Some(latest),
            last: end >= latest,
        })
    }

    async fn fetch_discovered(&mut self, item: &DiscoveredItem) -> Result<FetchedRecord, FetchError> {
        let HostingUnitId::Web(web) = &item.unit else {
            return Err(FetchError::Fatal(format!("not a Thingiverse unit: '{}'", item.unit)));
        };
        let thing_id = web.project_id().to_owned();
        self.fetch_thing(&item.unit, &thing_id).await
    }

    async fn fetch(&mut self, unit: &HostingUnitId, _path: Option<&str>) -> Result<FetchedRecord, FetchError> {
        let HostingUnitId::Web(web) = unit else {
            return Err(FetchError::Fatal(format!("not a Thingiverse unit: '{unit}'")));
        };
        let thing_id = web.project_id().to_owned();
        self.fetch_thing(unit, &thing_id).await
    }
}
