//! Fetcher for projects on GitHub.com.
//!
//! GitHub hosts far too many repositories to inspect one by one, so discovery
//! goes through the code search API, looking for manifest-shaped file names.
//! Code search brings two platform quirks this adapter has to absorb:
//!
//! - Search queries run under a short server-side timeout. When a query times
//!   out, the page is returned with however many results were ready, and the
//!   missing ones cannot be addressed at all (the next page starts after the
//!   full page size). The only remedy is to request the same page again and
//!   hope it completes; that is the `IncompletePage` path. Small batch sizes
//!   and a simple query keep the odds low.
//! - Besides the documented search quota (fed back through the
//!   `X-RateLimit-*` headers), an undocumented secondary limit answers HTTP
//!   403 with a "rate limit" message in the body. That one is handled with a
//!   flat cooldown by the orchestrator.
//!
//! Raw files are downloaded from the identity model's download URL on the
//! repository's default branch.

use crate::Result;
use crate::config::AdapterConfig;
use crate::fetch::rate_limit::{CadenceLimit, QuotaLimit};
use crate::fetch::transport::{HttpResponse, HttpTransport};
use crate::fetch::util::{check_payload_is_text, is_accepted_manifest_file_name};
use crate::fetch::{DiscoveredItem, DiscoveredPage, FetchCheckpoint, FetchError, Fetcher, FetchedRecord};
use crate::model::{CrawlMeta, ForgeUnit, HostingPlatform, HostingUnitId, Manifest, ManifestFormat, SourcingProcedure};
use bytes::Bytes;
use core::time::Duration;
use serde::Deserialize;
use std::collections::HashMap;

const LOG_TARGET: &str = "     github";

const SEARCH_URL: &str = "https://api.github.com/search/code";
const REPO_URL: &str = "https://api.github.com/repos";
const ACCEPT_HEADER: (&str, &str) = ("Accept", "application/vnd.github.v3+json");

/// Kept deliberately simple; file-content terms make the search slower and
/// incomplete pages more likely.
const SEARCH_QUERY: &str = "filename:okh extension:toml extension:yaml extension:yml";

/// Extensions probed when a project URL does not point at a manifest file.
const MANIFEST_FILE_EXTENSIONS: [&str; 7] = ["toml", "yaml", "yml", "json", "ttl", "rdf", "jsonld"];

const TRANSPORT_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_BATCH_SIZE: u32 = 10;
const SEARCH_RATE_LIMIT: i64 = 30;
const REPO_RATE_LIMIT: i64 = 5000;
const SECONDARY_SPACING: Duration = Duration::from_secs(5);
const FILE_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: Option<String>,
}

pub struct GithubFetcher {
    transport: HttpTransport,
    batch_size: u32,
    search_limit: QuotaLimit,
    repo_limit: QuotaLimit,
    secondary_limit: CadenceLimit,
    file_limit: CadenceLimit,
    /// Default branches already resolved, keyed by unit identity.
    repo_cache: HashMap<String, String>,
}

impl GithubFetcher {
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
            search_limit: QuotaLimit::new(SEARCH_RATE_LIMIT),
            repo_limit: QuotaLimit::new(REPO_RATE_LIMIT),
            secondary_limit: CadenceLimit::new(SECONDARY_SPACING),
            file_limit: CadenceLimit::new(FILE_SPACING),
            repo_cache: HashMap::new(),
        })
    }

    /// Feed a quota limiter from the authoritative `X-RateLimit-*` headers.
    fn update_quota(limit: &mut QuotaLimit, response: &HttpResponse) {
        let Some(remaining) = response.header_u64("X-RateLimit-Remaining") else {
            return;
        };
        let Some(reset) = response.header_u64("X-RateLimit-Reset") else {
            return;
        };
        if let Some(reset_at) = chrono::DateTime::from_timestamp(reset.cast_signed(), 0) {
            limit.update(remaining.cast_signed(), reset_at);
        }
    }

    /// Resolve the repository's default branch; only that branch is
    /// considered when downloading files.
    async fn default_branch(&mut self, unit: &ForgeUnit) -> Result<String, FetchError> {
        let key = unit.to_path_str();
        if let Some(branch) = self.repo_cache.get(&key) {
            return Ok(branch.clone());
        }

        self.repo_limit.apply().await;
        self.secondary_limit.apply().await;

        log::debug!(target: LOG_TARGET, "requesting repository information for '{key}'");
        let url = format!("{REPO_URL}/{}/{}", unit.owner(), unit.repo());
        let response = self.transport.get(&url, &[], &[ACCEPT_HEADER]).await?;
        self.secondary_limit.update();
        Self::update_quota(&mut self.repo_limit, &response);

        if response.status.as_u16() == 404 {
            return Err(FetchError::NotFound(format!("repository '{key}' does not exist")));
        }
        if !response.status.is_success() {
            return Err(FetchError::Transient {
                status: Some(response.status.as_u16()),
                message: format!("failed to fetch repository information for '{key}' (HTTP {})", response.status),
            });
        }

        let info: RepoInfo = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::Fatal(format!("malformed repository response for '{key}': {e}")))?;
        let branch = info.default_branch.unwrap_or_else(|| "HEAD".to_owned());
        let _ = self.repo_cache.insert(key, branch.clone());
        Ok(branch)
    }

    async fn download(&mut self, url: &str) -> Result<Bytes, FetchError> {
        self.file_limit.apply().await;
        log::debug!(target: LOG_TARGET, "downloading manifest file {url}");
        let response = self.transport.get(url, &[], &[]).await?;
        self.file_limit.update();

        if response.status.as_u16() == 404 {
            return Err(FetchError::NotFound(format!("manifest does not exist at '{url}'")));
        }
        if !response.status.is_success() {
            return Err(FetchError::Transient {
                status: Some(response.status.as_u16()),
                message: format!("manifest download failed (HTTP {}) at '{url}'", response.status),
            });
        }
        Ok(response.body)
    }

    async fn fetch_manifest(&mut self, unit: &ForgeUnit, path: &str) -> Result<FetchedRecord, FetchError> {
        log::debug!(target: LOG_TARGET, "fetching project '{unit}' path '{path}' ...");

        if !is_accepted_manifest_file_name(path) {
            return Err(FetchError::Payload(format!("not an accepted manifest file name: '{path}'")));
        }
        let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
        let Some(format) = ManifestFormat::from_ext(ext) else {
            return Err(FetchError::Payload(format!("unknown manifest file extension '{ext}'")));
        };

        let download_url = unit.download_url(Some(path));
        let meta = CrawlMeta::now(SourcingProcedure::Manifest, Some(path.to_owned()));
        let content = self.download(&download_url).await?;
        check_payload_is_text(&content, &download_url)?;

        log::debug!(target: LOG_TARGET, "fetched project {unit}");
        Ok(FetchedRecord {
            unit: unit.with_path(path).into(),
            manifest: Manifest::new(content, format),
            meta,
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for GithubFetcher {
    fn platform(&self) -> HostingPlatform {
        HostingPlatform::GithubCom
    }

    async fn discover(&mut self, checkpoint: &FetchCheckpoint) -> Result<DiscoveredPage, FetchError> {
        let page_number = checkpoint.cursor.max(1);
        let batch_size = u64::from(self.batch_size);
        log::debug!(
            target: LOG_TARGET,
            "fetching projects {} to {}",
            checkpoint.num_fetched,
            checkpoint.num_fetched + batch_size
        );

        self.search_limit.apply().await;
        self.secondary_limit.apply().await;

        let query = [
            ("q", SEARCH_QUERY.to_owned()),
            ("per_page", self.batch_size.to_string()),
            ("page", page_number.to_string()),
        ];
        let response = self.transport.get(SEARCH_URL, &query, &[ACCEPT_HEADER]).await?;
        self.secondary_limit.update();

        match response.status.as_u16() {
            200 => {}
            403 if response.body_text().contains("rate limit") => return Err(FetchError::RateLimited),
            _ => {
                return Err(FetchError::Fatal(format!(
                    "failed to fetch projects from GitHub (HTTP {}): {}",
                    response.status,
                    response.body_text()
                )));
            }
        }

        Self::update_quota(&mut self.search_limit, &response);

        let data: SearchResponse = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::Fatal(format!("malformed code search response: {e}")))?;
        log::debug!(target: LOG_TARGET, "found files: {}", data.total_count);

        // Check whether the page is actually complete before touching any of
        // its items; see the module docs for why short pages happen.
        let (expected, last) = page_expectation(data.total_count, page_number, batch_size);
        if data.items.len() < expected {
            return Err(FetchError::IncompletePage {
                page: page_number,
                got: data.items.len(),
                expected,
            });
        }

        let mut items = Vec::with_capacity(data.items.len());
        for hit in &data.items {
            match ForgeUnit::parse(&hit.html_url) {
                Ok((unit, path)) => items.push(DiscoveredItem::reference(unit, path)),
                Err(err) => {
                    log::debug!(target: LOG_TARGET, "skipping unparsable search hit '{}': {err}", hit.html_url);
                }
            }
        }

        Ok(DiscoveredPage {
            items,
            next_cursor: page_number + 1,
            total: Some(data.total_count),
            last,
        })
    }

    async fn fetch_discovered(&mut self, item: &DiscoveredItem) -> Result<FetchedRecord, FetchError> {
        let HostingUnitId::Forge(unit) = &item.unit else {
            return Err(FetchError::Fatal(format!("expected a forge unit, got '{}'", item.unit)));
        };
        let Some(path) = item.path.as_deref() else {
            return Err(FetchError::NotFound(format!("search hit '{unit}' carries no manifest path")));
        };
        self.fetch_manifest(unit, path).await
    }

    async fn fetch(&mut self, unit: &HostingUnitId, path: Option<&str>) -> Result<FetchedRecord, FetchError> {
        let HostingUnitId::Forge(forge) = unit else {
            return Err(FetchError::Fatal(format!("not a GitHub unit: '{unit}'")));
        };

        let forge = if forge.references_version() {
            forge.clone()
        } else {
            let branch = self.default_branch(forge).await?;
            forge.with_ref(branch)
        };

        if let Some(path) = path {
            return self.fetch_manifest(&forge, path).await;
        }

        // no direct path given; probe the well-known manifest names
        for ext in MANIFEST_FILE_EXTENSIONS {
            let candidate = format!("okh.{ext}");
            match self.fetch_manifest(&forge, &candidate).await {
                Ok(record) => return Ok(record),
                Err(err) => log::debug!(target: LOG_TARGET, "no manifest at '{candidate}': {err}"),
            }
        }
        Err(FetchError::NotFound(format!("no known manifest file found in '{forge}'")))
    }
}

/// How many results a page must contain to count as complete, and whether it
/// is the final page.
fn page_expectation(total_count: u64, page_number: u64, batch_size: u64) -> (usize, bool) {
    let last = page_number * batch_size >= total_count;
    let expected = if last { total_count % batch_size } else { batch_size };
    (usize::try_from(expected).unwrap_or(usize::MAX), last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WebUnit;

    #[test]
    fn test_page_expectation() {
        // middle pages must be full
        assert_eq!(page_expectation(25, 1, 10), (10, false));
        assert_eq!(page_expectation(25, 2, 10), (10, false));
        // the final page only carries the remainder
        assert_eq!(page_expectation(25, 3, 10), (5, true));
        // an evenly divisible total leaves no expected remainder on the final page
        assert_eq!(page_expectation(20, 2, 10), (0, true));
    }

    #[test]
    fn test_search_response_shape() {
        let data: SearchResponse = serde_json::from_str(
            r#"{
                "total_count": 2,
                "incomplete_results": false,
                "items": [
                    {"name": "okh.toml", "html_url": "https://github.com/acme/widget/blob/main/okh.toml"},
                    {"name": "okh.yml", "html_url": "https://github.com/acme/gadget/blob/dev/sub/okh.yml"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(data.total_count, 2);
        let (unit, path) = ForgeUnit::parse(&data.items[0].html_url).unwrap();
        assert_eq!(unit.repo(), "widget");
        assert_eq!(path.as_deref(), Some("okh.toml"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_forge_units() {
        let mut fetcher = GithubFetcher::new(&AdapterConfig::default(), "test-agent").unwrap();
        let unit = HostingUnitId::Web(WebUnit::new(HostingPlatform::OshwaOrg, "br000010"));
        let err = fetcher.fetch(&unit, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_fetch_discovered_rejects_bad_manifest_names_before_downloading() {
        let mut fetcher = GithubFetcher::new(&AdapterConfig::default(), "test-agent").unwrap();
        let unit = ForgeUnit::new(HostingPlatform::GithubCom, "acme", "widget").with_ref("main");
        let item = DiscoveredItem::reference(unit, Some("README.md".to_owned()));
        let err = fetcher.fetch_discovered(&item).await.unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }
}
