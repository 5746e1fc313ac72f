//! Fetcher for certified projects on oshwa.org.
//!
//! The certification API lists projects with limit/offset pagination and
//! returns the full record inline, so there is no per-item download step.

use crate::Result;
use crate::config::AdapterConfig;
use crate::fetch::rate_limit::CadenceLimit;
use crate::fetch::transport::HttpTransport;
use crate::fetch::util::check_payload_is_text;
use crate::fetch::{DiscoveredItem, DiscoveredPage, FetchCheckpoint, FetchError, Fetcher, FetchedRecord};
use crate::model::{CrawlMeta, HostingPlatform, HostingUnitId, Manifest, ManifestFormat, SourcingProcedure, WebUnit};
use core::time::Duration;
use serde::Deserialize;
use serde_json::Value;

const LOG_TARGET: &str = "      oshwa";

const API_URL: &str = "https://certificationapi.oshwa.org/api/projects";

const TRANSPORT_BACKOFF: Duration = Duration::from_secs(15);
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BATCH_SIZE: u32 = 50;
const REQUEST_SPACING: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    items: Vec<Value>,
}

pub struct OshwaFetcher {
    transport: HttpTransport,
    batch_size: u32,
    rate_limit: CadenceLimit,
}

impl OshwaFetcher {
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
        })
    }

    fn build_record(unit: &HostingUnitId, payload: &Value) -> Result<FetchedRecord, FetchError> {
        let content = serde_json::to_vec_pretty(payload)
            .map_err(|e| FetchError::Payload(format!("cannot serialize record for '{unit}': {e}")))?;
        check_payload_is_text(&content, &unit.to_path_str())?;

        Ok(FetchedRecord {
            unit: unit.clone(),
            manifest: Manifest::new(content, ManifestFormat::Json),
            meta: CrawlMeta::now(SourcingProcedure::Api, None),
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for OshwaFetcher {
    fn platform(&self) -> HostingPlatform {
        HostingPlatform::OshwaOrg
    }

    async fn discover(&mut self, checkpoint: &FetchCheckpoint) -> Result<DiscoveredPage, FetchError> {
        let offset = checkpoint.cursor;
        log::debug!(
            target: LOG_TARGET,
            "fetching projects {} to {}",
            checkpoint.num_fetched,
            checkpoint.num_fetched + u64::from(self.batch_size)
        );

        self.rate_limit.apply().await;
        let query = [("limit", self.batch_size.to_string()), ("offset", offset.to_string())];
        let response = self.transport.get(API_URL, &query, &[]).await?;
        self.rate_limit.update();

        if !response.status.is_success() {
            return Err(FetchError::Fatal(format!(
                "failed to fetch projects from OSHWA (HTTP {}): {}",
                response.status,
                response.body_text()
            )));
        }

        let data: ProjectList = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::Fatal(format!("malformed project list response: {e}")))?;

        let mut items = Vec::with_capacity(data.items.len());
        for raw in &data.items {
            let Some(id) = raw.get("oshwaUid").and_then(Value::as_str) else {
                log::debug!(target: LOG_TARGET, "skipping a listed project without an oshwaUid");
                continue;
            };
            items.push(DiscoveredItem::inline(WebUnit::new(HostingPlatform::OshwaOrg, id), raw.clone()));
        }

        // trust the reported limit, in case the platform lowers the batch size
        let step = if data.limit > 0 { data.limit } else { u64::from(self.batch_size) };
        let next_cursor = offset + step;
        Ok(DiscoveredPage {
            items,
            next_cursor,
            total: Some(data.total),
            last: next_cursor > data.total,
        })
    }

    async fn fetch_discovered(&mut self, item: &DiscoveredItem) -> Result<FetchedRecord, FetchError> {
        let Some(payload) = &item.payload else {
            return Err(FetchError::Fatal(format!("the listing delivered no record for '{}'", item.unit)));
        };
        Self::build_record(&item.unit, payload)
    }

    async fn fetch(&mut self, unit: &HostingUnitId, _path: Option<&str>) -> Result<FetchedRecord, FetchError> {
        let HostingUnitId::Web(web) = unit else {
            return Err(FetchError::Fatal(format!("not an OSHWA unit: '{unit}'")));
        };
        log::debug!(target: LOG_TARGET, "start fetching project {unit}");

        self.rate_limit.apply().await;
        let url = format!("{API_URL}/{}", web.project_id());
        let response = self.transport.get(&url, &[], &[]).await?;
        self.rate_limit.update();

        if response.status.as_u16() == 404 {
            return Err(FetchError::NotFound(format!("no OSHWA certification found for '{unit}'")));
        }
        if !response.status.is_success() {
            return Err(FetchError::Fatal(format!(
                "failed to fetch project from OSHWA (HTTP {}): {}",
                response.status,
                response.body_text()
            )));
        }

        let records: Vec<Value> = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::Payload(format!("malformed project response for '{unit}': {e}")))?;
        let Some(payload) = records.first() else {
            return Err(FetchError::NotFound(format!("no OSHWA certification found for '{unit}'")));
        };
        Self::build_record(unit, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_list_shape() {
        let data: ProjectList = serde_json::from_str(
            r#"{
                "total": 123,
                "limit": 50,
                "items": [
                    {"oshwaUid": "BR000010", "projectName": "Some Widget"},
                    {"projectName": "listed without a uid"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(data.total, 123);
        assert_eq!(data.limit, 50);
        assert_eq!(data.items.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_discovered_builds_record_from_inline_payload() {
        let mut fetcher = OshwaFetcher::new(&AdapterConfig::default(), "test-agent").unwrap();
        let unit = WebUnit::new(HostingPlatform::OshwaOrg, "BR000010");
        let payload = serde_json::json!({"oshwaUid": "BR000010", "projectName": "Some Widget"});
        let item = DiscoveredItem::inline(unit, payload);

        let record = fetcher.fetch_discovered(&item).await.unwrap();
        assert_eq!(record.manifest.format, ManifestFormat::Json);
        assert_eq!(record.meta.sourcing_procedure, SourcingProcedure::Api);
        let text = String::from_utf8(record.manifest.content.to_vec()).unwrap();
        assert!(text.contains("Some Widget"));
    }

    #[tokio::test]
    async fn test_fetch_discovered_without_payload_is_an_error() {
        let mut fetcher = OshwaFetcher::new(&AdapterConfig::default(), "test-agent").unwrap();
        let unit = WebUnit::new(HostingPlatform::OshwaOrg, "BR000010");
        let item = DiscoveredItem::reference(unit, None);
        let err = fetcher.fetch_discovered(&item).await.unwrap_err();
        assert!(matches!(err, FetchError::Fatal(_)));
    }
}
