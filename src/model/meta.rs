use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a record was sourced from its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourcingProcedure {
    /// The platform API was queried and its response recorded as-is.
    Api,
    /// The project supplies a manifest file that was downloaded.
    Manifest,
    /// The platform generates a manifest on the project's behalf.
    GeneratedManifest,
    /// The project directly supplies crawl-ready data.
    Direct,
}

/// Metadata about one crawl visit, recorded alongside the raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlMeta {
    pub sourcing_procedure: SourcingProcedure,
    pub last_visited: DateTime<Utc>,
    /// Repo-internal path of the manifest file, if the record came from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
}

impl CrawlMeta {
    /// Stamp a visit happening now.
    #[must_use]
    pub fn now(sourcing_procedure: SourcingProcedure, manifest_path: Option<String>) -> Self {
        Self {
            sourcing_procedure,
            last_visited: Utc::now(),
            manifest_path,
        }
    }
}
