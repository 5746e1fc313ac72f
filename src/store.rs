//! Stores fetch results in the local file system, one directory per hosting
//! unit, as a `meta.json` + `orig.<format>` pair.

use crate::Result;
use crate::fetch::{FetchListener, FetchOutcome, FetchedRecord};
use crate::model::{CrawlMeta, ManifestFormat};
use ohno::IntoAppError;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

const LOG_TARGET: &str = "    workdir";

/// The sidecar document written next to every raw payload.
#[derive(Debug, Serialize)]
struct MetaDoc<'a> {
    hosting_unit: String,
    format: ManifestFormat,
    crawl: &'a CrawlMeta,
}

/// Listener that persists every successful fetch under the workdir. Failed
/// fetches are only logged; counting and reporting them is someone else's job.
#[derive(Debug)]
pub struct WorkdirSink {
    workdir: PathBuf,
}

impl WorkdirSink {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn store_record(&self, record: &FetchedRecord) -> Result<()> {
        let project_dir = self.workdir.join(record.unit.to_path_str());
        fs::create_dir_all(&project_dir).into_app_err_with(|| format!("unable to create project directory '{}'", project_dir.display()))?;

        let meta = MetaDoc {
            hosting_unit: record.unit.to_path_str(),
            format: record.manifest.format,
            crawl: &record.meta,
        };
        let serialized = serde_json::to_vec_pretty(&meta).into_app_err("unable to serialize crawl metadata")?;
        let meta_path = project_dir.join("meta.json");
        fs::write(&meta_path, serialized).into_app_err_with(|| format!("unable to write '{}'", meta_path.display()))?;

        let orig_path = project_dir.join(format!("orig.{}", record.manifest.format));
        fs::write(&orig_path, &record.manifest.content).into_app_err_with(|| format!("unable to write '{}'", orig_path.display()))?;
        Ok(())
    }
}

impl FetchListener for WorkdirSink {
    fn outcome(&self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Fetched(record) => {
                log::debug!(target: LOG_TARGET, "saving '{}' ...", record.unit);
                if let Err(e) = self.store_record(record) {
                    log::warn!(target: LOG_TARGET, "could not store fetch result for '{}': {e:#}", record.unit);
                }
            }
            FetchOutcome::Failed(failure) => {
                log::warn!(target: LOG_TARGET, "failed to fetch '{}': {}", failure.unit, failure.error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForgeUnit, HostingPlatform, Manifest, SourcingProcedure};

    #[test]
    fn test_successful_fetch_is_written_as_meta_and_orig_pair() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WorkdirSink::new(dir.path());

        let unit = ForgeUnit::new(HostingPlatform::GithubCom, "acme", "widget")
            .with_ref("main")
            .with_path("okh.toml");
        let record = FetchedRecord {
            unit: unit.into(),
            manifest: Manifest::new(&b"okhv = \"1.0\"\n"[..], ManifestFormat::Toml),
            meta: CrawlMeta::now(SourcingProcedure::Manifest, Some("okh.toml".to_owned())),
        };
        sink.outcome(&FetchOutcome::Fetched(record));

        let project_dir = dir.path().join("github.com/acme/widget/main/okh.toml");
        let meta: serde_json::Value = serde_json::from_slice(&fs::read(project_dir.join("meta.json")).unwrap()).unwrap();
        assert_eq!(meta["format"], "toml");
        assert_eq!(meta["crawl"]["sourcing_procedure"], "Manifest");
        assert_eq!(fs::read(project_dir.join("orig.toml")).unwrap(), b"okhv = \"1.0\"\n");
    }
}
