//! The `fetch` command: fetch single projects by URL, without checkpointing.

use crate::commands::common::{Common, CommonArgs};
use clap::Args;
use ohno::bail;
use okh_krawler::Result;
use okh_krawler::fetch::factory::AVAILABLE;
use okh_krawler::fetch::CancelFlag;
use okh_krawler::model::HostingUnitId;

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Project or manifest URLs to fetch
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,
}

pub async fn fetch(args: &FetchArgs) -> Result<()> {
    let common = Common::new(&args.common)?;
    let mut factory = common.factory(&AVAILABLE)?;
    let orchestrator = common.orchestrator(CancelFlag::new());

    let mut failures = 0usize;
    for url in &args.urls {
        let (unit, path) = match HostingUnitId::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("failed   {url}: {e}");
                failures += 1;
                continue;
            }
        };

        let Some(fetcher) = factory.get_mut(unit.platform()) else {
            eprintln!("failed   {url}: no fetcher available for '{}'", unit.platform());
            failures += 1;
            continue;
        };

        match orchestrator.fetch_one(fetcher.as_mut(), &unit, path.as_deref()).await {
            Ok(record) => println!("fetched  {}", record.unit),
            Err(e) => {
                eprintln!("failed   {unit}: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("failed to fetch {failures} of {} projects", args.urls.len());
    }
    Ok(())
}
