//! The `crawl` command: run every enabled adapter through a full discovery
//! crawl, one independent worker per platform.

use crate::commands::common::{Common, CommonArgs};
use clap::Args;
use futures_util::future::join_all;
use ohno::{IntoAppError, bail};
use okh_krawler::Result;
use okh_krawler::fetch::factory::AVAILABLE;
use okh_krawler::fetch::{CancelFlag, CountingListener, CrawlSummary, FetchListener};
use okh_krawler::model::HostingPlatform;
use std::sync::Arc;

const LOG_TARGET: &str = "      crawl";

#[derive(Args, Debug)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Platforms to crawl, by domain [default: all available]
    #[arg(long = "platform", value_name = "DOMAIN")]
    pub platforms: Vec<String>,

    /// Start the crawl over from scratch instead of resuming from the last checkpoint
    #[arg(long)]
    pub start_over: bool,
}

pub async fn crawl(args: &CrawlArgs) -> Result<()> {
    let common = Common::new(&args.common)?;
    let enabled = resolve_platforms(&args.platforms)?;
    let factory = common.factory(&enabled)?;

    log::info!(
        target: LOG_TARGET,
        "crawling {} platform(s): {}",
        factory.platforms().len(),
        factory.platforms().iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );

    let cancel = CancelFlag::new();
    {
        // Ctrl-C sets the flag; every worker stops at its next page boundary
        let cancel = cancel.clone();
        drop(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("shutting down after the current page...");
                cancel.cancel();
            }
        }));
    }

    let counter = Arc::new(CountingListener::default());

    // one worker per platform; they share no mutable state
    let mut workers = Vec::new();
    for mut fetcher in factory.into_fetchers() {
        let orchestrator = common
            .orchestrator(cancel.clone())
            .with_listener(Arc::clone(&counter) as Arc<dyn FetchListener>);
        let start_over = args.start_over;

        workers.push(tokio::spawn(async move {
            let platform = fetcher.platform();
            let result = orchestrator.crawl(fetcher.as_mut(), start_over).await;
            (platform, result)
        }));
    }

    let mut aborted: Vec<HostingPlatform> = Vec::new();
    let mut totals = CrawlSummary {
        completed: true,
        ..Default::default()
    };
    for worker in join_all(workers).await {
        let (platform, result) = worker.into_app_err("crawl worker panicked")?;
        match result {
            Ok(summary) => {
                totals.discovered += summary.discovered;
                totals.fetched += summary.fetched;
                totals.failed += summary.failed;
                totals.completed &= summary.completed;
            }
            Err(e) => {
                log::error!(target: LOG_TARGET, "'{platform}' crawl aborted: {e}");
                aborted.push(platform);
            }
        }
    }

    println!(
        "fetched {} of {} discovered projects ({} successes, {} failures reported)",
        totals.fetched,
        totals.discovered,
        counter.successes(),
        counter.failures()
    );
    if !totals.completed {
        println!("crawl was interrupted; rerun without --start-over to resume");
    }

    if !aborted.is_empty() {
        bail!("{} crawl(s) aborted, checkpoints kept for resume", aborted.len());
    }
    Ok(())
}

fn resolve_platforms(names: &[String]) -> Result<Vec<HostingPlatform>> {
    if names.is_empty() {
        return Ok(AVAILABLE.to_vec());
    }
    names
        .iter()
        .map(|name| {
            name.parse::<HostingPlatform>().into_app_err_with(|| {
                format!(
                    "unknown platform '{name}', available are: {}",
                    AVAILABLE.map(|p| p.to_string()).join(", ")
                )
            })
        })
        .collect()
}
