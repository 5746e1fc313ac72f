//! A crawler for open source hardware project metadata.
//!
//! # Overview
//!
//! `okh-krawler` discovers open hardware projects on heterogeneous hosting
//! platforms — code forges like GitHub, certification registries like OSHWA,
//! model-sharing sites like Thingiverse — downloads their raw metadata, and
//! stores each result under a work directory for later normalization. Crawls
//! respect the platforms' rate limits and checkpoint their progress, so a
//! multi-hour run can be interrupted and resumed where it left off.
//!
//! # Basic Usage
//!
//! **Fetch single projects by URL:**
//! ```bash
//! okh-krawler fetch https://github.com/acme/widget
//! okh-krawler fetch https://certification.oshwa.org/br000010.html
//! ```
//!
//! **Crawl everything from all available platforms:**
//! ```bash
//! export GITHUB_TOKEN=ghp_...
//! okh-krawler crawl
//! ```
//!
//! **Crawl one platform, starting over from scratch:**
//! ```bash
//! okh-krawler crawl --platform thingiverse.com --start-over
//! ```
//!
//! **List the supported platforms:**
//! ```bash
//! okh-krawler platforms
//! ```
//!
//! # Resuming
//!
//! A crawl interrupted by Ctrl-C (or by a fatal platform error) leaves a
//! checkpoint behind; rerunning `crawl` without `--start-over` continues from
//! the last fully processed page instead of starting at page one.
//!
//! # Configuration
//!
//! All settings live in an optional TOML file passed via `--config`:
//!
//! ```toml
//! [crawl]
//! incomplete_page_retries = 10
//! secondary_cooldown_secs = 60
//!
//! [github]
//! access_token = "ghp_..."
//! batch_size = 10
//! ```
//!
//! Access tokens can also be supplied through the `GITHUB_TOKEN`,
//! `OSHWA_TOKEN` and `THINGIVERSE_TOKEN` environment variables.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use okh_krawler::Result;

mod commands;

use crate::commands::{CrawlArgs, FetchArgs, crawl, fetch, platforms};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "okh-krawler", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch single projects by URL
    Fetch(FetchArgs),
    /// Find and fetch all projects from the enabled platforms
    Crawl(CrawlArgs),
    /// List the supported hosting platforms
    Platforms,
}

#[tokio::main]
async fn main() -> Result<()> {
    match &Cli::parse().command {
        Command::Fetch(args) => fetch(args).await,
        Command::Crawl(args) => crawl(args).await,
        Command::Platforms => {
            platforms();
            Ok(())
        }
    }
}
