//! The `platforms` command: list the supported hosting platforms.

use okh_krawler::fetch::factory::AVAILABLE;
use okh_krawler::model::HostingPlatform;
use strum::IntoEnumIterator;

pub fn platforms() {
    for platform in HostingPlatform::iter() {
        let status = if AVAILABLE.contains(&platform) { "available" } else { "recognized, no fetcher yet" };
        println!("{:<18} {:<8} {status}", platform.to_string(), platform.kind().to_string());
    }
}
