mod common;
mod crawl;
mod fetch;
mod platforms;

pub use common::{Common, CommonArgs, LogLevel};
pub use crawl::{CrawlArgs, crawl};
pub use fetch::{FetchArgs, fetch};
pub use platforms::platforms;
