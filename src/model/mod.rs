//! The canonical shapes of everything the crawler names and produces:
//! hosting platforms, hosting-unit identities, manifests and crawl metadata.

pub mod hosting;
pub mod hosting_unit;
pub mod manifest;
pub mod meta;

pub use hosting::{HostingKind, HostingPlatform};
pub use hosting_unit::{ForgeUnit, HostingUnitId, ParseError, UnsupportedOperation, WebUnit};
pub use manifest::{Manifest, ManifestFormat};
pub use meta::{CrawlMeta, SourcingProcedure};
