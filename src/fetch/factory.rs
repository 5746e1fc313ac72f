//! Static registry of the available fetch adapters, built once at process
//! start and exposed read-only to the orchestration layer.

use crate::Result;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::fetch::github::GithubFetcher;
use crate::fetch::oshwa::OshwaFetcher;
use crate::fetch::thingiverse::ThingiverseFetcher;
use crate::model::HostingPlatform;
use ohno::bail;
use std::collections::HashMap;

/// Platforms an adapter exists for.
pub const AVAILABLE: [HostingPlatform; 3] = [
    HostingPlatform::GithubCom,
    HostingPlatform::OshwaOrg,
    HostingPlatform::ThingiverseCom,
];

pub struct FetcherFactory {
    fetchers: HashMap<HostingPlatform, Box<dyn Fetcher>>,
}

impl std::fmt::Debug for FetcherFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherFactory")
            .field("platforms", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FetcherFactory {
    /// Build the platform→adapter table for the enabled subset of platforms.
    pub fn new(config: &Config, enabled: &[HostingPlatform]) -> Result<Self> {
        let mut fetchers: HashMap<HostingPlatform, Box<dyn Fetcher>> = HashMap::new();
        for &platform in enabled {
            let fetcher: Box<dyn Fetcher> = match platform {
                HostingPlatform::GithubCom => Box::new(GithubFetcher::new(&config.github, &config.user_agent)?),
                HostingPlatform::OshwaOrg => Box::new(OshwaFetcher::new(&config.oshwa, &config.user_agent)?),
                HostingPlatform::ThingiverseCom => Box::new(ThingiverseFetcher::new(&config.thingiverse, &config.user_agent)?),
                _ => bail!(
                    "no fetcher available for '{platform}', available are: {}",
                    AVAILABLE.map(|p| p.to_string()).join(", ")
                ),
            };
            let _ = fetchers.insert(platform, fetcher);
        }
        Ok(Self { fetchers })
    }

    /// The registered platforms, in stable order.
    #[must_use]
    pub fn platforms(&self) -> Vec<HostingPlatform> {
        let mut platforms: Vec<_> = self.fetchers.keys().copied().collect();
        platforms.sort_by_key(|p| p.to_string());
        platforms
    }

    #[must_use]
    pub fn get_mut(&mut self, platform: HostingPlatform) -> Option<&mut Box<dyn Fetcher>> {
        self.fetchers.get_mut(&platform)
    }

    /// Decompose into the adapter list, for running one independent crawl
    /// worker per platform.
    pub fn into_fetchers(self) -> impl Iterator<Item = Box<dyn Fetcher>> {
        self.fetchers.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_the_enabled_subset() {
        let config = Config::default();
        let mut factory = FetcherFactory::new(&config, &[HostingPlatform::GithubCom, HostingPlatform::OshwaOrg]).unwrap();

        assert_eq!(factory.platforms(), vec![HostingPlatform::GithubCom, HostingPlatform::OshwaOrg]);
        assert!(factory.get_mut(HostingPlatform::GithubCom).is_some());
        assert!(factory.get_mut(HostingPlatform::ThingiverseCom).is_none());
    }

    #[test]
    fn test_factory_rejects_platforms_without_an_adapter() {
        let config = Config::default();
        let _ = FetcherFactory::new(&config, &[HostingPlatform::AppropediaOrg]).unwrap_err();
    }

    #[test]
    fn test_every_available_platform_constructs() {
        let config = Config::default();
        let factory = FetcherFactory::new(&config, &AVAILABLE).unwrap();
        assert_eq!(factory.into_fetchers().count(), AVAILABLE.len());
    }
}
