//! Configuration for the crawler, loaded from a TOML file with serde
//! defaults so an empty (or absent) file is a valid configuration.

use crate::Result;
use crate::fetch::RetryPolicy;
use crate::model::HostingPlatform;
use core::time::Duration;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const fn default_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!("okh-krawler/", env!("CARGO_PKG_VERSION")).to_owned()
}

const fn default_incomplete_page_retries() -> u32 {
    10
}

const fn default_secondary_cooldown_secs() -> u64 {
    60
}

/// Per-adapter connection settings. Timeout and batch size default to
/// adapter-specific values when left unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    /// Personal access token for the platform API.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Max seconds to wait for a not responding service.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Number of request retries in case of network errors.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Results requested per discovery call.
    #[serde(default)]
    pub batch_size: Option<u32>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            timeout_secs: None,
            retries: default_retries(),
            batch_size: None,
        }
    }
}

impl AdapterConfig {
    #[must_use]
    pub fn timeout_or(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(default_secs))
    }

    #[must_use]
    pub fn batch_size_or(&self, default: u32) -> u32 {
        self.batch_size.unwrap_or(default)
    }
}

/// Page-level retry bounds. The defaults are reference values observed on
/// GitHub code search; other platforms may warrant different numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    /// How often a short page is re-requested before the crawl aborts.
    #[serde(default = "default_incomplete_page_retries")]
    pub incomplete_page_retries: u32,

    /// Cooldown after a secondary rate limit signal, in seconds.
    #[serde(default = "default_secondary_cooldown_secs")]
    pub secondary_cooldown_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            incomplete_page_retries: default_incomplete_page_retries(),
            secondary_cooldown_secs: default_secondary_cooldown_secs(),
        }
    }
}

impl CrawlConfig {
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            incomplete_page_retries: self.incomplete_page_retries,
            secondary_cooldown: Duration::from_secs(self.secondary_cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub github: AdapterConfig,

    #[serde(default)]
    pub oshwa: AdapterConfig,

    #[serde(default)]
    pub thingiverse: AdapterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            crawl: CrawlConfig::default(),
            github: AdapterConfig::default(),
            oshwa: AdapterConfig::default(),
            thingiverse: AdapterConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration from a TOML file; no file means all defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).into_app_err_with(|| format!("unable to read config file '{}'", path.display()))?;
        toml::from_str(&raw).into_app_err_with(|| format!("unable to parse config file '{}'", path.display()))
    }

    /// The adapter section for a platform, if one exists.
    #[must_use]
    pub const fn adapter(&self, platform: HostingPlatform) -> Option<&AdapterConfig> {
        match platform {
            HostingPlatform::GithubCom => Some(&self.github),
            HostingPlatform::OshwaOrg => Some(&self.oshwa),
            HostingPlatform::ThingiverseCom => Some(&self.thingiverse),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.github.retries, 3);
        assert_eq!(config.github.batch_size, None);
        assert_eq!(config.crawl.incomplete_page_retries, 10);
        assert!(config.user_agent.starts_with("okh-krawler/"));
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [github]
            access_token = "ghp_something"
            batch_size = 5

            [crawl]
            secondary_cooldown_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.github.access_token.as_deref(), Some("ghp_something"));
        assert_eq!(config.github.batch_size_or(10), 5);
        assert_eq!(config.github.retries, 3);
        assert_eq!(config.oshwa.batch_size_or(50), 50);
        assert_eq!(config.crawl.secondary_cooldown_secs, 30);
        assert_eq!(config.crawl.retry_policy().secondary_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_adapter_default_fallbacks() {
        let config = AdapterConfig::default();
        assert_eq!(config.timeout_or(15), Duration::from_secs(15));
        assert_eq!(config.batch_size_or(10), 10);

        let config = AdapterConfig {
            timeout_secs: Some(2),
            ..AdapterConfig::default()
        };
        assert_eq!(config.timeout_or(15), Duration::from_secs(2));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let _ = toml::from_str::<Config>("[github]\nacces_token = \"typo\"\n").unwrap_err();
    }

    #[test]
    fn test_adapter_lookup() {
        let config = Config::default();
        assert!(config.adapter(HostingPlatform::GithubCom).is_some());
        assert!(config.adapter(HostingPlatform::AppropediaOrg).is_none());
    }
}
