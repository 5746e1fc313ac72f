use crate::model::hosting_unit::ParseError;
use serde::{Deserialize, Serialize};
use url::Url;

/// How a hosting platform addresses the projects it hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum HostingKind {
    /// Source-control hosting addressed by owner/repo/ref/path.
    Forge,
    /// Flat hosting addressed by a single opaque project id.
    WebById,
}

/// A remote system projects can be crawled from, identified by its network domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter, strum::EnumString, Serialize, Deserialize)]
pub enum HostingPlatform {
    #[strum(serialize = "appropedia.org")]
    #[serde(rename = "appropedia.org")]
    AppropediaOrg,

    #[strum(serialize = "codeberg.org")]
    #[serde(rename = "codeberg.org")]
    CodebergOrg,

    #[strum(serialize = "github.com")]
    #[serde(rename = "github.com")]
    GithubCom,

    #[strum(serialize = "gitlab.com")]
    #[serde(rename = "gitlab.com")]
    GitlabCom,

    #[strum(serialize = "oshwa.org")]
    #[serde(rename = "oshwa.org")]
    OshwaOrg,

    #[strum(serialize = "thingiverse.com")]
    #[serde(rename = "thingiverse.com")]
    ThingiverseCom,
}

impl HostingPlatform {
    /// Total, pure mapping from platform to addressing kind.
    #[must_use]
    pub const fn kind(self) -> HostingKind {
        match self {
            Self::CodebergOrg | Self::GithubCom | Self::GitlabCom => HostingKind::Forge,
            Self::AppropediaOrg | Self::OshwaOrg | Self::ThingiverseCom => HostingKind::WebById,
        }
    }

    /// Determine the platform from a URL's domain, accepting the alternate
    /// domains platforms serve content from (e.g. `raw.githubusercontent.com`).
    pub fn from_url(url: &Url) -> Result<Self, ParseError> {
        match url.host_str() {
            Some("appropedia.org" | "www.appropedia.org") => Ok(Self::AppropediaOrg),
            Some("codeberg.org") => Ok(Self::CodebergOrg),
            Some("github.com" | "raw.githubusercontent.com") => Ok(Self::GithubCom),
            Some("gitlab.com") => Ok(Self::GitlabCom),
            Some("oshwa.org" | "certification.oshwa.org") => Ok(Self::OshwaOrg),
            Some("thingiverse.com" | "www.thingiverse.com") => Ok(Self::ThingiverseCom),
            _ => Err(ParseError::UnknownPlatform(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_platform_has_exactly_one_kind() {
        for platform in HostingPlatform::iter() {
            // kind() is total; just make sure it doesn't panic and is stable
            assert_eq!(platform.kind(), platform.kind());
        }
    }

    #[test]
    fn test_display_is_the_domain() {
        assert_eq!(HostingPlatform::GithubCom.to_string(), "github.com");
        assert_eq!(HostingPlatform::OshwaOrg.to_string(), "oshwa.org");
    }

    #[test]
    fn test_from_url_alternate_domains() {
        let url = Url::parse("https://raw.githubusercontent.com/a/b/main/okh.toml").unwrap();
        assert_eq!(HostingPlatform::from_url(&url).unwrap(), HostingPlatform::GithubCom);

        let url = Url::parse("https://certification.oshwa.org/br000010.html").unwrap();
        assert_eq!(HostingPlatform::from_url(&url).unwrap(), HostingPlatform::OshwaOrg);
    }

    #[test]
    fn test_from_url_unknown_domain() {
        let url = Url::parse("https://example.com/foo/bar").unwrap();
        let _ = HostingPlatform::from_url(&url).unwrap_err();
    }
}
