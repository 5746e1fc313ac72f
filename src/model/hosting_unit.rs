//! Identity of a "unit of hosting" that holds a single project: a repo on a
//! forge, optionally narrowed to a ref and an in-repo file, or an opaque
//! project id on a web-by-id platform.
//!
//! Units are parsed from URLs, never mutated; `with_*` operations return a
//! new unit with the selected field overridden. The string form produced by
//! `to_path_str` doubles as the stable storage key for a unit.

use crate::model::hosting::{HostingKind, HostingPlatform};
use core::fmt::{Display, Formatter};
use url::Url;

/// Malformed or unrecognized project URL. The caller's input is wrong; never retried.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("URL '{0}' does not belong to a known hosting platform")]
    UnknownPlatform(String),

    #[error("not a valid {platform} project URL: '{url}'")]
    BadProjectPath { platform: HostingPlatform, url: String },

    #[error("'{url}' is hosted on {platform}, which is not a forge")]
    NotAForge { platform: HostingPlatform, url: String },

    #[error("'{url}' is hosted on {platform}, which is addressed by owner/repo, not by a single project id")]
    NotWebById { platform: HostingPlatform, url: String },

    #[error("project URL must not carry a file path: '{0}'")]
    UnexpectedPath(String),
}

/// A platform/kind combination cannot perform the requested URL reconstruction.
#[derive(Debug, thiserror::Error)]
#[error("platform '{platform}' does not support {operation}")]
pub struct UnsupportedOperation {
    pub platform: HostingPlatform,
    pub operation: &'static str,
}

/// Identity of a project hosted on a forge: owner, optional group hierarchy
/// (GitLab nested groups), repo, optional ref and optional in-repo path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForgeUnit {
    platform: HostingPlatform,
    owner: Box<str>,
    group_path: Option<Box<str>>,
    repo: Box<str>,
    ref_name: Option<Box<str>>,
    path: Option<Box<str>>,
}

/// Identity of a project on a flat web-by-id platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebUnit {
    platform: HostingPlatform,
    project_id: Box<str>,
}

/// The two closed shapes a hosting-unit identity can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostingUnitId {
    Forge(ForgeUnit),
    Web(WebUnit),
}

impl ForgeUnit {
    pub fn new(platform: HostingPlatform, owner: impl Into<Box<str>>, repo: impl Into<Box<str>>) -> Self {
        Self {
            platform,
            owner: owner.into(),
            group_path: None,
            repo: repo.into(),
            ref_name: None,
            path: None,
        }
    }

    /// Derive a new unit pinned to the given ref (branch, tag or commit).
    #[must_use]
    pub fn with_ref(&self, ref_name: impl Into<Box<str>>) -> Self {
        let mut unit = self.clone();
        unit.ref_name = Some(ref_name.into());
        unit
    }

    /// Derive a new unit pointing at the given in-repo file path.
    #[must_use]
    pub fn with_path(&self, path: impl Into<Box<str>>) -> Self {
        let mut unit = self.clone();
        unit.path = Some(path.into());
        unit
    }

    #[must_use]
    pub const fn platform(&self) -> HostingPlatform {
        self.platform
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn group_path(&self) -> Option<&str> {
        self.group_path.as_deref()
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    #[must_use]
    pub fn ref_name(&self) -> Option<&str> {
        self.ref_name.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }

    /// Whether the unit is pinned to a specific version (ref present).
    #[must_use]
    pub const fn references_version(&self) -> bool {
        self.ref_name.is_some()
    }

    /// Parse a forge project URL. Returns the unit plus the in-repo file path
    /// remainder, if the URL pointed below the repo root.
    pub fn parse(url_str: &str) -> Result<(Self, Option<String>), ParseError> {
        let url = parse_url(url_str)?;
        let platform = HostingPlatform::from_url(&url)?;
        if platform.kind() != HostingKind::Forge {
            return Err(ParseError::NotAForge {
                platform,
                url: url_str.to_owned(),
            });
        }

        let segs: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        if segs.len() < 2 {
            return Err(ParseError::BadProjectPath {
                platform,
                url: url_str.to_owned(),
            });
        }

        match platform {
            HostingPlatform::GithubCom | HostingPlatform::CodebergOrg => {
                let owner = segs[0];
                let repo = segs[1].trim_end_matches(".git");

                let (ref_name, path) = if url.host_str() == Some("raw.githubusercontent.com") {
                    (segs.get(2).copied(), join_rest(&segs, 3))
                } else {
                    match segs.get(2).copied() {
                        Some("tree" | "blob" | "raw") if segs.len() >= 4 => (Some(segs[3]), join_rest(&segs, 4)),
                        Some("releases") if segs.get(3).copied() == Some("tag") && segs.len() > 4 => (Some(segs[4]), None),
                        Some("commit") if segs.len() > 3 => (Some(segs[3]), None),
                        _ => (None, join_rest(&segs, 2)),
                    }
                };

                let unit = Self {
                    platform,
                    owner: Box::from(owner),
                    group_path: None,
                    repo: Box::from(repo),
                    ref_name: ref_name.map(Box::from),
                    path: None,
                };
                Ok((unit, path))
            }

            HostingPlatform::GitlabCom => Self::parse_gitlab(platform, url_str, &segs),

            HostingPlatform::AppropediaOrg | HostingPlatform::OshwaOrg | HostingPlatform::ThingiverseCom => {
                unreachable!("kind check above only lets forges through")
            }
        }
    }

    /// GitLab URLs may nest groups between owner and repo. The first `-`
    /// segment followed by a `tree|blob|raw|commit|tags` marker wins as the
    /// repo/ref separator; everything after the ref becomes the sub-path. A
    /// plain project URL with no marker treats the last segment as the repo.
    fn parse_gitlab(platform: HostingPlatform, url_str: &str, segs: &[&str]) -> Result<(Self, Option<String>), ParseError> {
        let bad = || ParseError::BadProjectPath {
            platform,
            url: url_str.to_owned(),
        };

        let marker = segs
            .iter()
            .position(|s| *s == "-")
            .filter(|&p| p + 1 < segs.len() && matches!(segs[p + 1], "tree" | "blob" | "raw" | "commit" | "tags"));

        let (repo_end, ref_name, path) = match marker {
            Some(p) => {
                let ref_name = segs.get(p + 2).copied().ok_or_else(bad)?;
                let path = match segs[p + 1] {
                    "tree" | "blob" | "raw" => join_rest(segs, p + 3),
                    _ => None,
                };
                (p, Some(ref_name), path)
            }
            None => (segs.len(), None, None),
        };

        if repo_end < 2 {
            return Err(bad());
        }

        let unit = Self {
            platform,
            owner: Box::from(segs[0]),
            group_path: (repo_end > 2).then(|| Box::from(segs[1..repo_end - 1].join("/"))),
            repo: Box::from(segs[repo_end - 1].trim_end_matches(".git")),
            ref_name: ref_name.map(Box::from),
            path: None,
        };
        Ok((unit, path))
    }

    /// The canonical project browse URL.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        let group = path_opt(self.group_path());
        format!("https://{}/{}{group}/{}", self.platform, self.owner, self.repo)
    }

    /// The raw-content download URL for a file in this unit. Falls back to
    /// the unit's own path when no explicit path is given, and to `HEAD` when
    /// no ref is set.
    #[must_use]
    pub fn download_url(&self, path: Option<&str>) -> String {
        let ref_name = self.ref_name().unwrap_or("HEAD");
        let path = path_opt(path.or(self.path()));
        match self.platform {
            HostingPlatform::GithubCom => {
                format!("https://raw.githubusercontent.com/{}/{}/{ref_name}{path}", self.owner, self.repo)
            }
            HostingPlatform::CodebergOrg => {
                format!("https://codeberg.org/{}/{}/raw/{ref_name}{path}", self.owner, self.repo)
            }
            HostingPlatform::GitlabCom => {
                let group = path_opt(self.group_path());
                format!("https://gitlab.com/{}{group}/{}/-/raw/{ref_name}{path}", self.owner, self.repo)
            }
            _ => unreachable!("forge units are only constructed for forge platforms"),
        }
    }

    #[must_use]
    pub fn to_path_str(&self) -> String {
        format!(
            "{}/{}{}/{}{}{}",
            self.platform,
            self.owner,
            path_opt(self.group_path()),
            self.repo,
            path_opt(self.ref_name()),
            path_opt(self.path()),
        )
    }
}

impl WebUnit {
    pub fn new(platform: HostingPlatform, project_id: impl Into<Box<str>>) -> Self {
        Self {
            platform,
            project_id: project_id.into(),
        }
    }

    #[must_use]
    pub const fn platform(&self) -> HostingPlatform {
        self.platform
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.project_id.is_empty()
    }

    /// Parse a web-by-id project URL. The path remainder is always `None`;
    /// these platforms have no notion of an in-project file path.
    pub fn parse(url_str: &str) -> Result<(Self, Option<String>), ParseError> {
        let url = parse_url(url_str)?;
        let platform = HostingPlatform::from_url(&url)?;
        if platform.kind() != HostingKind::WebById {
            return Err(ParseError::NotWebById {
                platform,
                url: url_str.to_owned(),
            });
        }

        let bad = || ParseError::BadProjectPath {
            platform,
            url: url_str.to_owned(),
        };

        let segs: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        let project_id = match platform {
            // example: <https://www.appropedia.org/AEF_food_dehydrator>; page titles may contain slashes
            HostingPlatform::AppropediaOrg => {
                if segs.is_empty() {
                    return Err(bad());
                }
                segs.join("/")
            }

            // example: <https://certification.oshwa.org/br000010.html>
            HostingPlatform::OshwaOrg => {
                if segs.len() != 1 {
                    return Err(bad());
                }
                segs[0].trim_end_matches(".html").to_owned()
            }

            // example: <https://www.thingiverse.com/thing:3062487>
            HostingPlatform::ThingiverseCom => segs
                .first()
                .and_then(|s| s.strip_prefix("thing:"))
                .filter(|id| !id.is_empty())
                .ok_or_else(bad)?
                .to_owned(),

            _ => unreachable!("kind check above only lets web-by-id platforms through"),
        };

        Ok((Self::new(platform, project_id), None))
    }

    /// The canonical project browse URL.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        match self.platform {
            HostingPlatform::AppropediaOrg => format!("https://www.appropedia.org/{}", self.project_id),
            HostingPlatform::OshwaOrg => {
                format!("https://certification.oshwa.org/{}.html", self.project_id.to_lowercase())
            }
            HostingPlatform::ThingiverseCom => format!("https://www.thingiverse.com/thing:{}", self.project_id),
            _ => unreachable!("web units are only constructed for web-by-id platforms"),
        }
    }

    /// Wiki-like platforms have no raw-file access at all; Thingiverse only
    /// supports downloads below the project page.
    pub fn download_url(&self, path: Option<&str>) -> Result<String, UnsupportedOperation> {
        match (self.platform, path) {
            (HostingPlatform::ThingiverseCom, Some(path)) => Ok(format!("{}/{path}", self.canonical_url())),
            (HostingPlatform::ThingiverseCom, None) => Err(UnsupportedOperation {
                platform: self.platform,
                operation: "download without an explicit file path",
            }),
            _ => Err(UnsupportedOperation {
                platform: self.platform,
                operation: "raw file download",
            }),
        }
    }

    #[must_use]
    pub fn to_path_str(&self) -> String {
        format!("{}/{}", self.platform, self.project_id)
    }
}

impl HostingUnitId {
    /// Parse a project URL without knowing the platform kind up front: forge
    /// grammar is attempted first, falling back to web-by-id on `ParseError`.
    pub fn parse(url_str: &str) -> Result<(Self, Option<String>), ParseError> {
        match ForgeUnit::parse(url_str) {
            Ok((unit, path)) => Ok((Self::Forge(unit), path)),
            Err(ParseError::InvalidUrl { url, source }) => Err(ParseError::InvalidUrl { url, source }),
            Err(ParseError::UnknownPlatform(url)) => Err(ParseError::UnknownPlatform(url)),
            Err(_) => {
                let (unit, path) = WebUnit::parse(url_str)?;
                Ok((Self::Web(unit), path))
            }
        }
    }

    /// Parse a project-level URL, failing if any file path remainder is present.
    pub fn parse_no_path(url_str: &str) -> Result<Self, ParseError> {
        let (unit, path) = Self::parse(url_str)?;
        if path.is_some() {
            return Err(ParseError::UnexpectedPath(url_str.to_owned()));
        }
        Ok(unit)
    }

    #[must_use]
    pub const fn platform(&self) -> HostingPlatform {
        match self {
            Self::Forge(unit) => unit.platform(),
            Self::Web(unit) => unit.platform(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Forge(unit) => unit.is_valid(),
            Self::Web(unit) => unit.is_valid(),
        }
    }

    #[must_use]
    pub const fn references_version(&self) -> bool {
        match self {
            Self::Forge(unit) => unit.references_version(),
            Self::Web(_) => false,
        }
    }

    #[must_use]
    pub fn canonical_url(&self) -> String {
        match self {
            Self::Forge(unit) => unit.canonical_url(),
            Self::Web(unit) => unit.canonical_url(),
        }
    }

    pub fn download_url(&self, path: Option<&str>) -> Result<String, UnsupportedOperation> {
        match self {
            Self::Forge(unit) => Ok(unit.download_url(path)),
            Self::Web(unit) => unit.download_url(path),
        }
    }

    #[must_use]
    pub fn to_path_str(&self) -> String {
        match self {
            Self::Forge(unit) => unit.to_path_str(),
            Self::Web(unit) => unit.to_path_str(),
        }
    }
}

impl Display for ForgeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_path_str())
    }
}

impl Display for WebUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_path_str())
    }
}

impl Display for HostingUnitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_path_str())
    }
}

impl From<ForgeUnit> for HostingUnitId {
    fn from(unit: ForgeUnit) -> Self {
        Self::Forge(unit)
    }
}

impl From<WebUnit> for HostingUnitId {
    fn from(unit: WebUnit) -> Self {
        Self::Web(unit)
    }
}

fn parse_url(url_str: &str) -> Result<Url, ParseError> {
    Url::parse(url_str).map_err(|source| ParseError::InvalidUrl {
        url: url_str.to_owned(),
        source,
    })
}

fn join_rest(segs: &[&str], from: usize) -> Option<String> {
    (segs.len() > from).then(|| segs[from..].join("/"))
}

fn path_opt(part: Option<&str>) -> String {
    part.map(|p| format!("/{p}")).unwrap_or_default()
}
