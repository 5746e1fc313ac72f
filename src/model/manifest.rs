use bytes::Bytes;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// File formats a crawled manifest payload can arrive in. The serialized form
/// is the conventional file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    Json,
    #[serde(rename = "jsonld")]
    JsonLd,
    Toml,
    #[serde(rename = "ttl")]
    Turtle,
    #[serde(rename = "yml")]
    Yaml,
}

impl ManifestFormat {
    /// Map a file extension to a format, accepting alternate spellings
    /// (`yaml` for `yml`, `rdf` for `ttl`).
    #[must_use]
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonld" => Some(Self::JsonLd),
            "toml" => Some(Self::Toml),
            "ttl" | "rdf" => Some(Self::Turtle),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// The conventional file extension for this format.
    #[must_use]
    pub const fn ext(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLd => "jsonld",
            Self::Toml => "toml",
            Self::Turtle => "ttl",
            Self::Yaml => "yml",
        }
    }
}

impl Display for ManifestFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.ext())
    }
}

/// The raw content of a crawled manifest plus its format tag. The content is
/// guaranteed non-empty text by the fetch layer before it gets here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub content: Bytes,
    pub format: ManifestFormat,
}

impl Manifest {
    pub fn new(content: impl Into<Bytes>, format: ManifestFormat) -> Self {
        Self {
            content: content.into(),
            format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ext_accepts_alternates() {
        assert_eq!(ManifestFormat::from_ext("yaml"), Some(ManifestFormat::Yaml));
        assert_eq!(ManifestFormat::from_ext("YML"), Some(ManifestFormat::Yaml));
        assert_eq!(ManifestFormat::from_ext("rdf"), Some(ManifestFormat::Turtle));
        assert_eq!(ManifestFormat::from_ext("toml"), Some(ManifestFormat::Toml));
        assert_eq!(ManifestFormat::from_ext("exe"), None);
    }

    #[test]
    fn test_display_is_the_extension() {
        assert_eq!(ManifestFormat::Turtle.to_string(), "ttl");
        assert_eq!(ManifestFormat::Yaml.to_string(), "yml");
    }
}
