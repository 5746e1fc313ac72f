//! Payload and file-name checks shared by the adapters.

use crate::fetch::error::FetchError;
use regex::Regex;
use std::sync::LazyLock;

/// Accepted manifest file stems: `okh`, `okh-widget`, `project.okh`, ...
static MANIFEST_STEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+\.)?okh([_\-:.][0-9a-zA-Z:._\-]+)?$").expect("invalid regex"));

/// Whether a file name (or in-repo path) looks like a manifest worth fetching.
#[must_use]
pub fn is_accepted_manifest_file_name(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let Some((stem, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    MANIFEST_STEM_REGEX.is_match(stem) && matches!(ext, "json" | "jsonld" | "toml" | "ttl" | "rdf" | "yml" | "yaml")
}

/// Reject empty or binary payloads with a deterministic error before they
/// ever reach normalization.
pub fn check_payload_is_text(content: &[u8], context: &str) -> Result<(), FetchError> {
    if content.is_empty() {
        return Err(FetchError::Payload(format!("file is empty: '{context}'")));
    }
    if content.contains(&0) {
        return Err(FetchError::Payload(format!("file is binary, expected text: '{context}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_manifest_file_names() {
        assert!(is_accepted_manifest_file_name("okh.toml"));
        assert!(is_accepted_manifest_file_name("okh-widget.yml"));
        assert!(is_accepted_manifest_file_name("sub/dir/project.okh.json"));
        assert!(is_accepted_manifest_file_name("okh_v1.yaml"));

        assert!(!is_accepted_manifest_file_name("README.md"));
        assert!(!is_accepted_manifest_file_name("okhno.toml"));
        assert!(!is_accepted_manifest_file_name("okh"));
        assert!(!is_accepted_manifest_file_name("okh.exe"));
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let err = check_payload_is_text(b"", "x").unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }

    #[test]
    fn test_binary_payload_is_rejected() {
        let err = check_payload_is_text(b"ok\0h", "x").unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }

    #[test]
    fn test_text_payload_passes() {
        check_payload_is_text(b"okhv: 1.0\n", "x").unwrap();
    }
}
