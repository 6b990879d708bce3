//! Artifact file naming: `<bundle_id>@<version>.<ext>`

use crate::error::{BundleError, BundleResult};

/// Separator between bundle id and version
const VERSION_SEPARATOR: char = '@';

/// A parsed artifact file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub bundle_id: String,
    pub version: String,
    pub extension: String,
}

/// Parse an artifact file name against the recognized extensions.
///
/// The name must end in `.<ext>` for one of `extensions` and the stem must
/// contain exactly one `@` with non-empty text on both sides.
pub fn parse_artifact_name(name: &str, extensions: &[String]) -> BundleResult<ArtifactName> {
    let (stem, extension) = extensions
        .iter()
        .find_map(|ext| {
            name.strip_suffix(ext.as_str())
                .and_then(|rest| rest.strip_suffix('.'))
                .map(|stem| (stem, ext))
        })
        .ok_or_else(|| BundleError::ArtifactName(format!("{}: unrecognized extension", name)))?;

    let mut parts = stem.split(VERSION_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(bundle_id), Some(version), None) if !bundle_id.is_empty() && !version.is_empty() => {
            Ok(ArtifactName {
                bundle_id: bundle_id.to_string(),
                version: version.to_string(),
                extension: extension.clone(),
            })
        }
        _ => Err(BundleError::ArtifactName(format!(
            "{}: expected <bundle>@<version>.{}",
            name, extension
        ))),
    }
}

/// Check that a bundle id can be stored as `<bundle_id>@<version>.<ext>`
/// inside the storage directory and parsed back by `parse_artifact_name`.
pub fn validate_bundle_id(bundle_id: &str) -> BundleResult<()> {
    let reason = if bundle_id.is_empty() {
        "empty id"
    } else if bundle_id.contains(VERSION_SEPARATOR) {
        "contains '@'"
    } else if bundle_id.contains(['/', '\\']) {
        "contains a path separator"
    } else if bundle_id.contains("..") {
        "contains '..'"
    } else {
        return Ok(());
    };

    Err(BundleError::InvalidBundleId {
        bundle_id: bundle_id.to_string(),
        reason: reason.to_string(),
    })
}

/// Build the artifact file name for a bundle version
pub fn file_name(bundle_id: &str, version: &str, extension: &str) -> String {
    format!("{}{}{}.{}", bundle_id, VERSION_SEPARATOR, version, extension)
}
