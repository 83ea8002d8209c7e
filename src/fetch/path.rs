//! Deterministic artifact paths derived from hierarchy labels.

use std::path::{Path, PathBuf};

use crate::catalog::LeafPath;

/// Characters that are replaced with `_` in path components.
const UNSAFE_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Makes a label safe to use as a single path component.
///
/// Replaces `<>:"/\|?*` with `_` and trims surrounding whitespace. A label
/// that would name the current or parent directory, or nothing, becomes `_`.
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    let cleaned = label
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>();
    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Returns `<root>/<Region>/<SubRegion>/<SubSubRegion>/<Leaf>.<ext>`.
#[must_use]
pub fn artifact_path(root: &Path, path: &LeafPath, extension: &str) -> PathBuf {
    let [region, sub_region, sub_sub_region, leaf] = path.labels();
    root.join(sanitize_label(region))
        .join(sanitize_label(sub_region))
        .join(sanitize_label(sub_sub_region))
        .join(format!("{}.{extension}", sanitize_label(leaf)))
}
