//! Leaf addressing: the four-level path to a leaf and its ledger key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the four values that make up a [`LeafKey`].
pub const LEAF_KEY_SEPARATOR: char = '_';

/// A `{value, label}` pair for one level of a leaf path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Opaque identifier used to select the dropdown option.
    pub value: String,
    /// Display string, used for filesystem paths and the leaf filter.
    pub label: String,
}

impl PathSegment {
    /// Creates a segment.
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Fully specified path from Region down to a Leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafPath {
    /// Top-level region.
    pub region: PathSegment,
    /// Second level.
    pub sub_region: PathSegment,
    /// Third level.
    pub sub_sub_region: PathSegment,
    /// The leaf itself.
    pub leaf: PathSegment,
}

impl LeafPath {
    /// Returns the ledger key for this path.
    #[must_use]
    pub fn key(&self) -> LeafKey {
        LeafKey::from_values([
            self.region.value.as_str(),
            self.sub_region.value.as_str(),
            self.sub_sub_region.value.as_str(),
            self.leaf.value.as_str(),
        ])
    }

    /// Returns the four labels in Region → Leaf order.
    #[must_use]
    pub fn labels(&self) -> [&str; 4] {
        [
            self.region.label.as_str(),
            self.sub_region.label.as_str(),
            self.sub_sub_region.label.as_str(),
            self.leaf.label.as_str(),
        ]
    }
}

impl fmt::Display for LeafPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [region, sub_region, sub_sub_region, leaf] = self.labels();
        write!(f, "{region} > {sub_region} > {sub_sub_region} > {leaf}")
    }
}

/// Ledger key: the four dropdown values joined by `_`.
///
/// Labels are never part of the key since they collide and carry unsafe
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafKey(String);

impl LeafKey {
    /// Builds a key from the Region → Leaf values.
    #[must_use]
    pub fn from_values(values: [&str; 4]) -> Self {
        Self(values.join(&LEAF_KEY_SEPARATOR.to_string()))
    }

    /// Wraps an already-joined key (as read from a ledger file).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeafKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> LeafPath {
        LeafPath {
            region: PathSegment::new("2", "BANGALORE URBAN"),
            sub_region: PathSegment::new("5", "ANEKAL"),
            sub_sub_region: PathSegment::new("1", "ATTIBELE"),
            leaf: PathSegment::new("17", "Hebbagodi"),
        }
    }

    #[test]
    fn test_leaf_key_joins_values_not_labels() {
        assert_eq!(sample_path().key().as_str(), "2_5_1_17");
    }

    #[test]
    fn test_leaf_key_serializes_as_plain_string() {
        let key = LeafKey::from_raw("1_2_3_4");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"1_2_3_4\"");
    }

    #[test]
    fn test_leaf_path_display_uses_labels() {
        assert_eq!(
            sample_path().to_string(),
            "BANGALORE URBAN > ANEKAL > ATTIBELE > Hebbagodi"
        );
    }
}
