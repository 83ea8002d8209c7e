//! Resolved-link catalog: every URL resolved so far, nested by labels.
//!
//! Links are recorded as soon as a leaf resolves, independently of whether
//! the download that follows succeeds. A later run fetches a recorded link
//! directly instead of driving the portal again.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{LedgerError, read_json_or_default, write_json};
use crate::catalog::LeafPath;

/// One resolved document URL and the dropdown values that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    /// Document URL.
    pub url: String,
    /// Region dropdown value.
    #[serde(alias = "district_value")]
    pub region_value: String,
    /// SubRegion dropdown value.
    #[serde(alias = "taluk_value")]
    pub subregion_value: String,
    /// SubSubRegion dropdown value.
    #[serde(alias = "hobli_value")]
    pub subsubregion_value: String,
    /// Leaf value.
    #[serde(alias = "village_value")]
    pub leaf_value: String,
    /// When the URL was resolved.
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Accepts RFC 3339 and offset-less ISO 8601 timestamps (read as UTC).
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

type LeafLinks = BTreeMap<String, ResolvedLink>;
type SubSubRegionLinks = BTreeMap<String, LeafLinks>;
type SubRegionLinks = BTreeMap<String, SubSubRegionLinks>;

/// Region → SubRegion → SubSubRegion → Leaf label → [`ResolvedLink`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedLinkCatalog {
    regions: BTreeMap<String, SubRegionLinks>,
}

impl ResolvedLinkCatalog {
    /// Loads the catalog; a missing file is an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the file is unreadable or corrupt.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        read_json_or_default(path)
    }

    /// Writes the catalog atomically.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the write fails.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        write_json(path, self)
    }

    /// Records `url` for `path`, replacing any earlier link for that leaf.
    pub fn record(&mut self, path: &LeafPath, url: &str, at: DateTime<Utc>) {
        let [region, sub_region, sub_sub_region, leaf] = path.labels();
        self.regions
            .entry(region.to_string())
            .or_default()
            .entry(sub_region.to_string())
            .or_default()
            .entry(sub_sub_region.to_string())
            .or_default()
            .insert(
                leaf.to_string(),
                ResolvedLink {
                    url: url.to_string(),
                    region_value: path.region.value.clone(),
                    subregion_value: path.sub_region.value.clone(),
                    subsubregion_value: path.sub_sub_region.value.clone(),
                    leaf_value: path.leaf.value.clone(),
                    timestamp: at,
                },
            );
    }

    /// Returns the link recorded for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &LeafPath) -> Option<&ResolvedLink> {
        let [region, sub_region, sub_sub_region, leaf] = path.labels();
        self.regions
            .get(region)?
            .get(sub_region)?
            .get(sub_sub_region)?
            .get(leaf)
    }

    /// Total number of recorded links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    /// True if no links are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds every link from `other`, keeping the newer one on conflict.
    pub fn merge(&mut self, other: &Self) {
        for (region, subs) in &other.regions {
            for (sub_region, sub_subs) in subs {
                for (sub_sub_region, leaves) in sub_subs {
                    let target = self
                        .regions
                        .entry(region.clone())
                        .or_default()
                        .entry(sub_region.clone())
                        .or_default()
                        .entry(sub_sub_region.clone())
                        .or_default();
                    for (leaf, link) in leaves {
                        let newer = target
                            .get(leaf)
                            .is_none_or(|existing| existing.timestamp < link.timestamp);
                        if newer {
                            target.insert(leaf.clone(), link.clone());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::PathSegment;
    use chrono::TimeZone;

    fn path(leaf: &str, value: &str) -> LeafPath {
        LeafPath {
            region: PathSegment::new("1", "R1"),
            sub_region: PathSegment::new("10", "T1"),
            sub_sub_region: PathSegment::new("100", "H1"),
            leaf: PathSegment::new(value, leaf),
        }
    }

    #[test]
    fn test_record_nests_by_labels_and_keeps_values() {
        let mut links = ResolvedLinkCatalog::default();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        links.record(&path("V1", "1"), "https://h/FileDownload.aspx?file=a", at);

        let raw = serde_json::to_value(&links).unwrap();
        let leaf = &raw["R1"]["T1"]["H1"]["V1"];
        assert_eq!(leaf["url"], "https://h/FileDownload.aspx?file=a");
        assert_eq!(leaf["region_value"], "1");
        assert_eq!(leaf["subsubregion_value"], "100");
        assert_eq!(leaf["leaf_value"], "1");
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_legacy_field_names_and_naive_timestamps_load() {
        let raw = r#"{"R1":{"T1":{"H1":{"V1":{
            "url":"u","district_value":"1","taluk_value":"10","hobli_value":"100",
            "village_value":"1","timestamp":"2025-03-04T10:11:12.123456"}}}}}"#;
        let links: ResolvedLinkCatalog = serde_json::from_str(raw).unwrap();
        let link = links.get(&path("V1", "1")).unwrap();
        assert_eq!(link.subregion_value, "10");
        assert_eq!(link.timestamp.date_naive().to_string(), "2025-03-04");
    }

    #[test]
    fn test_merge_keeps_newer_link() {
        let old = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut left = ResolvedLinkCatalog::default();
        left.record(&path("V1", "1"), "old", old);
        let mut right = ResolvedLinkCatalog::default();
        right.record(&path("V1", "1"), "new", new);
        right.record(&path("V2", "2"), "other", old);

        left.merge(&right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.get(&path("V1", "1")).unwrap().url, "new");
    }
}
