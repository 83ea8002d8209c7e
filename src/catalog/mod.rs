//! Catalog store: the Region → SubRegion → SubSubRegion → Leaf tree.
//!
//! The catalog is built once by a discovery pass and is read-only input for
//! every resolve/download run afterwards.
//!
//! # File format
//!
//! An ordered JSON array of region nodes, each `{value, label, children}`.
//! Catalogs written by older tooling that name the child lists per level
//! (`taluks`, `hoblis`, `villages`) are accepted on read.
//!
//! # Example
//!
//! ```no_run
//! use harvest_core::catalog::Catalog;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::load(Path::new("catalog.json"))?;
//! for path in catalog.leaves() {
//!     println!("{} -> {}", path.key(), path);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod leaf;

pub use error::CatalogError;
pub use leaf::{LEAF_KEY_SEPARATOR, LeafKey, LeafPath, PathSegment};

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::ledger::write_atomically;

/// Hierarchy level of a [`HierarchyNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeKind {
    /// Top level.
    Region,
    /// Second level.
    SubRegion,
    /// Third level.
    SubSubRegion,
    /// Unit of download.
    Leaf,
}

impl NodeKind {
    /// Returns the next level down, or `None` for leaves.
    #[must_use]
    pub fn child(self) -> Option<Self> {
        match self {
            Self::Region => Some(Self::SubRegion),
            Self::SubRegion => Some(Self::SubSubRegion),
            Self::SubSubRegion => Some(Self::Leaf),
            Self::Leaf => None,
        }
    }
}

/// One node in the catalog tree.
///
/// A non-leaf node with no children is valid: some branches are genuinely
/// empty and are not retried as failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    /// Level of this node.
    pub kind: NodeKind,
    /// Display string.
    pub label: String,
    /// Opaque dropdown value or search key.
    pub value: String,
    /// Ordered next-level nodes; always empty for leaves.
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Creates a node with no children.
    #[must_use]
    pub fn new(kind: NodeKind, value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// Returns the `{value, label}` pair for this node.
    #[must_use]
    pub fn segment(&self) -> PathSegment {
        PathSegment::new(self.value.clone(), self.label.clone())
    }

    fn from_record(record: NodeRecord, kind: NodeKind) -> Result<Self, CatalogError> {
        let children = match kind.child() {
            Some(child_kind) => record
                .children
                .into_iter()
                .map(|child| Self::from_record(child, child_kind))
                .collect::<Result<Vec<_>, _>>()?,
            None if record.children.is_empty() => Vec::new(),
            None => {
                return Err(CatalogError::TooDeep {
                    label: record.label,
                });
            }
        };
        Ok(Self {
            kind,
            label: record.label,
            value: record.value,
            children,
        })
    }

    fn to_record(&self) -> NodeRecord {
        NodeRecord {
            value: self.value.clone(),
            label: self.label.clone(),
            children: self.children.iter().map(Self::to_record).collect(),
        }
    }
}

/// On-disk node shape.
#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    value: String,
    label: String,
    #[serde(
        default,
        alias = "taluks",
        alias = "hoblis",
        alias = "villages",
        skip_serializing_if = "Vec::is_empty"
    )]
    children: Vec<NodeRecord>,
}

/// Node counts per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    /// Region count.
    pub regions: usize,
    /// SubRegion count.
    pub sub_regions: usize,
    /// SubSubRegion count.
    pub sub_sub_regions: usize,
    /// Leaf count.
    pub leaves: usize,
}

/// The full catalog tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    regions: Vec<HierarchyNode>,
}

impl Catalog {
    /// Wraps an already-built list of region nodes.
    #[must_use]
    pub fn new(regions: Vec<HierarchyNode>) -> Self {
        Self { regions }
    }

    /// Returns the region nodes in catalog order.
    #[must_use]
    pub fn regions(&self) -> &[HierarchyNode] {
        &self.regions
    }

    /// Parses a catalog from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the JSON is malformed, nests too deep, or
    /// repeats a leaf key.
    pub fn from_json(raw: &str, origin: &Path) -> Result<Self, CatalogError> {
        let records: Vec<NodeRecord> =
            serde_json::from_str(raw).map_err(|e| CatalogError::parse(origin, e))?;
        let regions = records
            .into_iter()
            .map(|record| HierarchyNode::from_record(record, NodeKind::Region))
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = Self { regions };
        catalog.check_unique_keys()?;
        Ok(catalog)
    }

    /// Loads and validates a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file is missing, unreadable, or invalid.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        let catalog = Self::from_json(&raw, path)?;
        let stats = catalog.stats();
        info!(
            regions = stats.regions,
            leaves = stats.leaves,
            path = %path.display(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Writes the catalog as pretty-printed JSON, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the write fails.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let records: Vec<NodeRecord> = self.regions.iter().map(HierarchyNode::to_record).collect();
        let body = serde_json::to_vec_pretty(&records).map_err(|e| CatalogError::parse(path, e))?;
        write_atomically(path, &body).map_err(|e| CatalogError::io(path, e))?;
        debug!(path = %path.display(), "catalog written");
        Ok(())
    }

    /// Enumerates every leaf path in deterministic catalog order.
    #[must_use]
    pub fn leaves(&self) -> Vec<LeafPath> {
        let mut out = Vec::new();
        for region in &self.regions {
            for sub_region in &region.children {
                for sub_sub_region in &sub_region.children {
                    for leaf in &sub_sub_region.children {
                        out.push(LeafPath {
                            region: region.segment(),
                            sub_region: sub_region.segment(),
                            sub_sub_region: sub_sub_region.segment(),
                            leaf: leaf.segment(),
                        });
                    }
                }
            }
        }
        out
    }

    /// Counts nodes per level.
    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            regions: self.regions.len(),
            ..CatalogStats::default()
        };
        for region in &self.regions {
            stats.sub_regions += region.children.len();
            for sub_region in &region.children {
                stats.sub_sub_regions += sub_region.children.len();
                for sub_sub_region in &sub_region.children {
                    stats.leaves += sub_sub_region.children.len();
                }
            }
        }
        stats
    }

    /// Drops empty branches bottom-up and returns how many nodes were removed
    /// per level. Leaves are never removed.
    pub fn prune_empty(&mut self) -> CatalogStats {
        let before = self.stats();
        for region in &mut self.regions {
            for sub_region in &mut region.children {
                sub_region.children.retain(|node| !node.children.is_empty());
            }
            region.children.retain(|node| !node.children.is_empty());
        }
        self.regions.retain(|node| !node.children.is_empty());
        let after = self.stats();
        CatalogStats {
            regions: before.regions - after.regions,
            sub_regions: before.sub_regions - after.sub_regions,
            sub_sub_regions: before.sub_sub_regions - after.sub_sub_regions,
            leaves: before.leaves - after.leaves,
        }
    }

    fn check_unique_keys(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for path in self.leaves() {
            let key = path.key();
            if !seen.insert(key.clone()) {
                return Err(CatalogError::DuplicateLeafKey {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}
