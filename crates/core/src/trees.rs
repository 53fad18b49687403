//! Tree data model shared by every pipeline stage.
//!
//! A detection run produces a [`TreeSet`]: an ordered arena of tree records
//! keyed by a stable integer id. Each downstream stage (top correction,
//! crown delineation, height calculation, screening, vectorization,
//! validation) reads and extends the same set, so results can always be
//! joined back to the tree they belong to.

use crate::error::{Error, Result};
use geo_types::Polygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Stable tree identifier, assigned in raster scan order at detection time
pub type TreeId = u32;

/// Tree-top location variant.
///
/// `Top` is the raw detected local maximum; `TopCor` is the
/// terrain-corrected position written by the top corrector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    Top,
    TopCor,
}

impl Location {
    /// Attribute key used in exports ("top" / "top_cor")
    pub fn key(&self) -> &'static str {
        match self {
            Location::Top => "top",
            Location::TopCor => "top_cor",
        }
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "top" => Ok(Location::Top),
            "top_cor" => Ok(Location::TopCor),
            other => Err(Error::Other(format!("unknown location variant: {other}"))),
        }
    }
}

/// Height and elevation attributes computed at one location variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationAttrs {
    /// Tree height above ground (CHM, or DSM − DTM)
    pub height: Option<f64>,
    /// Ground elevation (DTM)
    pub elevation: Option<f64>,
}

/// A detected tree top
#[derive(Debug, Clone)]
pub struct TreeTop {
    pub id: TreeId,
    /// Raw detected pixel (row, col)
    pub pixel: (usize, usize),
    /// Terrain-corrected pixel, set by the top corrector
    pub pixel_cor: Option<(usize, usize)>,
    /// Attributes at the raw location
    pub top: LocationAttrs,
    /// Attributes at the corrected location
    pub top_cor: LocationAttrs,
}

impl TreeTop {
    pub fn new(id: TreeId, row: usize, col: usize) -> Self {
        Self {
            id,
            pixel: (row, col),
            pixel_cor: None,
            top: LocationAttrs::default(),
            top_cor: LocationAttrs::default(),
        }
    }

    /// Pixel for a location variant. Falls back to the raw pixel when no
    /// correction has been applied.
    pub fn pixel_at(&self, loc: Location) -> (usize, usize) {
        match loc {
            Location::Top => self.pixel,
            Location::TopCor => self.pixel_cor.unwrap_or(self.pixel),
        }
    }

    pub fn attrs(&self, loc: Location) -> &LocationAttrs {
        match loc {
            Location::Top => &self.top,
            Location::TopCor => &self.top_cor,
        }
    }

    pub fn attrs_mut(&mut self, loc: Location) -> &mut LocationAttrs {
        match loc {
            Location::Top => &mut self.top,
            Location::TopCor => &mut self.top_cor,
        }
    }
}

/// Crown footprint of one tree.
///
/// Starts as a raster mask after delineation; vectorization adds the
/// polygon boundary in map coordinates.
#[derive(Debug, Clone, Default)]
pub struct Crown {
    /// Pixels belonging to this tree, in raster scan order
    pub mask: Vec<(usize, usize)>,
    /// Boundary polygon, set by the vectorizer
    pub polygon: Option<Polygon<f64>>,
}

impl Crown {
    pub fn from_mask(mask: Vec<(usize, usize)>) -> Self {
        Self {
            mask,
            polygon: None,
        }
    }

    pub fn contains_pixel(&self, pixel: (usize, usize)) -> bool {
        self.mask.contains(&pixel)
    }

    /// Crown area in map units², from the raster mask
    pub fn area(&self, cell_size: f64) -> f64 {
        self.mask.len() as f64 * cell_size * cell_size
    }
}

/// One tree: its top plus the crown attributed to it
#[derive(Debug, Clone)]
pub struct TreeRecord {
    pub top: TreeTop,
    pub crown: Option<Crown>,
}

/// The aggregate of all detected trees, keyed by id.
///
/// Backed by a `BTreeMap` so iteration order is always ascending id,
/// which downstream stages rely on for reproducibility.
#[derive(Debug, Clone, Default)]
pub struct TreeSet {
    trees: BTreeMap<TreeId, TreeRecord>,
}

impl TreeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Insert a freshly detected top (no crown yet)
    pub fn insert_top(&mut self, top: TreeTop) {
        self.trees.insert(top.id, TreeRecord { top, crown: None });
    }

    pub fn get(&self, id: TreeId) -> Option<&TreeRecord> {
        self.trees.get(&id)
    }

    pub fn get_mut(&mut self, id: TreeId) -> Option<&mut TreeRecord> {
        self.trees.get_mut(&id)
    }

    /// Remove a tree and its crown, preserving referential integrity
    pub fn remove(&mut self, id: TreeId) -> Option<TreeRecord> {
        self.trees.remove(&id)
    }

    /// All ids in ascending order
    pub fn ids(&self) -> Vec<TreeId> {
        self.trees.keys().copied().collect()
    }

    /// Iterate records in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (TreeId, &TreeRecord)> {
        self.trees.iter().map(|(id, rec)| (*id, rec))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TreeId, &mut TreeRecord)> {
        self.trees.iter_mut().map(|(id, rec)| (*id, rec))
    }

    /// Attach a crown to an existing tree
    pub fn set_crown(&mut self, id: TreeId, crown: Crown) -> Result<()> {
        match self.trees.get_mut(&id) {
            Some(rec) => {
                rec.crown = Some(crown);
                Ok(())
            }
            None => Err(Error::Other(format!("no tree with id {id}"))),
        }
    }
}

/// Summary of a screening pass. Every removed tree is listed so no tree
/// is discarded silently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub examined: usize,
    pub kept: usize,
    pub removed: Vec<TreeId>,
}

/// Per-tree outcome of geometry validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Crowns whose polygon was valid as produced
    pub passed: Vec<TreeId>,
    /// Crowns repaired by the best-effort geometric fix
    pub repaired: Vec<TreeId>,
    /// Crowns that could not be repaired, with the reason; these trees are
    /// excluded from the set
    pub failed: Vec<(TreeId, String)>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.passed.len() + self.repaired.len() + self.failed.len()
    }

    pub fn all_valid(&self) -> bool {
        self.failed.is_empty()
    }

    /// Escalate the first recorded failure, for callers that cannot accept
    /// partial results
    pub fn ensure_all_valid(&self) -> Result<()> {
        match self.failed.first() {
            None => Ok(()),
            Some((tree, reason)) => Err(Error::GeometryRepairFailed {
                tree: *tree,
                reason: reason.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parsing() {
        assert_eq!("top".parse::<Location>().unwrap(), Location::Top);
        assert_eq!("top_cor".parse::<Location>().unwrap(), Location::TopCor);
        assert!("apex".parse::<Location>().is_err());
    }

    #[test]
    fn test_pixel_fallback_without_correction() {
        let top = TreeTop::new(1, 4, 7);
        assert_eq!(top.pixel_at(Location::Top), (4, 7));
        assert_eq!(top.pixel_at(Location::TopCor), (4, 7));
    }

    #[test]
    fn test_treeset_ordering() {
        let mut ts = TreeSet::new();
        ts.insert_top(TreeTop::new(3, 0, 0));
        ts.insert_top(TreeTop::new(1, 1, 1));
        ts.insert_top(TreeTop::new(2, 2, 2));
        assert_eq!(ts.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_drops_crown() {
        let mut ts = TreeSet::new();
        ts.insert_top(TreeTop::new(1, 0, 0));
        ts.set_crown(1, Crown::from_mask(vec![(0, 0), (0, 1)])).unwrap();
        let rec = ts.remove(1).unwrap();
        assert_eq!(rec.crown.unwrap().mask.len(), 2);
        assert!(ts.is_empty());
        assert!(ts.set_crown(1, Crown::default()).is_err());
    }

    #[test]
    fn test_crown_area() {
        let crown = Crown::from_mask(vec![(0, 0), (0, 1), (1, 0)]);
        assert_eq!(crown.area(0.5), 0.75);
    }

    #[test]
    fn test_validation_report_escalation() {
        let mut report = ValidationReport::default();
        report.passed.push(1);
        assert!(report.ensure_all_valid().is_ok());

        report.failed.push((7, "ring not closed".into()));
        assert!(matches!(
            report.ensure_all_valid(),
            Err(Error::GeometryRepairFailed { tree: 7, .. })
        ));
    }
}
