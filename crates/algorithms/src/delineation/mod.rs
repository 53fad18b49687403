//! Crown delineation
//!
//! Partitions canopy pixels above a tree-presence threshold among the
//! detected tree tops. Three interchangeable algorithms share one
//! contract; the variant is picked by an explicit tag. Whatever the
//! variant, the resulting crown masks are pairwise disjoint and each
//! contains its own tree top pixel.

mod region_growing;
mod superpixel;
mod watershed;

use crownseg_core::{Crown, Error, GridSurface, Result, TreeId, TreeSet};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Closed set of crown delineation variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrownAlgorithm {
    /// Seed-based region growing with a distance-relaxed height threshold
    RegionGrowing,
    /// Marker-controlled watershed on the inverted CHM
    Watershed,
    /// SLIC-style superpixel clustering followed by tree association
    Superpixel,
}

impl CrownAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            CrownAlgorithm::RegionGrowing => "region_growing",
            CrownAlgorithm::Watershed => "watershed",
            CrownAlgorithm::Superpixel => "superpixel",
        }
    }
}

impl FromStr for CrownAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "region_growing" | "dalponte" => Ok(CrownAlgorithm::RegionGrowing),
            "watershed" => Ok(CrownAlgorithm::Watershed),
            "superpixel" | "slic" => Ok(CrownAlgorithm::Superpixel),
            other => Err(Error::UnknownAlgorithm(other.into())),
        }
    }
}

/// Thresholds shared by all delineation variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelineationParams {
    /// Global minimum canopy height; lower pixels are background
    pub th_tree: f64,
    /// Fraction of the tree-top height required at the seed (region growing)
    pub th_seed: f64,
    /// Fraction of the tree-top height required at the crown edge
    pub th_crown: f64,
    /// Maximum crown radius, in map units
    pub max_crown: f64,
    /// Number of superpixels (superpixel variant only)
    pub n_segments: usize,
    /// Clustering refinement iterations (superpixel variant only)
    pub iterations: usize,
}

impl Default for DelineationParams {
    fn default() -> Self {
        Self {
            th_tree: 2.0,
            th_seed: 0.7,
            th_crown: 0.55,
            max_crown: 10.0,
            n_segments: 200,
            iterations: 10,
        }
    }
}

/// A delineation seed: one tree top with its canopy height
#[derive(Debug, Clone, Copy)]
pub(crate) struct Seed {
    pub id: TreeId,
    pub row: usize,
    pub col: usize,
    pub height: f64,
}

/// Delineate crowns for every tree in the set.
///
/// Returns the tree set with a raster-mask [`Crown`] attached to each tree.
///
/// # Errors
/// `DelineationFailed` when the set has no tops or the thresholds are
/// degenerate; `GridMismatch` when a top lies outside the CHM.
pub fn delineate(
    mut tree_set: TreeSet,
    chm: &GridSurface<f64>,
    algorithm: CrownAlgorithm,
    params: &DelineationParams,
) -> Result<TreeSet> {
    if tree_set.is_empty() {
        return Err(Error::DelineationFailed("no tree tops supplied".into()));
    }
    if !(0.0..=1.0).contains(&params.th_seed)
        || !(0.0..=1.0).contains(&params.th_crown)
        || params.max_crown <= 0.0
        || !params.th_tree.is_finite()
    {
        return Err(Error::DelineationFailed(format!(
            "degenerate thresholds: th_tree={} th_seed={} th_crown={} max_crown={}",
            params.th_tree, params.th_seed, params.th_crown, params.max_crown
        )));
    }

    let seeds = collect_seeds(&tree_set, chm)?;

    let labels = match algorithm {
        CrownAlgorithm::RegionGrowing => region_growing::grow(chm, &seeds, params),
        CrownAlgorithm::Watershed => watershed::flood(chm, &seeds, params),
        CrownAlgorithm::Superpixel => superpixel::segment(chm, &seeds, params),
    };

    attach_crowns(&mut tree_set, &labels);
    Ok(tree_set)
}

fn collect_seeds(tree_set: &TreeSet, chm: &GridSurface<f64>) -> Result<Vec<Seed>> {
    let (rows, cols) = chm.shape();
    let mut seeds = Vec::with_capacity(tree_set.len());

    for (id, rec) in tree_set.iter() {
        let (row, col) = rec.top.pixel;
        if row >= rows || col >= cols {
            return Err(Error::GridMismatch(format!(
                "tree {id} top ({row}, {col}) lies outside the CHM ({rows}x{cols})"
            )));
        }
        let height = unsafe { chm.get_unchecked(row, col) };
        seeds.push(Seed {
            id,
            row,
            col,
            height: if height.is_finite() { height } else { 0.0 },
        });
    }

    Ok(seeds)
}

/// Convert a label grid into per-tree crown masks.
///
/// A single row-major scan keeps every mask in raster scan order, so the
/// masks themselves are deterministic.
fn attach_crowns(tree_set: &mut TreeSet, labels: &Array2<u32>) {
    let mut masks: BTreeMap<TreeId, Vec<(usize, usize)>> = BTreeMap::new();
    for ((row, col), &label) in labels.indexed_iter() {
        if label != 0 {
            masks.entry(label).or_default().push((row, col));
        }
    }

    for (id, rec) in tree_set.iter_mut() {
        let mask = masks.remove(&id).unwrap_or_default();
        rec.crown = Some(Crown::from_mask(mask));
    }
}
