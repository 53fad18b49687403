//! Stage-by-stage segmentation facade
//!
//! Thin wrappers over the individual stages with logging at the stage
//! boundaries, in the order a full run uses them: smooth, detect, correct,
//! delineate, compute heights, screen, vectorize, validate. Each wrapper
//! takes the tree set by value and hands it back, so a run reads as a
//! chain. Callers needing non-default statistics or thresholds use the
//! stage modules directly.

use crate::attributes;
use crate::correction::{self, CorrectionParams};
use crate::delineation::{self, CrownAlgorithm, DelineationParams};
use crate::detection::{self, DetectionParams};
use crate::smoothing::{self, SmoothParams};
use crate::validate as validation;
use crate::vectorize::{self, VectorizeParams};
use crate::window::WindowSize;
use crownseg_core::{
    GridSurface, Location, Result, ScreeningReport, TreeSet, ValidationReport,
};
use log::{debug, info};

/// Median-smooth the CHM with a square window.
pub fn smooth(chm: &GridSurface<f64>, window: WindowSize) -> Result<GridSurface<f64>> {
    debug!("smoothing CHM ({:?} window)", window);
    smoothing::smooth_chm(
        chm,
        &SmoothParams {
            window,
            ..Default::default()
        },
    )
}

/// Detect tree tops as windowed local maxima above `hmin`.
pub fn detect_tops(chm: &GridSurface<f64>, window: WindowSize, hmin: f64) -> Result<TreeSet> {
    let tree_set = detection::detect_tops(chm, &DetectionParams { window, hmin })?;
    info!("detected {} tree tops (hmin {hmin})", tree_set.len());
    Ok(tree_set)
}

/// Correct tree-top positions for terrain lean using default bounds.
pub fn correct_tops(
    tree_set: TreeSet,
    dtm: &GridSurface<f64>,
    dsm: &GridSurface<f64>,
) -> Result<TreeSet> {
    debug!("correcting {} tree tops for terrain slope", tree_set.len());
    correction::correct_tops(tree_set, dtm, dsm, &CorrectionParams::default())
}

/// Delineate crowns with an algorithm chosen by name.
///
/// Accepted names: `region_growing` (alias `dalponte`), `watershed`,
/// `superpixel` (alias `slic`).
pub fn delineate(
    tree_set: TreeSet,
    chm: &GridSurface<f64>,
    algorithm: &str,
    params: &DelineationParams,
) -> Result<TreeSet> {
    let algorithm: CrownAlgorithm = algorithm.parse()?;
    info!(
        "delineating {} crowns with {}",
        tree_set.len(),
        algorithm.name()
    );
    delineation::delineate(tree_set, chm, algorithm, params)
}

/// Compute per-tree height and ground elevation at one location variant.
pub fn compute_height(
    tree_set: TreeSet,
    location: Location,
    chm: &GridSurface<f64>,
    dsm: &GridSurface<f64>,
    dtm: &GridSurface<f64>,
) -> Result<TreeSet> {
    debug!("computing heights at '{}'", location.key());
    attributes::compute_height(tree_set, location, chm, dsm, dtm)
}

/// Remove trees below `hmin` at the given location variant.
pub fn screen(
    tree_set: TreeSet,
    hmin: f64,
    location: Location,
) -> Result<(TreeSet, ScreeningReport)> {
    let (tree_set, report) = attributes::screen(tree_set, hmin, location)?;
    info!(
        "screened {} trees, removed {} below {hmin}",
        report.examined,
        report.removed.len()
    );
    Ok((tree_set, report))
}

/// Convert crown masks to boundary polygons.
///
/// With `smooth` the staircase outline is Chaikin-smoothed and simplified
/// at half a cell; without it the polygons rasterize back to the masks
/// exactly.
pub fn vectorize(tree_set: TreeSet, grid: &GridSurface<f64>, smooth: bool) -> Result<TreeSet> {
    debug!("vectorizing {} crowns (smooth: {smooth})", tree_set.len());
    let params = VectorizeParams {
        smooth,
        simplify_tolerance: if smooth { grid.cell_size() / 2.0 } else { 0.0 },
        ..Default::default()
    };
    vectorize::vectorize_crowns(tree_set, grid, &params)
}

/// Validate crown polygons, repairing or removing broken ones.
pub fn validate(tree_set: TreeSet) -> Result<(TreeSet, ValidationReport)> {
    let (tree_set, report) = validation::validate_crowns(tree_set)?;
    info!(
        "validated {} crowns: {} passed, {} repaired, {} removed",
        report.total(),
        report.passed.len(),
        report.repaired.len(),
        report.failed.len()
    );
    Ok((tree_set, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crownseg_core::Error;

    #[test]
    fn test_unknown_algorithm_name() {
        let chm = GridSurface::filled(5, 5, 10.0);
        let mut ts = TreeSet::new();
        ts.insert_top(crownseg_core::TreeTop::new(1, 2, 2));
        let result = delineate(ts, &chm, "quadtree", &DelineationParams::default());
        assert!(matches!(result, Err(Error::UnknownAlgorithm(_))));
    }
}
