//! Terrain-slope tree-top correction
//!
//! On steep terrain the detected CHM maximum sits systematically downslope
//! of the true stem position. This stage estimates the local terrain
//! gradient from the DTM (Horn's 3x3 method, as used for slope/aspect
//! rasters) and displaces each top a bounded distance upslope. The result
//! is written as the `top_cor` location; the raw location is kept.

use crownseg_core::{GridSurface, Location, Result, TreeSet};
use serde::{Deserialize, Serialize};

/// Parameters for tree-top correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionParams {
    /// Minimum terrain slope (degrees) before any correction is applied
    pub slope_threshold: f64,
    /// Upper bound on the displacement, in map units
    pub max_shift: f64,
    /// Scales the lean estimate `height * tan(slope)`
    pub lean_factor: f64,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            slope_threshold: 10.0,
            max_shift: 3.0,
            lean_factor: 0.5,
        }
    }
}

/// Correct tree-top positions for terrain-induced lean.
///
/// For every tree the corrected pixel is written, equal to the raw pixel
/// when the slope is below the threshold or the gradient cannot be
/// estimated (edge cells, NaN terrain). Heights computed later at
/// [`Location::TopCor`] use the corrected position.
pub fn correct_tops(
    mut tree_set: TreeSet,
    dtm: &GridSurface<f64>,
    dsm: &GridSurface<f64>,
    params: &CorrectionParams,
) -> Result<TreeSet> {
    dtm.ensure_aligned_with(dsm, "dtm vs dsm")?;

    let (rows, cols) = dtm.shape();
    let cell = dtm.cell_size();

    for (_, rec) in tree_set.iter_mut() {
        let (row, col) = rec.top.pixel;
        // Default to no-op; overwritten below when a shift applies
        rec.top.pixel_cor = Some((row, col));

        let Some((p, q)) = horn_gradient(dtm, row, col, cell) else {
            continue;
        };

        let slope = (p * p + q * q).sqrt().atan();
        if slope.to_degrees() < params.slope_threshold {
            continue;
        }

        let ground = unsafe { dtm.get_unchecked(row, col) };
        let surface = unsafe { dsm.get_unchecked(row, col) };
        let height = surface - ground;
        if !height.is_finite() || height <= 0.0 {
            continue;
        }

        let lean = (height * slope.tan() * params.lean_factor).min(params.max_shift);
        let shift_px = lean / cell;

        // Gradient in index space points uphill: (dz/drow, dz/dcol)
        let mag = (p * p + q * q).sqrt();
        let drow = (q / mag * shift_px).round() as isize;
        let dcol = (p / mag * shift_px).round() as isize;

        let new_row = (row as isize + drow).clamp(0, rows as isize - 1) as usize;
        let new_col = (col as isize + dcol).clamp(0, cols as isize - 1) as usize;
        rec.top.pixel_cor = Some((new_row, new_col));
    }

    Ok(tree_set)
}

/// Horn (1981) gradient from the 3x3 DTM neighborhood, per map unit.
///
/// Returns `(dz/dcol, dz/drow)` in index space, or `None` when the window
/// is clipped by the raster edge or contains NaN.
fn horn_gradient(dtm: &GridSurface<f64>, row: usize, col: usize, cell: f64) -> Option<(f64, f64)> {
    let r = row as isize;
    let c = col as isize;

    let a = dtm.value_at(r - 1, c - 1)?;
    let b = dtm.value_at(r - 1, c)?;
    let cc = dtm.value_at(r - 1, c + 1)?;
    let d = dtm.value_at(r, c - 1)?;
    let f = dtm.value_at(r, c + 1)?;
    let g = dtm.value_at(r + 1, c - 1)?;
    let h = dtm.value_at(r + 1, c)?;
    let i = dtm.value_at(r + 1, c + 1)?;

    if [a, b, cc, d, f, g, h, i].iter().any(|v| v.is_nan()) {
        return None;
    }

    let dz_dcol = ((cc + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * cell);
    let dz_drow = ((g + 2.0 * h + i) - (a + 2.0 * b + cc)) / (8.0 * cell);
    Some((dz_dcol, dz_drow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crownseg_core::{TreeSet, TreeTop};

    fn single_tree(row: usize, col: usize) -> TreeSet {
        let mut ts = TreeSet::new();
        ts.insert_top(TreeTop::new(1, row, col));
        ts
    }

    /// DTM rising eastward at the given gradient, with a DSM a fixed
    /// canopy height above it.
    fn ramp(rows: usize, cols: usize, grade: f64, canopy: f64) -> (GridSurface<f64>, GridSurface<f64>) {
        let mut dtm = GridSurface::new(rows, cols);
        let mut dsm = GridSurface::new(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                dtm.set(r, c, c as f64 * grade).unwrap();
                dsm.set(r, c, c as f64 * grade + canopy).unwrap();
            }
        }
        (dtm, dsm)
    }

    #[test]
    fn test_noop_on_flat_terrain() {
        let (dtm, dsm) = ramp(10, 10, 0.0, 15.0);
        let ts = correct_tops(single_tree(5, 5), &dtm, &dsm, &CorrectionParams::default()).unwrap();
        let top = &ts.get(1).unwrap().top;
        assert_eq!(top.pixel_cor, Some((5, 5)));
        assert_eq!(top.pixel_at(Location::TopCor), top.pixel_at(Location::Top));
    }

    #[test]
    fn test_shift_goes_upslope() {
        // 45 degree slope rising eastward: correction moves the top east
        let (dtm, dsm) = ramp(10, 10, 1.0, 10.0);
        let ts = correct_tops(single_tree(5, 4), &dtm, &dsm, &CorrectionParams::default()).unwrap();
        let (row, col) = ts.get(1).unwrap().top.pixel_cor.unwrap();
        assert_eq!(row, 5);
        assert!(col > 4, "expected upslope (eastward) shift, got col {col}");
    }

    #[test]
    fn test_shift_is_bounded() {
        let (dtm, dsm) = ramp(10, 40, 1.0, 30.0);
        let params = CorrectionParams {
            slope_threshold: 5.0,
            max_shift: 2.0,
            lean_factor: 1.0,
        };
        let ts = correct_tops(single_tree(5, 10), &dtm, &dsm, &params).unwrap();
        let (_, col) = ts.get(1).unwrap().top.pixel_cor.unwrap();
        assert!(col - 10 <= 2, "shift exceeded max_shift: {}", col - 10);
    }

    #[test]
    fn test_edge_top_left_uncorrected() {
        let (dtm, dsm) = ramp(10, 10, 1.0, 10.0);
        let ts = correct_tops(single_tree(0, 0), &dtm, &dsm, &CorrectionParams::default()).unwrap();
        assert_eq!(ts.get(1).unwrap().top.pixel_cor, Some((0, 0)));
    }

    #[test]
    fn test_misaligned_surfaces_rejected() {
        let dtm: GridSurface<f64> = GridSurface::new(10, 10);
        let dsm: GridSurface<f64> = GridSurface::new(10, 12);
        assert!(correct_tops(single_tree(5, 5), &dtm, &dsm, &CorrectionParams::default()).is_err());
    }
}
