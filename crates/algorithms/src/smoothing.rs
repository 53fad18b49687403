//! Canopy smoothing
//!
//! Suppresses within-crown noise in a CHM with a rank filter (median by
//! default) before tree-top detection. Edge cells use the available,
//! clipped neighborhood — no padding values are fabricated.

use crate::maybe_rayon::*;
use crate::window::WindowSize;
use crownseg_core::{Error, GridSurface, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Rank statistic computed over each window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RankStatistic {
    /// Median value
    Median,
    /// Percentile (0-100)
    Percentile(f64),
}

/// Parameters for canopy smoothing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothParams {
    /// Square window width (even pixel widths behave as the next odd width)
    pub window: WindowSize,
    /// Statistic to compute
    pub statistic: RankStatistic,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            window: WindowSize::Pixels(3),
            statistic: RankStatistic::Median,
        }
    }
}

/// Smooth a CHM with a square rank filter.
///
/// Returns a new surface on the same grid; the input is never mutated.
/// NaN cells stay NaN, and NaN neighbors are excluded from the ranking.
///
/// # Errors
/// `InvalidWindowSize` when the window is zero-sized or wider than the
/// raster extent.
pub fn smooth_chm(chm: &GridSurface<f64>, params: &SmoothParams) -> Result<GridSurface<f64>> {
    let (rows, cols) = chm.shape();
    let px = params.window.to_pixels(chm.cell_size())?;
    if px > rows.min(cols) {
        return Err(Error::InvalidWindowSize(format!(
            "window of {px} px exceeds raster extent ({rows}x{cols})"
        )));
    }
    if let RankStatistic::Percentile(p) = params.statistic {
        if !(0.0..=100.0).contains(&p) {
            return Err(Error::Other(format!(
                "percentile must be within 0-100, got {p}"
            )));
        }
    }

    let half = (px / 2) as isize;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values: Vec<f64> = Vec::with_capacity(px * px);

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { chm.get_unchecked(row, col) };
                if center.is_nan() {
                    continue;
                }

                values.clear();
                for dr in -half..=half {
                    for dc in -half..=half {
                        if let Some(v) = chm.value_at(row as isize + dr, col as isize + dc) {
                            if !v.is_nan() {
                                values.push(v);
                            }
                        }
                    }
                }

                *out = rank_value(&mut values, params.statistic);
            }

            row_data
        })
        .collect();

    let mut output = chm.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

fn rank_value(values: &mut [f64], statistic: RankStatistic) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();

    match statistic {
        RankStatistic::Median => {
            let mid = n / 2;
            if n % 2 == 0 {
                (values[mid - 1] + values[mid]) / 2.0
            } else {
                values[mid]
            }
        }
        RankStatistic::Percentile(p) => {
            let idx = (p / 100.0 * (n - 1) as f64).round() as usize;
            values[idx.min(n - 1)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chm_with(values: &[(usize, usize, f64)], size: usize, base: f64) -> GridSurface<f64> {
        let mut chm = GridSurface::filled(size, size, base);
        for &(r, c, v) in values {
            chm.set(r, c, v).unwrap();
        }
        chm
    }

    #[test]
    fn test_median_removes_spike() {
        let chm = chm_with(&[(5, 5, 40.0)], 10, 10.0);
        let smoothed = smooth_chm(&chm, &SmoothParams::default()).unwrap();
        assert_eq!(smoothed.get(5, 5).unwrap(), 10.0);
    }

    #[test]
    fn test_uniform_interior_stable() {
        let chm = chm_with(&[], 10, 7.0);
        let once = smooth_chm(&chm, &SmoothParams::default()).unwrap();
        let twice = smooth_chm(&once, &SmoothParams::default()).unwrap();
        for r in 0..10 {
            for c in 0..10 {
                assert_eq!(once.get(r, c).unwrap(), 7.0);
                assert_eq!(twice.get(r, c).unwrap(), 7.0);
            }
        }
    }

    #[test]
    fn test_edge_uses_clipped_window() {
        // Corner cell has only a 2x2 neighborhood; a NaN border would show
        // up as NaN output if padding were fabricated.
        let chm = chm_with(&[(0, 0, 3.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)], 5, 1.0);
        let smoothed = smooth_chm(&chm, &SmoothParams::default()).unwrap();
        assert_eq!(smoothed.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_nan_center_preserved() {
        let chm = chm_with(&[(2, 2, f64::NAN)], 5, 4.0);
        let smoothed = smooth_chm(&chm, &SmoothParams::default()).unwrap();
        assert!(smoothed.get(2, 2).unwrap().is_nan());
        assert_eq!(smoothed.get(2, 3).unwrap(), 4.0);
    }

    #[test]
    fn test_window_larger_than_extent() {
        let chm = chm_with(&[], 5, 1.0);
        let params = SmoothParams {
            window: WindowSize::Pixels(7),
            statistic: RankStatistic::Median,
        };
        assert!(matches!(
            smooth_chm(&chm, &params),
            Err(crownseg_core::Error::InvalidWindowSize(_))
        ));
    }

    #[test]
    fn test_percentile_bounds() {
        let chm = chm_with(&[], 5, 1.0);
        let params = SmoothParams {
            window: WindowSize::Pixels(3),
            statistic: RankStatistic::Percentile(120.0),
        };
        assert!(smooth_chm(&chm, &params).is_err());
    }

    #[test]
    fn test_ground_window() {
        let mut chm = chm_with(&[(5, 5, 40.0)], 10, 10.0);
        chm.set_transform(crownseg_core::GeoTransform::new(0.0, 10.0, 0.5, -0.5));
        let params = SmoothParams {
            window: WindowSize::Ground(1.5), // 3 px at 0.5 m cells
            statistic: RankStatistic::Median,
        };
        let smoothed = smooth_chm(&chm, &params).unwrap();
        assert_eq!(smoothed.get(5, 5).unwrap(), 10.0);
    }
}
