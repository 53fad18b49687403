//! Tree-top detection
//!
//! Finds local maxima in a (smoothed) CHM above a minimum height. A cell is
//! a tree top when it is the strict maximum of its square window; ties on a
//! plateau go to the lowest row-then-column index so repeated runs always
//! produce the same tops. Ids are assigned in raster scan order, which is
//! part of the contract downstream stages rely on.

use crate::maybe_rayon::*;
use crate::window::WindowSize;
use crownseg_core::{Error, GridSurface, Result, TreeSet, TreeTop};
use serde::{Deserialize, Serialize};

/// Parameters for tree-top detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Square search window (must resolve to an odd pixel width)
    pub window: WindowSize,
    /// Minimum height for a cell to qualify as a tree top
    pub hmin: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            window: WindowSize::Pixels(3),
            hmin: 2.0,
        }
    }
}

/// Detect tree tops as windowed local maxima.
///
/// Edge cells are evaluated against the clipped window. A raster with no
/// qualifying maxima yields an empty [`TreeSet`], not an error.
pub fn detect_tops(chm: &GridSurface<f64>, params: &DetectionParams) -> Result<TreeSet> {
    let (rows, cols) = chm.shape();
    let px = params.window.to_odd_pixels(chm.cell_size())?;
    if px > rows.min(cols) {
        return Err(Error::InvalidWindowSize(format!(
            "window of {px} px exceeds raster extent ({rows}x{cols})"
        )));
    }
    let half = (px / 2) as isize;

    // Row-parallel scan; flat_map preserves row order so candidate order is
    // always raster scan order.
    let candidates: Vec<(usize, usize)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_tops = Vec::new();

            'cells: for col in 0..cols {
                let v = unsafe { chm.get_unchecked(row, col) };
                if !v.is_finite() || v < params.hmin {
                    continue;
                }

                for dr in -half..=half {
                    for dc in -half..=half {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        let Some(nv) = chm.value_at(nr, nc) else {
                            continue;
                        };
                        if nv > v {
                            continue 'cells;
                        }
                        // Plateau: the earliest cell in scan order wins
                        if nv == v && (nr, nc) < (row as isize, col as isize) {
                            continue 'cells;
                        }
                    }
                }

                row_tops.push((row, col));
            }

            row_tops
        })
        .collect();

    let mut tree_set = TreeSet::new();
    for (i, (row, col)) in candidates.into_iter().enumerate() {
        tree_set.insert_top(TreeTop::new(i as u32 + 1, row, col));
    }

    Ok(tree_set)
}
