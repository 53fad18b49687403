//! Moving-window size handling
//!
//! Window sizes can be given in pixels or in ground units; ground sizes are
//! converted via the grid's cell size, matching how batch pipelines usually
//! parameterize smoothing and detection.

use crownseg_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A square window size, in pixels or ground units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowSize {
    /// Window width in pixels
    Pixels(usize),
    /// Window width in map units, converted via the cell size
    Ground(f64),
}

impl WindowSize {
    /// Resolve to a pixel width (≥ 1).
    pub fn to_pixels(self, cell_size: f64) -> Result<usize> {
        match self {
            WindowSize::Pixels(0) => Err(Error::InvalidWindowSize(
                "window must be at least 1 pixel".into(),
            )),
            WindowSize::Pixels(px) => Ok(px),
            WindowSize::Ground(w) => {
                if w <= 0.0 || cell_size <= 0.0 {
                    return Err(Error::InvalidWindowSize(format!(
                        "ground window {w} with cell size {cell_size}"
                    )));
                }
                Ok(((w / cell_size).round() as usize).max(1))
            }
        }
    }

    /// Resolve to an odd pixel width (≥ 3), as required for windows with a
    /// well-defined center cell. Explicit even pixel widths are rejected;
    /// ground widths are rounded up to the next odd size.
    pub fn to_odd_pixels(self, cell_size: f64) -> Result<usize> {
        match self {
            WindowSize::Pixels(px) => {
                if px < 3 || px % 2 == 0 {
                    Err(Error::InvalidWindowSize(format!(
                        "window must be odd and at least 3 pixels, got {px}"
                    )))
                } else {
                    Ok(px)
                }
            }
            WindowSize::Ground(_) => {
                let px = self.to_pixels(cell_size)?;
                Ok(if px % 2 == 0 { px + 1 } else { px }.max(3))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_conversion() {
        assert_eq!(WindowSize::Ground(5.0).to_pixels(0.5).unwrap(), 10);
        assert_eq!(WindowSize::Ground(5.0).to_odd_pixels(0.5).unwrap(), 11);
        assert_eq!(WindowSize::Ground(0.4).to_odd_pixels(1.0).unwrap(), 3);
    }

    #[test]
    fn test_invalid_windows() {
        assert!(WindowSize::Pixels(0).to_pixels(1.0).is_err());
        assert!(WindowSize::Pixels(4).to_odd_pixels(1.0).is_err());
        assert!(WindowSize::Pixels(1).to_odd_pixels(1.0).is_err());
        assert!(WindowSize::Ground(-2.0).to_pixels(1.0).is_err());
    }
}
