//! Affine geotransformation for grid surfaces

use serde::{Deserialize, Serialize};

/// North-up affine transformation for georeferencing grid surfaces.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative for the usual north-up layout (row 0 at the
/// northern edge).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub pixel_width: f64,
    /// Cell size in Y direction (usually negative)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Map coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Map coordinates of the pixel's upper-left corner.
    ///
    /// Accepts `col == cols` / `row == rows` so the right/bottom grid edge
    /// can be addressed, which crown boundary tracing relies on.
    pub fn corner_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + col as f64 * self.pixel_width;
        let y = self.origin_y + row as f64 * self.pixel_height;
        (x, y)
    }

    /// Convert map coordinates to fractional pixel coordinates (col, row)
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.origin_x) / self.pixel_width;
        let row = (y - self.origin_y) / self.pixel_height;
        (col, row)
    }

    /// Cell size (assumes square pixels)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Bounding box (min_x, min_y, max_x, max_y) for a grid of given shape
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.corner_to_geo(0, 0);
        let (x1, y1) = self.corner_to_geo(cols, rows);
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Whether two transforms describe the same grid alignment
    pub fn matches(&self, other: &Self) -> bool {
        const EPS: f64 = 1e-9;
        (self.origin_x - other.origin_x).abs() < EPS
            && (self.origin_y - other.origin_y).abs() < EPS
            && (self.pixel_width - other.pixel_width).abs() < EPS
            && (self.pixel_height - other.pixel_height).abs() < EPS
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_geo_roundtrip() {
        let gt = GeoTransform::new(1000.0, 5000.0, 0.5, -0.5);
        let (x, y) = gt.pixel_to_geo(10, 20);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 10.5, epsilon = 1e-10);
        assert_relative_eq!(row, 20.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 50.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(50, 50);
        assert_relative_eq!(min_x, 0.0);
        assert_relative_eq!(min_y, 0.0);
        assert_relative_eq!(max_x, 50.0);
        assert_relative_eq!(max_y, 50.0);
    }

    #[test]
    fn test_matches() {
        let a = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let b = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let c = GeoTransform::new(0.5, 10.0, 1.0, -1.0);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
