//! The GridSurface type

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, GridElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D elevation/height surface.
///
/// `GridSurface<T>` stores cell values in row-major order together with the
/// affine transform that places the grid in map space. The CHM, DTM and DSM
/// of one plot are all `GridSurface<f64>` instances on an identical grid;
/// crown label grids use `GridSurface<u32>`.
///
/// Surfaces are treated as immutable once loaded: pipeline stages that
/// transform a surface (e.g. canopy smoothing) return a new instance built
/// via [`GridSurface::with_same_meta`] rather than mutating the input.
#[derive(Debug, Clone)]
pub struct GridSurface<T: GridElement> {
    /// Cell values in (row, col) order
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// No-data value
    nodata: Option<T>,
}

impl<T: GridElement> GridSurface<T> {
    /// Create a new surface filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Create a new surface filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Create a surface from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self {
            data: array,
            transform: GeoTransform::default(),
            nodata: None,
        })
    }

    /// Create a surface from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Create a surface on the same grid but with a different cell type,
    /// filled with zeros
    pub fn with_same_meta<U: GridElement>(&self) -> GridSurface<U> {
        GridSurface {
            data: Array2::zeros(self.data.dim()),
            transform: self.transform,
            nodata: None,
        }
    }

    /// Create a surface on the same grid, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            nodata: self.nodata,
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Get value at a signed (row, col), returning `None` outside the grid.
    ///
    /// Window scans use this so edge cells are evaluated against the
    /// clipped neighborhood instead of fabricated padding.
    pub fn value_at(&self, row: isize, col: isize) -> Option<T> {
        if row < 0 || col < 0 || row >= self.rows() as isize || col >= self.cols() as isize {
            return None;
        }
        Some(unsafe { self.get_unchecked(row as usize, col as usize) })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the surface and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Map coordinates of a pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional pixel coordinates (col, row) of a map position
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    // Statistics

    /// Minimum and maximum cell values, skipping no-data cells.
    /// `None` when the surface holds no valid cell.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut result: Option<(f64, f64)> = None;
        for &v in self.data.iter() {
            if self.is_nodata(v) {
                continue;
            }
            let Some(v) = v.to_f64() else { continue };
            result = Some(match result {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        result
    }

    /// Mean of the valid cell values
    pub fn mean(&self) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for &v in self.data.iter() {
            if self.is_nodata(v) {
                continue;
            }
            if let Some(v) = v.to_f64() {
                sum += v;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }

    // Alignment

    /// Whether this surface shares shape, resolution and origin with another
    pub fn is_aligned_with<U: GridElement>(&self, other: &GridSurface<U>) -> bool {
        self.shape() == other.shape() && self.transform.matches(&other.transform)
    }

    /// Fail with [`Error::GridMismatch`] unless the two surfaces are
    /// co-registered. Every pipeline stage that consumes more than one
    /// surface checks this up front.
    pub fn ensure_aligned_with<U: GridElement>(
        &self,
        other: &GridSurface<U>,
        what: &str,
    ) -> Result<()> {
        if self.is_aligned_with(other) {
            Ok(())
        } else {
            Err(Error::GridMismatch(format!(
                "{what}: {:?} vs {:?}",
                self.shape(),
                other.shape()
            )))
        }
    }
}
