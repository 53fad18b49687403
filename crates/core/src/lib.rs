//! # crownseg Core
//!
//! Core types for the crownseg individual-tree segmentation library.
//!
//! This crate provides:
//! - `GridSurface<T>`: georeferenced grid surface (CHM, DTM, DSM, labels)
//! - `GeoTransform`: affine transformation for georeferencing
//! - `TreeSet` / `TreeTop` / `Crown`: the shared tree data model
//! - The library-wide error type
//!
//! All algorithms live in `crownseg-algorithms`.

pub mod error;
pub mod raster;
pub mod trees;

pub use error::{Error, Result};
pub use raster::{GeoTransform, GridElement, GridSurface};
pub use trees::{
    Crown, Location, LocationAttrs, ScreeningReport, TreeId, TreeRecord, TreeSet, TreeTop,
    ValidationReport,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridElement, GridSurface};
    pub use crate::trees::{
        Crown, Location, ScreeningReport, TreeId, TreeSet, TreeTop, ValidationReport,
    };
}
