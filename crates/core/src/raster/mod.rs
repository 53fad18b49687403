//! Grid surface types

mod element;
mod surface;
mod transform;

pub use element::GridElement;
pub use surface::GridSurface;
pub use transform::GeoTransform;
