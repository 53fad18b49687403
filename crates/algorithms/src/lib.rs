//! Individual-tree segmentation algorithms for rasterized LiDAR surfaces.
//!
//! Implements the stages of a crown segmentation run over a canopy height
//! model (CHM) and its companion terrain (DTM) and surface (DSM) models:
//!
//! 1. [`smoothing`] — rank-filter the CHM to suppress within-crown noise
//! 2. [`detection`] — find tree tops as windowed local maxima
//! 3. [`correction`] — shift tops upslope on steep terrain
//! 4. [`delineation`] — partition the canopy into crowns (region growing,
//!    watershed, or superpixel)
//! 5. [`attributes`] — per-tree heights, elevations, and screening
//! 6. [`vectorize`] — crown masks to map-space polygons
//! 7. [`validate`] — geometry checks and repair
//!
//! The [`pipeline`] module chains these with default parameters. All
//! stages are deterministic, with or without the `parallel` feature.

pub mod attributes;
pub mod correction;
pub mod delineation;
pub mod detection;
mod maybe_rayon;
pub mod pipeline;
pub mod smoothing;
pub mod validate;
pub mod vectorize;
pub mod window;

pub use correction::{correct_tops, CorrectionParams};
pub use delineation::{delineate, CrownAlgorithm, DelineationParams};
pub use detection::{detect_tops, DetectionParams};
pub use smoothing::{smooth_chm, RankStatistic, SmoothParams};
pub use validate::validate_crowns;
pub use vectorize::{vectorize_crowns, VectorizeParams};
pub use window::WindowSize;

pub mod prelude {
    pub use crate::attributes::{compute_height, screen};
    pub use crate::correction::{correct_tops, CorrectionParams};
    pub use crate::delineation::{delineate, CrownAlgorithm, DelineationParams};
    pub use crate::detection::{detect_tops, DetectionParams};
    pub use crate::smoothing::{smooth_chm, RankStatistic, SmoothParams};
    pub use crate::validate::validate_crowns;
    pub use crate::vectorize::{vectorize_crowns, VectorizeParams};
    pub use crate::window::WindowSize;
    pub use crownseg_core::prelude::*;
}
