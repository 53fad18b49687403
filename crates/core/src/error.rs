//! Error types for crownseg

use thiserror::Error;

/// Main error type for crownseg operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid grid dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Surfaces passed to a pipeline stage are not co-registered
    /// (different shape, resolution or origin).
    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Invalid window size: {0}")]
    InvalidWindowSize(String),

    #[error("Crown delineation failed: {0}")]
    DelineationFailed(String),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// An unrepairable crown polygon, escalated from a validation report
    #[error("Geometry repair failed for tree {tree}: {reason}")]
    GeometryRepairFailed { tree: u32, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for crownseg operations
pub type Result<T> = std::result::Result<T, Error>;
