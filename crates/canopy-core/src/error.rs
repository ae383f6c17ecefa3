use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the pipeline.
///
/// Only genuinely fatal conditions surface here. A tile whose upstream
/// artifact is not ready yet, or a region whose mosaic inputs are incomplete,
/// is a recoverable skip handled inside the stage loops, never an error.
#[derive(Debug, Error)]
pub enum CanopyError {
    /// Missing or malformed configuration; the message names the offending
    /// key or path.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A reprojected tile's cell size disagrees with the snap raster beyond
    /// tolerance, so outputs could not be aligned pixel-exact.
    #[error(
        "cell size {actual} of {} does not match snap raster cell size {expected}",
        raster.display()
    )]
    CellSizeMismatch {
        raster: PathBuf,
        expected: f64,
        actual: f64,
    },

    /// The upstream classifier batch left gaps. Every missing tile stem is
    /// listed so the operator can re-run the classifier precisely.
    #[error(
        "classifier output missing for region {region}, tiles: {}",
        tiles.join(", ")
    )]
    MissingClassifierOutputs { region: String, tiles: Vec<String> },

    #[error("unknown region id {0}")]
    UnknownRegion(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Raised by the external geospatial engine.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

impl CanopyError {
    pub fn config(message: impl Into<String>) -> Self {
        CanopyError::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CanopyError>;
