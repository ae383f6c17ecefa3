//! Batch pipeline that turns NAIP tiles and trained classifier outputs into
//! per-region canopy rasters, plus stratified ground-truthing point samples.
//!
//! The filesystem under the results root is the resumability ledger: each
//! stage artifact's presence on disk is its completion state, so partially
//! finished runs can simply be re-invoked. Geometry and raster operations are
//! delegated to an external GIS engine behind the [`engine::GeoEngine`] trait.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod gapcheck;
pub mod grid;
pub mod gtpoints;
pub mod index;
pub mod ledger;
pub mod naming;
pub mod pipeline;

pub use catalog::{Region, RegionCatalog};
pub use config::Config;
pub use error::{CanopyError, Result};
pub use gapcheck::{check_gaps, GapReport};
pub use grid::RasterGrid;
pub use gtpoints::{point_count, GtSampler, PointCountPolicy};
pub use index::TileIndex;
pub use ledger::{FsLedger, Ledger};
pub use pipeline::Pipeline;
