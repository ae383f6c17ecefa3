//! Contract with the external geospatial engine.
//!
//! Everything geometric — reprojection, masking, mosaicking, tracing — is an
//! opaque, blocking call behind this trait. The pipeline only sequences these
//! calls and tracks artifact state; it never does polygon math itself.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::grid::RasterGrid;

#[cfg(test)]
pub(crate) mod mock;

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x < self.xmax && y > self.ymin && y <= self.ymax
    }
}

/// One feature of the region layer.
#[derive(Debug, Clone)]
pub struct RegionRecord {
    pub id: u32,
    pub name: String,
}

/// Attribute field types the engine can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Short,
    Long,
    Double,
    Text,
}

/// A ground-truthing point: world coordinates plus the sampled class label.
/// The label is `None` where no finished raster covers the point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GtPoint {
    pub x: f64,
    pub y: f64,
    pub label: Option<u8>,
}

/// Black-box geospatial engine.
///
/// Raster-writing operations must fail rather than overwrite an existing
/// output; the pipeline's existence checks make sure they are never asked to.
pub trait GeoEngine {
    // ── Layer reads ──────────────────────────────────────────────────────

    /// All regions of the catalog layer, in layer order. A missing required
    /// attribute is an error.
    fn regions(&self) -> Result<Vec<RegionRecord>>;

    /// FileName attribute of every tile footprint.
    fn tile_file_names(&self) -> Result<Vec<String>>;

    /// FileName of every tile intersecting the given region.
    fn tiles_intersecting(&self, region_id: u32) -> Result<Vec<String>>;

    fn region_bounds(&self, region_id: u32) -> Result<Bounds>;

    fn region_contains(&self, region_id: u32, x: f64, y: f64) -> Result<bool>;

    fn tile_bounds(&self, file_name: &str) -> Result<Bounds>;

    // ── Attribute tables ─────────────────────────────────────────────────

    fn add_field(&self, layer: &str, field: &str, kind: FieldKind) -> Result<()>;

    /// Dropping a field that does not exist is not an error.
    fn delete_field(&self, layer: &str, field: &str) -> Result<()>;

    fn copy_field(&self, layer: &str, from: &str, to: &str) -> Result<()>;

    fn set_tile_field(&self, layer: &str, file_name: &str, field: &str, value: &str)
        -> Result<()>;

    fn tile_field(&self, layer: &str, file_name: &str, field: &str) -> Result<String>;

    /// Compute feature areas in square kilometres into `field`.
    fn calculate_area_sqkm(&self, layer: &str, field: &str) -> Result<()>;

    /// Read back a region's materialized area.
    fn region_area_sqkm(&self, region_id: u32) -> Result<f64>;

    // ── Raster operations ────────────────────────────────────────────────

    /// Reproject to the target spatial reference, aligned to `snap` when
    /// given.
    fn reproject(&self, src: &Path, dst: &Path, wkid: u32, snap: Option<&Path>) -> Result<()>;

    /// (width, height) of a raster's cells in linear units.
    fn cell_size(&self, raster: &Path) -> Result<(f64, f64)>;

    /// Rasterize a polygon classifier output on its class-id attribute.
    fn feature_to_raster(&self, src: &Path, class_field: &str, dst: &Path) -> Result<()>;

    /// Remap cell values; pairs are (from, to).
    fn reclassify(&self, src: &Path, remap: &[(u8, u8)], dst: &Path) -> Result<()>;

    /// Extract by mask against a single tile's footprint.
    fn clip_to_tile(&self, src: &Path, file_name: &str, dst: &Path) -> Result<()>;

    /// Extract by mask against a region polygon.
    fn clip_to_region(&self, src: &Path, region_id: u32, dst: &Path) -> Result<()>;

    /// Mosaic clipped tiles into one raster: 2-bit pixels, single band,
    /// nodata sentinel 3.
    fn mosaic(&self, inputs: &[PathBuf], dst: &Path) -> Result<()>;

    /// Trace a raster to polygons without simplification, preserving cell
    /// boundaries exactly. The tracer writes its default `Id`/`gridcode`
    /// fields.
    fn raster_to_polygons(&self, src: &Path, dst: &Path) -> Result<()>;

    fn read_grid(&self, src: &Path) -> Result<RasterGrid>;

    fn write_grid(&self, dst: &Path, grid: &RasterGrid) -> Result<()>;

    // ── Point layers ─────────────────────────────────────────────────────

    /// Write a point layer carrying only geometry and one short label field.
    fn write_point_layer(&self, dst: &Path, field: &str, points: &[GtPoint]) -> Result<()>;

    fn read_point_layer(&self, src: &Path) -> Result<Vec<GtPoint>>;
}
