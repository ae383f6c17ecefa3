//! Artifact naming conventions and NAIP filename parsing.
//!
//! Every stage output is keyed by the sanitized region name and the tile
//! filename stem; these helpers are the single source of truth for those
//! paths, so the existence-gated resume protocol always probes the same
//! locations across runs.

use std::path::{Path, PathBuf};

/// Length of the acquisition suffix (`_YYYYMMDD.tif`) that the tile layer's
/// FileName attribute carries after the stem.
const FILE_NAME_SUFFIX_LEN: usize = 13;

/// Point shapefiles cannot be created with spaces or hyphens in their names.
pub fn sanitize_region_name(name: &str) -> String {
    name.replace([' ', '-'], "_")
}

/// Strip the acquisition suffix from a tile layer FileName value:
/// `m_3408301_ne_17_1_20090929_20100214.tif` -> `m_3408301_ne_17_1_20090929`.
pub fn tile_stem(file_name: &str) -> &str {
    &file_name[..file_name.len().saturating_sub(FILE_NAME_SUFFIX_LEN)]
}

/// The 5-digit block code embedded in a tile filename names its storage
/// subfolder in the imagery archive: `m_3408301_ne_17_1_20090929.tif` ->
/// `34083`.
pub fn block_code(filename: &str) -> Option<&str> {
    filename.get(2..7)
}

/// Resolve a tile's GeoTIFF inside the archive tree: `<root>/<block>/<file>`.
pub fn archive_path(naip_root: &Path, filename: &str) -> Option<PathBuf> {
    let block = block_code(filename)?;
    Some(naip_root.join(block).join(filename))
}

/// Derive the bootstrap tile for an absent snap raster by stripping the
/// fixed `r` prefix from its filename.
pub fn snap_bootstrap_tile(snaprast_path: &Path) -> Option<String> {
    let name = snaprast_path.file_name()?.to_str()?;
    name.strip_prefix('r').map(str::to_string)
}

/// Path builders for one region's slice of the results tree.
#[derive(Debug, Clone)]
pub struct RegionPaths {
    pub inputs: PathBuf,
    pub outputs: PathBuf,
    region: String,
    year: i32,
}

impl RegionPaths {
    pub fn new(results_path: &Path, region_name: &str, year: i32) -> Self {
        let region = sanitize_region_name(region_name);
        let root = results_path.join(&region);
        Self {
            inputs: root.join("Inputs"),
            outputs: root.join("Outputs"),
            region,
            year,
        }
    }

    /// Reprojected, snapped NAIP tile.
    pub fn reprojected(&self, stem: &str) -> PathBuf {
        self.inputs.join(format!("r{stem}.tif"))
    }

    /// Classifier output in vector form, if the classifier produced polygons.
    pub fn classifier_vector(&self, stem: &str) -> PathBuf {
        self.outputs.join(format!("r{stem}.shp"))
    }

    /// Classifier output in raster form, {1,2} domain.
    pub fn classifier_raster(&self, stem: &str) -> PathBuf {
        self.outputs.join(format!("r{stem}.tif"))
    }

    /// Classified tile reclassified to the {0,1} canopy domain.
    pub fn classified(&self, stem: &str) -> PathBuf {
        self.outputs.join(format!("fr{stem}.tif"))
    }

    /// Classified tile clipped to its own footprint.
    pub fn clipped(&self, stem: &str) -> PathBuf {
        self.outputs.join(format!("cfr{stem}.tif"))
    }

    /// Region mosaic before clipping to the region polygon.
    pub fn mosaic(&self) -> PathBuf {
        self.outputs
            .join(format!("mosaic_{}_{}.tif", self.year, self.region))
    }

    /// Final per-region canopy raster.
    pub fn canopy(&self) -> PathBuf {
        self.outputs
            .join(format!("canopy_{}_{}.tif", self.year, self.region))
    }

    /// Inversion-corrected canopy raster.
    pub fn corrected(&self) -> PathBuf {
        self.outputs
            .join(format!("corrected_canopy_{}_{}.tif", self.year, self.region))
    }

    /// Vectorized canopy product.
    pub fn shapefile(&self) -> PathBuf {
        self.outputs
            .join(format!("shp_canopy_{}_{}.shp", self.year, self.region))
    }

    /// Ground-truthing point set for this region and year.
    pub fn gtpoints(&self) -> PathBuf {
        self.outputs
            .join(format!("gtpoints_{}_{}.shp", self.year, self.region))
    }
}
