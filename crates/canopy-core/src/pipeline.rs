//! The five-stage tile-to-region pipeline.
//!
//! Every stage is scoped to a caller-supplied region subset and gated on the
//! existence of its output artifact: present means done, and nothing is ever
//! overwritten. A killed run leaves partial artifacts that the next
//! invocation picks up where it left off. Two concurrent runs over disjoint
//! region subsets are safe; runs sharing a region are the caller's problem.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::catalog::{Region, RegionCatalog};
use crate::config::Config;
use crate::engine::{FieldKind, GeoEngine};
use crate::error::{CanopyError, Result};
use crate::index::TileIndex;
use crate::ledger::Ledger;
use crate::naming::{self, RegionPaths};

/// Attribute carrying the class id on vector classifier outputs.
const CLASS_ID_FIELD: &str = "CLASS_ID";
/// Classifier raster {1,2} domain remapped to the {0,1} canopy domain.
const CLASSIFIER_REMAP: &[(u8, u8)] = &[(1, 0), (2, 1)];
/// Absolute tolerance for cell-size agreement with the snap raster.
const CELL_SIZE_TOL: f64 = 1e-4;

pub struct Pipeline<'a, E: GeoEngine> {
    config: &'a Config,
    engine: &'a E,
    ledger: &'a dyn Ledger,
    catalog: &'a RegionCatalog,
    index: &'a TileIndex,
}

impl<'a, E: GeoEngine> Pipeline<'a, E> {
    pub fn new(
        config: &'a Config,
        engine: &'a E,
        ledger: &'a dyn Ledger,
        catalog: &'a RegionCatalog,
        index: &'a TileIndex,
    ) -> Self {
        Self {
            config,
            engine,
            ledger,
            catalog,
            index,
        }
    }

    fn paths(&self, region: &Region) -> RegionPaths {
        RegionPaths::new(
            &self.config.results_path,
            &region.name,
            self.config.analysis_year,
        )
    }

    /// Reproject the snap raster's bootstrap tile if the snap raster itself
    /// does not exist yet.
    fn ensure_snap_raster(&self) -> Result<()> {
        let snap = &self.config.snaprast_path;
        if self.ledger.is_complete(snap) {
            return Ok(());
        }
        let tile = naming::snap_bootstrap_tile(snap).ok_or_else(|| {
            CanopyError::config(format!(
                "snap raster {} has no 'r' prefix to derive a bootstrap tile from",
                snap.display()
            ))
        })?;
        let infile = naming::archive_path(&self.config.naip_path, &tile).ok_or_else(|| {
            CanopyError::config(format!("bootstrap tile {tile} has no block code"))
        })?;
        if !self.ledger.is_complete(&infile) {
            return Err(CanopyError::config(format!(
                "bootstrap tile {} not found in archive",
                infile.display()
            )));
        }
        if let Some(parent) = snap.parent() {
            self.ledger.prepare_dir(parent)?;
        }
        self.engine
            .reproject(&infile, snap, self.config.spatref_wkid, None)?;
        self.ledger.record(snap);
        info!("snap raster bootstrapped from {tile}");
        Ok(())
    }

    fn check_cell_size(&self, raster: &Path, snap_cell: (f64, f64)) -> Result<()> {
        let cell = self.engine.cell_size(raster)?;
        if (cell.0 - snap_cell.0).abs() > CELL_SIZE_TOL
            || (cell.1 - snap_cell.1).abs() > CELL_SIZE_TOL
        {
            return Err(CanopyError::CellSizeMismatch {
                raster: raster.to_path_buf(),
                expected: snap_cell.0,
                actual: cell.0,
            });
        }
        Ok(())
    }

    /// Stage 1: reproject and snap every tile intersecting the selected
    /// regions. Tiles absent from the archive are skipped silently so a
    /// sample-area archive still processes; a cell-size mismatch against the
    /// snap raster is fatal. Existing outputs are re-validated on every run:
    /// a misaligned artifact left behind by an aborted run must keep failing
    /// until the operator deletes it or fixes the configuration.
    pub fn reproject_tiles(&self, region_ids: &[u32]) -> Result<()> {
        self.ensure_snap_raster()?;
        let snap_cell = self.engine.cell_size(&self.config.snaprast_path)?;

        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let paths = self.paths(region);
            self.ledger.prepare_dir(&paths.inputs)?;
            self.ledger.prepare_dir(&paths.outputs)?;

            for file_name in self.index.tiles_for_region(region.id) {
                let stem = naming::tile_stem(file_name);
                let tif = format!("{stem}.tif");
                let Some(infile) = naming::archive_path(&self.config.naip_path, &tif) else {
                    continue;
                };
                if !self.ledger.is_complete(&infile) {
                    debug!("not in archive, skipping: {}", infile.display());
                    continue;
                }
                let out = paths.reprojected(stem);
                if self.ledger.is_complete(&out) {
                    self.check_cell_size(&out, snap_cell)?;
                    continue;
                }
                self.engine.reproject(
                    &infile,
                    &out,
                    self.config.spatref_wkid,
                    Some(&self.config.snaprast_path),
                )?;
                self.check_cell_size(&out, snap_cell)?;
                self.ledger.record(&out);
            }
        }
        info!("completed: reproject");
        Ok(())
    }

    /// Stage 2: turn classifier outputs into {0,1} canopy tiles. Vector
    /// outputs are rasterized on their class id; raster outputs have their
    /// {1,2} domain remapped. A tile with neither form present means the
    /// upstream classifier batch is incomplete, which is fatal: silently
    /// skipping it would degrade the mosaic undetectably.
    pub fn classify_tiles(&self, region_ids: &[u32]) -> Result<()> {
        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let paths = self.paths(region);
            let mut missing = Vec::new();

            for file_name in self.index.tiles_for_region(region.id) {
                let stem = naming::tile_stem(file_name);
                let out = paths.classified(stem);
                if self.ledger.is_complete(&out) {
                    continue;
                }
                let vector_in = paths.classifier_vector(stem);
                let raster_in = paths.classifier_raster(stem);
                if self.ledger.is_complete(&vector_in) {
                    self.engine
                        .feature_to_raster(&vector_in, CLASS_ID_FIELD, &out)?;
                } else if self.ledger.is_complete(&raster_in) {
                    self.engine.reclassify(&raster_in, CLASSIFIER_REMAP, &out)?;
                } else {
                    missing.push(stem.to_string());
                    continue;
                }
                self.ledger.record(&out);
            }

            if !missing.is_empty() {
                return Err(CanopyError::MissingClassifierOutputs {
                    region: region.name.clone(),
                    tiles: missing,
                });
            }
        }
        info!("completed: classify");
        Ok(())
    }

    /// Stage 3: clip each classified tile to its own footprint, removing
    /// reprojection padding and tile overlap. Per-tile mask, not per-region.
    pub fn clip_tiles(&self, region_ids: &[u32]) -> Result<()> {
        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let paths = self.paths(region);

            for file_name in self.index.tiles_for_region(region.id) {
                let stem = naming::tile_stem(file_name);
                let out = paths.clipped(stem);
                if self.ledger.is_complete(&out) {
                    continue;
                }
                let src = paths.classified(stem);
                if !self.ledger.is_complete(&src) {
                    debug!("classified tile not ready, skipping: {stem}");
                    continue;
                }
                self.engine.clip_to_tile(&src, file_name, &out)?;
                self.ledger.record(&out);
            }
        }
        info!("completed: clip");
        Ok(())
    }

    /// Stage 4: mosaic a region's clipped tiles and clip the mosaic to the
    /// region polygon. A region missing any clipped tile is skipped whole —
    /// a partial mosaic would silently understate canopy — but the batch
    /// carries on with the other regions.
    pub fn mosaic_regions(&self, region_ids: &[u32]) -> Result<()> {
        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let paths = self.paths(region);
            let canopy = paths.canopy();
            if self.ledger.is_complete(&canopy) {
                continue;
            }

            let tiles = self.index.tiles_for_region(region.id);
            let mut inputs: Vec<PathBuf> = Vec::with_capacity(tiles.len());
            let mut missing = 0usize;
            for file_name in tiles {
                let clipped = paths.clipped(naming::tile_stem(file_name));
                if self.ledger.is_complete(&clipped) {
                    inputs.push(clipped);
                } else {
                    missing += 1;
                }
            }
            if inputs.is_empty() {
                warn!("{}: no clipped tiles yet, skipping mosaic", region.name);
                continue;
            }
            if missing > 0 {
                warn!(
                    "{}: {missing} of {} clipped tiles not ready, skipping mosaic",
                    region.name,
                    tiles.len()
                );
                continue;
            }

            let mosaic = paths.mosaic();
            if !self.ledger.is_complete(&mosaic) {
                self.engine.mosaic(&inputs, &mosaic)?;
                self.ledger.record(&mosaic);
            }
            self.engine.clip_to_region(&mosaic, region.id, &canopy)?;
            self.ledger.record(&canopy);
        }
        info!("completed: mosaic");
        Ok(())
    }

    /// Stages 2-4 in order: classifier outputs all the way to per-region
    /// canopy rasters.
    pub fn classify_to_canopy(&self, region_ids: &[u32]) -> Result<()> {
        self.classify_tiles(region_ids)?;
        self.clip_tiles(region_ids)?;
        self.mosaic_regions(region_ids)
    }

    /// Stage 5: correct regions whose classifier swapped canopy and
    /// non-canopy. Writes a new artifact; the original canopy raster is
    /// left untouched.
    pub fn correct_inverted(&self, region_ids: &[u32]) -> Result<()> {
        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let paths = self.paths(region);
            let canopy = paths.canopy();
            if !self.ledger.is_complete(&canopy) {
                debug!("{}: canopy raster not ready, skipping", region.name);
                continue;
            }
            let corrected = paths.corrected();
            if self.ledger.is_complete(&corrected) {
                continue;
            }
            let grid = self.engine.read_grid(&canopy)?;
            self.engine.write_grid(&corrected, &grid.inverted())?;
            self.ledger.record(&corrected);
        }
        info!("completed: inversion correction");
        Ok(())
    }

    /// Optional final stage: trace the corrected raster if one exists, else
    /// the canopy raster, to polygons with cell boundaries preserved. The
    /// human-readable `Canopy` field mirrors the class code; the tracer's
    /// default identifier fields are dropped.
    pub fn vectorize(&self, region_ids: &[u32]) -> Result<()> {
        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let paths = self.paths(region);
            let shp = paths.shapefile();
            if self.ledger.is_complete(&shp) {
                continue;
            }
            let corrected = paths.corrected();
            let canopy = paths.canopy();
            let src = if self.ledger.is_complete(&corrected) {
                corrected
            } else if self.ledger.is_complete(&canopy) {
                canopy
            } else {
                debug!("{}: no raster to vectorize, skipping", region.name);
                continue;
            };

            self.engine.raster_to_polygons(&src, &shp)?;
            let layer = shp.to_string_lossy();
            self.engine.add_field(&layer, "Canopy", FieldKind::Short)?;
            self.engine.copy_field(&layer, "gridcode", "Canopy")?;
            self.engine.delete_field(&layer, "Id")?;
            self.engine.delete_field(&layer, "gridcode")?;
            self.ledger.record(&shp);
        }
        info!("completed: vectorize");
        Ok(())
    }
}
