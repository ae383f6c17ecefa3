//! Stratified ground-truthing point samples for accuracy assessment.
//!
//! Each selected region gets a random point set whose size is proportional
//! to region area, clamped to a configured range. Every point is labeled
//! with the classification value of the finished raster cell underneath it,
//! flipped for regions with known-inverted classifier output.

use std::collections::HashMap;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalog::{Region, RegionCatalog};
use crate::config::Config;
use crate::engine::{Bounds, GeoEngine, GtPoint};
use crate::error::Result;
use crate::grid::RasterGrid;
use crate::index::TileIndex;
use crate::ledger::Ledger;
use crate::naming::{self, RegionPaths};

/// Label field on generated point sets.
pub const GT_FIELD: &str = "GT";

/// Rejection-sampling attempts per requested point before giving up on a
/// degenerate region geometry.
const MAX_ATTEMPTS_PER_POINT: usize = 10_000;

/// How the per-region point count is derived from region area.
#[derive(Debug, Clone, Copy)]
pub enum PointCountPolicy {
    /// `count = density * area`, clamped.
    Density { per_sqkm: f64 },
    /// Linear interpolation between the area bounds, clamped. The `+ 1`
    /// counts partial points: 0.1 of a point still needs one point.
    AreaInterpolation {
        min_area_sqkm: f64,
        max_area_sqkm: f64,
    },
}

/// Point count for one region. Reversed min/max pairs are swapped rather
/// than rejected; truncation happens before clamping.
pub fn point_count(
    policy: PointCountPolicy,
    area_sqkm: f64,
    min_points: usize,
    max_points: usize,
) -> usize {
    let (min_points, max_points) = if min_points > max_points {
        (max_points, min_points)
    } else {
        (min_points, max_points)
    };
    let raw = match policy {
        PointCountPolicy::Density { per_sqkm } => per_sqkm * area_sqkm,
        PointCountPolicy::AreaInterpolation {
            min_area_sqkm,
            max_area_sqkm,
        } => {
            let (lo, hi) = if min_area_sqkm > max_area_sqkm {
                (max_area_sqkm, min_area_sqkm)
            } else {
                (min_area_sqkm, max_area_sqkm)
            };
            let span = hi - lo;
            if span <= 0.0 {
                min_points as f64 + 1.0
            } else {
                min_points as f64
                    + (max_points - min_points) as f64 / span * (area_sqkm - lo)
                    + 1.0
            }
        }
    };
    (raw.max(0.0) as usize).clamp(min_points, max_points)
}

pub struct GtSampler<'a, E: GeoEngine> {
    config: &'a Config,
    engine: &'a E,
    ledger: &'a dyn Ledger,
    catalog: &'a RegionCatalog,
    index: &'a TileIndex,
}

impl<'a, E: GeoEngine> GtSampler<'a, E> {
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

    /// Generate labeled random point sets for the selected regions. Output
    /// layers carry only geometry and the `GT` field; a region whose point
    /// set already exists is skipped.
    pub fn generate(
        &self,
        region_ids: &[u32],
        policy: PointCountPolicy,
        min_points: usize,
        max_points: usize,
        seed: u64,
    ) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(seed);
        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let out = self.paths(region).gtpoints();
            if self.ledger.is_complete(&out) {
                continue;
            }
            let count = point_count(policy, region.area_sqkm, min_points, max_points);
            info!("{}: point count {count}", region.name);

            let coords = self.random_points(region, count, &mut rng)?;
            let points = self.label_points(region, &coords)?;
            self.engine.write_point_layer(&out, GT_FIELD, &points)?;
            self.ledger.record(&out);
        }
        info!("completed: ground-truth points");
        Ok(())
    }

    /// Carry a prior year's point geometries forward and re-sample labels
    /// against this analysis year's rasters, into a `GT_<year>` field. The
    /// point locations are not re-randomized, so the two sets line up for
    /// change detection.
    pub fn update(&self, region_ids: &[u32], prior_year: i32) -> Result<()> {
        let field = format!("GT_{}", self.config.analysis_year);
        for region in self.catalog.subset(region_ids)? {
            info!("{}", region.name);
            let prior = RegionPaths::new(&self.config.results_path, &region.name, prior_year)
                .gtpoints();
            if !self.ledger.is_complete(&prior) {
                warn!(
                    "{}: no prior point set at {}, skipping",
                    region.name,
                    prior.display()
                );
                continue;
            }
            let out = self.paths(region).gtpoints();
            if self.ledger.is_complete(&out) {
                continue;
            }
            let coords: Vec<(f64, f64)> = self
                .engine
                .read_point_layer(&prior)?
                .iter()
                .map(|p| (p.x, p.y))
                .collect();
            let points = self.label_points(region, &coords)?;
            self.engine.write_point_layer(&out, &field, &points)?;
            self.ledger.record(&out);
        }
        info!("completed: ground-truth update");
        Ok(())
    }

    /// Uniform random points inside the region polygon, by rejection
    /// sampling over its bounding box.
    fn random_points(
        &self,
        region: &Region,
        count: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<(f64, f64)>> {
        let bounds = self.engine.region_bounds(region.id)?;
        let mut coords = Vec::with_capacity(count);
        // gen_range panics on an empty range, so a collapsed bounding box
        // has to bail out before sampling starts.
        if !(bounds.xmax > bounds.xmin && bounds.ymax > bounds.ymin) {
            warn!("{}: degenerate bounding box, no points placed", region.name);
            return Ok(coords);
        }
        let mut attempts = 0usize;
        while coords.len() < count {
            attempts += 1;
            if attempts > count.max(1) * MAX_ATTEMPTS_PER_POINT {
                warn!(
                    "{}: only {} of {count} points placed, geometry too thin?",
                    region.name,
                    coords.len()
                );
                break;
            }
            let x = rng.gen_range(bounds.xmin..bounds.xmax);
            let y = rng.gen_range(bounds.ymin..bounds.ymax);
            if self.engine.region_contains(region.id, x, y)? {
                coords.push((x, y));
            }
        }
        Ok(coords)
    }

    /// Resolve each coordinate's covering tile through the tile index, read
    /// the finished raster value under it, and apply inversion correction
    /// for flagged regions.
    fn label_points(&self, region: &Region, coords: &[(f64, f64)]) -> Result<Vec<GtPoint>> {
        let paths = self.paths(region);
        let inverted = self.config.is_inverted(region.id);

        let mut tiles: Vec<(&str, Bounds)> = Vec::new();
        for file_name in self.index.tiles_for_region(region.id) {
            tiles.push((file_name, self.engine.tile_bounds(file_name)?));
        }
        // Raster cache: each covering tile is opened once per region.
        let mut grids: HashMap<String, Option<RasterGrid>> = HashMap::new();

        let mut points = Vec::with_capacity(coords.len());
        for &(x, y) in coords {
            let covering = tiles
                .iter()
                .find(|(_, bounds)| bounds.contains(x, y))
                .map(|(name, _)| *name);
            let label = match covering {
                Some(file_name) => {
                    let stem = naming::tile_stem(file_name);
                    let grid = grids.entry(file_name.to_string()).or_insert_with(|| {
                        let path = paths.clipped(stem);
                        match self.engine.read_grid(&path) {
                            Ok(grid) => Some(grid),
                            Err(_) => {
                                warn!("no finished raster at {}", path.display());
                                None
                            }
                        }
                    });
                    grid.as_ref().and_then(|g| {
                        g.value_at(x, y).map(|v| {
                            if v < g.nodata && inverted {
                                1 - v
                            } else {
                                v
                            }
                        })
                    })
                }
                None => None,
            };
            points.push(GtPoint { x, y, label });
        }
        Ok(points)
    }
}
