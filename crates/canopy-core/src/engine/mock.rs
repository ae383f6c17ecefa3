//! In-memory engine for pipeline tests: rectangular regions and tiles, grid
//! stores keyed by path. Doubles as the completion ledger so stage logic can
//! be exercised against simulated partial runs without touching a real
//! filesystem or GIS installation.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};

use crate::engine::{Bounds, FieldKind, GeoEngine, GtPoint, RegionRecord};
use crate::grid::{RasterGrid, NODATA};
use crate::ledger::Ledger;

#[derive(Default)]
struct State {
    regions: BTreeMap<u32, (String, Bounds)>,
    tiles: Vec<(String, Bounds)>,
    tile_fields: HashMap<(String, String), String>,
    layer_fields: HashMap<String, BTreeSet<String>>,
    rasters: HashMap<PathBuf, RasterGrid>,
    /// Grid a classifier vector output rasterizes to.
    vector_contents: HashMap<PathBuf, RasterGrid>,
    point_layers: HashMap<PathBuf, (String, Vec<GtPoint>)>,
    /// Every path "on disk", content-bearing or not.
    files: HashSet<PathBuf>,
    areas: HashMap<u32, f64>,
    writes: usize,
}

#[derive(Clone, Default)]
pub(crate) struct MockWorld(Rc<RefCell<State>>);

fn intersect(a: Bounds, b: Bounds) -> Option<Bounds> {
    let xmin = a.xmin.max(b.xmin);
    let ymin = a.ymin.max(b.ymin);
    let xmax = a.xmax.min(b.xmax);
    let ymax = a.ymax.min(b.ymax);
    if xmin < xmax && ymin < ymax {
        Some(Bounds::new(xmin, ymin, xmax, ymax))
    } else {
        None
    }
}

fn clip_grid(grid: &RasterGrid, mask: Bounds) -> Result<RasterGrid> {
    let extent = Bounds::new(grid.xmin, grid.ymin(), grid.xmax(), grid.ymax);
    let win = intersect(extent, mask).ok_or_else(|| anyhow!("mask does not overlap raster"))?;
    let row0 = ((grid.ymax - win.ymax) / grid.cell_height).round() as usize;
    let col0 = ((win.xmin - grid.xmin) / grid.cell_width).round() as usize;
    let rows = ((win.ymax - win.ymin) / grid.cell_height).round() as usize;
    let cols = ((win.xmax - win.xmin) / grid.cell_width).round() as usize;
    let mut out = RasterGrid::filled(
        rows,
        cols,
        win.xmin,
        win.ymax,
        grid.cell_width,
        grid.cell_height,
        grid.nodata,
    );
    for r in 0..rows {
        for c in 0..cols {
            out.set(r, c, grid.get(row0 + r, col0 + c));
        }
    }
    Ok(out)
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&self, id: u32, name: &str, bounds: Bounds) {
        self.0
            .borrow_mut()
            .regions
            .insert(id, (name.to_string(), bounds));
    }

    pub fn add_tile(&self, file_name: &str, bounds: Bounds) {
        self.0
            .borrow_mut()
            .tiles
            .push((file_name.to_string(), bounds));
    }

    /// Seed a raster "on disk", e.g. an archive tile or a prior artifact.
    pub fn add_raster(&self, path: &Path, grid: RasterGrid) {
        let mut s = self.0.borrow_mut();
        s.files.insert(path.to_path_buf());
        s.rasters.insert(path.to_path_buf(), grid);
    }

    /// Seed a classifier vector output with the grid it rasterizes to.
    pub fn add_classifier_vector(&self, path: &Path, grid: RasterGrid) {
        let mut s = self.0.borrow_mut();
        s.files.insert(path.to_path_buf());
        s.vector_contents.insert(path.to_path_buf(), grid);
    }

    pub fn has(&self, path: &Path) -> bool {
        self.0.borrow().files.contains(path)
    }

    pub fn raster(&self, path: &Path) -> Option<RasterGrid> {
        self.0.borrow().rasters.get(path).cloned()
    }

    pub fn point_layer(&self, path: &Path) -> Option<(String, Vec<GtPoint>)> {
        self.0.borrow().point_layers.get(path).cloned()
    }

    pub fn tile_field_value(&self, file_name: &str, field: &str) -> Option<String> {
        self.0
            .borrow()
            .tile_fields
            .get(&(file_name.to_string(), field.to_string()))
            .cloned()
    }

    pub fn layer_fields(&self, layer: &str) -> BTreeSet<String> {
        self.0
            .borrow()
            .layer_fields
            .get(layer)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of artifact-producing engine calls so far.
    pub fn write_count(&self) -> usize {
        self.0.borrow().writes
    }

    fn put_raster(&self, dst: &Path, grid: RasterGrid) -> Result<()> {
        let mut s = self.0.borrow_mut();
        if s.files.contains(dst) {
            bail!("refusing to overwrite {}", dst.display());
        }
        s.files.insert(dst.to_path_buf());
        s.rasters.insert(dst.to_path_buf(), grid);
        s.writes += 1;
        Ok(())
    }

    fn get_raster(&self, src: &Path) -> Result<RasterGrid> {
        self.0
            .borrow()
            .rasters
            .get(src)
            .cloned()
            .ok_or_else(|| anyhow!("raster not found: {}", src.display()))
    }
}

impl GeoEngine for MockWorld {
    fn regions(&self) -> Result<Vec<RegionRecord>> {
        Ok(self
            .0
            .borrow()
            .regions
            .iter()
            .map(|(&id, (name, _))| RegionRecord {
                id,
                name: name.clone(),
            })
            .collect())
    }

    fn tile_file_names(&self) -> Result<Vec<String>> {
        Ok(self.0.borrow().tiles.iter().map(|(n, _)| n.clone()).collect())
    }

    fn tiles_intersecting(&self, region_id: u32) -> Result<Vec<String>> {
        let s = self.0.borrow();
        let (_, region) = s
            .regions
            .get(&region_id)
            .ok_or_else(|| anyhow!("no region {region_id}"))?;
        Ok(s.tiles
            .iter()
            .filter(|(_, b)| intersect(*region, *b).is_some())
            .map(|(n, _)| n.clone())
            .collect())
    }

    fn region_bounds(&self, region_id: u32) -> Result<Bounds> {
        self.0
            .borrow()
            .regions
            .get(&region_id)
            .map(|(_, b)| *b)
            .ok_or_else(|| anyhow!("no region {region_id}"))
    }

    fn region_contains(&self, region_id: u32, x: f64, y: f64) -> Result<bool> {
        Ok(self.region_bounds(region_id)?.contains(x, y))
    }

    fn tile_bounds(&self, file_name: &str) -> Result<Bounds> {
        self.0
            .borrow()
            .tiles
            .iter()
            .find(|(n, _)| n == file_name)
            .map(|(_, b)| *b)
            .ok_or_else(|| anyhow!("no tile {file_name}"))
    }

    fn add_field(&self, layer: &str, field: &str, _kind: FieldKind) -> Result<()> {
        self.0
            .borrow_mut()
            .layer_fields
            .entry(layer.to_string())
            .or_default()
            .insert(field.to_string());
        Ok(())
    }

    fn delete_field(&self, layer: &str, field: &str) -> Result<()> {
        let mut s = self.0.borrow_mut();
        if let Some(fields) = s.layer_fields.get_mut(layer) {
            fields.remove(field);
        }
        let field = field.to_string();
        s.tile_fields.retain(|(_, f), _| *f != field);
        Ok(())
    }

    fn copy_field(&self, layer: &str, from: &str, to: &str) -> Result<()> {
        let s = self.0.borrow();
        let fields = s
            .layer_fields
            .get(layer)
            .ok_or_else(|| anyhow!("no layer {layer}"))?;
        if !fields.contains(from) || !fields.contains(to) {
            bail!("copy_field: missing field on {layer}");
        }
        Ok(())
    }

    fn set_tile_field(
        &self,
        _layer: &str,
        file_name: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        self.0
            .borrow_mut()
            .tile_fields
            .insert((file_name.to_string(), field.to_string()), value.to_string());
        Ok(())
    }

    fn tile_field(&self, _layer: &str, file_name: &str, field: &str) -> Result<String> {
        self.0
            .borrow()
            .tile_fields
            .get(&(file_name.to_string(), field.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("tile {file_name} has no {field} value"))
    }

    fn calculate_area_sqkm(&self, layer: &str, field: &str) -> Result<()> {
        let mut s = self.0.borrow_mut();
        let has_field = s
            .layer_fields
            .get(layer)
            .is_some_and(|f| f.contains(field));
        if !has_field {
            bail!("field {field} does not exist on {layer}");
        }
        let areas: Vec<(u32, f64)> = s
            .regions
            .iter()
            .map(|(&id, (_, b))| (id, (b.xmax - b.xmin) * (b.ymax - b.ymin)))
            .collect();
        s.areas.extend(areas);
        Ok(())
    }

    fn region_area_sqkm(&self, region_id: u32) -> Result<f64> {
        self.0
            .borrow()
            .areas
            .get(&region_id)
            .copied()
            .ok_or_else(|| anyhow!("area not materialized for region {region_id}"))
    }

    fn reproject(&self, src: &Path, dst: &Path, _wkid: u32, _snap: Option<&Path>) -> Result<()> {
        let grid = self.get_raster(src)?;
        self.put_raster(dst, grid)
    }

    fn cell_size(&self, raster: &Path) -> Result<(f64, f64)> {
        let grid = self.get_raster(raster)?;
        Ok((grid.cell_width, grid.cell_height))
    }

    fn feature_to_raster(&self, src: &Path, _class_field: &str, dst: &Path) -> Result<()> {
        let grid = self
            .0
            .borrow()
            .vector_contents
            .get(src)
            .cloned()
            .ok_or_else(|| anyhow!("vector not found: {}", src.display()))?;
        self.put_raster(dst, grid)
    }

    fn reclassify(&self, src: &Path, remap: &[(u8, u8)], dst: &Path) -> Result<()> {
        let mut grid = self.get_raster(src)?;
        for v in &mut grid.values {
            if let Some((_, to)) = remap.iter().find(|(from, _)| from == v) {
                *v = *to;
            }
        }
        self.put_raster(dst, grid)
    }

    fn clip_to_tile(&self, src: &Path, file_name: &str, dst: &Path) -> Result<()> {
        let grid = self.get_raster(src)?;
        let mask = self.tile_bounds(file_name)?;
        self.put_raster(dst, clip_grid(&grid, mask)?)
    }

    fn clip_to_region(&self, src: &Path, region_id: u32, dst: &Path) -> Result<()> {
        let grid = self.get_raster(src)?;
        let mask = self.region_bounds(region_id)?;
        self.put_raster(dst, clip_grid(&grid, mask)?)
    }

    fn mosaic(&self, inputs: &[PathBuf], dst: &Path) -> Result<()> {
        if inputs.is_empty() {
            bail!("mosaic of zero inputs");
        }
        let grids: Vec<RasterGrid> = inputs
            .iter()
            .map(|p| self.get_raster(p))
            .collect::<Result<_>>()?;
        let cw = grids[0].cell_width;
        let ch = grids[0].cell_height;
        let xmin = grids.iter().map(|g| g.xmin).fold(f64::INFINITY, f64::min);
        let ymax = grids.iter().map(|g| g.ymax).fold(f64::NEG_INFINITY, f64::max);
        let xmax = grids.iter().map(|g| g.xmax()).fold(f64::NEG_INFINITY, f64::max);
        let ymin = grids.iter().map(|g| g.ymin()).fold(f64::INFINITY, f64::min);
        let rows = ((ymax - ymin) / ch).round() as usize;
        let cols = ((xmax - xmin) / cw).round() as usize;
        let mut out = RasterGrid::filled(rows, cols, xmin, ymax, cw, ch, NODATA);
        for g in &grids {
            let r0 = ((ymax - g.ymax) / ch).round() as usize;
            let c0 = ((g.xmin - xmin) / cw).round() as usize;
            for r in 0..g.rows {
                for c in 0..g.cols {
                    let v = g.get(r, c);
                    if v < g.nodata {
                        out.set(r0 + r, c0 + c, v);
                    }
                }
            }
        }
        self.put_raster(dst, out)
    }

    fn raster_to_polygons(&self, src: &Path, dst: &Path) -> Result<()> {
        if !self.0.borrow().rasters.contains_key(src) {
            bail!("raster not found: {}", src.display());
        }
        let mut s = self.0.borrow_mut();
        if s.files.contains(dst) {
            bail!("refusing to overwrite {}", dst.display());
        }
        s.files.insert(dst.to_path_buf());
        // Tracer writes its default identifier fields.
        s.layer_fields.insert(
            dst.to_string_lossy().into_owned(),
            ["Id", "gridcode"].iter().map(|f| f.to_string()).collect(),
        );
        s.writes += 1;
        Ok(())
    }

    fn read_grid(&self, src: &Path) -> Result<RasterGrid> {
        self.get_raster(src)
    }

    fn write_grid(&self, dst: &Path, grid: &RasterGrid) -> Result<()> {
        self.put_raster(dst, grid.clone())
    }

    fn write_point_layer(&self, dst: &Path, field: &str, points: &[GtPoint]) -> Result<()> {
        let mut s = self.0.borrow_mut();
        if s.files.contains(dst) {
            bail!("refusing to overwrite {}", dst.display());
        }
        s.files.insert(dst.to_path_buf());
        s.point_layers
            .insert(dst.to_path_buf(), (field.to_string(), points.to_vec()));
        s.writes += 1;
        Ok(())
    }

    fn read_point_layer(&self, src: &Path) -> Result<Vec<GtPoint>> {
        self.0
            .borrow()
            .point_layers
            .get(src)
            .map(|(_, pts)| pts.clone())
            .ok_or_else(|| anyhow!("point layer not found: {}", src.display()))
    }
}

impl Ledger for MockWorld {
    fn is_complete(&self, path: &Path) -> bool {
        self.0.borrow().files.contains(path)
    }

    fn record(&self, _path: &Path) {}

    fn prepare_dir(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}
