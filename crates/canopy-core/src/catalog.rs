//! Read-only view over the physiographic region layer.
//!
//! Regions are never created or destroyed here; the only write this module
//! performs is the one-time materialization of the cached area field.

use log::debug;

use crate::config::Config;
use crate::engine::{FieldKind, GeoEngine};
use crate::error::{CanopyError, Result};
use crate::naming::sanitize_region_name;

#[derive(Debug, Clone)]
pub struct Region {
    pub id: u32,
    pub name: String,
    /// Filesystem-safe token used in every artifact path.
    pub dir_name: String,
    pub area_sqkm: f64,
}

/// Regions held in an explicit, enforced order (by name), so every stage
/// iterates them identically across runs.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    /// Load the catalog, sorted by region name. Areas read back as 0 until
    /// [`RegionCatalog::materialize_areas`] has run against the layer.
    pub fn load(engine: &dyn GeoEngine) -> Result<Self> {
        let mut regions = Vec::new();
        for record in engine.regions()? {
            let area_sqkm = engine.region_area_sqkm(record.id).unwrap_or(0.0);
            regions.push(Region {
                dir_name: sanitize_region_name(&record.name),
                id: record.id,
                name: record.name,
                area_sqkm,
            });
        }
        regions.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        debug!("region catalog loaded: {} regions", regions.len());
        Ok(Self { regions })
    }

    /// Drop, re-add, and recompute the cached area field on the region
    /// layer, then reload areas into the catalog. Destructive on purpose: a
    /// stale area field would skew ground-truth point counts.
    pub fn materialize_areas(
        &mut self,
        engine: &dyn GeoEngine,
        config: &Config,
    ) -> Result<()> {
        let layer = &config.phyregs_layer;
        let field = &config.phyregs_area_sqkm_field;
        engine.delete_field(layer, field)?;
        engine.add_field(layer, field, FieldKind::Double)?;
        engine.calculate_area_sqkm(layer, field)?;
        for region in &mut self.regions {
            region.area_sqkm = engine.region_area_sqkm(region.id)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn get(&self, id: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// The requested regions in catalog (name) order. An id with no catalog
    /// entry is fatal: the caller asked for something that cannot exist.
    pub fn subset(&self, ids: &[u32]) -> Result<Vec<&Region>> {
        for &id in ids {
            if self.get(id).is_none() {
                return Err(CanopyError::UnknownRegion(id));
            }
        }
        Ok(self
            .regions
            .iter()
            .filter(|r| ids.contains(&r.id))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
