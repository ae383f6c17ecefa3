//! Tile index: which regions does each imagery tile intersect.
//!
//! Built once, single-writer, before any stage pipeline run. The in-memory
//! form is an explicit id set per tile plus a region-to-tiles map; the
//! persisted form on the tile layer keeps the legacy comma-bracketed
//! encoding (`",3,7,"`) so existing LIKE-style `%,id,%` queries elsewhere
//! keep working.

use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::catalog::RegionCatalog;
use crate::config::Config;
use crate::engine::{FieldKind, GeoEngine};
use crate::error::Result;

/// Encode a membership set. Always begins and ends with a comma; ids appear
/// once, ascending. The empty set encodes as `","`.
pub fn encode_membership<I: IntoIterator<Item = u32>>(ids: I) -> String {
    let mut out = String::from(",");
    for id in ids {
        out.push_str(&id.to_string());
        out.push(',');
    }
    out
}

pub fn decode_membership(encoded: &str) -> BTreeSet<u32> {
    encoded
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Substring membership test, the form the encoding was designed for.
pub fn membership_contains(encoded: &str, id: u32) -> bool {
    encoded.contains(&format!(",{id},"))
}

#[derive(Debug, Clone, Default)]
pub struct TileIndex {
    by_tile: BTreeMap<String, BTreeSet<u32>>,
    by_region: BTreeMap<u32, Vec<String>>,
}

impl TileIndex {
    /// Build the index from scratch and persist it onto the tile layer.
    ///
    /// Drops and recreates the membership attribute, initializes every tile
    /// to the empty encoding, then walks regions in catalog (name) order so
    /// reruns write byte-identical values. Safe but wasteful to run twice.
    pub fn build(
        engine: &dyn GeoEngine,
        config: &Config,
        catalog: &RegionCatalog,
    ) -> Result<Self> {
        let layer = &config.naipqq_layer;
        let field = &config.naipqq_phyregs_field;

        engine.delete_field(layer, field)?;
        engine.add_field(layer, field, FieldKind::Text)?;

        let mut by_tile: BTreeMap<String, BTreeSet<u32>> = engine
            .tile_file_names()?
            .into_iter()
            .map(|name| (name, BTreeSet::new()))
            .collect();

        for region in catalog.iter() {
            info!("{}", region.name);
            for tile in engine.tiles_intersecting(region.id)? {
                if let Some(ids) = by_tile.get_mut(&tile) {
                    ids.insert(region.id);
                }
            }
        }

        for (tile, ids) in &by_tile {
            engine.set_tile_field(layer, tile, field, &encode_membership(ids.iter().copied()))?;
        }

        info!("completed: tile index");
        Ok(Self::from_by_tile(by_tile))
    }

    /// Rebuild the in-memory maps from the persisted attribute.
    pub fn load(engine: &dyn GeoEngine, config: &Config) -> Result<Self> {
        let layer = &config.naipqq_layer;
        let field = &config.naipqq_phyregs_field;
        let mut by_tile = BTreeMap::new();
        for tile in engine.tile_file_names()? {
            let encoded = engine.tile_field(layer, &tile, field)?;
            by_tile.insert(tile, decode_membership(&encoded));
        }
        Ok(Self::from_by_tile(by_tile))
    }

    fn from_by_tile(by_tile: BTreeMap<String, BTreeSet<u32>>) -> Self {
        let mut by_region: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for (tile, ids) in &by_tile {
            for &id in ids {
                by_region.entry(id).or_default().push(tile.clone());
            }
        }
        // BTreeMap iteration already yields tiles sorted by filename.
        Self { by_tile, by_region }
    }

    /// Tiles intersecting the region, sorted by filename. Empty for a
    /// region no tile touches.
    pub fn tiles_for_region(&self, region_id: u32) -> &[String] {
        self.by_region
            .get(&region_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn regions_for_tile(&self, file_name: &str) -> Option<&BTreeSet<u32>> {
        self.by_tile.get(file_name)
    }

    pub fn tile_count(&self) -> usize {
        self.by_tile.len()
    }
}
