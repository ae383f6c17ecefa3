use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CanopyError, Result};

fn default_area_field() -> String {
    "AREA_SQKM".to_string()
}

/// Process-wide configuration, loaded once from a JSON document.
///
/// Stages receive `&Config` and never mutate it. Hot reload is just calling
/// [`Config::load`] again at the orchestration layer; nothing inside a stage
/// ever re-reads the backing file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Polygon layer with the physiographic region catalog.
    pub phyregs_layer: String,
    /// Double field on the region layer that caches computed region area.
    #[serde(default = "default_area_field")]
    pub phyregs_area_sqkm_field: String,
    /// Polygon layer with the NAIP quarter-quad tile footprints.
    pub naipqq_layer: String,
    /// Text field on the tile layer holding the encoded region membership.
    pub naipqq_phyregs_field: String,
    /// Imagery archive root; tiles live under 5-digit block subfolders.
    pub naip_path: PathBuf,
    /// WKID of the target spatial reference.
    pub spatref_wkid: u32,
    /// Reference raster all outputs are grid-aligned to. Bootstrapped from
    /// the archive on first use when absent.
    pub snaprast_path: PathBuf,
    /// Root of the per-region results tree.
    pub results_path: PathBuf,
    pub analysis_year: i32,
    /// Regions whose classifier swapped canopy and non-canopy values.
    #[serde(default)]
    pub inverted_phyreg_ids: Vec<u32>,
    /// 0 = warnings only, 1 = per-region progress, 2 = per-tile detail.
    #[serde(default)]
    pub verbosity: u8,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CanopyError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|e| {
            CanopyError::config(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("phyregs_layer", &self.phyregs_layer),
            ("phyregs_area_sqkm_field", &self.phyregs_area_sqkm_field),
            ("naipqq_layer", &self.naipqq_layer),
            ("naipqq_phyregs_field", &self.naipqq_phyregs_field),
        ] {
            if value.trim().is_empty() {
                return Err(CanopyError::config(format!("{key} must not be empty")));
            }
        }
        for (key, value) in [
            ("naip_path", &self.naip_path),
            ("snaprast_path", &self.snaprast_path),
            ("results_path", &self.results_path),
        ] {
            if value.as_os_str().is_empty() {
                return Err(CanopyError::config(format!("{key} must not be empty")));
            }
        }
        if self.spatref_wkid == 0 {
            return Err(CanopyError::config("spatref_wkid must be a valid WKID"));
        }
        if !(1980..=2100).contains(&self.analysis_year) {
            return Err(CanopyError::config(format!(
                "analysis_year {} is implausible",
                self.analysis_year
            )));
        }
        Ok(())
    }

    pub fn is_inverted(&self, region_id: u32) -> bool {
        self.inverted_phyreg_ids.contains(&region_id)
    }
}
