/// Artifact completion report: walks the results tree and shows, per region,
/// how far each stage has progressed. Read-only — the filesystem is the
/// pipeline's ledger, so this is just a formatted view of it.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use canopy_core::Config;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "status",
    about = "Per-region stage completion report over the results tree"
)]
struct Args {
    /// Path to the pipeline configuration JSON.
    #[arg(short, long)]
    config: PathBuf,

    /// Report only this region directory name (sanitized form).
    #[arg(long)]
    region: Option<String>,

    /// Log level for diagnostics.
    #[arg(long, default_value = "warn")]
    log: String,
}

struct RegionStatus {
    name: String,
    reprojected: usize,
    classified: usize,
    clipped: usize,
    mosaic: bool,
    canopy: bool,
    corrected: bool,
    shapefile: bool,
    gtpoints: bool,
}

fn count_prefixed(dir: &Path, prefix: &str, suffix: &str) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix) && name.ends_with(suffix))
        .count()
}

fn has_artifact(dir: &Path, prefix: &str, year: i32) -> bool {
    let marker = format!("{prefix}_{year}_");
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .any(|name| name.starts_with(&marker))
        })
        .unwrap_or(false)
}

fn region_status(region_dir: &Path, year: i32) -> RegionStatus {
    let inputs = region_dir.join("Inputs");
    let outputs = region_dir.join("Outputs");
    let name = region_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    RegionStatus {
        name,
        // Classifier outputs are also r*.tif, but they live under Outputs.
        reprojected: count_prefixed(&inputs, "r", ".tif"),
        classified: count_prefixed(&outputs, "fr", ".tif"),
        clipped: count_prefixed(&outputs, "cfr", ".tif"),
        mosaic: has_artifact(&outputs, "mosaic", year),
        canopy: has_artifact(&outputs, "canopy", year),
        corrected: has_artifact(&outputs, "corrected_canopy", year),
        shapefile: has_artifact(&outputs, "shp_canopy", year),
        gtpoints: has_artifact(&outputs, "gtpoints", year),
    }
}

fn mark(done: bool) -> &'static str {
    if done {
        "yes"
    } else {
        "-"
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _logger = flexi_logger::Logger::try_with_str(&args.log)?.start()?;

    let config = Config::load(&args.config)?;
    let results = &config.results_path;
    let mut region_dirs: Vec<PathBuf> = fs::read_dir(results)
        .with_context(|| format!("cannot read results root {}", results.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    region_dirs.sort();

    println!(
        "{:<28} {:>6} {:>6} {:>6}  {:>6} {:>6} {:>9} {:>5} {:>8}",
        "region", "repr", "class", "clip", "mosaic", "canopy", "corrected", "shp", "gtpoints"
    );
    for dir in region_dirs {
        let status = region_status(&dir, config.analysis_year);
        if let Some(only) = &args.region {
            if &status.name != only {
                continue;
            }
        }
        println!(
            "{:<28} {:>6} {:>6} {:>6}  {:>6} {:>6} {:>9} {:>5} {:>8}",
            status.name,
            status.reprojected,
            status.classified,
            status.clipped,
            mark(status.mosaic),
            mark(status.canopy),
            mark(status.corrected),
            mark(status.shapefile),
            mark(status.gtpoints),
        );
    }
    Ok(())
}
