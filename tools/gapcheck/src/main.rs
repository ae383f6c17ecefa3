/// Advisory gap check over a finished canopy raster: decodes the GeoTIFF and
/// flags probable single-cell-wide interior nodata gaps, which usually mean
/// a missing or misaligned input tile. Findings are informational only; the
/// exit code is 0 either way.
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use canopy_core::{check_gaps, RasterGrid};
use clap::Parser;
use tiff::decoder::DecodingResult;

/// How many flagged cells to list before truncating the report.
const MAX_LISTED: usize = 25;

#[derive(Parser, Debug)]
#[command(
    name = "gapcheck",
    about = "Flag probable interior nodata gaps in a canopy raster"
)]
struct Args {
    /// Canopy GeoTIFF to check.
    input: PathBuf,

    /// Values at or above this sentinel count as nodata.
    #[arg(long, default_value = "3")]
    nodata: u8,

    /// Log level for diagnostics.
    #[arg(long, default_value = "warn")]
    log: String,
}

fn read_grid(path: &PathBuf, nodata: u8) -> Result<RasterGrid> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut decoder = tiff::decoder::Decoder::new(BufReader::new(file))
        .with_context(|| format!("{} is not a valid TIFF", path.display()))?;
    let (width, height) = decoder.dimensions().context("dimensions error")?;
    let (cols, rows) = (width as usize, height as usize);
    if cols == 0 || rows == 0 {
        bail!("zero-sized raster: {}", path.display());
    }
    let values = match decoder.read_image().context("decode error")? {
        DecodingResult::U8(v) => v,
        other => bail!(
            "unsupported sample format {:?}; canopy rasters are 8-bit",
            std::mem::discriminant(&other)
        ),
    };
    if values.len() != rows * cols {
        bail!("decoded {} samples for a {rows}x{cols} raster", values.len());
    }
    // The check only needs the cell matrix; georeferencing is irrelevant,
    // so a unit grid anchored at the origin stands in.
    Ok(RasterGrid {
        values,
        rows,
        cols,
        xmin: 0.0,
        ymax: rows as f64,
        cell_width: 1.0,
        cell_height: 1.0,
        nodata,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _logger = flexi_logger::Logger::try_with_str(&args.log)?.start()?;

    let grid = read_grid(&args.input, args.nodata)?;
    let report = check_gaps(&grid);

    if !report.gaps_found() {
        println!(
            "{}: no probable interior gaps ({}x{} cells)",
            args.input.display(),
            grid.rows,
            grid.cols
        );
        return Ok(());
    }

    println!(
        "{}: {} probable interior gap cell(s)",
        args.input.display(),
        report.flagged.len()
    );
    for (row, col) in report.flagged.iter().take(MAX_LISTED) {
        println!("  row {row}, col {col}");
    }
    if report.flagged.len() > MAX_LISTED {
        println!("  ... {} more", report.flagged.len() - MAX_LISTED);
    }
    println!("advisory only: wide gaps and some edge-touching gaps are not detected");
    Ok(())
}
