//! Advisory nodata-gap check for finished mosaics.
//!
//! A thin interior seam of nodata usually means a misaligned or missing
//! input tile; nodata abutting the region boundary is expected. The
//! heuristic: a nodata cell whose 8-neighborhood (itself included) holds at
//! most two nodata cells is probably a single-cell-wide interior gap.
//!
//! Known blind spots, accepted because this is a fast advisory check and not
//! a correctness gate: gaps wider than one cell, and some gaps touching a
//! raster edge, go unflagged.

use crate::grid::RasterGrid;

/// A nodata neighborhood count at or below this flags a probable gap.
const GAP_NEIGHBOR_MAX: usize = 2;

#[derive(Debug, Default)]
pub struct GapReport {
    /// (row, col) of every flagged cell.
    pub flagged: Vec<(usize, usize)>,
}

impl GapReport {
    pub fn gaps_found(&self) -> bool {
        !self.flagged.is_empty()
    }
}

/// Scan a raster for probable interior nodata gaps. Cells at or above the
/// grid's nodata sentinel count as nodata.
pub fn check_gaps(grid: &RasterGrid) -> GapReport {
    let mut flagged = Vec::new();
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            if grid.get(row, col) < grid.nodata {
                continue;
            }
            let mut nodata_count = 0;
            for dr in -1i64..=1 {
                for dc in -1i64..=1 {
                    let r = row as i64 + dr;
                    let c = col as i64 + dc;
                    if r < 0 || c < 0 || r >= grid.rows as i64 || c >= grid.cols as i64 {
                        continue;
                    }
                    if grid.get(r as usize, c as usize) >= grid.nodata {
                        nodata_count += 1;
                    }
                }
            }
            if nodata_count <= GAP_NEIGHBOR_MAX {
                flagged.push((row, col));
            }
        }
    }
    GapReport { flagged }
}
