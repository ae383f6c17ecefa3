/// Default nodata sentinel for 2-bit canopy rasters: data values are {0, 1},
/// leaving 3 as the out-of-region marker.
pub const NODATA: u8 = 3;

/// A small in-memory raster: row-major u8 cell values plus georeferencing.
///
/// Row 0 is the top of the raster (`ymax`); coordinate math uses f64, cell
/// values are the 2-bit canopy domain {0, 1} plus the nodata sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    /// Row-major cell values.
    pub values: Vec<u8>,
    pub rows: usize,
    pub cols: usize,
    /// World x of the left edge.
    pub xmin: f64,
    /// World y of the top edge.
    pub ymax: f64,
    pub cell_width: f64,
    pub cell_height: f64,
    /// Values >= this sentinel are nodata.
    pub nodata: u8,
}

impl RasterGrid {
    pub fn filled(
        rows: usize,
        cols: usize,
        xmin: f64,
        ymax: f64,
        cell_width: f64,
        cell_height: f64,
        fill: u8,
    ) -> Self {
        Self {
            values: vec![fill; rows * cols],
            rows,
            cols,
            xmin,
            ymax,
            cell_width,
            cell_height,
            nodata: NODATA,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.values[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: u8) {
        self.values[row * self.cols + col] = val;
    }

    pub fn xmax(&self) -> f64 {
        self.xmin + self.cols as f64 * self.cell_width
    }

    pub fn ymin(&self) -> f64 {
        self.ymax - self.rows as f64 * self.cell_height
    }

    /// Map world coordinates to the containing cell.
    ///
    /// `row = floor((ymax - y) / cell_height)`, `col = floor((x - xmin) /
    /// cell_width)`. Returns `None` outside the grid.
    pub fn row_col_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let row = ((self.ymax - y) / self.cell_height).floor();
        let col = ((x - self.xmin) / self.cell_width).floor();
        if row < 0.0 || col < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some((row, col))
    }

    pub fn value_at(&self, x: f64, y: f64) -> Option<u8> {
        self.row_col_at(x, y).map(|(r, c)| self.get(r, c))
    }

    /// Swap canopy and non-canopy: `1 - v` for every data cell. Nodata cells
    /// are preserved exactly, so applying this twice is the identity on the
    /// whole grid.
    pub fn inverted(&self) -> RasterGrid {
        let mut out = self.clone();
        for v in &mut out.values {
            if *v < self.nodata {
                *v = 1 - *v;
            }
        }
        out
    }
}
