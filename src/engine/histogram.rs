use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-point scale for accumulated color and depth: 2^16 per unit.
pub const FIXED_ONE: f64 = 65536.0;
const MAX_DEPTH: f32 = 1.0e6;

#[derive(Default)]
struct Cell {
    hits: AtomicU64,
    r: AtomicU64,
    g: AtomicU64,
    b: AtomicU64,
    depth: AtomicU64,
}

/// Plain copy of one cell's totals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellValue {
    pub hits: u64,
    pub rgb: [f32; 3],
    pub depth: f32,
}

impl CellValue {
    pub fn average_depth(&self) -> f32 {
        if self.hits == 0 {
            0.0
        } else {
            self.depth / self.hits as f32
        }
    }
}

/// Per-pixel hit counts plus summed color and depth. Writes are atomic adds,
/// so any number of walkers may splat concurrently through `&self`.
pub struct Histogram {
    width: usize,
    height: usize,
    cells: Box<[Cell]>,
}

impl Histogram {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let cells = (0..width * height).map(|_| Cell::default()).collect();
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Zeroes every cell in place; dimensions are unchanged.
    pub fn clear(&self) {
        for c in self.cells.iter() {
            c.hits.store(0, Ordering::Relaxed);
            c.r.store(0, Ordering::Relaxed);
            c.g.store(0, Ordering::Relaxed);
            c.b.store(0, Ordering::Relaxed);
            c.depth.store(0, Ordering::Relaxed);
        }
    }

    /// Adds one hit with `rgb` color and `depth`. Returns false for
    /// coordinates outside the buffer.
    #[inline]
    pub fn splat(&self, x: usize, y: usize, rgb: [f32; 3], depth: f32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let c = &self.cells[y * self.width + x];
        c.hits.fetch_add(1, Ordering::Relaxed);
        c.r.fetch_add(to_fixed(rgb[0]), Ordering::Relaxed);
        c.g.fetch_add(to_fixed(rgb[1]), Ordering::Relaxed);
        c.b.fetch_add(to_fixed(rgb[2]), Ordering::Relaxed);
        c.depth
            .fetch_add(to_fixed(depth.min(MAX_DEPTH)), Ordering::Relaxed);
        true
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<CellValue> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.cell_at(y * self.width + x))
    }

    pub(crate) fn cell_at(&self, index: usize) -> CellValue {
        let c = &self.cells[index];
        CellValue {
            hits: c.hits.load(Ordering::Relaxed),
            rgb: [
                from_fixed(c.r.load(Ordering::Relaxed)),
                from_fixed(c.g.load(Ordering::Relaxed)),
                from_fixed(c.b.load(Ordering::Relaxed)),
            ],
            depth: from_fixed(c.depth.load(Ordering::Relaxed)),
        }
    }

    pub fn hits(&self, x: usize, y: usize) -> u64 {
        self.cell(x, y).map_or(0, |c| c.hits)
    }

    pub fn max_hits(&self) -> u64 {
        self.cells
            .iter()
            .map(|c| c.hits.load(Ordering::Relaxed))
            .max()
            .unwrap_or(0)
    }

    pub fn total_hits(&self) -> u64 {
        self.cells
            .iter()
            .map(|c| c.hits.load(Ordering::Relaxed))
            .sum()
    }
}

#[inline]
fn to_fixed(v: f32) -> u64 {
    if v.is_finite() && v > 0.0 {
        (v as f64 * FIXED_ONE).round() as u64
    } else {
        0
    }
}

#[inline]
fn from_fixed(v: u64) -> f32 {
    (v as f64 / FIXED_ONE) as f32
}
