//! Lattice of candidate routing points around a set of obstacles.

use crate::geom::{Point, Rect};

/// Upper bound on lattice points; larger regions are not searched.
pub const MAX_GRID_CELLS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

/// Points on multiples of the cell size. A point is blocked when strictly
/// inside an obstacle grown by the effective clearance (at least half a
/// cell), so a step between free neighbours never enters an obstacle.
#[derive(Debug, Clone)]
pub struct Grid {
    pub cell_size: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub cols: usize,
    pub rows: usize,
    blocked: Vec<bool>,
}

impl Grid {
    /// Lattice covering `start`, `end` and every obstacle plus `margin`.
    ///
    /// `None` for a non-positive cell size, non-finite input or a region
    /// above [`MAX_GRID_CELLS`].
    pub fn build(
        start: Point,
        end: Point,
        obstacles: &[Rect],
        cell_size: f64,
        clearance: f64,
        margin: f64,
    ) -> Option<Self> {
        if !(cell_size > 0.0) || !cell_size.is_finite() || !start.is_finite() || !end.is_finite() {
            return None;
        }
        let finite: Vec<&Rect> = obstacles.iter().filter(|r| r.is_finite()).collect();

        let mut min_x = start.x.min(end.x);
        let mut min_y = start.y.min(end.y);
        let mut max_x = start.x.max(end.x);
        let mut max_y = start.y.max(end.y);
        for r in &finite {
            min_x = min_x.min(r.x);
            min_y = min_y.min(r.y);
            max_x = max_x.max(r.right());
            max_y = max_y.max(r.bottom());
        }
        let margin = margin.max(0.0);
        let origin_x = ((min_x - margin) / cell_size).floor() * cell_size;
        let origin_y = ((min_y - margin) / cell_size).floor() * cell_size;
        let cols = ((max_x + margin - origin_x) / cell_size).ceil() as usize + 1;
        let rows = ((max_y + margin - origin_y) / cell_size).ceil() as usize + 1;
        if cols.checked_mul(rows).is_none_or(|n| n > MAX_GRID_CELLS) {
            tracing::warn!(cols, rows, "routing region too large");
            return None;
        }

        let effective = clearance.max(cell_size / 2.0);
        let mut grid = Self {
            cell_size,
            origin_x,
            origin_y,
            cols,
            rows,
            blocked: vec![false; cols * rows],
        };
        for r in finite {
            let grown = r.expand(effective);
            let c0 = grid.col_floor(grown.x);
            let c1 = grid.col_ceil(grown.right());
            let r0 = grid.row_floor(grown.y);
            let r1 = grid.row_ceil(grown.bottom());
            for row in r0..=r1 {
                for col in c0..=c1 {
                    let cell = Cell { row, col };
                    if grown.contains_strict(grid.point(cell)) {
                        grid.blocked[row * cols + col] = true;
                    }
                }
            }
        }
        Some(grid)
    }

    fn col_floor(&self, x: f64) -> usize {
        (((x - self.origin_x) / self.cell_size).floor().max(0.0) as usize).min(self.cols - 1)
    }

    fn col_ceil(&self, x: f64) -> usize {
        (((x - self.origin_x) / self.cell_size).ceil().max(0.0) as usize).min(self.cols - 1)
    }

    fn row_floor(&self, y: f64) -> usize {
        (((y - self.origin_y) / self.cell_size).floor().max(0.0) as usize).min(self.rows - 1)
    }

    fn row_ceil(&self, y: f64) -> usize {
        (((y - self.origin_y) / self.cell_size).ceil().max(0.0) as usize).min(self.rows - 1)
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    pub fn index(&self, cell: Cell) -> usize {
        cell.row * self.cols + cell.col
    }

    pub fn cell_of(&self, index: usize) -> Cell {
        Cell {
            row: index / self.cols,
            col: index % self.cols,
        }
    }

    pub fn point(&self, cell: Cell) -> Point {
        Point::new(
            self.origin_x + cell.col as f64 * self.cell_size,
            self.origin_y + cell.row as f64 * self.cell_size,
        )
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked[self.index(cell)]
    }

    /// Lattice point closest to `p`, clamped to the grid.
    pub fn nearest_cell(&self, p: Point) -> Cell {
        let col = ((p.x - self.origin_x) / self.cell_size).round().max(0.0) as usize;
        let row = ((p.y - self.origin_y) / self.cell_size).round().max(0.0) as usize;
        Cell {
            row: row.min(self.rows - 1),
            col: col.min(self.cols - 1),
        }
    }

    /// In-bounds cells at Chebyshev distance exactly `radius`, row-major.
    pub fn ring(&self, center: Cell, radius: usize) -> Vec<Cell> {
        let mut cells = Vec::new();
        let r0 = center.row.saturating_sub(radius);
        let r1 = (center.row + radius).min(self.rows - 1);
        let c0 = center.col.saturating_sub(radius);
        let c1 = (center.col + radius).min(self.cols - 1);
        for row in r0..=r1 {
            for col in c0..=c1 {
                let dist = row.abs_diff(center.row).max(col.abs_diff(center.col));
                if dist == radius {
                    cells.push(Cell { row, col });
                }
            }
        }
        cells
    }

    /// Free orthogonal neighbours in fixed order: up, right, down, left.
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        let up = (cell.row > 0).then(|| Cell {
            row: cell.row - 1,
            col: cell.col,
        });
        let right = (cell.col + 1 < self.cols).then(|| Cell {
            row: cell.row,
            col: cell.col + 1,
        });
        let down = (cell.row + 1 < self.rows).then(|| Cell {
            row: cell.row + 1,
            col: cell.col,
        });
        let left = (cell.col > 0).then(|| Cell {
            row: cell.row,
            col: cell.col - 1,
        });
        [up, right, down, left]
            .into_iter()
            .flatten()
            .filter(move |c| !self.is_blocked(*c))
    }
}
