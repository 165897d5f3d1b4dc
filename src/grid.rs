//! Grid layout math.
//!
//! A [`GridPlan`] tiles a rectangular area into `cols × rows` cells.  Cell
//! edges are computed by integer flooring of `width * col / cols` on both
//! sides, so neighbouring cells share an edge exactly and the tiling covers
//! the whole area with no leftover pixels.  Padding is then taken off each
//! side of every cell.
//!
//! Nothing here talks to a platform; [`crate::arrange`] drives the
//! platform with the rectangles computed here.

use crate::model::Rect;

/// A computed tiling.  Derived per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridPlan {
    pub cols: usize,
    pub rows: usize,
    /// One rectangle per placed window, in row-major order.
    pub cells: Vec<Rect>,
}

/// Pick a column/row count for `count` windows on a display `width` pixels
/// wide.
///
/// Wide displays raise the column count (>1920 ⇒ ≥3, >2560 ⇒ ≥4,
/// >3000 ⇒ ≥5), but never beyond one column per window.
pub fn auto_grid(count: usize, width: i32) -> (usize, usize) {
    let count = count.max(1);
    let base = match count {
        1 => 1,
        2 => 2,
        3 => 3,
        4..=6 => 3,
        7..=8 => 4,
        9..=12 => 4,
        13..=20 => 5,
        _ => 6,
    };
    let floor = if width > 3000 {
        5
    } else if width > 2560 {
        4
    } else if width > 1920 {
        3
    } else {
        1
    };
    let cols = base.max(floor.min(count));
    (cols, count.div_ceil(cols).max(1))
}

/// Resolve requested dimensions, filling in whichever side is missing.
///
/// The result always has room for `count` cells: an explicit column count
/// wins and rows grow to fit.
pub fn dimensions(
    count: usize,
    cols: Option<usize>,
    rows: Option<usize>,
    width: i32,
) -> (usize, usize) {
    let n = count.max(1);
    match (cols.filter(|c| *c > 0), rows.filter(|r| *r > 0)) {
        (Some(c), Some(r)) => (c, r.max(n.div_ceil(c))),
        (Some(c), None) => (c, n.div_ceil(c)),
        (None, Some(r)) => {
            let c = n.div_ceil(r);
            (c, r.max(n.div_ceil(c)))
        }
        (None, None) => auto_grid(n, width),
    }
}

/// Offset of edge `k` of `parts` equal divisions of `length`.
fn edge(length: i32, k: usize, parts: usize) -> i32 {
    ((i64::from(length) * k as i64) / parts as i64) as i32
}

/// Rectangle spanning cells `col0..=col1` × `row0..=row1`, padded.
pub fn span_rect(
    area: Rect,
    cols: usize,
    rows: usize,
    (col0, row0): (usize, usize),
    (col1, row1): (usize, usize),
    pad: i32,
) -> Rect {
    let cols = cols.max(1);
    let rows = rows.max(1);
    let x1 = area.x + edge(area.w, col0, cols) + pad;
    let x2 = area.x + edge(area.w, col1 + 1, cols) - pad;
    let y1 = area.y + edge(area.h, row0, rows) + pad;
    let y2 = area.y + edge(area.h, row1 + 1, rows) - pad;
    Rect::from_edges(x1, y1, x2, y2)
}

/// Rectangle of the cell at flattened index `i`.
pub fn cell_rect(area: Rect, cols: usize, rows: usize, i: usize, pad: i32) -> Rect {
    let cols = cols.max(1);
    let col = i % cols;
    let row = i / cols;
    span_rect(area, cols, rows, (col, row), (col, row), pad)
}

/// Tile `area` for `count` windows.
pub fn plan(area: Rect, cols: usize, rows: usize, count: usize, pad: i32) -> GridPlan {
    let cols = cols.max(1);
    let rows = rows.max(count.div_ceil(cols)).max(1);
    GridPlan {
        cols,
        rows,
        cells: (0..count).map(|i| cell_rect(area, cols, rows, i, pad)).collect(),
    }
}

//  Tests
