use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub cols: usize,
    pub rows: usize,
}

impl GridShape {
    pub const fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    pub fn capacity(&self) -> usize {
        self.cols * self.rows
    }
}

/// Grid used for `count` terminals. Past twelve the grid stays 4x3 and the
/// extra terminals are left out of the grid view.
pub fn grid_shape_for(count: usize) -> GridShape {
    match count {
        0 | 1 => GridShape::new(1, 1),
        2 => GridShape::new(2, 1),
        3 | 4 => GridShape::new(2, 2),
        5 | 6 => GridShape::new(3, 2),
        7..=9 => GridShape::new(3, 3),
        _ => GridShape::new(4, 3),
    }
}

/// Cell rectangles for `count` terminals in row-major order, at most one per
/// grid slot.
pub fn grid_cells(count: usize, bounds: Rect) -> Vec<Rect> {
    let shape = grid_shape_for(count);
    let cell_w = bounds.width / shape.cols as f64;
    let cell_h = bounds.height / shape.rows as f64;
    (0..count.min(shape.capacity()))
        .map(|i| {
            let (row, col) = (i / shape.cols, i % shape.cols);
            Rect::new(
                bounds.x + col as f64 * cell_w,
                bounds.y + row as f64 * cell_h,
                cell_w,
                cell_h,
            )
        })
        .collect()
}
