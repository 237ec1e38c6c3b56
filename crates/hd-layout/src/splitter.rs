use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    /// Panes side by side.
    #[default]
    Horizontal,
    /// Panes stacked top to bottom.
    Vertical,
}

/// Pane sizes of a splitter, in percent of the container. Always sums to 100
/// (when non-empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterSizes {
    sizes: Vec<f64>,
    min_percent: f64,
}

impl SplitterSizes {
    pub fn equal(count: usize, min_percent: f64) -> Self {
        let sizes = if count == 0 {
            Vec::new()
        } else {
            vec![100.0 / count as f64; count]
        };
        Self { sizes, min_percent }
    }

    pub fn sizes(&self) -> &[f64] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn min_percent(&self) -> f64 {
        self.min_percent
    }

    /// Drag boundary `boundary` (between panes `boundary` and `boundary + 1`)
    /// by `delta` percent. Only those two panes change; each stays at or
    /// above the minimum. Returns `false` when nothing moved.
    pub fn resize_boundary(&mut self, boundary: usize, delta: f64) -> bool {
        if boundary + 1 >= self.sizes.len() || !delta.is_finite() {
            return false;
        }
        let (a, b) = (self.sizes[boundary], self.sizes[boundary + 1]);
        let pair = a + b;
        if pair < 2.0 * self.min_percent {
            return false;
        }
        let new_a = (a + delta).clamp(self.min_percent, pair - self.min_percent);
        if new_a == a {
            return false;
        }
        self.sizes[boundary] = new_a;
        self.sizes[boundary + 1] = pair - new_a;
        true
    }

    /// Reorder panes so that new pane `i` takes the size of old pane
    /// `order[i]`. Ignored (returns `false`) unless `order` is a permutation
    /// of the current panes.
    pub fn permute(&mut self, order: &[usize]) -> bool {
        if order.len() != self.sizes.len() {
            return false;
        }
        let mut seen = vec![false; order.len()];
        for &i in order {
            if i >= seen.len() || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        self.sizes = order.iter().map(|&i| self.sizes[i]).collect();
        true
    }

    /// Pane rectangles inside `bounds`.
    pub fn rects(&self, bounds: Rect, direction: SplitDirection) -> Vec<Rect> {
        let mut offset = 0.0;
        self.sizes
            .iter()
            .map(|pct| {
                let frac = pct / 100.0;
                let rect = match direction {
                    SplitDirection::Horizontal => Rect::new(
                        bounds.x + offset * bounds.width,
                        bounds.y,
                        frac * bounds.width,
                        bounds.height,
                    ),
                    SplitDirection::Vertical => Rect::new(
                        bounds.x,
                        bounds.y + offset * bounds.height,
                        bounds.width,
                        frac * bounds.height,
                    ),
                };
                offset += frac;
                rect
            })
            .collect()
    }
}
