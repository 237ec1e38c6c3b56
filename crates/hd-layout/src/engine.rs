use hd_core::config::{LayoutConfig, LayoutMode};
use tracing::debug;
use uuid::Uuid;

use crate::drop_zone::{self, DropZone};
use crate::geometry::{Point, Rect};
use crate::grid::{self, GridShape};
use crate::splitter::{SplitDirection, SplitterSizes};
use crate::window::WindowLayout;

/// Derives terminal rectangles from the ordered instance list for whichever
/// layout mode is active. Splitter sizes and window geometry are kept across
/// mode switches.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    config: LayoutConfig,
    ids: Vec<Uuid>,
    splitter: SplitterSizes,
    direction: SplitDirection,
    windows: WindowLayout,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig, bounds: Rect) -> Self {
        let splitter = SplitterSizes::equal(0, config.min_split_percent);
        let windows = WindowLayout::new(bounds, config.min_window_width, config.min_window_height);
        Self {
            config,
            ids: Vec::new(),
            splitter,
            direction: SplitDirection::default(),
            windows,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn mode(&self) -> LayoutMode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: LayoutMode) {
        if self.config.mode != mode {
            debug!(from = ?self.config.mode, to = ?mode, "layout mode changed");
            self.config.mode = mode;
        }
    }

    pub fn set_direction(&mut self, direction: SplitDirection) {
        self.direction = direction;
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        self.windows.set_bounds(bounds);
    }

    /// Follow the instance list: order, additions and removals.
    ///
    /// Splitter sizes follow their terminal through a reorder. Any change in
    /// which terminals are shown resets to an equal split.
    pub fn sync(&mut self, ids: &[Uuid]) {
        let order: Option<Vec<usize>> = (ids.len() == self.ids.len())
            .then(|| {
                ids.iter()
                    .map(|id| self.ids.iter().position(|known| known == id))
                    .collect()
            })
            .flatten();
        match order {
            Some(order) if self.splitter.permute(&order) => {}
            _ => self.splitter = SplitterSizes::equal(ids.len(), self.config.min_split_percent),
        }
        self.ids = ids.to_vec();
        self.windows.sync(ids);
    }

    pub fn grid_shape(&self) -> GridShape {
        grid::grid_shape_for(self.ids.len())
    }

    pub fn splitter(&self) -> &SplitterSizes {
        &self.splitter
    }

    pub fn splitter_mut(&mut self) -> &mut SplitterSizes {
        &mut self.splitter
    }

    pub fn windows(&self) -> &WindowLayout {
        &self.windows
    }

    pub fn windows_mut(&mut self) -> &mut WindowLayout {
        &mut self.windows
    }

    pub fn drop_zone_for(&self, pointer: Point, container: Rect) -> DropZone {
        drop_zone::drop_zone_for(pointer, container, &self.config)
    }

    /// Rectangle per terminal in the active mode. In grid mode terminals
    /// beyond the grid capacity get no rectangle.
    pub fn compute(&self, bounds: Rect) -> Vec<(Uuid, Rect)> {
        match self.config.mode {
            LayoutMode::Grid => self
                .ids
                .iter()
                .copied()
                .zip(grid::grid_cells(self.ids.len(), bounds))
                .collect(),
            LayoutMode::Splitter => self
                .ids
                .iter()
                .copied()
                .zip(self.splitter.rects(bounds, self.direction))
                .collect(),
            LayoutMode::Window => self
                .ids
                .iter()
                .filter_map(|id| self.windows.window_state(*id).map(|w| (*id, w.rect())))
                .collect(),
        }
    }
}
