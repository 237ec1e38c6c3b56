use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::drop_zone::{snap_geometry, DropZone};
use crate::geometry::Rect;

/// Offset between successive default window positions.
const CASCADE_STEP: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub z_index: u32,
}

impl WindowGeometry {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Edge or corner a window is being resized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeHandle {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeHandle {
    fn moves_west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    fn moves_east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    fn moves_north(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    fn moves_south(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }
}

/// Free-form window geometry, one entry per terminal. Ephemeral: nothing
/// here is persisted.
#[derive(Debug, Clone)]
pub struct WindowLayout {
    bounds: Rect,
    min_width: f64,
    min_height: f64,
    windows: HashMap<Uuid, WindowGeometry>,
}

impl WindowLayout {
    pub fn new(bounds: Rect, min_width: f64, min_height: f64) -> Self {
        Self {
            bounds,
            min_width,
            min_height,
            windows: HashMap::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn window_state(&self, id: Uuid) -> Option<&WindowGeometry> {
        self.windows.get(&id)
    }

    /// Window currently on top.
    pub fn top(&self) -> Option<Uuid> {
        self.windows
            .iter()
            .max_by_key(|(_, w)| w.z_index)
            .map(|(id, _)| *id)
    }

    fn max_z(&self) -> u32 {
        self.windows.values().map(|w| w.z_index).max().unwrap_or(0)
    }

    /// Give new ids a cascaded default window and forget ids that are gone.
    pub fn sync(&mut self, ids: &[Uuid]) {
        self.windows.retain(|id, _| ids.contains(id));
        for (i, id) in ids.iter().enumerate() {
            if self.windows.contains_key(id) {
                continue;
            }
            let geometry = self.default_geometry(i);
            self.windows.insert(*id, geometry);
        }
    }

    fn default_geometry(&self, index: usize) -> WindowGeometry {
        let width = (self.bounds.width / 2.0).max(self.min_width);
        let height = (self.bounds.height / 2.0).max(self.min_height);
        let step = CASCADE_STEP * (index % 8) as f64;
        WindowGeometry {
            x: self.bounds.x + step,
            y: self.bounds.y + step,
            width,
            height,
            z_index: self.max_z() + 1,
        }
    }

    /// Raise `id` above every other window. Returns `false` for unknown ids.
    pub fn focus(&mut self, id: Uuid) -> bool {
        let top = self.max_z();
        let tied = self.windows.values().filter(|w| w.z_index == top).count() > 1;
        match self.windows.get_mut(&id) {
            Some(w) => {
                if w.z_index != top || tied {
                    w.z_index = top + 1;
                }
                true
            }
            None => false,
        }
    }

    /// Move `id` to (`x`, `y`) and raise it.
    pub fn move_to(&mut self, id: Uuid, x: f64, y: f64) -> bool {
        let z = self.max_z() + 1;
        match self.windows.get_mut(&id) {
            Some(w) => {
                w.x = x;
                w.y = y;
                w.z_index = z;
                true
            }
            None => false,
        }
    }

    /// Drag `handle` by (`dx`, `dy`). The opposite edge stays put and the
    /// window never shrinks below the minimum size.
    pub fn resize(&mut self, id: Uuid, handle: ResizeHandle, dx: f64, dy: f64) -> bool {
        let (min_w, min_h) = (self.min_width, self.min_height);
        let Some(w) = self.windows.get_mut(&id) else {
            return false;
        };
        if handle.moves_east() {
            w.width = (w.width + dx).max(min_w);
        }
        if handle.moves_west() {
            let right = w.x + w.width;
            w.width = (w.width - dx).max(min_w);
            w.x = right - w.width;
        }
        if handle.moves_south() {
            w.height = (w.height + dy).max(min_h);
        }
        if handle.moves_north() {
            let bottom = w.y + w.height;
            w.height = (w.height - dy).max(min_h);
            w.y = bottom - w.height;
        }
        true
    }

    /// Snap `id` to the fixed geometry of `zone` and raise it. A drop on
    /// [`DropZone::None`] leaves the window where it is.
    pub fn snap(&mut self, id: Uuid, zone: DropZone) -> bool {
        let Some(target) = snap_geometry(zone, self.bounds) else {
            return false;
        };
        let z = self.max_z() + 1;
        match self.windows.get_mut(&id) {
            Some(w) => {
                *w = WindowGeometry {
                    x: target.x,
                    y: target.y,
                    width: target.width,
                    height: target.height,
                    z_index: z,
                };
                true
            }
            None => false,
        }
    }
}
