//! Spatial layouts for the terminal deck.
//!
//! Three interchangeable layouts are derived from the ordered instance list:
//! an automatic grid, a one-dimensional splitter and free-form windows. The
//! drop-zone helpers map a drag pointer onto snap targets.

pub mod drop_zone;
pub mod engine;
pub mod geometry;
pub mod grid;
pub mod splitter;
pub mod window;

pub use drop_zone::{drop_zone_for, snap_geometry, DropZone};
pub use engine::LayoutEngine;
pub use geometry::{Point, Rect};
pub use grid::{grid_cells, grid_shape_for, GridShape};
pub use splitter::{SplitDirection, SplitterSizes};
pub use window::{ResizeHandle, WindowGeometry, WindowLayout};
