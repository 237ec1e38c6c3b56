use hd_core::config::LayoutConfig;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

/// Region of a container a dragged terminal is hovering over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropZone {
    Top,
    Bottom,
    Left,
    Right,
    Center,
    None,
}

impl DropZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropZone::Top => "top",
            DropZone::Bottom => "bottom",
            DropZone::Left => "left",
            DropZone::Right => "right",
            DropZone::Center => "center",
            DropZone::None => "none",
        }
    }
}

impl std::fmt::Display for DropZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone under `pointer`. Edges are checked top, bottom, left, right, then
/// the centred square; a pointer outside the container, or in none of the
/// zones, yields [`DropZone::None`].
pub fn drop_zone_for(pointer: Point, container: Rect, config: &LayoutConfig) -> DropZone {
    if container.width <= 0.0 || container.height <= 0.0 || !container.contains(pointer) {
        return DropZone::None;
    }
    let edge_x = container.width * config.edge_threshold;
    let edge_y = container.height * config.edge_threshold;

    if pointer.y - container.y < edge_y {
        return DropZone::Top;
    }
    if container.bottom() - pointer.y < edge_y {
        return DropZone::Bottom;
    }
    if pointer.x - container.x < edge_x {
        return DropZone::Left;
    }
    if container.right() - pointer.x < edge_x {
        return DropZone::Right;
    }

    let half = container.width.min(container.height) * config.center_fraction / 2.0;
    let c = container.center();
    if (pointer.x - c.x).abs() <= half && (pointer.y - c.y).abs() <= half {
        return DropZone::Center;
    }
    DropZone::None
}

/// Fixed geometry a window snaps to when dropped on `zone`.
pub fn snap_geometry(zone: DropZone, bounds: Rect) -> Option<Rect> {
    match zone {
        DropZone::Top => Some(bounds.top_half()),
        DropZone::Bottom => Some(bounds.bottom_half()),
        DropZone::Left => Some(bounds.left_half()),
        DropZone::Right => Some(bounds.right_half()),
        DropZone::Center => Some(bounds),
        DropZone::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 500.0)
    }

    #[test]
    fn edges_in_priority_order() {
        let cfg = LayoutConfig::default();
        // Top-left corner is in both the top and left bands; top wins.
        assert_eq!(drop_zone_for(Point::new(10.0, 10.0), container(), &cfg), DropZone::Top);
        assert_eq!(drop_zone_for(Point::new(10.0, 495.0), container(), &cfg), DropZone::Bottom);
        assert_eq!(drop_zone_for(Point::new(50.0, 250.0), container(), &cfg), DropZone::Left);
        assert_eq!(drop_zone_for(Point::new(950.0, 250.0), container(), &cfg), DropZone::Right);
    }

    #[test]
    fn between_edges_and_centre_is_none() {
        let cfg = LayoutConfig::default();
        assert_eq!(drop_zone_for(Point::new(300.0, 250.0), container(), &cfg), DropZone::None);
        assert_eq!(drop_zone_for(Point::new(-1.0, 250.0), container(), &cfg), DropZone::None);
    }

    #[test]
    fn snap_targets() {
        let b = container();
        assert_eq!(snap_geometry(DropZone::Right, b), Some(Rect::new(500.0, 0.0, 500.0, 500.0)));
        assert_eq!(snap_geometry(DropZone::Bottom, b), Some(Rect::new(0.0, 250.0, 1000.0, 250.0)));
        assert_eq!(snap_geometry(DropZone::Center, b), Some(b));
        assert_eq!(snap_geometry(DropZone::None, b), None);
    }
}
