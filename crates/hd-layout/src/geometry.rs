use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in container coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Edges inclusive.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn top_half(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height / 2.0)
    }

    pub fn bottom_half(&self) -> Rect {
        Rect::new(self.x, self.y + self.height / 2.0, self.width, self.height / 2.0)
    }

    pub fn left_half(&self) -> Rect {
        Rect::new(self.x, self.y, self.width / 2.0, self.height)
    }

    pub fn right_half(&self) -> Rect {
        Rect::new(self.x + self.width / 2.0, self.y, self.width / 2.0, self.height)
    }
}
