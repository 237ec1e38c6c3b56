use hd_core::config::{LayoutConfig, LayoutMode};
use hd_layout::{
    drop_zone_for, grid_shape_for, DropZone, GridShape, LayoutEngine, Point, Rect, ResizeHandle,
};
use uuid::Uuid;

fn bounds() -> Rect {
    Rect::new(0.0, 0.0, 1200.0, 800.0)
}

fn ids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

#[test]
fn grid_shapes_for_five_and_ten() {
    assert_eq!(grid_shape_for(5), GridShape::new(3, 2));
    assert_eq!(grid_shape_for(10), GridShape::new(4, 3));
}

#[test]
fn drop_zone_centre_and_origin() {
    let cfg = LayoutConfig::default();
    let c = bounds();
    assert_eq!(drop_zone_for(c.center(), c, &cfg), DropZone::Center);
    assert_eq!(drop_zone_for(Point::new(0.0, 0.0), c, &cfg), DropZone::Top);
}

#[test]
fn drop_zone_in_offset_container() {
    let cfg = LayoutConfig::default();
    let c = Rect::new(100.0, 100.0, 400.0, 400.0);
    assert_eq!(drop_zone_for(Point::new(300.0, 300.0), c, &cfg), DropZone::Center);
    assert_eq!(drop_zone_for(Point::new(110.0, 300.0), c, &cfg), DropZone::Left);
    assert_eq!(drop_zone_for(Point::new(50.0, 50.0), c, &cfg), DropZone::None);
}

#[test]
fn splitter_resize_keeps_sum_and_neighbours() {
    let mut engine = LayoutEngine::new(LayoutConfig::default(), bounds());
    engine.sync(&ids(5));
    let before = engine.splitter().sizes().to_vec();

    for (boundary, delta) in [(0, 7.5), (3, -13.0), (1, 42.0), (2, -3.25)] {
        let snapshot = engine.splitter().sizes().to_vec();
        engine.splitter_mut().resize_boundary(boundary, delta);
        let after = engine.splitter().sizes();
        for (i, (old, new)) in snapshot.iter().zip(after).enumerate() {
            if i != boundary && i != boundary + 1 {
                assert_eq!(old, new, "pane {i} moved on boundary {boundary}");
            }
        }
        let total: f64 = after.iter().sum();
        assert!((total - 100.0).abs() < 1e-9, "sum drifted to {total}");
        assert!(after.iter().all(|s| *s >= 10.0 - 1e-9));
    }
    assert_ne!(engine.splitter().sizes(), &before[..]);
}

#[test]
fn splitter_sizes_follow_terminals_through_reorder() {
    let list = ids(2);
    let mut engine = LayoutEngine::new(LayoutConfig::default(), Rect::new(0.0, 0.0, 1000.0, 500.0));
    engine.set_mode(LayoutMode::Splitter);
    engine.sync(&list);
    assert!(engine.splitter_mut().resize_boundary(0, 20.0));

    engine.sync(&list);
    assert_eq!(engine.splitter().sizes(), &[70.0, 30.0]);

    engine.sync(&[list[1], list[0]]);
    assert_eq!(engine.splitter().sizes(), &[30.0, 70.0]);
    let rects = engine.compute(Rect::new(0.0, 0.0, 1000.0, 500.0));
    assert_eq!(rects[0], (list[1], Rect::new(0.0, 0.0, 300.0, 500.0)));
    assert_eq!(rects[1], (list[0], Rect::new(300.0, 0.0, 700.0, 500.0)));
}

#[test]
fn splitter_resets_when_the_terminal_set_changes() {
    let list = ids(2);
    let mut engine = LayoutEngine::new(LayoutConfig::default(), bounds());
    engine.sync(&list);
    engine.splitter_mut().resize_boundary(0, 20.0);

    let swapped = vec![list[0], Uuid::new_v4()];
    engine.sync(&swapped);
    assert_eq!(engine.splitter().sizes(), &[50.0, 50.0]);

    engine.sync(&ids(4));
    assert_eq!(engine.splitter().sizes(), &[25.0; 4]);
    engine.sync(&[]);
    assert!(engine.splitter().is_empty());
}

#[test]
fn compute_follows_mode() {
    let list = ids(3);
    let mut engine = LayoutEngine::new(LayoutConfig::default(), bounds());
    engine.sync(&list);

    let grid = engine.compute(bounds());
    assert_eq!(grid.len(), 3);
    assert_eq!(grid[0], (list[0], Rect::new(0.0, 0.0, 600.0, 400.0)));

    engine.set_mode(LayoutMode::Splitter);
    let split = engine.compute(bounds());
    assert_eq!(split.len(), 3);
    assert!((split[1].1.x - 400.0).abs() < 1e-9);

    engine.set_mode(LayoutMode::Window);
    assert!(engine.windows_mut().resize(list[1], ResizeHandle::East, 100.0, 0.0));
    let windows = engine.compute(bounds());
    assert_eq!(windows.len(), 3);
    assert_eq!(windows[1].1.width, 700.0);
}

#[test]
fn grid_leaves_overflow_without_cells() {
    let list = ids(14);
    let mut engine = LayoutEngine::new(LayoutConfig::default(), bounds());
    engine.sync(&list);
    assert_eq!(engine.grid_shape(), GridShape::new(4, 3));
    assert_eq!(engine.compute(bounds()).len(), 12);
}

#[test]
fn geometry_serializes_for_the_ui() {
    let json = serde_json::to_string(&Rect::new(1.0, 2.0, 3.0, 4.0)).expect("serialize");
    assert_eq!(json, r#"{"x":1.0,"y":2.0,"width":3.0,"height":4.0}"#);
    assert_eq!(serde_json::to_string(&DropZone::Center).expect("serialize"), "\"center\"");
}
