use hd_core::config::Config;
use hd_layout::{drop_zone_for, snap_geometry, DropZone, Point, Rect};
use serde_json::json;

/// Run the `drop-zone` subcommand.
pub fn run(
    config: &Config,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    as_json: bool,
) -> anyhow::Result<()> {
    let container = Rect::new(0.0, 0.0, width, height);
    let zone = drop_zone_for(Point::new(x, y), container, &config.layout);
    let snap = snap_geometry(zone, container);
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "zone": zone, "snap": snap }))?
        );
    } else {
        println!("{}", describe(zone, snap));
    }
    Ok(())
}

fn describe(zone: DropZone, snap: Option<Rect>) -> String {
    match snap {
        Some(r) => format!(
            "{zone} -> snap to x={:.0} y={:.0} w={:.0} h={:.0}",
            r.x, r.y, r.width, r.height
        ),
        None => format!("{zone} -> no snap"),
    }
}
