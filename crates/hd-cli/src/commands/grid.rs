use hd_layout::{grid_cells, grid_shape_for, Rect};
use serde_json::json;

/// Run the `grid` subcommand: print the shape and cells for `count` terminals.
pub fn run(count: usize, width: f64, height: f64, as_json: bool) -> anyhow::Result<()> {
    if width <= 0.0 || height <= 0.0 {
        anyhow::bail!("container must have a positive size (got {width}x{height})");
    }
    let bounds = Rect::new(0.0, 0.0, width, height);
    if as_json {
        let value = json!({
            "shape": grid_shape_for(count),
            "cells": grid_cells(count, bounds),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", render(count, bounds));
    }
    Ok(())
}

fn render(count: usize, bounds: Rect) -> String {
    let shape = grid_shape_for(count);
    let mut out = format!("{count} terminals -> {}x{} grid\n", shape.cols, shape.rows);
    for (i, cell) in grid_cells(count, bounds).iter().enumerate() {
        out.push_str(&format!(
            "  [{i}] x={:.0} y={:.0} w={:.0} h={:.0}\n",
            cell.x, cell.y, cell.width, cell.height
        ));
    }
    out
}
