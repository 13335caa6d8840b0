//! Random shape grid, emitted as protocol text so it runs through the same
//! batch path as any other command file.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::canvas::NORM_MAX;

/// Normalized gap between the canvas edge and the grid
const GRID_MARGIN: i32 = 50;
/// Normalized gap between neighbouring cells
const CELL_GAP: i32 = 20;

const SHAPES: &[&str] = &["rectangle", "circle", "triangle"];
const COLORS: &[&str] = &["black", "blue", "red", "green"];

/// `rows` x `cols` cells, each with a random color and shape. The same seed
/// always yields the same text.
pub fn shape_grid(rows: u32, cols: u32, seed: Option<u64>) -> String {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    if rows == 0 || cols == 0 {
        return String::new();
    }

    let cell_w = (NORM_MAX - 2 * GRID_MARGIN) / cols as i32;
    let cell_h = (NORM_MAX - 2 * GRID_MARGIN) / rows as i32;

    let mut out = String::from("TOOL: ensure_paint_focused\n");
    for row in 0..rows as i32 {
        for col in 0..cols as i32 {
            let left = GRID_MARGIN + col * cell_w;
            let top = GRID_MARGIN + row * cell_h;
            let right = left + (cell_w - CELL_GAP).max(1);
            let bottom = top + (cell_h - CELL_GAP).max(1);

            let color = COLORS.choose(&mut rng).copied().unwrap_or("black");
            out.push_str(&format!("TOOL: select_color | {{\"color_name\": \"{}\"}}\n", color));

            match SHAPES[rng.gen_range(0..SHAPES.len())] {
                "circle" => {
                    let radius = (right - left).min(bottom - top) / 3;
                    out.push_str(&format!(
                        "TOOL: draw_circle | {{\"x\": {}, \"y\": {}, \"radius\": {}}}\n",
                        (left + right) / 2, (top + bottom) / 2, radius
                    ));
                }
                shape => out.push_str(&format!(
                    "TOOL: draw_shape | {{\"shape_type\": \"{}\", \"start_x\": {}, \"start_y\": {}, \"end_x\": {}, \"end_y\": {}}}\n",
                    shape, left, top, right, bottom
                )),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DrawCommand;
    use crate::protocol::{parse_batch, ProtocolCommand};

    #[test]
    fn same_seed_same_grid() {
        assert_eq!(shape_grid(3, 3, Some(7)), shape_grid(3, 3, Some(7)));
    }

    #[test]
    fn every_line_parses_and_stays_in_range() {
        let lines = parse_batch(&shape_grid(3, 4, Some(42)));
        assert_eq!(lines.len(), 1 + 3 * 4 * 2);
        for line in &lines {
            match line.command.as_ref().unwrap() {
                ProtocolCommand::Draw(DrawCommand::Shape { start, end, .. }) => {
                    for v in [start.x, start.y, end.x, end.y] {
                        assert!((GRID_MARGIN..=NORM_MAX - GRID_MARGIN).contains(&v), "{}", line.raw);
                    }
                }
                ProtocolCommand::Draw(DrawCommand::ColorSelect { color }) => {
                    assert!(COLORS.contains(&color.as_str()));
                }
                ProtocolCommand::Focus => {}
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn empty_grid_is_empty_batch() {
        assert!(shape_grid(0, 3, Some(1)).is_empty());
    }
}
