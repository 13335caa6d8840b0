//! Line-oriented command protocol: `TOOL: <name> | <json params>`.
//!
//! Lines without the `TOOL:` prefix are ignored. A line whose parameters do
//! not parse still counts toward the batch, as a failed command.

use serde_json::{Map, Value};

use crate::canvas::NormalizedPoint;
use crate::dispatch::DrawCommand;
use crate::error::{BrushError, Result};

const PREFIX: &str = "TOOL:";

/// Defaults for a drag with missing coordinates
const DEFAULT_START: (i32, i32) = (300, 200);
const DEFAULT_END: (i32, i32) = (500, 400);
const DEFAULT_TEXT_AT: (i32, i32) = (400, 100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolCommand {
    /// Find, restore and focus the window, then recompute the canvas
    Focus,
    Draw(DrawCommand),
}

/// One `TOOL:` line of a batch
#[derive(Debug)]
pub struct ProtocolLine {
    /// 1-based line number in the batch text
    pub line_no: usize,
    pub tool: String,
    pub raw: String,
    pub command: Result<ProtocolCommand>,
}

/// Parse every `TOOL:` line of `text`.
pub fn parse_batch(text: &str) -> Vec<ProtocolLine> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let (tool, command) = parse_line(line)?;
            Some(ProtocolLine { line_no: i + 1, tool, raw: line.trim().to_string(), command })
        })
        .collect()
}

/// `None` for lines that are not protocol lines at all.
pub fn parse_line(line: &str) -> Option<(String, Result<ProtocolCommand>)> {
    let rest = line.trim().strip_prefix(PREFIX)?;
    let (name, payload) = match rest.split_once('|') {
        Some((name, payload)) => (name.trim(), payload.trim()),
        None => (rest.trim(), ""),
    };
    let tool = name.to_string();
    let command = parse_params(payload).and_then(|params| build(&tool, &params));
    Some((tool, command))
}

fn parse_params(payload: &str) -> Result<Map<String, Value>> {
    if payload.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(BrushError::Protocol(format!("parameters must be an object, got {}", other))),
        Err(e) => Err(BrushError::Protocol(format!("unparsable parameters: {}", e))),
    }
}

/// Integer parameter under the first present key. Floats are rounded and
/// numeric strings accepted.
fn int_param(params: &Map<String, Value>, keys: &[&str], default: i32) -> Result<i32> {
    let Some((key, value)) = keys.iter().find_map(|k| params.get(*k).map(|v| (*k, v))) else {
        return Ok(default);
    };
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    };
    n.map(saturate)
        .ok_or_else(|| BrushError::Protocol(format!("'{}' is not a number: {}", key, value)))
}

fn saturate(n: i64) -> i32 {
    n.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn str_param(params: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| params.get(*k))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required_str(params: &Map<String, Value>, tool: &str, keys: &[&str]) -> Result<String> {
    str_param(params, keys)
        .ok_or_else(|| BrushError::Protocol(format!("{} needs '{}'", tool, keys[0])))
}

fn drag(params: &Map<String, Value>) -> Result<(NormalizedPoint, NormalizedPoint)> {
    let start = NormalizedPoint::new(
        int_param(params, &["start_x", "x1"], DEFAULT_START.0)?,
        int_param(params, &["start_y", "y1"], DEFAULT_START.1)?,
    );
    let end = NormalizedPoint::new(
        int_param(params, &["end_x", "x2"], DEFAULT_END.0)?,
        int_param(params, &["end_y", "y2"], DEFAULT_END.1)?,
    );
    Ok((start, end))
}

fn build(tool: &str, params: &Map<String, Value>) -> Result<ProtocolCommand> {
    let color = || str_param(params, &["color", "color_name"]);
    let draw = match tool {
        "ensure_paint_focused" | "focus_paint" => return Ok(ProtocolCommand::Focus),
        "draw_shape" => {
            let shape = str_param(params, &["shape_type", "shape"]).unwrap_or_else(|| "rectangle".into());
            let (start, end) = drag(params)?;
            DrawCommand::Shape { shape, color: color(), start, end }
        }
        "draw_rectangle" => {
            let (start, end) = drag(params)?;
            DrawCommand::Shape { shape: "rectangle".into(), color: color(), start, end }
        }
        "draw_circle" => {
            let x = i64::from(int_param(params, &["x", "center_x"], 500)?);
            let y = i64::from(int_param(params, &["y", "center_y"], 500)?);
            let r = i64::from(int_param(params, &["radius", "r"], 100)?.unsigned_abs());
            DrawCommand::Shape {
                shape: "circle".into(),
                color: color(),
                start: NormalizedPoint::new(saturate(x - r), saturate(y - r)),
                end: NormalizedPoint::new(saturate(x + r), saturate(y + r)),
            }
        }
        "select_color" => DrawCommand::ColorSelect {
            color: required_str(params, tool, &["color_name", "color"])?,
        },
        "select_tool" => DrawCommand::ToolSelect {
            tool: required_str(params, tool, &["tool_name", "tool"])?,
        },
        "add_text_in_paint" | "draw_text" => DrawCommand::Text {
            text: required_str(params, tool, &["text"])?,
            at: NormalizedPoint::new(
                int_param(params, &["x"], DEFAULT_TEXT_AT.0)?,
                int_param(params, &["y"], DEFAULT_TEXT_AT.1)?,
            ),
            color: color(),
        },
        "open_paint" | "close_paint" | "save_image" => {
            return Err(BrushError::Unsupported(tool.to_string()))
        }
        _ => return Err(BrushError::Protocol(format!("unknown tool '{}'", tool))),
    };
    Ok(ProtocolCommand::Draw(draw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(line: &str) -> DrawCommand {
        match parse_line(line).unwrap().1.unwrap() {
            ProtocolCommand::Draw(d) => d,
            other => panic!("expected draw, got {:?}", other),
        }
    }

    #[test]
    fn non_protocol_lines_are_ignored() {
        let text = "thinking about it\nTOOL: ensure_paint_focused\n\n  # note\nTOOL: select_color | {\"color_name\": \"red\"}\n";
        let lines = parse_batch(text);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_no, 2);
        assert_eq!(lines[0].tool, "ensure_paint_focused");
        assert_eq!(*lines[0].command.as_ref().unwrap(), ProtocolCommand::Focus);
        assert_eq!(lines[1].line_no, 5);
    }

    #[test]
    fn draw_shape_accepts_both_coordinate_spellings() {
        let a = draw(r#"TOOL: draw_shape | {"shape_type": "oval", "start_x": 100, "start_y": 150, "end_x": 400, "end_y": 450}"#);
        let b = draw(r#"TOOL: draw_shape | {"shape_type": "oval", "x1": 100, "y1": 150.4, "x2": "400", "y2": 450}"#);
        assert_eq!(a, b);
        assert_eq!(
            a,
            DrawCommand::Shape {
                shape: "oval".into(),
                color: None,
                start: NormalizedPoint::new(100, 150),
                end: NormalizedPoint::new(400, 450),
            }
        );
    }

    #[test]
    fn missing_coordinates_take_defaults() {
        let d = draw(r#"TOOL: draw_rectangle | {"color": "blue"}"#);
        assert_eq!(
            d,
            DrawCommand::Shape {
                shape: "rectangle".into(),
                color: Some("blue".into()),
                start: NormalizedPoint::new(300, 200),
                end: NormalizedPoint::new(500, 400),
            }
        );
    }

    #[test]
    fn circle_becomes_bounding_box() {
        let d = draw(r#"TOOL: draw_circle | {"x": 500, "y": 500, "radius": 150}"#);
        let DrawCommand::Shape { shape, start, end, .. } = d else { panic!() };
        assert_eq!(shape, "circle");
        assert_eq!(start, NormalizedPoint::new(350, 350));
        assert_eq!(end, NormalizedPoint::new(650, 650));
    }

    #[test]
    fn huge_circle_values_saturate_onto_the_canvas() {
        let d = draw(r#"TOOL: draw_circle | {"x": 500, "y": 500, "radius": 3000000000}"#);
        let DrawCommand::Shape { start, end, .. } = d else { panic!() };
        assert_eq!((start, end), (NormalizedPoint::new(0, 0), NormalizedPoint::new(1000, 1000)));

        let d = draw(r#"TOOL: draw_circle | {"x": 500, "y": 500, "radius": -3000000000}"#);
        let DrawCommand::Shape { start, end, .. } = d else { panic!() };
        assert_eq!((start, end), (NormalizedPoint::new(0, 0), NormalizedPoint::new(1000, 1000)));

        let d = draw(r#"TOOL: draw_circle | {"x": -3000000000, "y": 500, "radius": 100}"#);
        let DrawCommand::Shape { start, end, .. } = d else { panic!() };
        assert_eq!((start, end), (NormalizedPoint::new(0, 400), NormalizedPoint::new(0, 600)));
    }

    #[test]
    fn text_defaults_position() {
        let d = draw(r#"TOOL: add_text_in_paint | {"text": "Hello"}"#);
        assert_eq!(
            d,
            DrawCommand::Text { text: "Hello".into(), at: NormalizedPoint::new(400, 100), color: None }
        );
    }

    #[test]
    fn bad_payloads_are_protocol_errors() {
        for line in [
            "TOOL: draw_shape | {oops",
            "TOOL: draw_shape | [1, 2]",
            r#"TOOL: draw_shape | {"x1": true}"#,
            "TOOL: select_color | {}",
            "TOOL: teleport | {}",
        ] {
            let (_, command) = parse_line(line).unwrap();
            assert!(matches!(command, Err(BrushError::Protocol(_))), "{}", line);
        }
    }

    #[test]
    fn collaborator_tools_are_unsupported() {
        let (tool, command) = parse_line("TOOL: save_image | {\"path\": \"out.png\"}").unwrap();
        assert_eq!(tool, "save_image");
        assert!(matches!(command, Err(BrushError::Unsupported(_))));
    }
}
