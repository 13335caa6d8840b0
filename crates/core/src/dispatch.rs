//! Turns drawing intents into primitive pointer/keyboard actions.
//!
//! Precondition for callers: select the color before drawing. Tool state
//! lives inside Paint and cannot be observed, so nothing here enforces it.

use crate::calibration::{normalize_label, CalibrationProfile};
use crate::canvas::{self, CanvasBounds, NormalizedPoint};
use crate::error::{BrushError, Result};
use crate::logger;
use crate::types::{ScreenPoint, ScreenRect};

/// Caller vocabulary -> calibrated label.
const SYNONYMS: &[(&str, &str)] = &[
    // shapes
    ("circle", "oval"),
    ("ellipse", "oval"),
    ("square", "rectangle"),
    ("rect", "rectangle"),
    ("star", "five point star"),
    ("text", "text tool"),
    ("selection", "select"),
    // colors
    ("blue", "indigo"),
    ("light blue", "torquoise"),
    ("dark blue", "blue grey"),
    ("light green", "lime"),
    ("violet", "lavender"),
    ("pink", "rose"),
    ("black", "black color"),
    ("gray", "gray-50%"),
    ("grey", "gray-50%"),
    ("light gray", "grey-25%"),
    ("light grey", "grey-25%"),
];

/// Offset of the empty-canvas click that drops the current selection.
const DESELECT_CLICK: (i32, i32) = (20, 20);
/// Where the pointer rests after deselecting.
const REST_POINT: (i32, i32) = (50, 50);
/// Rough glyph box of the default text tool font, for the verification rectangle.
const TEXT_CHAR_WIDTH: i32 = 8;
const TEXT_LINE_HEIGHT: i32 = 12;

fn synonym(label: &str) -> Option<&'static str> {
    SYNONYMS.iter().find(|(from, _)| *from == label).map(|(_, to)| *to)
}

fn is_circle(shape: &str) -> bool {
    normalize_label(shape) == "circle"
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommand {
    Shape {
        shape: String,
        color: Option<String>,
        start: NormalizedPoint,
        end: NormalizedPoint,
    },
    Text {
        text: String,
        at: NormalizedPoint,
        color: Option<String>,
    },
    ColorSelect { color: String },
    ToolSelect { tool: String },
}

impl DrawCommand {
    pub fn describe(&self) -> String {
        match self {
            DrawCommand::Shape { shape, start, end, .. } => format!(
                "{} ({}, {})-({}, {})", shape, start.x, start.y, end.x, end.y
            ),
            DrawCommand::Text { text, at, .. } => format!("text \"{}\" at ({}, {})", text, at.x, at.y),
            DrawCommand::ColorSelect { color } => format!("color {}", color),
            DrawCommand::ToolSelect { tool } => format!("tool {}", tool),
        }
    }
}

/// Primitive actions understood by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click(ScreenPoint),
    MoveTo(ScreenPoint),
    /// Press at `from`, move to `to`, release. `constrain` holds the aspect modifier.
    Drag { from: ScreenPoint, to: ScreenPoint, constrain: bool },
    TypeText(String),
}

/// Resolved actions plus the rectangle whose perimeter should change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<Action>,
    /// `None` when the command is not expected to touch the canvas
    pub verify_rect: Option<ScreenRect>,
}

pub struct Dispatcher<'a> {
    profile: &'a CalibrationProfile,
    inset: i32,
}

impl<'a> Dispatcher<'a> {
    pub fn new(profile: &'a CalibrationProfile, inset: i32) -> Self {
        Self { profile, inset }
    }

    /// Calibrated position for a tool or color label.
    ///
    /// The synonym is tried first, then the label as written.
    pub fn resolve_tool(&self, label: &str) -> Result<ScreenPoint> {
        let key = normalize_label(label);
        synonym(&key)
            .and_then(|target| self.profile.get(target))
            .or_else(|| self.profile.get(&key))
            .ok_or_else(|| BrushError::UnknownToolLabel(key))
    }

    pub fn dispatch(&self, command: &DrawCommand, bounds: &CanvasBounds) -> Result<Plan> {
        match command {
            DrawCommand::Shape { shape, color, start, end } => {
                let mut actions = Vec::new();
                if let Some(color) = color {
                    actions.push(Action::Click(self.resolve_tool(color)?));
                }
                actions.push(Action::Click(self.resolve_tool(shape)?));
                actions.push(Action::Click(bounds.center()));

                let square = is_circle(shape);
                let (from, to) = canvas::map_drag(*start, *end, bounds, self.inset, square);
                actions.push(Action::Drag { from, to, constrain: square });
                self.push_deselect(&mut actions, bounds);

                Ok(Plan { actions, verify_rect: Some(ScreenRect::from_corners(from, to)) })
            }
            DrawCommand::Text { text, at, color } => {
                let mut actions = Vec::new();
                if let Some(color) = color {
                    actions.push(Action::Click(self.resolve_tool(color)?));
                }
                actions.push(Action::Click(self.resolve_tool("text")?));
                let point = canvas::to_screen(*at, bounds, self.inset);
                actions.push(Action::Click(point));
                actions.push(Action::TypeText(text.clone()));
                self.push_deselect(&mut actions, bounds);

                let chars = i32::try_from(text.chars().count().max(1)).unwrap_or(i32::MAX);
                // Glyph box, cut at the canvas edge
                let glyph_width = chars.saturating_mul(TEXT_CHAR_WIDTH);
                let rect = ScreenRect {
                    left: point.x,
                    top: point.y,
                    right: point.x.saturating_add(glyph_width - 1).min(bounds.right()),
                    bottom: (point.y + TEXT_LINE_HEIGHT - 1).min(bounds.bottom()),
                };
                Ok(Plan { actions, verify_rect: Some(rect) })
            }
            DrawCommand::ColorSelect { color } => Ok(Plan {
                actions: vec![Action::Click(self.resolve_tool(color)?)],
                verify_rect: None,
            }),
            DrawCommand::ToolSelect { tool } => Ok(Plan {
                actions: vec![Action::Click(self.resolve_tool(tool)?)],
                verify_rect: None,
            }),
        }
    }

    /// Select tool, click an empty corner, park the pointer. Keeps the next
    /// shape from joining the previous one in a multi-selection.
    fn push_deselect(&self, actions: &mut Vec<Action>, bounds: &CanvasBounds) {
        match self.profile.get("select") {
            Some(select) => {
                actions.push(Action::Click(select));
                actions.push(Action::Click(bounds.offset_from_origin(DESELECT_CLICK.0, DESELECT_CLICK.1)));
                actions.push(Action::MoveTo(bounds.offset_from_origin(REST_POINT.0, REST_POINT.1)));
            }
            None => logger::warn_p("exec", "profile has no 'select' position, shape stays selected"),
        }
    }
}
