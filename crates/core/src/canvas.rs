//! Canvas geometry: where the drawable area sits inside the window, and how
//! normalized 0..=1000 coordinates land on screen pixels.
//!
//! The canvas rectangle is never measured. It is the window's outer rectangle
//! minus fixed chrome margins, which only approximates the real layout and
//! drifts across application versions and DPI settings. Margins therefore live
//! in named presets that settings can select or override.

use serde::{Deserialize, Serialize};

use crate::error::{BrushError, Result};
use crate::logger;
use crate::types::{Region, ScreenPoint, ScreenRect};

/// Upper end of the normalized coordinate range (inclusive).
pub const NORM_MAX: i32 = 1000;

/// Window chrome to subtract from the outer rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub title: i32,
    pub ribbon: i32,
    pub status: i32,
    pub left: i32,
    pub right: i32,
    /// Right margin as a percentage of the window width; wins over `right`.
    #[serde(default)]
    pub right_percent: Option<u32>,
}

impl Margins {
    fn right_px(&self, window_width: i32) -> i32 {
        match self.right_percent {
            Some(pct) => window_width * pct as i32 / 100,
            None => self.right,
        }
    }
}

/// Named margin sets observed on different Paint layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginPreset {
    /// Ribbon Paint with a thin left gutter
    Classic,
    /// Windows 11 Paint, side panel on the right
    Win11,
    /// Canvas framed by rulers on both sides
    Rulers,
}

impl MarginPreset {
    pub fn margins(self) -> Margins {
        match self {
            MarginPreset::Classic => Margins {
                title: 30,
                ribbon: 130,
                status: 30,
                left: 50,
                right: 30,
                right_percent: None,
            },
            MarginPreset::Win11 => Margins {
                title: 32,
                ribbon: 93,
                status: 26,
                left: 10,
                right: 0,
                right_percent: Some(25),
            },
            MarginPreset::Rulers => Margins {
                title: 30,
                ribbon: 115,
                status: 30,
                left: 265,
                right: 265,
                right_percent: None,
            },
        }
    }
}

/// Inferred drawable rectangle in absolute screen coordinates.
///
/// Width and height are always positive: the only way to build one is
/// [`CanvasBounds::new`] (or [`compute_bounds`]), which rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasBounds {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl CanvasBounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self> {
        if right - left <= 0 || bottom - top <= 0 {
            return Err(BrushError::InvalidWindowState(format!(
                "canvas ({}, {}, {}, {}) has no area",
                left, top, right, bottom
            )));
        }
        Ok(Self { left, top, right, bottom })
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.left + self.width() / 2, self.top + self.height() / 2)
    }

    /// Point at a fixed pixel offset from the top-left corner, kept inside.
    pub fn offset_from_origin(&self, dx: i32, dy: i32) -> ScreenPoint {
        ScreenPoint::new(
            (self.left + dx).clamp(self.left, self.right),
            (self.top + dy).clamp(self.top, self.bottom),
        )
    }

    pub fn contains(&self, p: ScreenPoint) -> bool {
        (self.left..=self.right).contains(&p.x) && (self.top..=self.bottom).contains(&p.y)
    }
}

impl std::fmt::Display for CanvasBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}) {}x{}",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// Position in the resolution-independent 0..=1000 space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizedPoint {
    pub x: i32,
    pub y: i32,
}

impl NormalizedPoint {
    /// Build a point, pulling out-of-range input back into 0..=1000.
    pub fn new(x: i32, y: i32) -> Self {
        let p = Self {
            x: x.clamp(0, NORM_MAX),
            y: y.clamp(0, NORM_MAX),
        };
        if p.x != x || p.y != y {
            let e = BrushError::CoordinateOutOfBounds {
                x,
                y,
                range: format!("0..={}", NORM_MAX),
            };
            logger::warn_p("canvas", &e.to_string());
        }
        p
    }
}

/// Subtract the chrome margins from the window's outer rectangle.
pub fn compute_bounds(window: &Region, margins: &Margins) -> Result<CanvasBounds> {
    if window.w <= 0 || window.h <= 0 {
        return Err(BrushError::InvalidWindowState(format!(
            "window rectangle {}x{} is degenerate (minimized?)", window.w, window.h
        )));
    }
    CanvasBounds::new(
        window.l + margins.left,
        window.t + margins.title + margins.ribbon,
        window.r - margins.right_px(window.w),
        window.b - margins.status,
    )
    .map_err(|_| BrushError::InvalidWindowState(format!(
        "window {}x{} is too small for its chrome margins", window.w, window.h
    )))
}

/// Pull `p` into the bounds, `inset` pixels away from every edge.
///
/// The inset shrinks on canvases narrower than twice the inset, so the allowed
/// range never inverts. Idempotent.
pub fn clamp(p: ScreenPoint, bounds: &CanvasBounds, inset: i32) -> ScreenPoint {
    let ix = inset.clamp(0, bounds.width() / 2);
    let iy = inset.clamp(0, bounds.height() / 2);
    ScreenPoint::new(
        p.x.clamp(bounds.left + ix, bounds.right - ix),
        p.y.clamp(bounds.top + iy, bounds.bottom - iy),
    )
}

/// Scale a normalized point onto the canvas, then clamp.
pub fn to_screen(p: NormalizedPoint, bounds: &CanvasBounds, inset: i32) -> ScreenPoint {
    let raw = ScreenPoint::new(
        bounds.left + (p.x as i64 * bounds.width() as i64 / NORM_MAX as i64) as i32,
        bounds.top + (p.y as i64 * bounds.height() as i64 / NORM_MAX as i64) as i32,
    );
    let clamped = clamp(raw, bounds, inset);
    if clamped != raw {
        logger::info_p("canvas", &format!("clamped {} to {} (inset {})", raw, clamped, inset));
    }
    clamped
}

/// Re-derive two corners as a square around their common center.
///
/// The side is the smaller of the two spans. A drag along one axis (one span
/// zero) uses the other span instead, so a flat drag still yields a circle.
/// The radius is then cut down until the square fits inside 0..=1000.
pub fn square_normalized(a: NormalizedPoint, b: NormalizedPoint) -> (NormalizedPoint, NormalizedPoint) {
    let cx = (a.x + b.x) / 2;
    let cy = (a.y + b.y) / 2;
    let span_x = (b.x - a.x).abs();
    let span_y = (b.y - a.y).abs();
    let side = match span_x.min(span_y) {
        0 => span_x.max(span_y),
        s => s,
    };
    let radius = (side / 2).min(cx).min(cy).min(NORM_MAX - cx).min(NORM_MAX - cy);
    (
        NormalizedPoint { x: cx - radius, y: cy - radius },
        NormalizedPoint { x: cx + radius, y: cy + radius },
    )
}

/// Shrink a screen rectangle to a centered square that fits inside it.
pub fn square_screen(rect: ScreenRect) -> ScreenRect {
    let half = rect.width().min(rect.height()) / 2;
    let cx = (rect.left + rect.right).div_euclid(2);
    let cy = (rect.top + rect.bottom).div_euclid(2);
    ScreenRect { left: cx - half, top: cy - half, right: cx + half, bottom: cy + half }
}

/// Map a drag between two normalized points to screen space.
///
/// With `square`, the 1:1 correction runs before scaling and again after
/// clamping, since clamping one corner can stretch the box.
pub fn map_drag(
    start: NormalizedPoint,
    end: NormalizedPoint,
    bounds: &CanvasBounds,
    inset: i32,
    square: bool,
) -> (ScreenPoint, ScreenPoint) {
    if !square {
        return (to_screen(start, bounds, inset), to_screen(end, bounds, inset));
    }
    let (a, b) = square_normalized(start, end);
    let rect = ScreenRect::from_corners(to_screen(a, bounds, inset), to_screen(b, bounds, inset));
    let sq = square_screen(rect);
    (sq.top_left(), sq.bottom_right())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a_bounds() -> CanvasBounds {
        let window = Region::from_ltrb(0, 0, 1920, 1080);
        compute_bounds(&window, &MarginPreset::Classic.margins()).unwrap()
    }

    fn sample_bounds() -> Vec<CanvasBounds> {
        vec![
            scenario_a_bounds(),
            CanvasBounds::new(-1280, 40, -10, 700).unwrap(),
            CanvasBounds::new(100, 100, 105, 103).unwrap(),
            CanvasBounds::new(0, 0, 1, 1).unwrap(),
            CanvasBounds::new(300, 200, 2300, 1400).unwrap(),
        ]
    }

    #[test]
    fn classic_margins_on_full_hd_window() {
        let b = scenario_a_bounds();
        assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (50, 160, 1890, 1050));
        assert_eq!((b.width(), b.height()), (1840, 890));
    }

    #[test]
    fn center_point_maps_to_canvas_center() {
        let p = to_screen(NormalizedPoint::new(500, 500), &scenario_a_bounds(), 10);
        assert_eq!(p, ScreenPoint::new(970, 605));
    }

    #[test]
    fn win11_right_margin_scales_with_window() {
        let window = Region::from_ltrb(0, 0, 2000, 1000);
        let b = compute_bounds(&window, &MarginPreset::Win11.margins()).unwrap();
        assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (10, 125, 1500, 974));
    }

    #[test]
    fn degenerate_window_is_rejected() {
        let minimized = Region::from_ltrb(-32000, -32000, -32000, -32000);
        let err = compute_bounds(&minimized, &MarginPreset::Classic.margins()).unwrap_err();
        assert!(matches!(err, BrushError::InvalidWindowState(_)));

        let tiny = Region::from_ltrb(0, 0, 60, 100);
        let err = compute_bounds(&tiny, &MarginPreset::Classic.margins()).unwrap_err();
        assert!(matches!(err, BrushError::InvalidWindowState(_)));
    }

    #[test]
    fn canvas_bounds_requires_positive_area() {
        assert!(CanvasBounds::new(10, 10, 10, 20).is_err());
        assert!(CanvasBounds::new(10, 20, 30, 5).is_err());
        assert!(CanvasBounds::new(10, 10, 11, 11).is_ok());
    }

    #[test]
    fn normalized_input_is_pulled_into_range() {
        assert_eq!(NormalizedPoint::new(-5, 1200), NormalizedPoint { x: 0, y: 1000 });
        assert_eq!(NormalizedPoint::new(0, 1000), NormalizedPoint { x: 0, y: 1000 });
    }

    #[test]
    fn every_normalized_point_lands_inside_bounds() {
        for bounds in sample_bounds() {
            for x in (0..=NORM_MAX).step_by(37).chain([NORM_MAX]) {
                for y in (0..=NORM_MAX).step_by(41).chain([NORM_MAX]) {
                    let p = to_screen(NormalizedPoint::new(x, y), &bounds, 10);
                    assert!(bounds.contains(p), "{:?} -> {} outside {}", (x, y), p, bounds);
                }
            }
        }
    }

    #[test]
    fn clamp_is_idempotent() {
        let b = scenario_a_bounds();
        let points = [
            ScreenPoint::new(-500, -500),
            ScreenPoint::new(5000, 20),
            ScreenPoint::new(55, 1049),
            ScreenPoint::new(970, 605),
        ];
        for bounds in sample_bounds().into_iter().chain([b]) {
            for p in points {
                let once = clamp(p, &bounds, 10);
                assert_eq!(clamp(once, &bounds, 10), once);
            }
        }
    }

    #[test]
    fn clamp_keeps_inset_from_edges() {
        let b = scenario_a_bounds();
        assert_eq!(clamp(ScreenPoint::new(0, 0), &b, 10), ScreenPoint::new(60, 170));
        assert_eq!(clamp(ScreenPoint::new(9999, 9999), &b, 10), ScreenPoint::new(1880, 1040));
    }

    #[test]
    fn flat_circle_drag_becomes_square_span() {
        let (a, b) = square_normalized(NormalizedPoint::new(300, 200), NormalizedPoint::new(700, 200));
        assert_eq!(b.x - a.x, 400);
        assert_eq!(b.y - a.y, 400);
        assert_eq!((a, b), (NormalizedPoint { x: 300, y: 0 }, NormalizedPoint { x: 700, y: 400 }));
    }

    #[test]
    fn circle_uses_smaller_span() {
        let (a, b) = square_normalized(NormalizedPoint::new(100, 100), NormalizedPoint::new(500, 300));
        assert_eq!((a, b), (NormalizedPoint { x: 200, y: 100 }, NormalizedPoint { x: 400, y: 300 }));
    }

    #[test]
    fn circle_near_edge_shrinks_to_fit_range() {
        let (a, b) = square_normalized(NormalizedPoint::new(900, 900), NormalizedPoint::new(1000, 1000));
        assert!(a.x >= 0 && a.y >= 0 && b.x <= NORM_MAX && b.y <= NORM_MAX);
        assert_eq!(b.x - a.x, b.y - a.y);
    }

    #[test]
    fn circle_stays_square_on_screen() {
        let corners = [
            ((300, 200), (700, 200)),
            ((0, 0), (1000, 1000)),
            ((950, 10), (990, 900)),
            ((10, 10), (11, 12)),
            ((800, 600), (200, 100)),
        ];
        for bounds in sample_bounds() {
            for ((x1, y1), (x2, y2)) in corners {
                let (s, e) = map_drag(
                    NormalizedPoint::new(x1, y1), NormalizedPoint::new(x2, y2), &bounds, 10, true,
                );
                let r = ScreenRect::from_corners(s, e);
                assert!((r.width() - r.height()).abs() <= 1, "{:?} on {}", r, bounds);
                assert!(bounds.contains(s) && bounds.contains(e));
            }
        }
    }

    #[test]
    fn plain_drag_keeps_direction() {
        let b = scenario_a_bounds();
        let (s, e) = map_drag(NormalizedPoint::new(800, 800), NormalizedPoint::new(200, 100), &b, 10, false);
        assert!(s.x > e.x && s.y > e.y);
    }
}
