//! In-memory platform: a fake Paint window on a fake screen.
//!
//! A press-drag-release inks the outline of the dragged box onto the raster,
//! typed text inks a small block at the cursor, and every input event is
//! recorded. Used by `--stub` runs and by the tests.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{BrushError, Result};
use crate::logger;
use crate::types::*;
use super::{InputDevice, Modifier, ScreenCapture, WindowManager};

pub const STUB_WINDOW_ID: WindowId = 30001;

/// One recorded input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Move(ScreenPoint),
    Down,
    Up,
    KeyDown(Modifier),
    KeyUp(Modifier),
    Type(String),
}

pub struct StubState {
    pub title: String,
    pub window: Region,
    pub minimized: bool,
    /// Number of upcoming focus calls that fail
    pub focus_failures: u32,
    pub focus_calls: u32,
    pub screen: ScreenSize,
    pub raster: Capture,
    pub ink: Rgb,
    /// When false, drags and typing leave the raster untouched
    pub inks: bool,
    /// Fail the input call made after this many recorded events
    pub fail_after: Option<usize>,
    pub cursor: ScreenPoint,
    pub button_held: bool,
    pub held_keys: Vec<Modifier>,
    pub events: Vec<InputEvent>,
    press_at: Option<ScreenPoint>,
}

impl StubState {
    fn check_fault(&self) -> Result<()> {
        match self.fail_after {
            Some(n) if self.events.len() >= n => {
                Err(BrushError::Input(format!("injected fault after {} events", n)))
            }
            _ => Ok(()),
        }
    }

    fn ink_outline(&mut self, a: ScreenPoint, b: ScreenPoint) {
        let r = ScreenRect::from_corners(a, b);
        let ink = self.ink;
        for x in r.left..=r.right {
            self.raster.set_pixel(x, r.top, ink);
            self.raster.set_pixel(x, r.bottom, ink);
        }
        for y in r.top..=r.bottom {
            self.raster.set_pixel(r.left, y, ink);
            self.raster.set_pixel(r.right, y, ink);
        }
    }

    fn ink_text(&mut self, at: ScreenPoint, chars: usize) {
        let ink = self.ink;
        let width = (chars as i32 * 8).max(1);
        for y in at.y..at.y + 12 {
            for x in at.x..at.x + width {
                self.raster.set_pixel(x, y, ink);
            }
        }
    }
}

/// Cloneable view into a stub platform's state, for inspection after the
/// platform itself has been boxed and handed to a session.
#[derive(Clone)]
pub struct StubHandle(Arc<Mutex<StubState>>);

impl StubHandle {
    pub fn lock(&self) -> MutexGuard<'_, StubState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct StubPlatform {
    state: Arc<Mutex<StubState>>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::with_window(Region::from_ltrb(0, 0, 1920, 1080))
    }

    pub fn with_window(window: Region) -> Self {
        let screen = ScreenSize { width: 1920, height: 1080 };
        let state = StubState {
            title: "Untitled - Paint".into(),
            window,
            minimized: false,
            focus_failures: 0,
            focus_calls: 0,
            screen,
            raster: Capture::filled(screen.width as u32, screen.height as u32, Rgb::WHITE),
            ink: Rgb::BLACK,
            inks: true,
            fail_after: None,
            cursor: ScreenPoint::new(screen.width / 2, screen.height / 2),
            button_held: false,
            held_keys: Vec::new(),
            events: Vec::new(),
            press_at: None,
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn handle(&self) -> StubHandle {
        StubHandle(Arc::clone(&self.state))
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowManager for StubPlatform {
    fn find_window(&self, pattern: &str) -> Option<WindowId> {
        let s = self.state();
        let found = regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(&s.title))
            .unwrap_or(false);
        logger::info_p("stub", &format!("find_window(\"{}\") -> {}", pattern, found));
        found.then_some(STUB_WINDOW_ID)
    }

    fn outer_rect(&self, id: WindowId) -> Option<Region> {
        let s = self.state();
        if id != STUB_WINDOW_ID {
            return None;
        }
        if s.minimized {
            // Minimized windows report a collapsed off-screen rectangle
            return Some(Region::from_ltrb(-32000, -32000, -32000, -32000));
        }
        Some(s.window)
    }

    fn focus(&mut self, id: WindowId) -> bool {
        let mut s = self.state();
        s.focus_calls += 1;
        logger::info_p("stub", &format!("win({}).focus() #{}", id, s.focus_calls));
        if id != STUB_WINDOW_ID {
            return false;
        }
        if s.focus_failures > 0 {
            s.focus_failures -= 1;
            return false;
        }
        s.minimized = false;
        true
    }

    fn is_minimized(&self, _id: WindowId) -> bool {
        self.state().minimized
    }
}

impl InputDevice for StubPlatform {
    fn move_to(&mut self, p: ScreenPoint) -> Result<()> {
        let mut s = self.state();
        s.check_fault()?;
        s.cursor = p;
        s.events.push(InputEvent::Move(p));
        Ok(())
    }

    fn button_down(&mut self) -> Result<()> {
        let mut s = self.state();
        s.check_fault()?;
        s.button_held = true;
        s.press_at = Some(s.cursor);
        s.events.push(InputEvent::Down);
        Ok(())
    }

    fn button_up(&mut self) -> Result<()> {
        // Release always lands, even after an injected fault
        let mut s = self.state();
        s.button_held = false;
        s.events.push(InputEvent::Up);
        if let Some(from) = s.press_at.take() {
            let to = s.cursor;
            if from != to && s.inks {
                s.ink_outline(from, to);
            }
        }
        Ok(())
    }

    fn key_down(&mut self, key: Modifier) -> Result<()> {
        let mut s = self.state();
        s.check_fault()?;
        if !s.held_keys.contains(&key) {
            s.held_keys.push(key);
        }
        s.events.push(InputEvent::KeyDown(key));
        Ok(())
    }

    fn key_up(&mut self, key: Modifier) -> Result<()> {
        let mut s = self.state();
        s.held_keys.retain(|k| *k != key);
        s.events.push(InputEvent::KeyUp(key));
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        let mut s = self.state();
        s.check_fault()?;
        logger::info_p("stub", &format!("type_text(\"{}\")", text));
        s.events.push(InputEvent::Type(text.to_string()));
        if s.inks && !text.is_empty() {
            let at = s.cursor;
            s.ink_text(at, text.chars().count());
        }
        Ok(())
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        Some(self.state().cursor)
    }

    fn screen_size(&self) -> ScreenSize {
        self.state().screen
    }
}

impl ScreenCapture for StubPlatform {
    fn capture(&mut self) -> Option<Capture> {
        Some(self.state().raster.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_inks_outline_and_click_does_not() {
        let mut p = StubPlatform::new();
        let before = p.capture().unwrap();

        p.move_to(ScreenPoint::new(100, 100)).unwrap();
        p.button_down().unwrap();
        p.button_up().unwrap();
        assert_eq!(p.capture().unwrap().data, before.data);

        p.button_down().unwrap();
        p.move_to(ScreenPoint::new(200, 150)).unwrap();
        p.button_up().unwrap();
        let after = p.capture().unwrap();
        assert_eq!(after.pixel(150, 100), Some(Rgb::BLACK));
        assert_eq!(after.pixel(200, 120), Some(Rgb::BLACK));
        assert_eq!(after.pixel(150, 120), Some(Rgb::WHITE));
    }

    #[test]
    fn focus_failures_are_consumed() {
        let mut p = StubPlatform::new();
        p.handle().lock().focus_failures = 1;
        assert!(!p.focus(STUB_WINDOW_ID));
        assert!(p.focus(STUB_WINDOW_ID));
        assert_eq!(p.handle().lock().focus_calls, 2);
    }

    #[test]
    fn minimized_window_reports_degenerate_rect() {
        let p = StubPlatform::new();
        p.handle().lock().minimized = true;
        let r = p.outer_rect(STUB_WINDOW_ID).unwrap();
        assert_eq!((r.w, r.h), (0, 0));
        assert!(p.is_minimized(STUB_WINDOW_ID));
    }

    #[test]
    fn find_window_matches_title_case_insensitively() {
        let p = StubPlatform::new();
        assert_eq!(p.find_window("PAINT"), Some(STUB_WINDOW_ID));
        assert_eq!(p.find_window("notepad"), None);
    }
}
