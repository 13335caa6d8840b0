pub mod stub;
pub mod hotkey;

#[cfg(target_os = "windows")]
pub mod win32;

use crate::error::Result;
use crate::types::*;
use crate::logger;

/// Window discovery and focus. The core never touches window chrome beyond these calls.
pub trait WindowManager {
    /// First visible top-level window whose title matches `pattern` (case-insensitive regex).
    fn find_window(&self, pattern: &str) -> Option<WindowId>;
    fn outer_rect(&self, id: WindowId) -> Option<Region>;
    /// Restore, raise and maximize. Returns whether the window ended up in front.
    fn focus(&mut self, id: WindowId) -> bool;
    fn is_minimized(&self, id: WindowId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Shift,
}

/// Simulated pointer and keyboard.
pub trait InputDevice {
    fn move_to(&mut self, p: ScreenPoint) -> Result<()>;
    fn button_down(&mut self) -> Result<()>;
    fn button_up(&mut self) -> Result<()>;
    fn key_down(&mut self, key: Modifier) -> Result<()>;
    fn key_up(&mut self, key: Modifier) -> Result<()>;
    fn type_text(&mut self, text: &str) -> Result<()>;
    fn cursor_position(&self) -> Option<ScreenPoint>;
    fn screen_size(&self) -> ScreenSize;
}

/// Full-screen raster capture.
pub trait ScreenCapture {
    fn capture(&mut self) -> Option<Capture>;
}

/// Everything a session needs from the OS.
pub trait Platform: WindowManager + InputDevice + ScreenCapture + Send {}

impl<T: WindowManager + InputDevice + ScreenCapture + Send> Platform for T {}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Box::new(stub::StubPlatform::new());
    }
    #[cfg(target_os = "windows")]
    {
        logger::register_prefix("win32", logger::COLOR_GRAY);
        return Box::new(win32::Win32Platform::new());
    }
    #[cfg(not(target_os = "windows"))]
    {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        logger::warn("no native input backend on this OS, using the stub platform");
        return Box::new(stub::StubPlatform::new());
    }
}
