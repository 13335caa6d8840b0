/// Window identifier (HWND on Windows, synthetic in the stub)
pub type WindowId = u64;

/// Screen-coordinate bounding box of a window (outer rectangle, chrome included)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub l: i32,
    pub t: i32,
    pub r: i32,
    pub b: i32,
    pub w: i32,
    pub h: i32,
}

impl Region {
    pub fn from_ltrb(l: i32, t: i32, r: i32, b: i32) -> Self {
        Self { l, t, r, b, w: r - l, h: b - t }
    }
}

/// Absolute screen pixel position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Ordered screen rectangle: `left <= right`, `top <= bottom`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    /// Build from two arbitrary corners (drag start/end in any direction).
    pub fn from_corners(a: ScreenPoint, b: ScreenPoint) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn top_left(&self) -> ScreenPoint {
        ScreenPoint::new(self.left, self.top)
    }

    pub fn bottom_right(&self) -> ScreenPoint {
        ScreenPoint::new(self.right, self.bottom)
    }
}

/// Primary display size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

/// Opaque pixel color as read back from a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Raw full-screen pixel data (BGRA), origin at the screen's top-left.
#[derive(Debug, Clone)]
pub struct Capture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl Capture {
    /// A capture filled with one color.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[color.b, color.g, color.r, 0xFF]);
        }
        Self { data, width, height, bytes_per_row: width * 4 }
    }

    /// Color at a screen position, `None` when outside the raster.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let idx = (y as u32 * self.bytes_per_row + x as u32 * 4) as usize;
        let px = self.data.get(idx..idx + 3)?;
        Some(Rgb::new(px[2], px[1], px[0]))
    }

    /// Overwrite one pixel; out-of-raster writes are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = (y as u32 * self.bytes_per_row + x as u32 * 4) as usize;
        if let Some(px) = self.data.get_mut(idx..idx + 3) {
            px[0] = color.b;
            px[1] = color.g;
            px[2] = color.r;
        }
    }

    /// Convert to an RGBA image for writing to disk.
    pub fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.pixel(x as i32, y as i32).unwrap_or_default();
            image::Rgba([c.r, c.g, c.b, 0xFF])
        })
    }
}

/// Status of one protocol line in a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

/// One command of a batch as shown by the TUI
pub struct CommandEntry {
    pub line_no: usize,
    pub text: String,
    pub status: EntryStatus,
    pub reason: Option<String>,
}

impl CommandEntry {
    pub fn new(line_no: usize, text: impl Into<String>) -> Self {
        Self {
            line_no,
            text: text.into(),
            status: EntryStatus::Pending,
            reason: None,
        }
    }
}

/// Command from TUI to the batch runner
pub enum Command {
    StartStop,
    Quit,
}

/// Batch runner lifecycle, shared between the TUI and the runner thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Stopping,
    Finished,
}
