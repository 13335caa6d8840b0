use std::ffi::c_void;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
    GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
    SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT,
    VIRTUAL_KEY, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetCursorPos, GetForegroundWindow, GetSystemMetrics, GetWindowRect,
    GetWindowTextW, IsIconic, IsWindowVisible, SetCursorPos, SetForegroundWindow, ShowWindow,
    SM_CXSCREEN, SM_CYSCREEN, SW_MAXIMIZE, SW_RESTORE,
};

use crate::error::{BrushError, Result};
use crate::logger;
use crate::sleep;
use crate::types::*;
use super::{InputDevice, Modifier, ScreenCapture, WindowManager};

fn hwnd(id: WindowId) -> HWND {
    HWND(id as usize as *mut c_void)
}

fn window_id(h: HWND) -> WindowId {
    h.0 as usize as WindowId
}

fn window_title(h: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(h, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

unsafe extern "system" fn collect_window(h: HWND, lparam: LPARAM) -> BOOL {
    let out = &mut *(lparam.0 as *mut Vec<(WindowId, String)>);
    if IsWindowVisible(h).as_bool() {
        let title = window_title(h);
        if !title.is_empty() {
            out.push((window_id(h), title));
        }
    }
    BOOL(1)
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(BrushError::Input(format!("SendInput accepted {} of {} events", sent, inputs.len())));
    }
    Ok(())
}

fn mouse_input(flags: windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT { dx: 0, dy: 0, mouseData: 0, dwFlags: flags, time: 0, dwExtraInfo: 0 },
        },
    }
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT { wVk: vk, wScan: scan, dwFlags: flags, time: 0, dwExtraInfo: 0 },
        },
    }
}

fn virtual_key(key: Modifier) -> VIRTUAL_KEY {
    match key {
        Modifier::Shift => VK_SHIFT,
    }
}

/// Win32 backend: EnumWindows for discovery, SendInput for input, GDI for capture.
pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        Win32Platform
    }
}

impl WindowManager for Win32Platform {
    fn find_window(&self, pattern: &str) -> Option<WindowId> {
        let re = match regex::RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(r) => r,
            Err(e) => {
                logger::error_p("win32", &format!("invalid window pattern '{}': {}", pattern, e));
                return None;
            }
        };

        let mut windows: Vec<(WindowId, String)> = Vec::new();
        let lparam = LPARAM(&mut windows as *mut Vec<(WindowId, String)> as isize);
        if let Err(e) = unsafe { EnumWindows(Some(collect_window), lparam) } {
            logger::warn_p("win32", &format!("EnumWindows failed: {}", e));
        }

        let found = windows.into_iter().find(|(_, title)| re.is_match(title));
        if let Some((id, title)) = &found {
            logger::info_p("win32", &format!("found window \"{}\" (hwnd {:#x})", title, id));
        }
        found.map(|(id, _)| id)
    }

    fn outer_rect(&self, id: WindowId) -> Option<Region> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd(id), &mut rect) }.ok()?;
        Some(Region::from_ltrb(rect.left, rect.top, rect.right, rect.bottom))
    }

    fn focus(&mut self, id: WindowId) -> bool {
        let h = hwnd(id);
        unsafe {
            if IsIconic(h).as_bool() {
                let _ = ShowWindow(h, SW_RESTORE);
                sleep::sleep_ms(500);
            }
            let _ = SetForegroundWindow(h);
            sleep::sleep_ms(500);
            let _ = ShowWindow(h, SW_MAXIMIZE);
            sleep::sleep_ms(500);
            GetForegroundWindow() == h
        }
    }

    fn is_minimized(&self, id: WindowId) -> bool {
        unsafe { IsIconic(hwnd(id)).as_bool() }
    }
}

impl InputDevice for Win32Platform {
    fn move_to(&mut self, p: ScreenPoint) -> Result<()> {
        unsafe { SetCursorPos(p.x, p.y) }
            .map_err(|e| BrushError::Input(format!("SetCursorPos{}: {}", p, e)))
    }

    fn button_down(&mut self) -> Result<()> {
        send(&[mouse_input(MOUSEEVENTF_LEFTDOWN)])
    }

    fn button_up(&mut self) -> Result<()> {
        send(&[mouse_input(MOUSEEVENTF_LEFTUP)])
    }

    fn key_down(&mut self, key: Modifier) -> Result<()> {
        send(&[key_input(virtual_key(key), 0, KEYBD_EVENT_FLAGS(0))])
    }

    fn key_up(&mut self, key: Modifier) -> Result<()> {
        send(&[key_input(virtual_key(key), 0, KEYEVENTF_KEYUP)])
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        // Unicode packets bypass the keyboard layout
        let mut inputs = Vec::with_capacity(text.len() * 4);
        for unit in text.encode_utf16() {
            inputs.push(key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE));
            inputs.push(key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP));
        }
        if inputs.is_empty() {
            return Ok(());
        }
        send(&inputs)
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        let mut p = POINT::default();
        unsafe { GetCursorPos(&mut p) }.ok()?;
        Some(ScreenPoint::new(p.x, p.y))
    }

    fn screen_size(&self) -> ScreenSize {
        unsafe {
            ScreenSize {
                width: GetSystemMetrics(SM_CXSCREEN),
                height: GetSystemMetrics(SM_CYSCREEN),
            }
        }
    }
}

impl ScreenCapture for Win32Platform {
    fn capture(&mut self) -> Option<Capture> {
        let size = self.screen_size();
        if size.width <= 0 || size.height <= 0 {
            return None;
        }
        let (w, h) = (size.width, size.height);

        unsafe {
            let screen_dc = GetDC(HWND::default());
            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, w, h);
            let previous = SelectObject(mem_dc, bitmap);

            let copied = BitBlt(mem_dc, 0, 0, w, h, screen_dc, 0, 0, SRCCOPY).is_ok();

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: w,
                    biHeight: -h, // top-down rows
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut data = vec![0u8; (w * h * 4) as usize];
            let rows = if copied {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    h as u32,
                    Some(data.as_mut_ptr() as *mut c_void),
                    &mut info,
                    DIB_RGB_COLORS,
                )
            } else {
                0
            };

            SelectObject(mem_dc, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(HWND::default(), screen_dc);

            if rows != h {
                logger::warn_p("win32", &format!("screen capture returned {} of {} rows", rows, h));
                return None;
            }
            Some(Capture { data, width: w as u32, height: h as u32, bytes_per_row: w as u32 * 4 })
        }
    }
}
