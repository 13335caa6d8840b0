use std::sync::Arc;
use std::sync::atomic::AtomicBool;

// Abort hotkey: sets the flag; the batch runner checks it between commands,
// so an in-flight command always completes (button released) first.

/// Start a background thread that listens for the abort hotkey Ctrl+Shift+K (Windows).
/// Sets `flag` to `true` when the hotkey is pressed.
#[cfg(target_os = "windows")]
pub fn start_hotkey_listener(flag: Arc<AtomicBool>) {
    use std::sync::atomic::Ordering;

    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT, VK_K,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

    const ABORT_HOTKEY_ID: i32 = 1;

    std::thread::spawn(move || unsafe {
        if let Err(e) = RegisterHotKey(
            HWND::default(),
            ABORT_HOTKEY_ID,
            MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
            VK_K.0 as u32,
        ) {
            crate::logger::error(&format!(
                "failed to register abort hotkey Ctrl+Shift+K ({}), another application may own it",
                e
            ));
            return;
        }
        crate::logger::info("abort hotkey Ctrl+Shift+K registered (stops after the current command)");

        // GetMessageW blocks; returns 0 on WM_QUIT and -1 on error
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {
            if msg.message == WM_HOTKEY && msg.wParam.0 == ABORT_HOTKEY_ID as usize {
                flag.store(true, Ordering::Release);
            }
        }
    });
}

/// Bring the console window that owns our process back to the foreground
/// once a batch has finished driving Paint.
#[cfg(target_os = "windows")]
pub fn activate_terminal() {
    use windows::Win32::System::Console::GetConsoleWindow;
    use windows::Win32::UI::WindowsAndMessaging::{SetForegroundWindow, ShowWindow, SW_RESTORE};

    unsafe {
        let hwnd = GetConsoleWindow();
        if !hwnd.is_invalid() {
            let _ = ShowWindow(hwnd, SW_RESTORE);
            let _ = SetForegroundWindow(hwnd);
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub fn start_hotkey_listener(_flag: Arc<AtomicBool>) {
    // Global hotkeys need a native backend; the TUI stop key still works
}

#[cfg(not(target_os = "windows"))]
pub fn activate_terminal() {}
