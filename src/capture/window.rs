//! Window discovery and the Win32-backed `GameWindow`.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::time::Duration;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT, TRUE};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowRect, GetWindowTextLengthW, GetWindowThreadProcessId, IsWindow,
    IsWindowVisible, SetForegroundWindow,
};

use super::region::{crop_region, ScreenRegion};
use super::screenshot::capture_window_frame;
use super::{GameWindow, WindowRect};

/// Handle to the attached game window.
#[derive(Clone, Copy, Debug)]
pub struct WindowHandle {
    hwnd: HWND,
}

impl GameWindow for WindowHandle {
    fn rect(&self) -> Result<WindowRect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(self.hwnd, &mut rect)? };
        Ok(WindowRect {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        })
    }

    fn focus(&self) -> Result<()> {
        if !self.is_alive() {
            return Err(anyhow!("Game window no longer exists"));
        }
        unsafe {
            let _ = SetForegroundWindow(self.hwnd);
        }
        // Give the window time to activate
        std::thread::sleep(Duration::from_millis(50));
        Ok(())
    }

    fn is_alive(&self) -> bool {
        unsafe { IsWindow(self.hwnd).as_bool() }
    }

    fn capture(&self, region: &ScreenRegion) -> Result<RgbaImage> {
        let frame = capture_window_frame(self.hwnd)?;
        Ok(crop_region(&frame, region))
    }
}

/// Finds the main window of the game by enumerating visible, titled windows
/// and matching the owning process's executable name (case-insensitive).
pub fn find_game_window(process_name: &str) -> Result<WindowHandle> {
    struct EnumData {
        wanted: String,
        hwnd: Option<HWND>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }

            // Windows without a title are rarely main windows
            if GetWindowTextLengthW(hwnd) == 0 {
                return TRUE;
            }

            let mut process_id: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
            if process_id == 0 {
                return TRUE;
            }

            let Ok(process_handle) =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id)
            else {
                return TRUE;
            };

            let mut name_buf: Vec<u16> = vec![0; 1024];
            let mut len = name_buf.len() as u32;
            let result = QueryFullProcessImageNameW(
                process_handle,
                PROCESS_NAME_WIN32,
                windows::core::PWSTR(name_buf.as_mut_ptr()),
                &mut len,
            );
            let _ = windows::Win32::Foundation::CloseHandle(process_handle);

            if result.is_err() || len == 0 {
                return TRUE;
            }

            let full_path = OsString::from_wide(&name_buf[..len as usize])
                .to_string_lossy()
                .to_string();
            let exe_name = full_path.rsplit('\\').next().unwrap_or(&full_path);

            tracing::trace!(process_id, exe_name, "visible window");

            if exe_name.eq_ignore_ascii_case(&data.wanted) {
                data.hwnd = Some(hwnd);
                return BOOL(0); // Stop enumeration
            }

            TRUE
        }
    }

    tracing::info!("Attaching to {}...", process_name);
    let mut data = EnumData {
        wanted: process_name.to_string(),
        hwnd: None,
    };
    unsafe {
        // EnumWindows reports an error when the callback stops it early, which
        // is exactly the success case here.
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }

    let hwnd = data
        .hwnd
        .ok_or_else(|| anyhow!("Could not find {} window. Is the game running?", process_name))?;
    tracing::info!("Attached to game window {:?}", hwnd);
    Ok(WindowHandle { hwnd })
}
