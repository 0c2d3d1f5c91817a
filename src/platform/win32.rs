//! Win32 implementation of the platform collaborators.
//!
//! Windows are found by exact title, regions are copied off the screen DC at
//! the client area's screen position with GDI, and input goes through
//! `SendInput` with absolute coordinates. The window DC of a flip-model
//! DirectX window reads back black.
//! `SendInput` moves the real cursor, so the game must be in the foreground.

use std::ffi::{c_void, OsString};
use std::os::windows::ffi::OsStringExt;

use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage};

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    BitBlt, ClientToScreen, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
    GetDC, GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetForegroundWindow, GetSystemMetrics, GetWindowTextLengthW,
    GetWindowTextW, IsWindow, IsWindowVisible, SM_CXSCREEN, SM_CYSCREEN,
};

use crate::platform::{ClientRect, InputSynth, RegionCapture, SurfaceHandle, WindowLocator};

/// One notch of the mouse wheel.
const WHEEL_DELTA: i32 = 120;

fn to_hwnd(handle: SurfaceHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

fn window_title(hwnd: HWND) -> String {
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return String::new();
        }
        let mut buf: Vec<u16> = vec![0; (len + 1) as usize];
        let copied = GetWindowTextW(hwnd, &mut buf);
        OsString::from_wide(&buf[..copied.max(0) as usize])
            .to_string_lossy()
            .to_string()
    }
}

/// Converts a client point to normalized absolute coordinates (0..65535).
fn to_absolute(hwnd: HWND, x: i32, y: i32) -> Result<(i32, i32)> {
    let mut point = POINT { x, y };
    unsafe {
        if !ClientToScreen(hwnd, &mut point).as_bool() {
            return Err(anyhow!("ClientToScreen failed"));
        }
    }
    let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) }.max(1);
    let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) }.max(1);
    let norm_x = ((point.x as i64 * 65535) / screen_width as i64) as i32;
    let norm_y = ((point.y as i64 * 65535) / screen_height as i64) as i32;
    Ok((norm_x, norm_y))
}

fn send_mouse(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS, data: i32) -> Result<()> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data as _,
                dwFlags: flags | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                ..Default::default()
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        return Err(anyhow!("SendInput rejected the event (flags {:?})", flags));
    }
    Ok(())
}

/// The game as seen through Win32.
#[derive(Clone, Copy, Debug, Default)]
pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        Self
    }
}

impl WindowLocator for Win32Platform {
    fn find_target_surface(&self, allowed_titles: &[String]) -> Option<SurfaceHandle> {
        struct EnumData<'a> {
            titles: &'a [String],
            found: Option<HWND>,
        }

        unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
            unsafe {
                let data = &mut *(lparam.0 as *mut EnumData);
                if !IsWindowVisible(hwnd).as_bool() {
                    return TRUE;
                }
                let title = window_title(hwnd);
                if title.is_empty() {
                    return TRUE;
                }
                if data.titles.iter().any(|t| *t == title) {
                    tracing::debug!("Found game window \"{}\"", title);
                    data.found = Some(hwnd);
                    return BOOL(0);
                }
                TRUE
            }
        }

        let mut data = EnumData {
            titles: allowed_titles,
            found: None,
        };
        unsafe {
            // EnumWindows reports an error when the callback stops early
            let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
        }
        data.found.map(|hwnd| SurfaceHandle(hwnd.0 as usize))
    }

    fn is_foreground(&self, handle: SurfaceHandle) -> bool {
        let hwnd = to_hwnd(handle);
        unsafe { IsWindow(hwnd).as_bool() && GetForegroundWindow() == hwnd }
    }

    fn client_size(&self, handle: SurfaceHandle) -> Result<(u32, u32)> {
        let mut rect = RECT::default();
        unsafe { GetClientRect(to_hwnd(handle), &mut rect)? };
        Ok((
            (rect.right - rect.left).max(0) as u32,
            (rect.bottom - rect.top).max(0) as u32,
        ))
    }
}

impl RegionCapture for Win32Platform {
    fn capture_region(&self, handle: SurfaceHandle, rect: ClientRect) -> Result<DynamicImage> {
        if rect.width == 0 || rect.height == 0 {
            return Err(anyhow!("empty capture rect {:?}", rect));
        }
        let hwnd = to_hwnd(handle);
        let (width, height) = (rect.width as i32, rect.height as i32);
        let mut origin = POINT { x: rect.x, y: rect.y };

        unsafe {
            if !ClientToScreen(hwnd, &mut origin).as_bool() {
                return Err(anyhow!("ClientToScreen failed"));
            }
            let screen_dc = GetDC(HWND::default());
            if screen_dc.is_invalid() {
                return Err(anyhow!("GetDC failed"));
            }
            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let previous = SelectObject(mem_dc, bitmap);

            let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, origin.x, origin.y, SRCCOPY);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height gives a top-down bitmap
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut bgra = vec![0u8; (width * height * 4) as usize];
            let lines = if blit.is_ok() {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    height as u32,
                    Some(bgra.as_mut_ptr() as *mut c_void),
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

            blit.map_err(|e| anyhow!("BitBlt failed: {}", e))?;
            if lines != height {
                return Err(anyhow!("GetDIBits copied {} of {} lines", lines, height));
            }

            let mut img = RgbImage::new(rect.width, rect.height);
            for (i, pixel) in img.pixels_mut().enumerate() {
                let o = i * 4;
                // BGRA -> RGB
                *pixel = image::Rgb([bgra[o + 2], bgra[o + 1], bgra[o]]);
            }
            Ok(DynamicImage::ImageRgb8(img))
        }
    }
}

impl InputSynth for Win32Platform {
    fn click(&self, handle: SurfaceHandle, x: i32, y: i32) -> Result<()> {
        let (nx, ny) = to_absolute(to_hwnd(handle), x, y)?;
        send_mouse(nx, ny, MOUSE_EVENT_FLAGS(0), 0)?;
        std::thread::sleep(std::time::Duration::from_millis(30));
        send_mouse(nx, ny, MOUSEEVENTF_LEFTDOWN, 0)?;
        std::thread::sleep(std::time::Duration::from_millis(30));
        send_mouse(nx, ny, MOUSEEVENTF_LEFTUP, 0)
    }

    fn scroll(&self, handle: SurfaceHandle, x: i32, y: i32, ticks: i32) -> Result<()> {
        let (nx, ny) = to_absolute(to_hwnd(handle), x, y)?;
        send_mouse(nx, ny, MOUSE_EVENT_FLAGS(0), 0)?;
        std::thread::sleep(std::time::Duration::from_millis(30));
        for _ in 0..ticks.unsigned_abs() {
            send_mouse(nx, ny, MOUSEEVENTF_WHEEL, ticks.signum() * WHEEL_DELTA)?;
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        Ok(())
    }
}
