/*
 * Native child controls of the progress dialog. Each handler module wraps the
 * Win32 calls for one control class; this module holds what they share:
 * creating a child window, assigning its font, and positioning it.
 */
pub(crate) mod button_handler;
pub(crate) mod label_handler;
pub(crate) mod progress_handler;

use crate::error::{DialogError, Result};
use crate::layout::Rect;

use windows::Win32::{
    Foundation::{HINSTANCE, HWND, LPARAM, WPARAM},
    Graphics::Gdi::HFONT,
    UI::WindowsAndMessaging::{
        CreateWindowExW, HMENU, SWP_NOACTIVATE, SWP_NOZORDER, SendMessageW, SetWindowPos,
        WINDOW_EX_STYLE, WINDOW_STYLE, WM_SETFONT,
    },
};
use windows::core::{HSTRING, PCWSTR};

pub(crate) fn create_child(
    parent: HWND,
    instance: HINSTANCE,
    class: PCWSTR,
    text: &str,
    style: WINDOW_STYLE,
    control_id: i32,
) -> Result<HWND> {
    unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            class,
            &HSTRING::from(text),
            style,
            0,
            0,
            0,
            0,
            Some(parent),
            Some(HMENU(control_id as isize as *mut _)),
            Some(instance),
            None,
        )
    }
    .map_err(|e| {
        log::error!("Controls: CreateWindowExW failed for control id {control_id}: {e:?}");
        DialogError::InitializationFailed(format!(
            "failed to create control {control_id}: {}",
            e.message()
        ))
    })
}

pub(crate) fn set_font(hwnd: HWND, font: HFONT) {
    unsafe {
        SendMessageW(
            hwnd,
            WM_SETFONT,
            Some(WPARAM(font.0 as usize)),
            Some(LPARAM(1)),
        );
    }
}

pub(crate) fn place(hwnd: HWND, rect: Rect) -> Result<()> {
    unsafe {
        SetWindowPos(
            hwnd,
            None,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            SWP_NOZORDER | SWP_NOACTIVATE,
        )?;
    }
    Ok(())
}
