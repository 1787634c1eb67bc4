use crate::controls::create_child;
use crate::error::Result;

use windows::Win32::{
    Foundation::{HINSTANCE, HWND, LPARAM, WPARAM},
    UI::{
        Controls::{
            PBM_SETMARQUEE, PBM_SETPOS, PBM_SETRANGE32, PBS_MARQUEE, PBS_SMOOTH, PROGRESS_CLASSW,
        },
        WindowsAndMessaging::{
            GWL_STYLE, SendMessageW, SetWindowLongPtrW, WINDOW_STYLE, WS_CHILD, WS_CLIPSIBLINGS,
            WS_GROUP, WS_VISIBLE,
        },
    },
};

const ID_PROGRESS: i32 = 100;

/// Marquee animation interval in milliseconds; 0 selects the control's default.
const MARQUEE_INTERVAL_MS: usize = 0;

fn base_style() -> WINDOW_STYLE {
    WS_CHILD | WS_VISIBLE | WS_GROUP | WS_CLIPSIBLINGS | WINDOW_STYLE(PBS_SMOOTH)
}

/*
 * Creates the bar in its initial mode: a marquee when `max_value` is negative,
 * otherwise a smooth determinate bar spanning `0..=max_value`.
 */
pub(crate) fn create_progress_bar(
    parent: HWND,
    instance: HINSTANCE,
    max_value: i32,
) -> Result<HWND> {
    let indeterminate = max_value < 0;
    let style = if indeterminate {
        base_style() | WINDOW_STYLE(PBS_MARQUEE)
    } else {
        base_style()
    };
    let hwnd = create_child(parent, instance, PROGRESS_CLASSW, "", style, ID_PROGRESS)?;

    if indeterminate {
        unsafe {
            SendMessageW(
                hwnd,
                PBM_SETMARQUEE,
                Some(WPARAM(1)),
                Some(LPARAM(MARQUEE_INTERVAL_MS as isize)),
            );
        }
    } else {
        set_range(hwnd, max_value);
    }
    Ok(hwnd)
}

pub(crate) fn set_range(hwnd: HWND, max_value: i32) {
    unsafe {
        SendMessageW(
            hwnd,
            PBM_SETRANGE32,
            Some(WPARAM(0)),
            Some(LPARAM(max_value.max(0) as isize)),
        );
    }
}

/// Values outside the range are clamped by the control.
pub(crate) fn set_position(hwnd: HWND, position: i32) {
    unsafe {
        SendMessageW(
            hwnd,
            PBM_SETPOS,
            Some(WPARAM(position as isize as usize)),
            Some(LPARAM(0)),
        );
    }
}

/// Leaves marquee mode (if active) and fills the bar.
pub(crate) fn show_full(hwnd: HWND) {
    unsafe {
        SendMessageW(hwnd, PBM_SETMARQUEE, Some(WPARAM(0)), Some(LPARAM(0)));
        SetWindowLongPtrW(hwnd, GWL_STYLE, base_style().0 as isize);
    }
    set_range(hwnd, 1);
    set_position(hwnd, 1);
}
