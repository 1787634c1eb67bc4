/*
 * The status line above the progress bar: a single-line STATIC control that
 * ellipsizes long text at word boundaries and shows `&` literally.
 */

use crate::controls::create_child;
use crate::error::Result;

use windows::Win32::{
    Foundation::{HINSTANCE, HWND},
    UI::WindowsAndMessaging::{SetWindowTextW, WINDOW_STYLE, WS_CHILD, WS_GROUP, WS_VISIBLE},
};
use windows::core::{HSTRING, w};

const SS_NOPREFIX: WINDOW_STYLE = WINDOW_STYLE(0x0000_0080);
const SS_EDITCONTROL: WINDOW_STYLE = WINDOW_STYLE(0x0000_2000);
const SS_WORDELLIPSIS: WINDOW_STYLE = WINDOW_STYLE(0x0000_C000);

// Static controls are conventionally created with this id.
const ID_STATIC: i32 = -1;

pub(crate) fn create_label(parent: HWND, instance: HINSTANCE) -> Result<HWND> {
    create_child(
        parent,
        instance,
        w!("STATIC"),
        "",
        WS_CHILD | WS_VISIBLE | WS_GROUP | SS_WORDELLIPSIS | SS_EDITCONTROL | SS_NOPREFIX,
        ID_STATIC,
    )
}

pub(crate) fn set_label_text(hwnd: HWND, text: &str) -> Result<()> {
    unsafe { SetWindowTextW(hwnd, &HSTRING::from(text))? };
    Ok(())
}
