/*
 * The dialog font: the system message font, recreated at the height that matches
 * the window's current DPI. The previous handle is deleted when a new height is
 * requested and on drop, so the owner must reassign the font to its controls
 * right after `for_dpi` returns.
 */

use crate::dpi::Dpi;

use std::ffi::c_void;
use windows::Win32::{
    Foundation::GetLastError,
    Graphics::Gdi::{
        CreateFontIndirectW, DEFAULT_GUI_FONT, DeleteObject, GetObjectW, GetStockObject, HFONT,
        HGDIOBJ, LOGFONTW,
    },
    UI::WindowsAndMessaging::{
        NONCLIENTMETRICSW, SPI_GETNONCLIENTMETRICS, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
        SystemParametersInfoW,
    },
};

pub(crate) struct DpiFont {
    logical: LOGFONTW,
    handle: Option<HFONT>,
}

impl DpiFont {
    pub(crate) fn message_font() -> Self {
        Self {
            logical: system_message_font().unwrap_or_else(default_gui_font),
            handle: None,
        }
    }

    /// Returns the font for `dpi`, creating it if the height changed.
    pub(crate) fn for_dpi(&mut self, dpi: Dpi) -> Option<HFONT> {
        let height = dpi.font_height();
        if self.handle.is_some() && self.logical.lfHeight == height {
            return self.handle;
        }

        self.release();
        self.logical.lfHeight = height;
        let font = unsafe { CreateFontIndirectW(&self.logical) };
        if font.is_invalid() {
            log::error!(
                "DpiFont: CreateFontIndirectW failed at {dpi:?}. LastError={:?}",
                unsafe { GetLastError() }
            );
            return None;
        }
        log::debug!("DpiFont: created {font:?} with height {height} for {dpi:?}.");
        self.handle = Some(font);
        self.handle
    }

    fn release(&mut self) {
        if let Some(font) = self.handle.take()
            && !font.is_invalid()
        {
            unsafe {
                let _ = DeleteObject(HGDIOBJ(font.0));
            }
        }
    }
}

impl Drop for DpiFont {
    fn drop(&mut self) {
        self.release();
    }
}

fn system_message_font() -> Option<LOGFONTW> {
    let mut metrics = NONCLIENTMETRICSW {
        cbSize: std::mem::size_of::<NONCLIENTMETRICSW>() as u32,
        ..Default::default()
    };
    let queried = unsafe {
        SystemParametersInfoW(
            SPI_GETNONCLIENTMETRICS,
            metrics.cbSize,
            Some(&mut metrics as *mut _ as *mut c_void),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        )
    };
    match queried {
        Ok(()) => Some(metrics.lfMessageFont),
        Err(e) => {
            log::warn!("DpiFont: SPI_GETNONCLIENTMETRICS failed ({e:?}); using DEFAULT_GUI_FONT.");
            None
        }
    }
}

fn default_gui_font() -> LOGFONTW {
    let mut logical = LOGFONTW::default();
    let stock_font = unsafe { GetStockObject(DEFAULT_GUI_FONT) };
    if stock_font.0.is_null() {
        log::error!("DpiFont: DEFAULT_GUI_FONT unavailable.");
        return logical;
    }
    let copied = unsafe {
        GetObjectW(
            stock_font,
            std::mem::size_of::<LOGFONTW>() as i32,
            Some(&mut logical as *mut _ as *mut c_void),
        )
    };
    if copied == 0 {
        log::error!("DpiFont: GetObjectW failed for DEFAULT_GUI_FONT. LastError={:?}", unsafe {
            GetLastError()
        });
    }
    logical
}
