/*
 * DPI arithmetic shared by the layout engine and the font resolver. All dialog
 * geometry is authored at 96 DPI and scaled per monitor.
 */

pub(crate) const BASE_DPI: u32 = 96;

/// Logical font height in pixels at 96 DPI.
const BASE_FONT_PX: i32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dpi(pub u32);

impl Default for Dpi {
    fn default() -> Self {
        Self(BASE_DPI)
    }
}

impl Dpi {
    /// A zero DPI (the native query failed) is treated as 96.
    pub fn new(value: u32) -> Self {
        if value == 0 { Self::default() } else { Self(value) }
    }

    /// Extracts the new DPI from a `WM_DPICHANGED` wparam (Y DPI in the high word).
    pub fn from_dpichanged_wparam(wparam: usize) -> Self {
        Self::new(((wparam >> 16) & 0xFFFF) as u32)
    }

    /// Scales a 96-DPI pixel value, rounding to nearest like `MulDiv`.
    pub fn scale(self, px: i32) -> i32 {
        let dpi = i64::from(self.0);
        let base = i64::from(BASE_DPI);
        let scaled = i64::from(px) * dpi;
        let rounded = if scaled >= 0 {
            (scaled + base / 2) / base
        } else {
            (scaled - base / 2) / base
        };
        rounded as i32
    }

    /// `LOGFONTW::lfHeight` for the dialog font: negative selects by character height.
    pub fn font_height(self) -> i32 {
        -self.scale(BASE_FONT_PX)
    }
}
