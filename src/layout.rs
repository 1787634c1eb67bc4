/*
 * Geometry for the progress dialog. `compute` is a pure function of the control
 * set and the DPI; toolkits call it on first show and again on every DPI change.
 *
 * Buttons sit in three fixed slots on one row, right-aligned as a group. The
 * visual order left to right is Extra, OK, Cancel; absent controls leave their
 * slots empty on the left side, never gaps between buttons.
 */

use crate::dpi::Dpi;
use crate::types::Button;

const WINDOW_WIDTH: i32 = 281;
const WINDOW_HEIGHT: i32 = 133;
const MARGIN_X: i32 = 12;
const CONTENT_WIDTH: i32 = 241;
const LABEL_Y: i32 = 10;
const PROGRESS_Y: i32 = 30;
const ROW_HEIGHT: i32 = 16;
const BUTTON_Y: i32 = 58;
const BUTTON_WIDTH: i32 = 75;
const BUTTON_HEIGHT: i32 = 24;
const BUTTON_SLOTS_X: [i32; 3] = [12, 95, 178];

/// Which optional buttons exist. OK is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlSet {
    pub cancel: bool,
    pub extra: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub(crate) const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn scaled(self, dpi: Dpi) -> Self {
        Self {
            x: dpi.scale(self.x),
            y: dpi.scale(self.y),
            width: dpi.scale(self.width),
            height: dpi.scale(self.height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogLayout {
    /// Outer window size; position is left to the toolkit.
    pub window_width: i32,
    pub window_height: i32,
    pub label: Rect,
    pub progress: Rect,
    pub ok: Rect,
    pub cancel: Option<Rect>,
    pub extra: Option<Rect>,
}

fn button_at(slot: usize) -> Rect {
    Rect::new(BUTTON_SLOTS_X[slot], BUTTON_Y, BUTTON_WIDTH, BUTTON_HEIGHT)
}

pub fn compute(controls: ControlSet, dpi: Dpi) -> DialogLayout {
    let mut slots = Vec::with_capacity(3);
    if controls.extra {
        slots.push(Button::Extra);
    }
    slots.push(Button::Ok);
    if controls.cancel {
        slots.push(Button::Cancel);
    }
    // Right-align: the last button always lands in the rightmost slot.
    let first_slot = BUTTON_SLOTS_X.len() - slots.len();

    let mut ok = Rect::default();
    let mut cancel = None;
    let mut extra = None;
    for (offset, which) in slots.iter().enumerate() {
        let rect = button_at(first_slot + offset).scaled(dpi);
        match which {
            Button::Extra => extra = Some(rect),
            Button::Ok => ok = rect,
            Button::Cancel => cancel = Some(rect),
        }
    }

    DialogLayout {
        window_width: dpi.scale(WINDOW_WIDTH),
        window_height: dpi.scale(WINDOW_HEIGHT),
        label: Rect::new(MARGIN_X, LABEL_Y, CONTENT_WIDTH, ROW_HEIGHT).scaled(dpi),
        progress: Rect::new(MARGIN_X, PROGRESS_Y, CONTENT_WIDTH, ROW_HEIGHT).scaled(dpi),
        ok,
        cancel,
        extra,
    }
}

/// Top-left corner that centers a `width` x `height` window inside `area`.
pub fn center_in(area: Rect, width: i32, height: i32) -> (i32, i32) {
    (
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
    )
}
