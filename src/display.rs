//! Multi-display geometry resolution.
//!
//! Platforms report display metrics in their own convention: macOS uses a
//! bottom-left origin with Y growing upward, Windows and X11 use a top-left
//! origin.  [`resolve`] converts a native report into [`DisplayInfo`]s that
//! all share one convention: origin at the main display's top-left corner,
//! Y growing downward, `as_x`/`as_y` locating the usable area.

use crate::model::{DisplayInfo, Rect};

/// Native coordinate convention of a platform's display report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Origin at the main display's bottom-left, Y grows upward (macOS).
    BottomLeft,
    /// Origin at the main display's top-left, Y grows downward.
    TopLeft,
}

/// One display as a platform reports it.
///
/// `frame` is the full display rectangle and `visible` the work area
/// (excluding menu bar, dock or taskbar), both in native coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeDisplay {
    pub frame: Rect,
    pub visible: Rect,
    pub is_main: bool,
}

/// Display enumeration produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("display geometry unavailable: {0}")]
pub struct GeometryUnavailable(pub String);

/// Convert native display metrics into the unified convention.
///
/// When a bottom-left display other than the main one reports a work area
/// as tall as its frame, the OS did not exclude the menu bar there; a fixed
/// `menu_bar_inset` is taken off the top of the usable area.
pub fn resolve(
    natives: &[NativeDisplay],
    origin: Origin,
    menu_bar_inset: i32,
) -> Result<Vec<DisplayInfo>, GeometryUnavailable> {
    if natives.is_empty() {
        return Err(GeometryUnavailable("no displays reported".into()));
    }
    if let Some(bad) = natives.iter().find(|d| d.frame.w <= 0 || d.frame.h <= 0) {
        return Err(GeometryUnavailable(format!("degenerate display frame {:?}", bad.frame)));
    }

    let main_index = natives.iter().position(|d| d.is_main).unwrap_or(0);
    let main = natives[main_index].frame;

    Ok(natives
        .iter()
        .enumerate()
        .map(|(index, d)| {
            let is_main = index == main_index;
            let visible = if d.visible.w > 0 && d.visible.h > 0 {
                d.visible
            } else {
                d.frame
            };
            let as_x = visible.x - main.x;
            let (mut as_y, mut visible_h) = match origin {
                Origin::BottomLeft => (main.bottom() - visible.bottom(), visible.h),
                Origin::TopLeft => (visible.y - main.y, visible.h),
            };
            if origin == Origin::BottomLeft && !is_main && visible.h == d.frame.h {
                as_y += menu_bar_inset;
                visible_h -= menu_bar_inset;
            }
            DisplayInfo {
                index,
                frame_x: d.frame.x,
                frame_y: d.frame.y,
                frame_w: d.frame.w,
                frame_h: d.frame.h,
                as_x,
                as_y,
                visible_w: visible.w,
                visible_h,
                is_main,
            }
        })
        .collect())
}

/// Index of the display whose usable area contains the point, if any.
pub fn display_at(displays: &[DisplayInfo], x: i32, y: i32) -> Option<usize> {
    displays
        .iter()
        .find(|d| d.usable().contains(x, y))
        .map(|d| d.index)
}

/// The main display.
pub fn main_display(displays: &[DisplayInfo]) -> Option<&DisplayInfo> {
    displays.iter().find(|d| d.is_main).or_else(|| displays.first())
}
