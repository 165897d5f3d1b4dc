//! Shared data model.
//!
//! [`WindowRecord`] is the normalized snapshot of one live window produced by
//! every probe.  [`CardWindowRef`] is the board's persisted pointer to a
//! window, which may go stale between probes.  [`DisplayInfo`] describes one
//! display in the unified coordinate space (origin at the main display's
//! top-left corner, Y growing downward).

use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer rectangle in the unified coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Build a rectangle from its two corners (`x2`/`y2` exclusive).
    pub fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Whether the point lies inside the rectangle (right/bottom exclusive).
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

/// How an application is treated by probing and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppKind {
    /// The host's default terminal.  Queried by native handle.
    Terminal,
    /// The host's file manager.  Windows carry a folder path.
    FileManager,
    /// Any other application, queried in one batched call.
    Generic,
}

/// Normalized snapshot of one live on-screen window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRecord {
    pub app: String,
    /// Best available stable handle, unique within one probe result.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// 1-based position of the window in its application's window list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
}

impl WindowRecord {
    pub fn new(app: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            id: id.into(),
            name: name.into(),
            path: None,
            index: None,
            bounds: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Persisted pointer from a task card to a window.
///
/// `id` may go stale; `name` and `path` are fallback keys only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardWindowRef {
    pub app: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CardWindowRef {
    /// Point this reference at `record`, keeping the app name.
    pub fn rebind(&mut self, record: &WindowRecord) {
        self.id = record.id.clone();
        self.name = record.name.clone();
        if record.path.is_some() {
            self.path = record.path.clone();
        }
    }
}

impl From<&WindowRecord> for CardWindowRef {
    fn from(record: &WindowRecord) -> Self {
        Self {
            app: record.app.clone(),
            id: record.id.clone(),
            name: record.name.clone(),
            path: record.path.clone(),
        }
    }
}

/// The part of a board card that reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub windows: Vec<CardWindowRef>,
}

/// One display in the unified coordinate space.
///
/// `frame_*` are the native values as reported by the OS.  `as_x`/`as_y`
/// locate the top-left corner of the usable area with the main display's
/// top-left as origin and Y growing downward; `visible_w`/`visible_h` are
/// the usable size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub index: usize,
    pub frame_x: i32,
    pub frame_y: i32,
    pub frame_w: i32,
    pub frame_h: i32,
    pub as_x: i32,
    pub as_y: i32,
    pub visible_w: i32,
    pub visible_h: i32,
    pub is_main: bool,
}

impl DisplayInfo {
    /// Usable area in unified coordinates.
    pub fn usable(&self) -> Rect {
        Rect::new(self.as_x, self.as_y, self.visible_w, self.visible_h)
    }
}

/// Visual effect played when a window is activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Animation {
    #[default]
    None,
    /// Shrink, overshoot and settle on the target window only.
    Pop,
    /// Native minimize followed by restore.
    Minimize,
}

/// A color with 16-bit channels, the precision Terminal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Rgb {
    pub fn new(r: u16, g: u16, b: u16) -> Self {
        Self { r, g, b }
    }

    /// Build from 8-bit channels.
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: u16::from(r) * 257,
            g: u16::from(g) * 257,
            b: u16::from(b) * 257,
        }
    }

    /// Parse `"#rrggbb"` or `"rrggbb"`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self::from_u8(channel(0)?, channel(2)?, channel(4)?))
    }

    /// 8-bit channels, rounded.
    pub fn to_u8(self) -> (u8, u8, u8) {
        let down = |c: u16| ((u32::from(c) + 128) / 257).min(255) as u8;
        (down(self.r), down(self.g), down(self.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, g, b) = self.to_u8();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}
