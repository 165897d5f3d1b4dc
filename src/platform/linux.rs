//! X11 backend driven by `wmctrl`, `xdotool`, `xrandr` and `xprop`.
//!
//! Windows are addressed by their X11 window id.  X11 reports everything in
//! root-window coordinates, whose origin is not necessarily the main
//! monitor's top-left corner; the offset of the primary monitor is recorded
//! on every display query (or on first use) and applied in both directions
//! so that callers only ever see unified coordinates.

use super::{int, same_app, PlatformError};
use crate::config::{CallClass, Config, TimeoutConfig};
use crate::display::{NativeDisplay, Origin};
use crate::exec::{self, Invocation};
use crate::model::{AppKind, Rect, WindowRecord};
use crate::traits::{FrameMode, WindowPlatform};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_TERMINAL: &str = "gnome-terminal";
const DEFAULT_FILE_MANAGER: &str = "nautilus";

/// `wmctrl`/`xdotool`/`xrandr`-driven backend.
pub struct LinuxPlatform {
    terminal: String,
    file_manager: String,
    timeouts: TimeoutConfig,
    /// Root coordinates of the primary monitor's top-left corner, once known.
    offset: Mutex<Option<(i32, i32)>>,
}

impl LinuxPlatform {
    pub fn new(config: &Config) -> Self {
        Self {
            terminal: config
                .apps
                .terminal
                .clone()
                .unwrap_or_else(|| DEFAULT_TERMINAL.to_string()),
            file_manager: config
                .apps
                .file_manager
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_MANAGER.to_string()),
            timeouts: config.timeouts.clone(),
            offset: Mutex::new(None),
        }
    }

    async fn run(&self, inv: Invocation, class: CallClass) -> Result<String, PlatformError> {
        Ok(exec::run(&inv, self.timeouts.for_class(class)).await?)
    }

    fn store_offset(&self, offset: (i32, i32)) {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner()) = Some(offset);
    }

    /// The primary monitor's root offset, querying `xrandr` the first time.
    async fn offset(&self) -> (i32, i32) {
        let known = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(offset) = known {
            return offset;
        }
        match self
            .run(Invocation::new("xrandr").arg("--query"), CallClass::Probe)
            .await
        {
            Ok(out) => {
                let offset = primary_origin(&parse_xrandr(&out));
                self.store_offset(offset);
                offset
            }
            Err(e) => {
                debug!("no monitor offset yet: {}", e);
                (0, 0)
            }
        }
    }

    async fn list(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError> {
        let out = self
            .run(Invocation::new("wmctrl").arg("-lpGx"), CallClass::Probe)
            .await?;
        let (dx, dy) = self.offset().await;
        let mut records = parse_wmctrl(apps, &out);
        for r in &mut records {
            if let Some(b) = r.bounds.as_mut() {
                b.x -= dx;
                b.y -= dy;
            }
        }
        Ok(records)
    }

    /// Run `wmctrl -i <action> <id> [extra..]`.
    async fn wmctrl(
        &self,
        window: &WindowRecord,
        action: &str,
        extra: &[&str],
    ) -> Result<(), PlatformError> {
        let inv = Invocation::new("wmctrl")
            .args(["-i", action])
            .arg(xid(window)?)
            .args(extra.iter().copied());
        self.run(inv, CallClass::Control).await.map(drop)
    }

    async fn move_resize(
        &self,
        id: &str,
        rect: Rect,
        mode: FrameMode,
    ) -> Result<(), PlatformError> {
        let (dx, dy) = self.offset().await;
        let geometry = match mode {
            FrameMode::PositionOnly => format!("0,{},{},-1,-1", rect.x + dx, rect.y + dy),
            FrameMode::PositionAndSize => {
                format!("0,{},{},{},{}", rect.x + dx, rect.y + dy, rect.w, rect.h)
            }
        };
        let inv = Invocation::new("wmctrl").args(["-i", "-r", id, "-e", geometry.as_str()]);
        self.run(inv, CallClass::Control).await.map(drop)
    }
}

/// X11 id of a record, without any duplicate suffix.
fn xid(window: &WindowRecord) -> Result<String, PlatformError> {
    let id = window.id.split('-').next().unwrap_or_default();
    if id.starts_with("0x") && u64::from_str_radix(&id[2..], 16).is_ok() {
        Ok(id.to_string())
    } else {
        Err(PlatformError::not_found(window))
    }
}

#[async_trait]
impl WindowPlatform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn origin(&self) -> Origin {
        Origin::TopLeft
    }

    fn app_kind(&self, app: &str) -> AppKind {
        if same_app(app, &self.terminal) {
            AppKind::Terminal
        } else if same_app(app, &self.file_manager) {
            AppKind::FileManager
        } else {
            AppKind::Generic
        }
    }

    fn builtin_apps(&self) -> Vec<String> {
        vec![self.terminal.clone(), self.file_manager.clone()]
    }

    async fn probe_app(&self, app: &str) -> Result<Vec<WindowRecord>, PlatformError> {
        self.list(&[app.to_string()]).await
    }

    async fn probe_batch(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError> {
        if apps.is_empty() {
            return Ok(Vec::new());
        }
        self.list(apps).await
    }

    async fn displays(&self) -> Result<Vec<NativeDisplay>, PlatformError> {
        let out = self
            .run(Invocation::new("xrandr").arg("--query"), CallClass::Probe)
            .await?;
        let mut displays = parse_xrandr(&out);
        if displays.is_empty() {
            return Err(PlatformError::parse("xrandr", "no connected outputs"));
        }

        // The work area is optional: without a compliant window manager the
        // full frames are used.
        match self
            .run(
                Invocation::new("xprop").args(["-root", "_NET_WORKAREA"]),
                CallClass::Probe,
            )
            .await
        {
            Ok(out) => {
                if let Some(area) = parse_workarea(&out) {
                    for d in &mut displays {
                        d.visible = intersect(d.frame, area).unwrap_or(d.frame);
                    }
                }
            }
            Err(e) => debug!("no _NET_WORKAREA: {}", e),
        }

        self.store_offset(primary_origin(&displays));
        Ok(displays)
    }

    async fn raise(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        self.wmctrl(window, "-a", &[]).await
    }

    async fn minimize_restore(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        let id = xid(window)?;
        self.run(
            Invocation::new("xdotool").args(["windowminimize", id.as_str()]),
            CallClass::Control,
        )
        .await?;
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.wmctrl(window, "-a", &[]).await
    }

    async fn animate(&self, window: &WindowRecord, frames: &[Rect]) -> Result<(), PlatformError> {
        let id = xid(window)?;
        for frame in frames {
            self.move_resize(&id, *frame, FrameMode::PositionAndSize).await?;
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
        Ok(())
    }

    async fn close(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        self.wmctrl(window, "-c", &[]).await
    }

    async fn set_frame(
        &self,
        window: &WindowRecord,
        rect: Rect,
        mode: FrameMode,
    ) -> Result<(), PlatformError> {
        // A maximized window ignores move requests.
        self.wmctrl(window, "-r", &["-b", "remove,maximized_vert,maximized_horz"])
            .await?;
        self.move_resize(&xid(window)?, rect, mode).await
    }
}

//  Parsing

/// Parse `wmctrl -lpGx` output, keeping windows whose `WM_CLASS` mentions
/// one of `apps`.
///
/// Columns: id, desktop, pid, x, y, w, h, instance.class, host, title.
pub(crate) fn parse_wmctrl(apps: &[String], output: &str) -> Vec<WindowRecord> {
    let wanted: Vec<(String, &String)> = apps.iter().map(|a| (a.to_lowercase(), a)).collect();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for line in output.lines() {
        let Some((cols, title)) = split_columns(line, 9) else {
            continue;
        };
        let class = cols[7].to_lowercase();
        let Some((key, app)) = wanted.iter().find(|(k, _)| class.contains(k.as_str())) else {
            continue;
        };
        let n = counters.entry(key.clone()).or_insert(0);
        *n += 1;
        let mut record = WindowRecord::new(app.as_str(), cols[0], title).with_index(*n);
        if let (Some(x), Some(y), Some(w), Some(h)) =
            (int(cols[3]), int(cols[4]), int(cols[5]), int(cols[6]))
        {
            record = record.with_bounds(Rect::new(x, y, w, h));
        }
        out.push(record);
    }
    out
}

/// Split the first `n` whitespace-separated columns off `line`; the rest
/// (which may itself contain runs of spaces) is returned trimmed.
fn split_columns(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut cols = Vec::with_capacity(n);
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        cols.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Some((cols, rest.trim_end()))
}

/// Parse connected outputs from `xrandr --query`.
pub(crate) fn parse_xrandr(output: &str) -> Vec<NativeDisplay> {
    output
        .lines()
        .filter(|l| l.contains(" connected"))
        .filter_map(|line| {
            let frame = line.split_whitespace().find_map(parse_geometry)?;
            Some(NativeDisplay {
                frame,
                visible: frame,
                is_main: line.contains(" primary "),
            })
        })
        .collect()
}

/// Parse `WxH+X+Y`.
fn parse_geometry(token: &str) -> Option<Rect> {
    let (size, pos) = token.split_once('+')?;
    let (w, h) = size.split_once('x')?;
    let (x, y) = pos.split_once('+')?;
    Some(Rect::new(
        x.parse().ok()?,
        y.parse().ok()?,
        w.parse().ok()?,
        h.parse().ok()?,
    ))
}

/// First desktop's work area from `xprop -root _NET_WORKAREA`.
pub(crate) fn parse_workarea(output: &str) -> Option<Rect> {
    let (_, values) = output.split_once('=')?;
    let n: Vec<i32> = values
        .split(',')
        .take(4)
        .filter_map(|v| v.trim().parse().ok())
        .collect();
    (n.len() == 4).then(|| Rect::new(n[0], n[1], n[2], n[3]))
}

fn intersect(a: Rect, b: Rect) -> Option<Rect> {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());
    (x2 > x1 && y2 > y1).then(|| Rect::from_edges(x1, y1, x2, y2))
}

/// Root coordinates of the primary monitor, or the first one.
fn primary_origin(displays: &[NativeDisplay]) -> (i32, i32) {
    displays
        .iter()
        .find(|d| d.is_main)
        .or_else(|| displays.first())
        .map(|d| (d.frame.x, d.frame.y))
        .unwrap_or((0, 0))
}
