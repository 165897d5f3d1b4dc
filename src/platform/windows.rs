//! Windows backend driven by `powershell`.
//!
//! A small interop class compiled with `Add-Type` exposes the handful of
//! Win32 calls needed (`EnumWindows`, `SetWindowPos`, …).  Every window is
//! addressed by its `HWND`, which is stable for the window's lifetime, so no
//! id synthesis is needed here.  Explorer windows are enumerated through
//! `Shell.Application` to recover their folder path.

use super::{fields, int, parse_display_lines, same_app, PlatformError};
use crate::config::{CallClass, Config, TimeoutConfig};
use crate::display::{NativeDisplay, Origin};
use crate::exec;
use crate::model::{AppKind, Rect, WindowRecord};
use crate::script::Script;
use crate::traits::{FrameMode, WindowPlatform};
use async_trait::async_trait;
use std::collections::HashMap;

const DEFAULT_TERMINAL: &str = "WindowsTerminal";
const DEFAULT_FILE_MANAGER: &str = "explorer";

const SWP_NOSIZE: i64 = 0x0001;
const SWP_NOZORDER: i64 = 0x0004;
const SWP_NOACTIVATE: i64 = 0x0010;

const INTEROP: &str = r#"
Add-Type @"
using System;
using System.Runtime.InteropServices;
using System.Text;
public class CwWin {
    public delegate bool EnumProc(IntPtr h, IntPtr l);
    public struct RECT { public int Left, Top, Right, Bottom; }
    [DllImport("user32.dll")] public static extern bool EnumWindows(EnumProc cb, IntPtr l);
    [DllImport("user32.dll")] public static extern bool IsWindow(IntPtr h);
    [DllImport("user32.dll")] public static extern bool IsWindowVisible(IntPtr h);
    [DllImport("user32.dll")] public static extern bool IsIconic(IntPtr h);
    [DllImport("user32.dll", CharSet = CharSet.Unicode)] public static extern int GetWindowText(IntPtr h, StringBuilder s, int n);
    [DllImport("user32.dll")] public static extern uint GetWindowThreadProcessId(IntPtr h, out uint pid);
    [DllImport("user32.dll")] public static extern bool GetWindowRect(IntPtr h, out RECT r);
    [DllImport("user32.dll")] public static extern bool SetForegroundWindow(IntPtr h);
    [DllImport("user32.dll")] public static extern bool ShowWindow(IntPtr h, int cmd);
    [DllImport("user32.dll")] public static extern bool SetWindowPos(IntPtr h, IntPtr after, int x, int y, int cx, int cy, uint flags);
    [DllImport("user32.dll")] public static extern bool PostMessage(IntPtr h, uint msg, IntPtr w, IntPtr l);
}
"@
"#;

/// `process|hwnd|x|y|w|h|title` for every visible top-level window owned
/// by one of the named processes.
const ENUM_WINDOWS: &str = r#"
$names = {{procs}}
$out = New-Object System.Collections.Generic.List[string]
$cb = [CwWin+EnumProc]{
    param($h, $l)
    if ([CwWin]::IsWindowVisible($h)) {
        $procId = [uint32]0
        [void][CwWin]::GetWindowThreadProcessId($h, [ref]$procId)
        $p = Get-Process -Id $procId -ErrorAction SilentlyContinue
        if ($p -and ($names -contains $p.ProcessName)) {
            $sb = New-Object System.Text.StringBuilder 512
            [void][CwWin]::GetWindowText($h, $sb, 512)
            $r = New-Object CwWin+RECT
            [void][CwWin]::GetWindowRect($h, [ref]$r)
            $out.Add(("{0}|{1}|{2}|{3}|{4}|{5}|{6}" -f $p.ProcessName, $h.ToInt64(), $r.Left, $r.Top, ($r.Right - $r.Left), ($r.Bottom - $r.Top), $sb.ToString()))
        }
    }
    return $true
}
[void][CwWin]::EnumWindows($cb, [IntPtr]::Zero)
$out -join "`n"
"#;

/// `hwnd|index|x|y|w|h|path|name` per Explorer window.
const SHELL_WINDOWS: &str = r#"
$shell = New-Object -ComObject Shell.Application
$out = @()
$i = 0
foreach ($w in $shell.Windows()) {
    try {
        if ($w.FullName -notlike '*explorer.exe') { continue }
        $i++
        $path = ''
        try { $path = $w.Document.Folder.Self.Path } catch {}
        $out += ("{0}|{1}|{2}|{3}|{4}|{5}|{6}|{7}" -f $w.HWND, $i, $w.Left, $w.Top, $w.Width, $w.Height, $path, $w.LocationName)
    } catch {}
}
$out -join "`n"
"#;

const DISPLAYS: &str = r#"
Add-Type -AssemblyName System.Windows.Forms
$i = 0
$lines = foreach ($s in [System.Windows.Forms.Screen]::AllScreens) {
    $b = $s.Bounds
    $a = $s.WorkingArea
    "{0}|{1}|{2}|{3}|{4}|{5}|{6}|{7}|{8}|{9}" -f $i, $b.X, $b.Y, $b.Width, $b.Height, $a.X, $a.Y, $a.Width, $a.Height, [int]$s.Primary
    $i++
}
$lines -join "`n"
"#;

const RAISE: &str = r#"
$h = [IntPtr]{{hwnd}}
if (-not [CwWin]::IsWindow($h)) { throw 'window not found' }
if ([CwWin]::IsIconic($h)) { [void][CwWin]::ShowWindow($h, 9) }
[void][CwWin]::SetForegroundWindow($h)
"#;

const MINIMIZE_RESTORE: &str = r#"
$h = [IntPtr]{{hwnd}}
if (-not [CwWin]::IsWindow($h)) { throw 'window not found' }
[void][CwWin]::ShowWindow($h, 6)
Start-Sleep -Milliseconds 300
[void][CwWin]::ShowWindow($h, 9)
[void][CwWin]::SetForegroundWindow($h)
"#;

/// Frames are flattened `x, y, w, h` quadruples.
const ANIMATE: &str = r#"
$h = [IntPtr]{{hwnd}}
$f = {{frames}}
for ($k = 0; $k -lt $f.Count; $k += 4) {
    [void][CwWin]::SetWindowPos($h, [IntPtr]::Zero, $f[$k], $f[$k + 1], $f[$k + 2], $f[$k + 3], {{flags}})
    Start-Sleep -Milliseconds 16
}
"#;

const CLOSE: &str = r#"
$h = [IntPtr]{{hwnd}}
if (-not [CwWin]::IsWindow($h)) { throw 'window not found' }
[void][CwWin]::PostMessage($h, 0x0010, [IntPtr]::Zero, [IntPtr]::Zero)
"#;

const SET_FRAME: &str = r#"
$h = [IntPtr]{{hwnd}}
if ([CwWin]::IsIconic($h)) { [void][CwWin]::ShowWindow($h, 9) }
if (-not [CwWin]::SetWindowPos($h, [IntPtr]::Zero, {{x}}, {{y}}, {{width}}, {{height}}, {{flags}})) { throw 'SetWindowPos failed' }
"#;

/// `powershell`-driven backend.
pub struct WindowsPlatform {
    terminal: String,
    file_manager: String,
    timeouts: TimeoutConfig,
}

impl WindowsPlatform {
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
        }
    }

    async fn ps(&self, script: Script, class: CallClass) -> Result<String, PlatformError> {
        let inv = script.invocation()?;
        Ok(exec::run(&inv, self.timeouts.for_class(class)).await?)
    }

    /// Script with the interop class loaded and `hwnd` bound.
    fn control(&self, window: &WindowRecord, body: &str) -> Result<Script, PlatformError> {
        Ok(Script::powershell(format!("{}{}", INTEROP, body)).int("hwnd", hwnd(window)?))
    }

    async fn enumerate(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError> {
        let script = Script::powershell(format!("{}{}", INTEROP, ENUM_WINDOWS))
            .list("procs", apps.iter().cloned());
        let out = self.ps(script, CallClass::Probe).await?;
        Ok(parse_enum(apps, &out))
    }
}

/// Native handle of a record.  Duplicate handles within one probe carry a
/// `-n` suffix that is not part of the handle.
fn hwnd(window: &WindowRecord) -> Result<i64, PlatformError> {
    window
        .id
        .split('-')
        .next()
        .and_then(|h| h.parse().ok())
        .ok_or_else(|| PlatformError::not_found(window))
}

#[async_trait]
impl WindowPlatform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
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
        match self.app_kind(app) {
            AppKind::FileManager => {
                let out = self
                    .ps(Script::powershell(SHELL_WINDOWS), CallClass::Probe)
                    .await?;
                Ok(parse_shell(app, &out))
            }
            _ => self.enumerate(&[app.to_string()]).await,
        }
    }

    async fn probe_batch(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError> {
        if apps.is_empty() {
            return Ok(Vec::new());
        }
        self.enumerate(apps).await
    }

    async fn displays(&self) -> Result<Vec<NativeDisplay>, PlatformError> {
        let out = self
            .ps(Script::powershell(DISPLAYS), CallClass::Probe)
            .await?;
        parse_display_lines(&out)
    }

    async fn raise(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        let script = self.control(window, RAISE)?;
        self.ps(script, CallClass::Control).await.map(drop)
    }

    async fn minimize_restore(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        let script = self.control(window, MINIMIZE_RESTORE)?;
        self.ps(script, CallClass::Control).await.map(drop)
    }

    async fn animate(&self, window: &WindowRecord, frames: &[Rect]) -> Result<(), PlatformError> {
        if frames.is_empty() {
            return Ok(());
        }
        let script = self
            .control(window, ANIMATE)?
            .ints(
                "frames",
                frames
                    .iter()
                    .flat_map(|r| [r.x, r.y, r.w, r.h].map(i64::from)),
            )
            .int("flags", SWP_NOZORDER | SWP_NOACTIVATE);
        self.ps(script, CallClass::Control).await.map(drop)
    }

    async fn close(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        let script = self.control(window, CLOSE)?;
        self.ps(script, CallClass::Control).await.map(drop)
    }

    async fn set_frame(
        &self,
        window: &WindowRecord,
        rect: Rect,
        mode: FrameMode,
    ) -> Result<(), PlatformError> {
        let flags = match mode {
            FrameMode::PositionOnly => SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
            FrameMode::PositionAndSize => SWP_NOZORDER | SWP_NOACTIVATE,
        };
        let script = self
            .control(window, SET_FRAME)?
            .int("x", i64::from(rect.x))
            .int("y", i64::from(rect.y))
            .int("width", i64::from(rect.w))
            .int("height", i64::from(rect.h))
            .int("flags", flags);
        self.ps(script, CallClass::Control).await.map(drop)
    }
}

//  Parsing

/// Parse `process|hwnd|x|y|w|h|title` lines, naming each record after the
/// requested app it matched and numbering windows per app.
pub(crate) fn parse_enum(apps: &[String], output: &str) -> Vec<WindowRecord> {
    let mut counters: HashMap<String, usize> = HashMap::new();
    output
        .lines()
        .filter_map(|line| {
            let f = fields(line.trim_end_matches('\r'), 7)?;
            let app = apps
                .iter()
                .find(|a| same_app(a, f[0]))
                .cloned()
                .unwrap_or_else(|| f[0].to_string());
            let n = counters.entry(app.to_lowercase()).or_insert(0);
            *n += 1;
            let mut record = WindowRecord::new(app, f[1].trim(), f[6]).with_index(*n);
            if let (Some(x), Some(y), Some(w), Some(h)) =
                (int(f[2]), int(f[3]), int(f[4]), int(f[5]))
            {
                record = record.with_bounds(Rect::new(x, y, w, h));
            }
            Some(record)
        })
        .collect()
}

/// Parse `hwnd|index|x|y|w|h|path|name` lines.
pub(crate) fn parse_shell(app: &str, output: &str) -> Vec<WindowRecord> {
    output
        .lines()
        .filter_map(|line| {
            let f = fields(line.trim_end_matches('\r'), 8)?;
            let mut record = WindowRecord::new(app, f[0].trim(), f[7]);
            if let Ok(i) = f[1].trim().parse() {
                record = record.with_index(i);
            }
            if let (Some(x), Some(y), Some(w), Some(h)) =
                (int(f[2]), int(f[3]), int(f[4]), int(f[5]))
            {
                record = record.with_bounds(Rect::new(x, y, w, h));
            }
            if !f[6].trim().is_empty() {
                record = record.with_path(f[6].trim());
            }
            Some(record)
        })
        .collect()
}
