//! macOS backend driven by `osascript`.
//!
//! The terminal and the Finder are queried through their own scripting
//! dictionaries, which expose a stable numeric `window id`.  Every other
//! application goes through one batched System Events script; those windows
//! have no native handle, so their ids are synthesized from the title
//! (see [`crate::probe`]).
//!
//! Display geometry comes from `NSScreen` through JXA and is reported with
//! a bottom-left origin.  Window bounds from both dictionaries are already
//! top-left based and need no conversion.

use super::{fields, int, parse_display_lines, same_app, PlatformError};
use crate::config::{CallClass, Config, TimeoutConfig};
use crate::display::{NativeDisplay, Origin};
use crate::exec::{self, Invocation};
use crate::model::{AppKind, Rect, Rgb, WindowRecord};
use crate::script::Script;
use crate::traits::{AppearanceBackend, FrameMode, ProfileSpec, WindowPlatform};
use async_trait::async_trait;
use log::{debug, info};
use std::path::PathBuf;

const DEFAULT_TERMINAL: &str = "Terminal";
const DEFAULT_FILE_MANAGER: &str = "Finder";

//  Scripts

/// `id|index|x1|y1|x2|y2|name` per visible window.
const NATIVE_PROBE: &str = r#"
set out to ""
if application {{app}} is running then
	tell application {{app}}
		set i to 0
		repeat with w in windows
			set i to i + 1
			try
				if visible of w then
					set b to bounds of w
					set out to out & (id of w) & "|" & i & "|" & (item 1 of b) & "|" & (item 2 of b) & "|" & (item 3 of b) & "|" & (item 4 of b) & "|" & (name of w) & linefeed
				end if
			end try
		end repeat
	end tell
end if
return out
"#;

/// `id|index|x1|y1|x2|y2|path|name` per Finder window.
const FINDER_PROBE: &str = r#"
set out to ""
if application {{app}} is running then
	tell application {{app}}
		set i to 0
		repeat with w in Finder windows
			set i to i + 1
			try
				set b to bounds of w
				set p to ""
				try
					set p to POSIX path of (target of w as alias)
				end try
				set out to out & (id of w) & "|" & i & "|" & (item 1 of b) & "|" & (item 2 of b) & "|" & (item 3 of b) & "|" & (item 4 of b) & "|" & p & "|" & (name of w) & linefeed
			end try
		end repeat
	end tell
end if
return out
"#;

/// `app|index|x|y|w|h|title` for every window of every requested process.
const BATCH_PROBE: &str = r#"
set out to ""
set appNames to {{apps}}
tell application "System Events"
	repeat with appName in appNames
		set n to appName as text
		if exists process n then
			set i to 0
			repeat with w in windows of process n
				set i to i + 1
				try
					set p to position of w
					set s to size of w
					set t to ""
					try
						set t to (name of w) as text
					end try
					set out to out & n & "|" & i & "|" & (item 1 of p) & "|" & (item 2 of p) & "|" & (item 1 of s) & "|" & (item 2 of s) & "|" & t & linefeed
				end try
			end repeat
		end if
	end repeat
end tell
return out
"#;

const DISPLAYS: &str = r#"
ObjC.import('AppKit');
var screens = $.NSScreen.screens;
var out = [];
for (var i = 0; i < screens.count; i++) {
	var s = screens.objectAtIndex(i);
	var f = s.frame, v = s.visibleFrame;
	out.push([i, f.origin.x, f.origin.y, f.size.width, f.size.height,
		v.origin.x, v.origin.y, v.size.width, v.size.height, i === 0 ? 1 : 0].join('|'));
}
out.join('\n');
"#;

/// Locates `target` in a System Events process: exact title, then
/// substring either way, then positional index.
const GENERIC_HEAD: &str = r#"
tell application "System Events"
	tell process {{app}}
		set target to missing value
		repeat with w in windows
			try
				if ((name of w) as text) is {{title}} then
					set target to contents of w
					exit repeat
				end if
			end try
		end repeat
		if target is missing value and {{title}} is not "" then
			repeat with w in windows
				set t to ""
				try
					set t to (name of w) as text
				end try
				if t is not "" and (t contains {{title}} or {{title}} contains t) then
					set target to contents of w
					exit repeat
				end if
			end repeat
		end if
		if target is missing value and {{index}} > 0 and {{index}} <= (count of windows) then
			set target to window {{index}}
		end if
		if target is missing value then error "window not found"
"#;

const GENERIC_TAIL: &str = r#"
	end tell
end tell
"#;

const GENERIC_RAISE: &str = r#"
		perform action "AXRaise" of target
		set value of attribute "AXMain" of target to true
"#;

const GENERIC_MINIMIZE: &str = r#"
		set value of attribute "AXMinimized" of target to true
		delay 0.3
		set value of attribute "AXMinimized" of target to false
		perform action "AXRaise" of target
"#;

const GENERIC_CLOSE: &str = r#"
		click (first button of target whose subrole is "AXCloseButton")
"#;

const GENERIC_MOVE: &str = r#"
		set position of target to {{pos}}
"#;

const GENERIC_MOVE_RESIZE: &str = r#"
		set position of target to {{pos}}
		set size of target to {{size}}
"#;

/// Frames are flattened `x, y, w, h` quadruples.
const GENERIC_ANIMATE: &str = r#"
		set fs to {{frames}}
		repeat with k from 1 to (count of fs) by 4
			set position of target to {item k of fs, item (k + 1) of fs}
			set size of target to {item (k + 2) of fs, item (k + 3) of fs}
			delay 0.016
		end repeat
"#;

/// Window-scoped raise: reorders only this window and never activates
/// the whole application.
const NATIVE_RAISE: &str = r#"
tell application {{app}}
	set index of window id {{id}} to 1
end tell
tell application "System Events"
	tell process {{app}}
		try
			perform action "AXRaise" of window 1
		end try
	end tell
end tell
"#;

const NATIVE_MINIMIZE: &str = r#"
tell application {{app}}
	set {{prop}} of window id {{id}} to true
	delay 0.3
	set {{prop}} of window id {{id}} to false
	set index of window id {{id}} to 1
end tell
"#;

const NATIVE_CLOSE: &str = r#"
tell application {{app}} to close window id {{id}}
"#;

const NATIVE_MOVE: &str = r#"
tell application {{app}} to set position of window id {{id}} to {{pos}}
"#;

const NATIVE_BOUNDS: &str = r#"
tell application {{app}} to set bounds of window id {{id}} to {{bounds}}
"#;

/// Frames are flattened `x1, y1, x2, y2` quadruples.
const NATIVE_ANIMATE: &str = r#"
tell application {{app}}
	set w to window id {{id}}
	set fs to {{frames}}
	repeat with k from 1 to (count of fs) by 4
		set bounds of w to {item k of fs, item (k + 1) of fs, item (k + 2) of fs, item (k + 3) of fs}
		delay 0.016
	end repeat
end tell
"#;

//  Terminal appearance scripts

const GET_BACKGROUND: &str = r#"
tell application {{app}} to get background color of selected tab of window id {{id}}
"#;

const SET_BACKGROUND: &str = r#"
tell application {{app}} to set background color of selected tab of window id {{id}} to {{color}}
"#;

const APPLY_SETTINGS: &str = r#"
tell application {{app}} to set current settings of selected tab of window id {{id}} to settings set {{profile}}
"#;

const APPLY_DEFAULT_SETTINGS: &str = r#"
tell application {{app}} to set current settings of selected tab of window id {{id}} to default settings
"#;

const SETTINGS_NAMES: &str = r#"
set out to ""
tell application {{app}}
	repeat with s in settings sets
		set out to out & (name of s) & linefeed
	end repeat
end tell
return out
"#;

/// Archive an sRGB `NSColor` into a `.terminal` preset file.
const WRITE_PRESET: &str = r#"
ObjC.import('AppKit');
var color = $.NSColor.colorWithSRGBRedGreenBlueAlpha({{r}}, {{g}}, {{b}}, {{alpha}});
var data = $.NSKeyedArchiver.archivedDataWithRootObjectRequiringSecureCodingError(color, false, null);
var dict = $.NSMutableDictionary.dictionary;
dict.setObjectForKey($({{name}}), 'name');
dict.setObjectForKey($('Window Settings'), 'type');
dict.setObjectForKey($.NSNumber.numberWithDouble(2.07), 'ProfileCurrentVersion');
dict.setObjectForKey(data, 'BackgroundColor');
dict.writeToFileAtomically($({{path}}), true) ? 'ok' : 'failed';
"#;

/// Wait until every imported preset is registered, then close the windows
/// the import itself opened.
const AWAIT_PRESETS: &str = r#"
set wanted to {{names}}
tell application {{app}}
	set absent to 0
	repeat 48 times
		set have to name of every settings set
		set absent to 0
		repeat with n in wanted
			if have does not contain (n as text) then set absent to absent + 1
		end repeat
		if absent is 0 then exit repeat
		delay 0.25
	end repeat
	if absent is not 0 then return "absent " & absent
	set doomed to {}
	repeat with w in windows
		try
			if wanted contains (name of current settings of selected tab of w) then set end of doomed to (id of w)
		end try
	end repeat
	repeat with i in doomed
		close window id i
	end repeat
end tell
return "ok"
"#;

//  Backend

/// `osascript`-driven backend.
pub struct MacPlatform {
    terminal: String,
    file_manager: String,
    timeouts: TimeoutConfig,
    appearance: TerminalAppearance,
}

impl MacPlatform {
    pub fn new(config: &Config) -> Self {
        let terminal = config
            .apps
            .terminal
            .clone()
            .unwrap_or_else(|| DEFAULT_TERMINAL.to_string());
        Self {
            file_manager: config
                .apps
                .file_manager
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_MANAGER.to_string()),
            timeouts: config.timeouts.clone(),
            appearance: TerminalAppearance {
                terminal: terminal.clone(),
                timeouts: config.timeouts.clone(),
                preset_dir: config.appearance.cache_dir(),
            },
            terminal,
        }
    }

    async fn osa(&self, script: Script, class: CallClass) -> Result<String, PlatformError> {
        osa(script, self.timeouts.for_class(class)).await
    }

    /// Build a script that locates a generic window and runs `body` on it.
    fn generic(&self, window: &WindowRecord, body: &str) -> Script {
        Script::applescript(format!("{}{}{}", GENERIC_HEAD, body, GENERIC_TAIL))
            .str("app", &window.app)
            .str("title", &window.name)
            .int("index", window.index.unwrap_or(0) as i64)
    }

    /// Build a script addressing a dictionary window by its numeric id.
    fn native(&self, window: &WindowRecord, template: &str) -> Result<Script, PlatformError> {
        let id: i64 = window
            .id
            .parse()
            .map_err(|_| PlatformError::not_found(window))?;
        Ok(Script::applescript(template)
            .str("app", &window.app)
            .int("id", id))
    }

    fn is_native(&self, app: &str) -> bool {
        self.app_kind(app) != AppKind::Generic
    }
}

async fn osa(script: Script, timeout: std::time::Duration) -> Result<String, PlatformError> {
    let inv = script.invocation()?;
    Ok(exec::run(&inv, timeout).await?)
}

#[async_trait]
impl WindowPlatform for MacPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn origin(&self) -> Origin {
        Origin::BottomLeft
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

    fn snaps_geometry(&self, app: &str) -> bool {
        same_app(app, &self.terminal)
    }

    async fn probe_app(&self, app: &str) -> Result<Vec<WindowRecord>, PlatformError> {
        match self.app_kind(app) {
            AppKind::Terminal => {
                let out = self
                    .osa(Script::applescript(NATIVE_PROBE).str("app", app), CallClass::Probe)
                    .await?;
                Ok(parse_native(app, &out))
            }
            AppKind::FileManager => {
                let out = self
                    .osa(Script::applescript(FINDER_PROBE).str("app", app), CallClass::Probe)
                    .await?;
                Ok(parse_finder(app, &out))
            }
            AppKind::Generic => self.probe_batch(&[app.to_string()]).await,
        }
    }

    async fn probe_batch(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError> {
        if apps.is_empty() {
            return Ok(Vec::new());
        }
        let out = self
            .osa(
                Script::applescript(BATCH_PROBE).list("apps", apps.iter().cloned()),
                CallClass::Probe,
            )
            .await?;
        Ok(parse_batch(&out))
    }

    async fn displays(&self) -> Result<Vec<NativeDisplay>, PlatformError> {
        let out = self.osa(Script::jxa(DISPLAYS), CallClass::Probe).await?;
        parse_display_lines(&out)
    }

    async fn raise(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        let script = if self.is_native(&window.app) {
            self.native(window, NATIVE_RAISE)?
        } else {
            self.generic(window, GENERIC_RAISE)
        };
        self.osa(script, CallClass::Control).await.map(drop)
    }

    async fn minimize_restore(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        let script = match self.app_kind(&window.app) {
            AppKind::Generic => self.generic(window, GENERIC_MINIMIZE),
            kind => {
                // A dictionary term, not a string literal, so spliced in as text.
                let prop = if kind == AppKind::Terminal {
                    "miniaturized"
                } else {
                    "collapsed"
                };
                self.native(window, &NATIVE_MINIMIZE.replace("{{prop}}", prop))?
            }
        };
        self.osa(script, CallClass::Control).await.map(drop)
    }

    async fn animate(&self, window: &WindowRecord, frames: &[Rect]) -> Result<(), PlatformError> {
        if frames.is_empty() {
            return Ok(());
        }
        let script = if self.is_native(&window.app) {
            self.native(window, NATIVE_ANIMATE)?
                .ints("frames", frames.iter().flat_map(|r| edges(*r)))
        } else {
            self.generic(window, GENERIC_ANIMATE)
                .ints("frames", frames.iter().flat_map(|r| xywh(*r)))
        };
        self.osa(script, CallClass::Control).await.map(drop)
    }

    async fn close(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        let script = if self.is_native(&window.app) {
            self.native(window, NATIVE_CLOSE)?
        } else {
            self.generic(window, GENERIC_CLOSE)
        };
        self.osa(script, CallClass::Control).await.map(drop)
    }

    async fn set_frame(
        &self,
        window: &WindowRecord,
        rect: Rect,
        mode: FrameMode,
    ) -> Result<(), PlatformError> {
        let pos = [i64::from(rect.x), i64::from(rect.y)];
        let script = match (self.is_native(&window.app), mode) {
            (true, FrameMode::PositionOnly) => self.native(window, NATIVE_MOVE)?.ints("pos", pos),
            (true, FrameMode::PositionAndSize) => {
                self.native(window, NATIVE_BOUNDS)?.ints("bounds", edges(rect))
            }
            (false, FrameMode::PositionOnly) => {
                self.generic(window, GENERIC_MOVE).ints("pos", pos)
            }
            (false, FrameMode::PositionAndSize) => self
                .generic(window, GENERIC_MOVE_RESIZE)
                .ints("pos", pos)
                .ints("size", [i64::from(rect.w), i64::from(rect.h)]),
        };
        self.osa(script, CallClass::Control).await.map(drop)
    }

    fn appearance(&self) -> Option<&dyn AppearanceBackend> {
        // The preset scripts rely on Terminal.app's settings-set dictionary.
        same_app(&self.terminal, DEFAULT_TERMINAL)
            .then_some(&self.appearance as &dyn AppearanceBackend)
    }
}

fn edges(r: Rect) -> [i64; 4] {
    [r.x, r.y, r.right(), r.bottom()].map(i64::from)
}

fn xywh(r: Rect) -> [i64; 4] {
    [r.x, r.y, r.w, r.h].map(i64::from)
}

//  Terminal appearance

/// Preset management for Terminal.app windows.
pub struct TerminalAppearance {
    terminal: String,
    timeouts: TimeoutConfig,
    preset_dir: PathBuf,
}

impl TerminalAppearance {
    fn window_script(&self, template: &str, window_id: &str) -> Result<Script, PlatformError> {
        let id: i64 = window_id.parse().map_err(|_| PlatformError::NotFound {
            app: self.terminal.clone(),
            id: window_id.to_string(),
        })?;
        Ok(Script::applescript(template)
            .str("app", &self.terminal)
            .int("id", id))
    }

    async fn control(&self, script: Script) -> Result<String, PlatformError> {
        osa(script, self.timeouts.for_class(CallClass::Control)).await
    }

    async fn settings_names(&self) -> Result<Vec<String>, PlatformError> {
        let out = self
            .control(Script::applescript(SETTINGS_NAMES).str("app", &self.terminal))
            .await?;
        Ok(out.lines().map(|l| l.trim().to_string()).collect())
    }
}

#[async_trait]
impl AppearanceBackend for TerminalAppearance {
    async fn background_color(&self, window_id: &str) -> Result<Rgb, PlatformError> {
        let out = self
            .control(self.window_script(GET_BACKGROUND, window_id)?)
            .await?;
        parse_color(&out).ok_or_else(|| PlatformError::parse("background color", out))
    }

    async fn set_background_color(&self, window_id: &str, color: Rgb) -> Result<(), PlatformError> {
        let script = self
            .window_script(SET_BACKGROUND, window_id)?
            .ints("color", [color.r, color.g, color.b].map(i64::from));
        self.control(script).await.map(drop)
    }

    async fn import_profiles(&self, profiles: &[ProfileSpec]) -> Result<(), PlatformError> {
        let existing = self.settings_names().await?;
        let fresh: Vec<&ProfileSpec> = profiles
            .iter()
            .filter(|p| !existing.contains(&p.name))
            .collect();
        if fresh.is_empty() {
            debug!("all {} presets already registered", profiles.len());
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.preset_dir).await?;

        let timeout = self.timeouts.for_class(CallClass::ProfileImport);
        let mut paths = Vec::with_capacity(fresh.len());
        for spec in &fresh {
            let path = self.preset_dir.join(format!("{}.terminal", spec.name));
            let path_str = path.to_string_lossy().to_string();
            let script = Script::jxa(WRITE_PRESET)
                .float("r", f64::from(spec.color.r) / 65535.0)
                .float("g", f64::from(spec.color.g) / 65535.0)
                .float("b", f64::from(spec.color.b) / 65535.0)
                .float("alpha", spec.alpha)
                .str("name", &spec.name)
                .str("path", &path_str);
            let out = osa(script, timeout).await?;
            if out != "ok" {
                return Err(PlatformError::parse("preset write", out));
            }
            paths.push(path_str);
        }

        // One `open` registers every preset file at once.
        let inv = Invocation::new("open").arg("-g").args(paths);
        exec::run(&inv, timeout).await?;

        let names: Vec<String> = fresh.iter().map(|p| p.name.clone()).collect();
        let out = osa(
            Script::applescript(AWAIT_PRESETS)
                .str("app", &self.terminal)
                .list("names", names.iter().cloned()),
            timeout,
        )
        .await?;
        if out != "ok" {
            return Err(PlatformError::parse("preset import", out));
        }
        info!("imported {} terminal presets", names.len());
        Ok(())
    }

    async fn apply_profile(&self, window_id: &str, profile: &str) -> Result<(), PlatformError> {
        let script = self
            .window_script(APPLY_SETTINGS, window_id)?
            .str("profile", profile);
        self.control(script).await.map(drop)
    }

    async fn apply_default_profile(&self, window_id: &str) -> Result<(), PlatformError> {
        self.control(self.window_script(APPLY_DEFAULT_SETTINGS, window_id)?)
            .await
            .map(drop)
    }
}

//  Parsing

/// Parse `id|index|x1|y1|x2|y2|name` lines.
pub(crate) fn parse_native(app: &str, output: &str) -> Vec<WindowRecord> {
    output
        .lines()
        .filter_map(|line| {
            let f = fields(line.trim_end_matches('\r'), 7)?;
            let mut record = WindowRecord::new(app, f[0].trim(), f[6]);
            if let Ok(i) = f[1].trim().parse() {
                record = record.with_index(i);
            }
            if let Some(b) = bounds_from_edges(&f[2..6]) {
                record = record.with_bounds(b);
            }
            Some(record)
        })
        .collect()
}

/// Parse `id|index|x1|y1|x2|y2|path|name` lines.
pub(crate) fn parse_finder(app: &str, output: &str) -> Vec<WindowRecord> {
    output
        .lines()
        .filter_map(|line| {
            let f = fields(line.trim_end_matches('\r'), 8)?;
            let mut record = WindowRecord::new(app, f[0].trim(), f[7]);
            if let Ok(i) = f[1].trim().parse() {
                record = record.with_index(i);
            }
            if let Some(b) = bounds_from_edges(&f[2..6]) {
                record = record.with_bounds(b);
            }
            if !f[6].is_empty() {
                record = record.with_path(f[6]);
            }
            Some(record)
        })
        .collect()
}

/// Parse `app|index|x|y|w|h|title` lines.  Ids are left empty for the
/// probe to synthesize.
pub(crate) fn parse_batch(output: &str) -> Vec<WindowRecord> {
    output
        .lines()
        .filter_map(|line| {
            let f = fields(line.trim_end_matches('\r'), 7)?;
            let mut record = WindowRecord::new(f[0], "", f[6]);
            if let Ok(i) = f[1].trim().parse() {
                record = record.with_index(i);
            }
            if let (Some(x), Some(y), Some(w), Some(h)) =
                (int(f[2]), int(f[3]), int(f[4]), int(f[5]))
            {
                record = record.with_bounds(Rect::new(x, y, w, h));
            }
            Some(record)
        })
        .collect()
}

fn bounds_from_edges(f: &[&str]) -> Option<Rect> {
    Some(Rect::from_edges(int(f[0])?, int(f[1])?, int(f[2])?, int(f[3])?))
}

/// Parse Terminal's `r, g, b[, a]` 16-bit color list.
pub(crate) fn parse_color(output: &str) -> Option<Rgb> {
    let mut channels = output
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(|c| c.trim().parse::<u16>().ok());
    Some(Rgb::new(channels.next()??, channels.next()??, channels.next()??))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_probe_lines() {
        let out = "4211|1|0|25|960|1080|zsh — 80×24\n4300|2|960|25|1920|1080|vim | notes\n";
        let w = parse_native("Terminal", out);
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].id, "4211");
        assert_eq!(w[0].index, Some(1));
        assert_eq!(w[0].bounds, Some(Rect::new(0, 25, 960, 1055)));
        assert_eq!(w[1].name, "vim | notes");
    }

    #[test]
    fn finder_probe_carries_path() {
        let out = "77|1|10|40|810|640|/Users/me/src/|src\n78|2|0|0|100|100||Recents\n";
        let w = parse_finder("Finder", out);
        assert_eq!(w[0].path.as_deref(), Some("/Users/me/src/"));
        assert_eq!(w[0].name, "src");
        assert_eq!(w[1].path, None);
    }

    #[test]
    fn batch_probe_leaves_ids_empty() {
        let out = "Code|1|0|25|1440|875|main.rs — cardwin\nCode|2|0|0|40|40|\nSafari|1|100|100|800|600|Docs";
        let w = parse_batch(out);
        assert_eq!(w.len(), 3);
        assert!(w.iter().all(|r| r.id.is_empty()));
        assert_eq!(w[0].app, "Code");
        assert_eq!(w[1].name, "");
        assert_eq!(w[2].bounds, Some(Rect::new(100, 100, 800, 600)));
    }

    #[test]
    fn garbage_lines_are_skipped() {
        assert!(parse_native("Terminal", "not a record\n").is_empty());
        assert!(parse_batch("").is_empty());
    }

    #[test]
    fn terminal_color_output() {
        assert_eq!(parse_color("7710, 7710, 8224"), Some(Rgb::new(7710, 7710, 8224)));
        assert_eq!(parse_color("{0, 0, 0, 65535}"), Some(Rgb::new(0, 0, 0)));
        assert_eq!(parse_color("oops"), None);
    }

    #[test]
    fn generic_script_quotes_title() {
        let p = MacPlatform::new(&Config::default());
        let w = WindowRecord::new("Code", "Code:a", r#"say "hi""#).with_index(2);
        let body = p.generic(&w, GENERIC_RAISE).render().unwrap();
        assert!(body.contains(r#"tell process "Code""#));
        assert!(body.contains(r#""say \"hi\"""#));
        assert!(body.contains("2 <= (count of windows)"));
    }

    #[test]
    fn native_script_requires_numeric_id() {
        let p = MacPlatform::new(&Config::default());
        let w = WindowRecord::new("Terminal", "Terminal:zsh", "zsh");
        assert!(matches!(
            p.native(&w, NATIVE_CLOSE),
            Err(PlatformError::NotFound { .. })
        ));
    }

    #[test]
    fn kinds_and_snapping() {
        let p = MacPlatform::new(&Config::default());
        assert_eq!(p.app_kind("terminal"), AppKind::Terminal);
        assert_eq!(p.app_kind("Finder"), AppKind::FileManager);
        assert_eq!(p.app_kind("Code"), AppKind::Generic);
        assert!(p.snaps_geometry("Terminal"));
        assert!(!p.snaps_geometry("Code"));
        assert!(p.appearance().is_some());
    }
}
