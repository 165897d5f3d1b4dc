//! Host window-management backends.
//!
//! Each supported operating system has one [`WindowPlatform`] implementation
//! that drives the host's automation surface through external tools:
//!
//! - [`macos`]: `osascript` (AppleScript and JXA).
//! - [`windows`]: `powershell` with a small Win32 interop type.
//! - [`linux`]: X11 through `wmctrl`, `xdotool`, `xrandr` and `xprop`.
//!
//! [`Host`] picks the implementation matching the running OS once at
//! startup.  The helpers at the bottom parse the `|`-delimited line format
//! every probe script emits.

pub mod linux;
pub mod macos;
pub mod windows;

use crate::config::Config;
use crate::display::{NativeDisplay, Origin};
use crate::exec::ExecError;
use crate::model::{AppKind, Rect, WindowRecord};
use crate::script::ScriptError;
use crate::traits::{AppearanceBackend, FrameMode, WindowPlatform};
use async_trait::async_trait;
use log::{info, warn};

pub use linux::LinuxPlatform;
pub use macos::MacPlatform;
pub use windows::WindowsPlatform;

/// Errors from a platform backend.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("unexpected {what} output: {detail}")]
    Parse { what: &'static str, detail: String },
    #[error("{0} is not supported on this host")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("automation tools missing: {}", .0.join(", "))]
    CapabilityMissing(Vec<String>),
    #[error("window {app}/{id} not found")]
    NotFound { app: String, id: String },
}

impl PlatformError {
    pub(crate) fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        PlatformError::Parse {
            what,
            detail: detail.into(),
        }
    }

    pub(crate) fn not_found(window: &WindowRecord) -> Self {
        PlatformError::NotFound {
            app: window.app.clone(),
            id: window.id.clone(),
        }
    }
}

//  Host selection

/// The platform backend for the running operating system.
pub enum Host {
    Mac(MacPlatform),
    Windows(WindowsPlatform),
    Linux(LinuxPlatform),
}

impl Host {
    /// Select the backend for `std::env::consts::OS`.
    pub fn detect(config: &Config) -> Result<Self, PlatformError> {
        Self::for_os(std::env::consts::OS, config)
    }

    pub fn for_os(os: &str, config: &Config) -> Result<Self, PlatformError> {
        let host = match os {
            "macos" => Host::Mac(MacPlatform::new(config)),
            "windows" => Host::Windows(WindowsPlatform::new(config)),
            "linux" | "freebsd" | "openbsd" | "netbsd" => Host::Linux(LinuxPlatform::new(config)),
            other => return Err(PlatformError::Unsupported(other.to_string())),
        };
        info!("platform backend: {}", host.name());
        Ok(host)
    }

    /// External tools the backend shells out to.
    pub fn required_tools(&self) -> &'static [&'static str] {
        match self {
            Host::Mac(_) => &["osascript", "open"],
            Host::Windows(_) => &["powershell"],
            Host::Linux(_) => &["wmctrl", "xdotool", "xrandr", "xprop"],
        }
    }
}

/// Whether the host's automation tools are installed.
///
/// Checked once at startup.  When anything is missing, every platform
/// operation answers with a typed error instead of trying to spawn it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capability {
    missing: Vec<String>,
}

impl Capability {
    /// Look every tool up on `PATH`.
    pub fn check(tools: &[&str]) -> Self {
        let missing: Vec<String> = tools
            .iter()
            .filter(|tool| which::which(tool).is_err())
            .map(|tool| tool.to_string())
            .collect();
        if missing.is_empty() {
            info!("automation tools available: {}", tools.join(", "));
        } else {
            warn!("automation tools missing: {}", missing.join(", "));
        }
        Self { missing }
    }

    pub fn missing(tools: &[&str]) -> Self {
        Self {
            missing: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_tools(&self) -> &[String] {
        &self.missing
    }

    /// `Err` naming the missing tools, if any.
    pub fn require(&self) -> Result<(), PlatformError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(PlatformError::CapabilityMissing(self.missing.clone()))
        }
    }
}

/// Forward every trait method to the active backend.
macro_rules! dispatch {
    ($self:ident, $p:ident => $call:expr) => {
        match $self {
            Host::Mac($p) => $call,
            Host::Windows($p) => $call,
            Host::Linux($p) => $call,
        }
    };
}

#[async_trait]
impl WindowPlatform for Host {
    fn name(&self) -> &'static str {
        dispatch!(self, p => p.name())
    }

    fn origin(&self) -> Origin {
        dispatch!(self, p => p.origin())
    }

    fn app_kind(&self, app: &str) -> AppKind {
        dispatch!(self, p => p.app_kind(app))
    }

    fn builtin_apps(&self) -> Vec<String> {
        dispatch!(self, p => p.builtin_apps())
    }

    fn snaps_geometry(&self, app: &str) -> bool {
        dispatch!(self, p => p.snaps_geometry(app))
    }

    async fn probe_app(&self, app: &str) -> Result<Vec<WindowRecord>, PlatformError> {
        dispatch!(self, p => p.probe_app(app).await)
    }

    async fn probe_batch(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError> {
        dispatch!(self, p => p.probe_batch(apps).await)
    }

    async fn displays(&self) -> Result<Vec<NativeDisplay>, PlatformError> {
        dispatch!(self, p => p.displays().await)
    }

    async fn raise(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        dispatch!(self, p => p.raise(window).await)
    }

    async fn minimize_restore(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        dispatch!(self, p => p.minimize_restore(window).await)
    }

    async fn animate(&self, window: &WindowRecord, frames: &[Rect]) -> Result<(), PlatformError> {
        dispatch!(self, p => p.animate(window, frames).await)
    }

    async fn close(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        dispatch!(self, p => p.close(window).await)
    }

    async fn set_frame(
        &self,
        window: &WindowRecord,
        rect: Rect,
        mode: FrameMode,
    ) -> Result<(), PlatformError> {
        dispatch!(self, p => p.set_frame(window, rect, mode).await)
    }

    fn appearance(&self) -> Option<&dyn AppearanceBackend> {
        dispatch!(self, p => p.appearance())
    }
}

//  Output parsing helpers

/// Split a `|`-delimited line into exactly `n` fields.
///
/// The last field takes the remainder of the line, so a window title
/// containing `|` survives intact as long as it is emitted last.
pub(crate) fn fields(line: &str, n: usize) -> Option<Vec<&str>> {
    let parts: Vec<&str> = line.splitn(n, '|').collect();
    (parts.len() == n).then_some(parts)
}

/// Parse an integer that a script may have printed as a float (`"12.0"`).
pub(crate) fn int(s: &str) -> Option<i32> {
    let s = s.trim();
    s.parse::<i32>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i32))
}

/// Parse the shared display line format:
/// `index|fx|fy|fw|fh|vx|vy|vw|vh|main`.
pub(crate) fn parse_display_lines(output: &str) -> Result<Vec<NativeDisplay>, PlatformError> {
    let mut out = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let f = fields(line, 10).ok_or_else(|| PlatformError::parse("display", line))?;
        let n: Option<Vec<i32>> = f[1..9].iter().map(|s| int(s)).collect();
        let n = n.ok_or_else(|| PlatformError::parse("display", line))?;
        out.push(NativeDisplay {
            frame: Rect::new(n[0], n[1], n[2], n[3]),
            visible: Rect::new(n[4], n[5], n[6], n[7]),
            is_main: matches!(f[9].trim(), "1" | "true" | "True"),
        });
    }
    Ok(out)
}

/// Case-insensitive application name comparison.
pub(crate) fn same_app(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keeps_pipes_in_last_field() {
        let f = fields("1|2|a | b | c", 3).unwrap();
        assert_eq!(f, vec!["1", "2", "a | b | c"]);
        assert!(fields("1|2", 3).is_none());
    }

    #[test]
    fn int_accepts_float_output() {
        assert_eq!(int("12"), Some(12));
        assert_eq!(int(" 12.0 "), Some(12));
        assert_eq!(int("-3.6"), Some(-4));
        assert_eq!(int("x"), None);
    }

    #[test]
    fn display_lines_parse() {
        let out = "0|0|0|1920|1080|0|60|1920|995|1\n1|1920|0|2560|1440|1920|0|2560|1440|0\n";
        let d = parse_display_lines(out).unwrap();
        assert_eq!(d.len(), 2);
        assert!(d[0].is_main);
        assert_eq!(d[0].visible, Rect::new(0, 60, 1920, 995));
        assert_eq!(d[1].frame, Rect::new(1920, 0, 2560, 1440));
        assert!(!d[1].is_main);
    }

    #[test]
    fn malformed_display_line_is_a_parse_error() {
        assert!(matches!(
            parse_display_lines("0|0|0|1920"),
            Err(PlatformError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_os_is_unsupported() {
        let cfg = Config::default();
        assert!(matches!(
            Host::for_os("plan9", &cfg),
            Err(PlatformError::Unsupported(_))
        ));
        let host = Host::for_os("linux", &cfg).unwrap();
        assert_eq!(host.name(), "linux");
        assert_eq!(host.origin(), Origin::TopLeft);
    }

    #[test]
    fn capability_reports_missing_tools() {
        let cap = Capability::check(&["cardwin-no-such-tool"]);
        assert!(!cap.is_available());
        assert_eq!(cap.missing_tools(), ["cardwin-no-such-tool"]);
        assert!(Capability::check(&[]).is_available());
    }

    #[test]
    fn require_names_missing_tools() {
        let err = Capability::missing(&["wmctrl", "xrandr"]).require().unwrap_err();
        assert_eq!(err.to_string(), "automation tools missing: wmctrl, xrandr");
        assert!(Capability::default().require().is_ok());
    }

    #[tokio::test]
    async fn filesystem_failures_are_io_errors() {
        let file = std::env::temp_dir().join(format!("cardwin-io-{}", std::process::id()));
        tokio::fs::write(&file, b"x").await.unwrap();
        let result: Result<(), PlatformError> = async {
            tokio::fs::create_dir_all(file.join("presets")).await?;
            Ok(())
        }
        .await;
        let _ = tokio::fs::remove_file(&file).await;
        assert!(matches!(result, Err(PlatformError::Io(_))));
    }
}
