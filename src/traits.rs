//! Core traits that decouple cardwin from any specific operating system or
//! transport mechanism.
//!
//! Every concrete backend (macOS, Windows, X11, a Unix-socket listener, a
//! test harness, …) implements one of these traits.  The reconciliation,
//! control, arrangement and appearance components only depend on these
//! abstractions.

use crate::command::Envelope;
use crate::display::{NativeDisplay, Origin};
use crate::model::{AppKind, Rect, Rgb, WindowRecord};
use crate::platform::PlatformError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Which parts of a window's frame to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Move only.  Used for the first pass on snapping surfaces so the
    /// window lands on the right display before it is resized.
    PositionOnly,
    PositionAndSize,
}

/// Abstraction over one operating system's window-management surface.
///
/// Implementations issue automation scripts or command-line tools and parse
/// their delimited output.  Every method may be slow or fail; callers bound
/// them with timeouts and treat failures as recoverable.
#[async_trait]
pub trait WindowPlatform: Send + Sync + 'static {
    /// Short host name used in logs (`"macos"`, `"windows"`, `"linux"`).
    fn name(&self) -> &'static str;

    /// Convention of the native display report.
    fn origin(&self) -> Origin;

    /// How `app` is probed and matched.
    fn app_kind(&self, app: &str) -> AppKind;

    /// Applications queried through a dedicated per-app call.
    fn builtin_apps(&self) -> Vec<String>;

    /// Whether `app`'s windows snap their geometry to non-pixel units
    /// (character cells) and need corrective placement passes.
    fn snaps_geometry(&self, _app: &str) -> bool {
        false
    }

    /// Enumerate the windows of one built-in application.
    async fn probe_app(&self, app: &str) -> Result<Vec<WindowRecord>, PlatformError>;

    /// Enumerate the windows of all `apps` in a single batched call.
    async fn probe_batch(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError>;

    /// Report every display in native coordinates.
    async fn displays(&self) -> Result<Vec<NativeDisplay>, PlatformError>;

    /// Bring exactly this window to the front.  Sibling windows of the same
    /// application must stay where they are.
    async fn raise(&self, window: &WindowRecord) -> Result<(), PlatformError>;

    /// Minimize the window, then restore it.
    async fn minimize_restore(&self, window: &WindowRecord) -> Result<(), PlatformError>;

    /// Play a sequence of frames on the window, ending on the last one.
    async fn animate(&self, window: &WindowRecord, frames: &[Rect]) -> Result<(), PlatformError>;

    /// Close the window.
    async fn close(&self, window: &WindowRecord) -> Result<(), PlatformError>;

    /// Move (and optionally resize) the window to `rect`, in unified
    /// coordinates.
    async fn set_frame(
        &self,
        window: &WindowRecord,
        rect: Rect,
        mode: FrameMode,
    ) -> Result<(), PlatformError>;

    /// Terminal appearance backend, where the host has one.
    fn appearance(&self) -> Option<&dyn AppearanceBackend> {
        None
    }
}

/// A translucent preset to be generated and imported.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSpec {
    pub name: String,
    pub color: Rgb,
    pub alpha: f64,
}

/// Terminal appearance operations used by
/// [`ProfileManager`](crate::appearance::ProfileManager).
#[async_trait]
pub trait AppearanceBackend: Send + Sync {
    /// Current background color of the terminal window.
    async fn background_color(&self, window_id: &str) -> Result<Rgb, PlatformError>;

    async fn set_background_color(&self, window_id: &str, color: Rgb) -> Result<(), PlatformError>;

    /// Generate and import all `profiles` in one grouped operation.
    async fn import_profiles(&self, profiles: &[ProfileSpec]) -> Result<(), PlatformError>;

    async fn apply_profile(&self, window_id: &str, profile: &str) -> Result<(), PlatformError>;

    /// Switch the window back to the terminal's default preset.
    async fn apply_default_profile(&self, window_id: &str) -> Result<(), PlatformError>;
}

//  Command Source

/// A source of [`Command`](crate::command::Command)s.
///
/// Implementations listen on some transport (a Unix socket or a loopback TCP
/// port) and forward each parsed command, paired
/// with a reply channel, into the provided sink.
///
/// # Contract
///
/// * [`run`](CommandSource::run) runs until the source is exhausted or an
///   unrecoverable error occurs.
/// * Each received command must be sent through `sink` exactly once.
#[async_trait]
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming command into `sink`.
    async fn run(&mut self, sink: mpsc::Sender<Envelope>) -> Result<(), Self::Error>;
}
