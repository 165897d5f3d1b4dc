//! Application configuration.
//!
//! The configuration is loaded from a JSON file at
//! `$XDG_CONFIG_HOME/cardwin/config.json`.  Every section is optional so a
//! minimal `{}` file is valid and each section falls back to its
//! compiled-in defaults.
//!
//! # Example
//!
//! ```json
//! {
//!   "polling": { "interval_ms": 10000, "cache_ttl_ms": 5000 },
//!   "snap": { "padding_bias": -4, "passes": 3, "pass_delay_ms": 250 },
//!   "apps": { "min_panel_size": 100 }
//! }
//! ```

use crate::model::Rgb;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub snap: SnapConfig,
    #[serde(default)]
    pub displays: DisplayConfig,
    #[serde(default)]
    pub apps: AppsConfig,
    #[serde(default)]
    pub appearance: AppearanceConfig,
    #[serde(default)]
    pub ipc: IpcConfig,
}

/// Poll loop and identity cache timing.  Durations are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Period of the reconciliation loop while the board is visible.
    pub interval_ms: u64,
    /// A focus/visibility regain only triggers a cycle when the last probe
    /// is older than this.
    pub focus_min_age_ms: u64,
    /// Probe results younger than this are served from the cache.
    pub cache_ttl_ms: u64,
    /// Consecutive failed cycles before a card is reported broken.
    pub broken_threshold: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            focus_min_age_ms: 3_000,
            cache_ttl_ms: 5_000,
            broken_threshold: 3,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn focus_min_age(&self) -> Duration {
        Duration::from_millis(self.focus_min_age_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Class of an automation call, used to pick its timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    Probe,
    Control,
    /// Grid arrangement; `snapping` is set for surfaces that need
    /// corrective passes and therefore take longer.
    Arrange { snapping: bool },
    ProfileImport,
}

/// Per-call-class timeouts in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub probe_ms: u64,
    pub control_ms: u64,
    pub arrange_ms: u64,
    pub arrange_snapping_ms: u64,
    pub profile_import_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_ms: 8_000,
            control_ms: 12_000,
            arrange_ms: 20_000,
            arrange_snapping_ms: 45_000,
            profile_import_ms: 12_000,
        }
    }
}

impl TimeoutConfig {
    pub fn for_class(&self, class: CallClass) -> Duration {
        let ms = match class {
            CallClass::Probe => self.probe_ms,
            CallClass::Control => self.control_ms,
            CallClass::Arrange { snapping: false } => self.arrange_ms,
            CallClass::Arrange { snapping: true } => self.arrange_snapping_ms,
            CallClass::ProfileImport => self.profile_import_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Compensation for surfaces that snap window geometry to character cells.
///
/// These values are empirical: they were tuned against Terminal.app and are
/// not derived from any documented formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Added to the requested padding on snapping surfaces only.
    pub padding_bias: i32,
    /// Total number of placement passes (the first is position-only).
    pub passes: u32,
    /// Delay between passes (ms).
    pub pass_delay_ms: u64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            padding_bias: -4,
            passes: 3,
            pass_delay_ms: 250,
        }
    }
}

/// Display normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Top inset applied when a display reports its full frame as usable.
    pub menu_bar_inset: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { menu_bar_inset: 25 }
    }
}

/// Application names the probes treat specially.
///
/// `None` means "use the host's default".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    pub terminal: Option<String>,
    pub file_manager: Option<String>,
    /// Generic-app windows narrower or shorter than this are auxiliary
    /// panels and are not reported.
    pub min_panel_size: i32,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            terminal: None,
            file_manager: None,
            min_panel_size: 100,
        }
    }
}

/// Translucent terminal presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Background alpha of generated presets, `0.0..=1.0`.
    pub alpha: f64,
    /// Channel step (in 8-bit units) colors are snapped to before keying.
    pub quantize_step: u8,
    /// Color restored when a window's original color was never cached.
    pub fallback_color: Rgb,
    /// Where generated preset files are written.  Defaults to the system
    /// temp directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            alpha: 0.82,
            quantize_step: 8,
            fallback_color: Rgb::new(0, 0, 0),
            cache_dir: None,
        }
    }
}

impl AppearanceConfig {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cardwin-profiles"))
    }
}

/// Local IPC endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Unix socket path.  Defaults to `$XDG_RUNTIME_DIR/cardwin.sock`.
    pub socket_path: Option<PathBuf>,
    /// Loopback TCP port used where Unix sockets are unavailable.
    pub tcp_port: Option<u16>,
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
