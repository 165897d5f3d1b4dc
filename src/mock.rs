//! In-memory [`WindowPlatform`] for tests.
//!
//! [`MockPlatform`] keeps a list of windows and displays, records every
//! call made on it, and applies frame changes and closes to its own state
//! so follow-up probes observe them.

use crate::display::{NativeDisplay, Origin};
use crate::exec::ExecError;
use crate::model::{AppKind, Rect, Rgb, WindowRecord};
use crate::platform::PlatformError;
use crate::traits::{AppearanceBackend, FrameMode, ProfileSpec, WindowPlatform};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ProbeApp(String),
    ProbeBatch(Vec<String>),
    Displays,
    Raise(String),
    MinimizeRestore(String),
    Animate(String, usize),
    Close(String),
    SetFrame(String, Rect, FrameMode),
}

#[derive(Default)]
struct State {
    windows: Vec<WindowRecord>,
    displays: Vec<NativeDisplay>,
    calls: Vec<Call>,
    failing_apps: HashSet<String>,
    fail_displays: bool,
    fail_control: bool,
    /// `set_frame` calls allowed to succeed before the rest fail.
    frame_budget: Option<usize>,
    probe_delay: Duration,
}

pub struct MockPlatform {
    state: Mutex<State>,
    appearance: Option<MockAppearance>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn failure(what: &str) -> PlatformError {
    PlatformError::Exec(ExecError::Failed {
        program: "mock".into(),
        status: "exit status: 1".into(),
        stderr: what.into(),
    })
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                displays: vec![NativeDisplay {
                    frame: Rect::new(0, 0, 1920, 1080),
                    visible: Rect::new(0, 25, 1920, 1055),
                    is_main: true,
                }],
                ..State::default()
            }),
            appearance: Some(MockAppearance::default()),
        }
    }

    pub fn without_appearance() -> Self {
        Self {
            appearance: None,
            ..Self::new()
        }
    }

    pub fn with_windows(self, windows: Vec<WindowRecord>) -> Self {
        lock(&self.state).windows = windows;
        self
    }

    pub fn with_displays(self, displays: Vec<NativeDisplay>) -> Self {
        lock(&self.state).displays = displays;
        self
    }

    pub fn with_probe_delay(self, delay: Duration) -> Self {
        lock(&self.state).probe_delay = delay;
        self
    }

    pub fn set_windows(&self, windows: Vec<WindowRecord>) {
        lock(&self.state).windows = windows;
    }

    pub fn fail_probe(&self, app: &str) {
        lock(&self.state).failing_apps.insert(app.to_lowercase());
    }

    pub fn fail_displays(&self) {
        lock(&self.state).fail_displays = true;
    }

    pub fn fail_control(&self) {
        lock(&self.state).fail_control = true;
    }

    pub fn fail_frames_after(&self, successes: usize) {
        lock(&self.state).frame_budget = Some(successes);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Number of probe calls (per-app and batched) made so far.
    pub fn probe_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| matches!(c, Call::ProbeApp(_) | Call::ProbeBatch(_)))
            .count()
    }

    pub fn frames(&self) -> Vec<(String, Rect, FrameMode)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::SetFrame(id, r, m) => Some((id.clone(), *r, *m)),
                _ => None,
            })
            .collect()
    }

    pub fn windows(&self) -> Vec<WindowRecord> {
        lock(&self.state).windows.clone()
    }

    pub fn appearance_mock(&self) -> &MockAppearance {
        self.appearance.as_ref().expect("mock built without appearance")
    }

    fn record(&self, call: Call) {
        lock(&self.state).calls.push(call);
    }

    fn control(&self, call: Call, window: &WindowRecord) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        if state.fail_control {
            return Err(failure("control failed"));
        }
        if !state.windows.iter().any(|w| w.id == window.id) {
            return Err(PlatformError::not_found(window));
        }
        Ok(())
    }

    async fn delay(&self) {
        let delay = lock(&self.state).probe_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WindowPlatform for MockPlatform {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn origin(&self) -> Origin {
        Origin::TopLeft
    }

    fn app_kind(&self, app: &str) -> AppKind {
        match app.to_lowercase().as_str() {
            "terminal" => AppKind::Terminal,
            "finder" => AppKind::FileManager,
            _ => AppKind::Generic,
        }
    }

    fn builtin_apps(&self) -> Vec<String> {
        vec!["Terminal".into(), "Finder".into()]
    }

    fn snaps_geometry(&self, app: &str) -> bool {
        app.eq_ignore_ascii_case("terminal")
    }

    async fn probe_app(&self, app: &str) -> Result<Vec<WindowRecord>, PlatformError> {
        self.record(Call::ProbeApp(app.to_string()));
        self.delay().await;
        let state = lock(&self.state);
        if state.failing_apps.contains(&app.to_lowercase()) {
            return Err(failure("probe failed"));
        }
        Ok(state
            .windows
            .iter()
            .filter(|w| w.app.eq_ignore_ascii_case(app))
            .cloned()
            .collect())
    }

    async fn probe_batch(&self, apps: &[String]) -> Result<Vec<WindowRecord>, PlatformError> {
        self.record(Call::ProbeBatch(apps.to_vec()));
        self.delay().await;
        let state = lock(&self.state);
        if apps
            .iter()
            .any(|a| state.failing_apps.contains(&a.to_lowercase()))
        {
            return Err(failure("batch probe failed"));
        }
        Ok(state
            .windows
            .iter()
            .filter(|w| apps.iter().any(|a| w.app.eq_ignore_ascii_case(a)))
            .cloned()
            .collect())
    }

    async fn displays(&self) -> Result<Vec<NativeDisplay>, PlatformError> {
        self.record(Call::Displays);
        let state = lock(&self.state);
        if state.fail_displays {
            return Err(failure("no displays"));
        }
        Ok(state.displays.clone())
    }

    async fn raise(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        self.control(Call::Raise(window.id.clone()), window)
    }

    async fn minimize_restore(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        self.control(Call::MinimizeRestore(window.id.clone()), window)
    }

    async fn animate(&self, window: &WindowRecord, frames: &[Rect]) -> Result<(), PlatformError> {
        self.control(Call::Animate(window.id.clone(), frames.len()), window)
    }

    async fn close(&self, window: &WindowRecord) -> Result<(), PlatformError> {
        self.control(Call::Close(window.id.clone()), window)?;
        lock(&self.state).windows.retain(|w| w.id != window.id);
        Ok(())
    }

    async fn set_frame(
        &self,
        window: &WindowRecord,
        rect: Rect,
        mode: FrameMode,
    ) -> Result<(), PlatformError> {
        self.control(Call::SetFrame(window.id.clone(), rect, mode), window)?;
        let mut state = lock(&self.state);
        if let Some(budget) = state.frame_budget.as_mut() {
            if *budget == 0 {
                return Err(failure("set_frame failed"));
            }
            *budget -= 1;
        }
        if let Some(w) = state.windows.iter_mut().find(|w| w.id == window.id) {
            let current = w.bounds.unwrap_or(rect);
            w.bounds = Some(match mode {
                FrameMode::PositionOnly => Rect::new(rect.x, rect.y, current.w, current.h),
                FrameMode::PositionAndSize => rect,
            });
        }
        Ok(())
    }

    fn appearance(&self) -> Option<&dyn AppearanceBackend> {
        self.appearance
            .as_ref()
            .map(|a| a as &dyn AppearanceBackend)
    }
}

//  Appearance

#[derive(Default)]
struct AppearanceState {
    colors: HashMap<String, Rgb>,
    profiles: HashMap<String, Option<String>>,
    imports: Vec<Vec<String>>,
    registered: HashSet<String>,
    fail_import: bool,
    import_delay: Duration,
}

/// Records preset imports and per-window presets.
#[derive(Default)]
pub struct MockAppearance {
    state: Mutex<AppearanceState>,
}

impl MockAppearance {
    pub fn set_color(&self, window_id: &str, color: Rgb) {
        lock(&self.state).colors.insert(window_id.to_string(), color);
    }

    pub fn color_of(&self, window_id: &str) -> Option<Rgb> {
        lock(&self.state).colors.get(window_id).copied()
    }

    /// `Some(Some(name))` for a custom preset, `Some(None)` for the default.
    pub fn profile_of(&self, window_id: &str) -> Option<Option<String>> {
        lock(&self.state).profiles.get(window_id).cloned()
    }

    /// Preset names passed to each import call.
    pub fn imports(&self) -> Vec<Vec<String>> {
        lock(&self.state).imports.clone()
    }

    /// Total number of presets generated across all imports.
    pub fn generated(&self) -> usize {
        lock(&self.state).imports.iter().map(Vec::len).sum()
    }

    pub fn fail_import(&self) {
        lock(&self.state).fail_import = true;
    }

    pub fn set_import_delay(&self, delay: Duration) {
        lock(&self.state).import_delay = delay;
    }
}

#[async_trait]
impl AppearanceBackend for MockAppearance {
    async fn background_color(&self, window_id: &str) -> Result<Rgb, PlatformError> {
        lock(&self.state)
            .colors
            .get(window_id)
            .copied()
            .ok_or_else(|| PlatformError::NotFound {
                app: "Terminal".into(),
                id: window_id.to_string(),
            })
    }

    async fn set_background_color(&self, window_id: &str, color: Rgb) -> Result<(), PlatformError> {
        lock(&self.state).colors.insert(window_id.to_string(), color);
        Ok(())
    }

    async fn import_profiles(&self, profiles: &[ProfileSpec]) -> Result<(), PlatformError> {
        let delay = lock(&self.state).import_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        state
            .imports
            .push(profiles.iter().map(|p| p.name.clone()).collect());
        if state.fail_import {
            return Err(failure("import failed"));
        }
        for p in profiles {
            state.registered.insert(p.name.clone());
        }
        Ok(())
    }

    async fn apply_profile(&self, window_id: &str, profile: &str) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        if !state.registered.contains(profile) {
            return Err(failure("unknown preset"));
        }
        state
            .profiles
            .insert(window_id.to_string(), Some(profile.to_string()));
        Ok(())
    }

    async fn apply_default_profile(&self, window_id: &str) -> Result<(), PlatformError> {
        lock(&self.state).profiles.insert(window_id.to_string(), None);
        Ok(())
    }
}
