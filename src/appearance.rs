//! Translucent terminal presets.
//!
//! Making a terminal window translucent means switching it to a preset
//! whose background carries an alpha channel.  Presets are keyed by a
//! quantized background color, so many windows share one.  Each preset is
//! generated and imported at most once per process; concurrent requests
//! for a key that is still being imported wait for that import instead of
//! starting their own.
//!
//! A window's original background color is cached when it turns
//! translucent and restored when it turns opaque again.

use crate::config::AppearanceConfig;
use crate::model::Rgb;
use crate::traits::{AppearanceBackend, ProfileSpec};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Result of an appearance change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppearanceOutcome {
    pub success: bool,
    /// Windows whose appearance now matches the request.
    pub updated: Vec<String>,
    /// Per-window failures.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl AppearanceOutcome {
    fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self
    }

    /// Every window failed for the same reason.
    pub fn all_failed(ids: &[String], error: &str) -> Self {
        Self {
            success: false,
            updated: Vec::new(),
            errors: ids.iter().map(|id| (id.clone(), error.to_string())).collect(),
        }
    }
}

/// A generated preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppearanceProfile {
    pub color_key: (u8, u8, u8),
    pub profile_name: String,
    pub imported_at: Instant,
}

type ImportResult = Option<Result<(), String>>;

#[derive(Default)]
struct Inner {
    /// Background color each window had before it turned translucent.
    colors: HashMap<String, Rgb>,
    /// Windows currently showing a translucent preset.
    transparent: HashSet<String>,
    profiles: HashMap<String, AppearanceProfile>,
    /// Imports in flight, by preset name.
    pending: HashMap<String, watch::Receiver<ImportResult>>,
}

/// Reduce 16-bit channels to 8 bits and snap each to a multiple of `step`.
pub fn quantize(color: Rgb, step: u8) -> (u8, u8, u8) {
    let (r, g, b) = color.to_u8();
    let snap = |c: u8| -> u8 {
        if step <= 1 {
            return c;
        }
        let step = u32::from(step);
        (((u32::from(c) + step / 2) / step) * step).min(255) as u8
    };
    (snap(r), snap(g), snap(b))
}

/// Preset name for a quantized color.
pub fn profile_name((r, g, b): (u8, u8, u8)) -> String {
    format!("cardwin-translucent-{:02x}{:02x}{:02x}", r, g, b)
}

/// Process-wide preset and per-window appearance caches.
pub struct ProfileManager {
    alpha: f64,
    step: u8,
    fallback: Rgb,
    import_timeout: Duration,
    inner: Mutex<Inner>,
}

impl ProfileManager {
    pub fn new(config: &AppearanceConfig, import_timeout: Duration) -> Self {
        Self {
            alpha: config.alpha.clamp(0.0, 1.0),
            step: config.quantize_step,
            fallback: config.fallback_color,
            import_timeout,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_transparent(&self, window_id: &str) -> bool {
        self.inner().transparent.contains(window_id)
    }

    /// Presets generated so far.
    pub fn profiles(&self) -> Vec<AppearanceProfile> {
        self.inner().profiles.values().cloned().collect()
    }

    /// Toggle one window.
    pub async fn set_appearance(
        &self,
        backend: &dyn AppearanceBackend,
        window_id: &str,
        enable: bool,
        color: Option<Rgb>,
    ) -> AppearanceOutcome {
        let ids = [window_id.to_string()];
        self.set_appearance_batch(backend, &ids, enable, color, &HashMap::new())
            .await
    }

    /// Toggle several windows.  All missing presets are imported in one
    /// grouped operation.
    pub async fn set_appearance_batch(
        &self,
        backend: &dyn AppearanceBackend,
        window_ids: &[String],
        enable: bool,
        color: Option<Rgb>,
        per_window: &HashMap<String, Rgb>,
    ) -> AppearanceOutcome {
        let mut ids: Vec<&String> = Vec::new();
        for id in window_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if enable {
            self.enable(backend, &ids, color, per_window).await
        } else {
            self.disable(backend, &ids).await
        }
    }

    async fn enable(
        &self,
        backend: &dyn AppearanceBackend,
        ids: &[&String],
        color: Option<Rgb>,
        per_window: &HashMap<String, Rgb>,
    ) -> AppearanceOutcome {
        let mut outcome = AppearanceOutcome::default();
        let mut wanted: Vec<(&String, String)> = Vec::new();
        let mut specs: Vec<ProfileSpec> = Vec::new();

        for id in ids {
            let original = match self.original_color(backend, id).await {
                Ok(c) => c,
                Err(e) => {
                    outcome.errors.insert((*id).clone(), e);
                    continue;
                }
            };
            let base = per_window.get(*id).copied().or(color).unwrap_or(original);
            let key = quantize(base, self.step);
            let name = profile_name(key);
            if !specs.iter().any(|s| s.name == name) {
                specs.push(ProfileSpec {
                    name: name.clone(),
                    color: Rgb::from_u8(key.0, key.1, key.2),
                    alpha: self.alpha,
                });
            }
            wanted.push((*id, name));
        }

        let ready = self.ensure_profiles(backend, specs).await;

        for (id, name) in wanted {
            match ready.get(&name) {
                Some(Ok(())) => match backend.apply_profile(id, &name).await {
                    Ok(()) => {
                        self.inner().transparent.insert(id.clone());
                        outcome.updated.push(id.clone());
                    }
                    Err(e) => {
                        warn!("applying {} to {} failed: {}", name, id, e);
                        outcome.errors.insert(id.clone(), e.to_string());
                    }
                },
                Some(Err(e)) => {
                    warn!("preset {} unavailable, {} stays opaque: {}", name, id, e);
                    outcome.errors.insert(id.clone(), e.clone());
                }
                None => {
                    outcome.errors.insert(id.clone(), format!("preset {} unavailable", name));
                }
            }
        }
        outcome.finish()
    }

    async fn disable(&self, backend: &dyn AppearanceBackend, ids: &[&String]) -> AppearanceOutcome {
        let mut outcome = AppearanceOutcome::default();
        for id in ids {
            let restore = self.inner().colors.get(*id).copied().unwrap_or(self.fallback);
            let result = async {
                backend.apply_default_profile(id).await?;
                backend.set_background_color(id, restore).await
            }
            .await;
            match result {
                Ok(()) => {
                    let mut inner = self.inner();
                    inner.colors.remove(*id);
                    inner.transparent.remove(id.as_str());
                    outcome.updated.push((*id).clone());
                }
                Err(e) => {
                    warn!("restoring {} failed: {}", id, e);
                    outcome.errors.insert((*id).clone(), e.to_string());
                }
            }
        }
        outcome.finish()
    }

    /// The window's pre-translucency color, reading and caching it on first
    /// use.
    async fn original_color(
        &self,
        backend: &dyn AppearanceBackend,
        id: &str,
    ) -> Result<Rgb, String> {
        if let Some(c) = self.inner().colors.get(id) {
            return Ok(*c);
        }
        let color = backend
            .background_color(id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(*self.inner().colors.entry(id.to_string()).or_insert(color))
    }

    /// Make sure every preset in `specs` is imported.
    ///
    /// Presets nobody is importing yet are imported together by this call;
    /// presets another call is importing are awaited.
    async fn ensure_profiles(
        &self,
        backend: &dyn AppearanceBackend,
        specs: Vec<ProfileSpec>,
    ) -> HashMap<String, Result<(), String>> {
        let mut ready = HashMap::new();
        let mut lead: Vec<ProfileSpec> = Vec::new();
        let mut senders: Vec<(String, watch::Sender<ImportResult>)> = Vec::new();
        let mut waits: Vec<(String, watch::Receiver<ImportResult>)> = Vec::new();

        {
            let mut inner = self.inner();
            for spec in specs {
                if inner.profiles.contains_key(&spec.name) {
                    ready.insert(spec.name, Ok(()));
                    continue;
                }
                // A closed sender means its importer was dropped mid-way.
                if let Some(rx) = inner.pending.get(&spec.name) {
                    if rx.has_changed().is_ok() {
                        waits.push((spec.name.clone(), rx.clone()));
                        continue;
                    }
                }
                let (tx, rx) = watch::channel(None);
                inner.pending.insert(spec.name.clone(), rx);
                senders.push((spec.name.clone(), tx));
                lead.push(spec);
            }
        }

        if !lead.is_empty() {
            info!("importing {} preset(s)", lead.len());
            let import = backend.import_profiles(&lead);
            let result = match tokio::time::timeout(self.import_timeout, import).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("preset import failed: {}", e)),
                Err(_) => Err(format!(
                    "preset import timed out after {:?}",
                    self.import_timeout
                )),
            };
            let mut inner = self.inner();
            for (spec, (name, tx)) in lead.iter().zip(senders) {
                inner.pending.remove(&name);
                if result.is_ok() {
                    inner.profiles.insert(
                        name.clone(),
                        AppearanceProfile {
                            color_key: spec.color.to_u8(),
                            profile_name: name.clone(),
                            imported_at: Instant::now(),
                        },
                    );
                }
                tx.send_replace(Some(result.clone()));
                ready.insert(name, result.clone());
            }
        }

        for (name, mut rx) in waits {
            debug!("waiting for pending import of {}", name);
            let result = match rx.wait_for(Option::is_some).await {
                Ok(value) => value.clone().unwrap_or(Ok(())),
                Err(_) => Err(format!("import of {} was abandoned", name)),
            };
            ready.insert(name, result);
        }
        ready
    }

    /// Forget cached state for `ids` (or every window) without touching
    /// any window.  Returns how many windows were forgotten.
    pub fn reset_cache(&self, ids: Option<&[String]>) -> usize {
        let mut inner = self.inner();
        match ids {
            Some(ids) => ids
                .iter()
                .filter(|id| {
                    let had_color = inner.colors.remove(id.as_str()).is_some();
                    let had_state = inner.transparent.remove(id.as_str());
                    had_color || had_state
                })
                .count(),
            None => {
                let n = inner.colors.len().max(inner.transparent.len());
                inner.colors.clear();
                inner.transparent.clear();
                n
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAppearance;

    fn manager() -> ProfileManager {
        ProfileManager::new(&AppearanceConfig::default(), Duration::from_secs(12))
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quantize_snaps_to_step() {
        assert_eq!(quantize(Rgb::from_u8(0, 3, 4), 8), (0, 0, 8));
        assert_eq!(quantize(Rgb::from_u8(30, 31, 255), 8), (32, 32, 255));
        assert_eq!(quantize(Rgb::from_u8(30, 31, 255), 1), (30, 31, 255));
        assert_eq!(quantize(Rgb::new(0x1e1e, 0, 0xffff), 0), (30, 0, 255));
    }

    #[test]
    fn profile_names_are_keyed_by_hex() {
        assert_eq!(profile_name((0x10, 0x20, 0xff)), "cardwin-translucent-1020ff");
    }

    #[tokio::test]
    async fn batch_generates_one_preset_per_color() {
        let backend = MockAppearance::default();
        let pm = manager();
        let windows = ids(&["1", "2", "3", "4", "5"]);
        for (i, id) in windows.iter().enumerate() {
            let c = if i % 2 == 0 {
                Rgb::from_u8(16, 16, 16)
            } else {
                Rgb::from_u8(240, 240, 240)
            };
            backend.set_color(id, c);
        }
        let outcome = pm
            .set_appearance_batch(&backend, &windows, true, None, &HashMap::new())
            .await;
        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(outcome.updated.len(), 5);
        assert_eq!(backend.generated(), 2);
        assert_eq!(backend.imports().len(), 1);
        assert_eq!(
            backend.profile_of("2"),
            Some(Some("cardwin-translucent-f0f0f0".to_string()))
        );

        // Already imported: nothing new is generated.
        pm.set_appearance(&backend, "1", true, None).await;
        assert_eq!(backend.generated(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_import() {
        let backend = MockAppearance::default();
        backend.set_import_delay(Duration::from_secs(1));
        backend.set_color("1", Rgb::from_u8(10, 10, 10));
        backend.set_color("2", Rgb::from_u8(10, 10, 10));
        let pm = manager();
        let (a, b) = tokio::join!(
            pm.set_appearance(&backend, "1", true, None),
            pm.set_appearance(&backend, "2", true, None),
        );
        assert!(a.success && b.success);
        assert_eq!(backend.generated(), 1);
        assert!(pm.is_transparent("1") && pm.is_transparent("2"));
    }

    #[tokio::test]
    async fn failed_import_leaves_window_opaque() {
        let backend = MockAppearance::default();
        backend.fail_import();
        backend.set_color("1", Rgb::from_u8(10, 10, 10));
        let pm = manager();
        let outcome = pm.set_appearance(&backend, "1", true, None).await;
        assert!(!outcome.success);
        assert!(outcome.errors.contains_key("1"));
        assert!(!pm.is_transparent("1"));
        assert_eq!(backend.profile_of("1"), None);
        assert!(pm.profiles().is_empty());
    }

    #[tokio::test]
    async fn explicit_color_overrides_window_color() {
        let backend = MockAppearance::default();
        backend.set_color("1", Rgb::from_u8(0, 0, 0));
        let pm = manager();
        let mut per_window = HashMap::new();
        per_window.insert("1".to_string(), Rgb::from_u8(0x40, 0x80, 0xc0));
        let fallback = Some(Rgb::from_u8(1, 1, 1));
        pm.set_appearance_batch(&backend, &ids(&["1"]), true, fallback, &per_window)
            .await;
        assert_eq!(
            backend.profile_of("1"),
            Some(Some("cardwin-translucent-4080c0".to_string()))
        );
    }

    #[tokio::test]
    async fn disable_restores_cached_color() {
        let backend = MockAppearance::default();
        let original = Rgb::from_u8(12, 34, 56);
        backend.set_color("1", original);
        let pm = manager();
        pm.set_appearance(&backend, "1", true, None).await;
        backend.set_color("1", Rgb::from_u8(0, 0, 0));

        let outcome = pm.set_appearance(&backend, "1", false, None).await;
        assert!(outcome.success);
        assert_eq!(backend.color_of("1"), Some(original));
        assert_eq!(backend.profile_of("1"), Some(None));
        assert!(!pm.is_transparent("1"));
    }

    #[tokio::test]
    async fn disable_without_cache_uses_fallback() {
        let backend = MockAppearance::default();
        let pm = manager();
        pm.set_appearance(&backend, "9", false, None).await;
        assert_eq!(backend.color_of("9"), Some(AppearanceConfig::default().fallback_color));
    }

    #[tokio::test]
    async fn unreadable_window_is_reported() {
        let backend = MockAppearance::default();
        let pm = manager();
        let outcome = pm.set_appearance(&backend, "ghost", true, None).await;
        assert!(!outcome.success);
        assert!(backend.imports().is_empty());
    }

    #[tokio::test]
    async fn reset_cache_forgets_without_calls() {
        let backend = MockAppearance::default();
        backend.set_color("1", Rgb::from_u8(1, 2, 3));
        backend.set_color("2", Rgb::from_u8(1, 2, 3));
        let pm = manager();
        pm.set_appearance_batch(&backend, &ids(&["1", "2"]), true, None, &HashMap::new())
            .await;
        assert_eq!(pm.reset_cache(Some(&ids(&["1", "7"]))), 1);
        assert!(!pm.is_transparent("1"));
        assert!(pm.is_transparent("2"));
        assert_eq!(pm.reset_cache(None), 1);
        assert!(!pm.is_transparent("2"));
        // Presets stay imported.
        assert_eq!(pm.profiles().len(), 1);
        assert_eq!(backend.profile_of("1"), Some(Some(profile_name((0, 0, 0)))));
    }
}
