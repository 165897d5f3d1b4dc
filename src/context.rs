//! Process-wide state shared by every component.
//!
//! One [`Context`] is built at startup and handed around as an
//! `Arc<Context<P>>`.  It owns the platform backend, the configuration, the
//! identity cache, the reconciliation state with its change channel, and
//! the appearance-profile caches.

use crate::appearance::ProfileManager;
use crate::cache::IdentityCache;
use crate::config::{CallClass, Config};
use crate::display::{self, GeometryUnavailable};
use crate::model::{Card, DisplayInfo, WindowRecord};
use crate::platform::{same_app, Capability, PlatformError};
use crate::probe;
use crate::reconcile::{LinkReport, Reconciler};
use crate::traits::WindowPlatform;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

pub struct Context<P: WindowPlatform> {
    platform: P,
    config: Config,
    capability: Capability,
    identity: IdentityCache,
    links: Mutex<Reconciler>,
    links_tx: watch::Sender<LinkReport>,
    profiles: ProfileManager,
    visible: AtomicBool,
    cycle_running: AtomicBool,
}

/// Marks a reconciliation cycle as running until dropped.
pub struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<P: WindowPlatform> Context<P> {
    pub fn new(platform: P, config: Config, capability: Capability) -> Arc<Self> {
        let identity = IdentityCache::new(config.polling.cache_ttl());
        let links = Reconciler::new(config.polling.broken_threshold);
        let profiles = ProfileManager::new(
            &config.appearance,
            config.timeouts.for_class(CallClass::ProfileImport),
        );
        let (links_tx, _) = watch::channel(LinkReport::default());
        Arc::new(Self {
            platform,
            config,
            capability,
            identity,
            links: Mutex::new(links),
            links_tx,
            profiles,
            visible: AtomicBool::new(false),
            cycle_running: AtomicBool::new(false),
        })
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileManager {
        &self.profiles
    }

    /// Fails when the host's automation tools are missing.
    pub fn ensure_capable(&self) -> Result<(), PlatformError> {
        self.capability.require()
    }

    pub fn timeout(&self, class: CallClass) -> Duration {
        self.config.timeouts.for_class(class)
    }

    //  Windows

    /// Live windows of the built-in apps plus `extra_apps`, served from the
    /// identity cache when fresh.
    pub async fn windows(&self, extra_apps: &[String]) -> Vec<WindowRecord> {
        let records = self
            .identity
            .get(extra_apps, |apps| self.probe(apps))
            .await;
        self.visible_to(&records, extra_apps)
    }

    /// Like [`windows`](Self::windows) but always probes.
    pub async fn fresh_windows(&self, extra_apps: &[String]) -> Vec<WindowRecord> {
        let records = self
            .identity
            .refresh(extra_apps, |apps| self.probe(apps))
            .await;
        self.visible_to(&records, extra_apps)
    }

    async fn probe(&self, apps: Vec<String>) -> Vec<WindowRecord> {
        probe::list_windows(
            &self.platform,
            &apps,
            self.timeout(CallClass::Probe),
            self.config.apps.min_panel_size,
        )
        .await
    }

    /// A snapshot may cover apps other callers asked for; only hand back
    /// what this caller asked for.
    fn visible_to(&self, records: &[WindowRecord], extra_apps: &[String]) -> Vec<WindowRecord> {
        let builtin = self.platform.builtin_apps();
        records
            .iter()
            .filter(|r| {
                builtin.iter().chain(extra_apps).any(|a| same_app(a, &r.app))
            })
            .cloned()
            .collect()
    }

    /// Force the next lookup to probe.
    pub async fn invalidate(&self) {
        self.identity.invalidate().await;
    }

    pub fn last_probe_age(&self) -> Option<Duration> {
        self.identity.last_probe_age()
    }

    //  Displays

    /// Every display in unified coordinates.  Recomputed on each call.
    pub async fn displays(&self) -> Result<Vec<DisplayInfo>, GeometryUnavailable> {
        let timeout = self.timeout(CallClass::Probe);
        let natives = match tokio::time::timeout(timeout, self.platform.displays()).await {
            Ok(Ok(natives)) => natives,
            Ok(Err(e)) => return Err(GeometryUnavailable(e.to_string())),
            Err(_) => {
                return Err(GeometryUnavailable(format!(
                    "display query timed out after {:?}",
                    timeout
                )))
            }
        };
        display::resolve(
            &natives,
            self.platform.origin(),
            self.config.displays.menu_bar_inset,
        )
    }

    //  Reconciliation

    fn links(&self) -> MutexGuard<'_, Reconciler> {
        self.links.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sync_cards(&self, cards: Vec<Card>, active_app: String) {
        self.links().set_cards(cards, active_app);
    }

    pub fn active_app(&self) -> String {
        self.links().active_app().to_string()
    }

    pub fn link_report(&self) -> LinkReport {
        self.links().report().clone()
    }

    /// Run one reconciliation pass over `live` and publish the report if
    /// it changed.
    pub fn reconcile(&self, live: &[WindowRecord]) -> Option<LinkReport> {
        let changed = self
            .links()
            .cycle(live, |app| self.platform.app_kind(app));
        if let Some(report) = &changed {
            self.publish(report.clone());
        }
        changed
    }

    pub fn publish(&self, report: LinkReport) {
        debug!(
            "publishing links: {} unadded, {} broken, {} repairs",
            report.unadded.len(),
            report.broken.len(),
            report.repairs.len()
        );
        self.links_tx.send_replace(report);
    }

    /// Receive every published report.
    pub fn subscribe(&self) -> watch::Receiver<LinkReport> {
        self.links_tx.subscribe()
    }

    /// Claim the single reconciliation slot.  `None` while a cycle runs.
    pub fn begin_cycle(&self) -> Option<CycleGuard<'_>> {
        self.cycle_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                flag: &self.cycle_running,
            })
    }

    //  Visibility

    /// Record board visibility.  Returns `true` when it just became
    /// visible.
    pub fn set_visible(&self, visible: bool) -> bool {
        let was = self.visible.swap(visible, Ordering::AcqRel);
        visible && !was
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }
}
