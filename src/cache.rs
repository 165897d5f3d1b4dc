//! Short-lived cache of probe results.
//!
//! Probing is expensive (it spawns automation tools), so results younger
//! than the TTL are shared between callers.  At most one probe runs at a
//! time: a caller that finds the cache stale holds the slot lock while it
//! probes, and concurrent callers wait on that lock and then find the fresh
//! result instead of starting a probe of their own.

use crate::model::WindowRecord;
use log::trace;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct Snapshot {
    taken: Instant,
    /// Extra apps the snapshot covers, keyed by lowercase name.
    apps: BTreeMap<String, String>,
    records: Arc<Vec<WindowRecord>>,
}

/// Time-bounded, single-flight cache of the latest probe.
pub struct IdentityCache {
    ttl: Duration,
    slot: tokio::sync::Mutex<Option<Snapshot>>,
    last_probe: Mutex<Option<Instant>>,
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: tokio::sync::Mutex::new(None),
            last_probe: Mutex::new(None),
        }
    }

    /// Serve a fresh snapshot covering `extra_apps`, or run `probe`.
    ///
    /// `probe` receives the union of `extra_apps` and the apps the previous
    /// snapshot covered, so alternating callers do not evict each other.
    pub async fn get<F, Fut>(&self, extra_apps: &[String], probe: F) -> Arc<Vec<WindowRecord>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Vec<WindowRecord>>,
    {
        self.fetch(extra_apps, probe, false).await
    }

    /// Probe unconditionally and replace the snapshot.
    pub async fn refresh<F, Fut>(&self, extra_apps: &[String], probe: F) -> Arc<Vec<WindowRecord>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Vec<WindowRecord>>,
    {
        self.fetch(extra_apps, probe, true).await
    }

    async fn fetch<F, Fut>(
        &self,
        extra_apps: &[String],
        probe: F,
        force: bool,
    ) -> Arc<Vec<WindowRecord>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Vec<WindowRecord>>,
    {
        let wanted: BTreeMap<String, String> = extra_apps
            .iter()
            .map(|a| (a.to_lowercase(), a.clone()))
            .collect();

        let mut slot = self.slot.lock().await;
        if let Some(snap) = slot.as_ref() {
            let fresh = snap.taken.elapsed() < self.ttl;
            let covers = wanted.keys().all(|k| snap.apps.contains_key(k));
            if !force && fresh && covers {
                trace!("identity cache hit ({} windows)", snap.records.len());
                return snap.records.clone();
            }
        }

        let mut apps = slot.take().map(|s| s.apps).unwrap_or_default();
        apps.extend(wanted);
        let records = Arc::new(probe(apps.values().cloned().collect()).await);
        let taken = Instant::now();
        *slot = Some(Snapshot {
            taken,
            apps,
            records: records.clone(),
        });
        *self.last_probe.lock().unwrap_or_else(|e| e.into_inner()) = Some(taken);
        records
    }

    /// Drop the snapshot so the next lookup probes.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    /// Time since the last completed probe.
    pub fn last_probe_age(&self) -> Option<Duration> {
        self.last_probe
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|t| t.elapsed())
    }
}
