//! Window enumeration across the built-in and generic applications.
//!
//! Built-in applications (terminal, file manager) are probed through their
//! dedicated per-app calls; every other requested application shares one
//! batched call.  All probes run concurrently, each under its own timeout,
//! and a failing probe only empties its own slice of the result.

use crate::model::{AppKind, WindowRecord};
use crate::platform::same_app;
use crate::traits::WindowPlatform;
use futures::future::join_all;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

/// Enumerate live windows of every built-in app plus `extra_apps`.
pub async fn list_windows<P>(
    platform: &P,
    extra_apps: &[String],
    timeout: Duration,
    min_panel_size: i32,
) -> Vec<WindowRecord>
where
    P: WindowPlatform + ?Sized,
{
    let builtin = platform.builtin_apps();
    let generic = generic_apps(&builtin, extra_apps);

    let dedicated = join_all(
        builtin
            .iter()
            .map(|app| bounded(app.as_str(), timeout, platform.probe_app(app))),
    );
    let batched = async {
        if generic.is_empty() {
            Vec::new()
        } else {
            bounded("batch", timeout, platform.probe_batch(&generic)).await
        }
    };
    let (dedicated, batched) = tokio::join!(dedicated, batched);

    let raw: Vec<WindowRecord> = dedicated.into_iter().flatten().chain(batched).collect();
    let records = normalize(raw, |app| platform.app_kind(app), min_panel_size);
    debug!(
        "probed {} windows ({} built-in apps, {} generic)",
        records.len(),
        builtin.len(),
        generic.len()
    );
    records
}

/// Extra apps not covered by a built-in probe, deduplicated.
fn generic_apps(builtin: &[String], extra: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for app in extra {
        let app = app.trim();
        if app.is_empty()
            || builtin.iter().any(|b| same_app(b, app))
            || out.iter().any(|o| same_app(o, app))
        {
            continue;
        }
        out.push(app.to_string());
    }
    out
}

async fn bounded<F, E>(what: &str, timeout: Duration, probe: F) -> Vec<WindowRecord>
where
    F: Future<Output = Result<Vec<WindowRecord>, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(records)) => records,
        Ok(Err(e)) => {
            warn!("probe {} failed: {}", what, e);
            Vec::new()
        }
        Err(_) => {
            warn!("probe {} timed out after {:?}", what, timeout);
            Vec::new()
        }
    }
}

/// Drop untitled windows and small generic panels, then make every id
/// unique.
///
/// Records that arrive without an id get `app:title`; a repeated id gets
/// `-2`, `-3`, … in first-seen order.
pub fn normalize<K>(records: Vec<WindowRecord>, kind: K, min_panel_size: i32) -> Vec<WindowRecord>
where
    K: Fn(&str) -> AppKind,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|r| !r.name.trim().is_empty())
        .filter(|r| {
            kind(&r.app) != AppKind::Generic
                || r
                    .bounds
                    .map_or(true, |b| b.w >= min_panel_size && b.h >= min_panel_size)
        })
        .map(|mut r| {
            if r.id.is_empty() {
                r.id = format!("{}:{}", r.app, r.name);
            }
            let n = seen.entry(r.id.clone()).or_insert(0);
            *n += 1;
            if taken.contains(&r.id) {
                // A real title may already look like a suffixed id.
                let mut k = (*n).max(2);
                while taken.contains(&format!("{}-{}", r.id, k)) {
                    k += 1;
                }
                *n = k;
                r.id = format!("{}-{}", r.id, k);
            }
            taken.insert(r.id.clone());
            r
        })
        .collect()
}
