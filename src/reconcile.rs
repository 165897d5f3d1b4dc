//! Card-to-window reconciliation.
//!
//! Each cycle matches the window references held by the board's cards
//! against a fresh probe of the active application.  A reference resolves
//! through, in order:
//!
//! 1. its exact id,
//! 2. an exact title,
//! 3. a title substring in either direction (generic apps only),
//! 4. the only live window of the app (generic apps and file managers),
//! 5. its folder path (file managers only).
//!
//! Exact-id matches are claimed before any fuzzy matching starts, and a
//! window claimed by one reference is never offered to another in the same
//! cycle.  Anything but an exact-id match repairs the reference in place.
//!
//! A card whose references all fail for `threshold` consecutive cycles is
//! reported broken; a single transient miss is not enough.

use crate::model::{AppKind, Card, CardWindowRef, WindowRecord};
use crate::platform::same_app;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a reference was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    Id,
    Name,
    Substring,
    AutoBind,
    Path,
}

/// A reference rebound to a different live window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repair {
    pub card_id: String,
    /// Position of the reference in the card's window list.
    pub index: usize,
    pub previous: CardWindowRef,
    pub updated: CardWindowRef,
    pub via: MatchKind,
}

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkReport {
    pub active_app: String,
    /// Live windows of the active app that no active card references.
    pub unadded: Vec<WindowRecord>,
    /// Ids of cards whose references have all failed long enough.
    pub broken: Vec<String>,
    pub repairs: Vec<Repair>,
}

/// Reconciliation state carried across cycles.
pub struct Reconciler {
    threshold: u32,
    cards: Vec<Card>,
    active_app: String,
    streaks: HashMap<String, u32>,
    /// Sorted unadded ids and broken card ids of the last published report.
    last: Option<(Vec<String>, Vec<String>)>,
    report: LinkReport,
}

impl Reconciler {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            cards: Vec::new(),
            active_app: String::new(),
            streaks: HashMap::new(),
            last: None,
            report: LinkReport::default(),
        }
    }

    /// Replace the tracked cards.  Miss streaks survive for cards that are
    /// still present unless the active app changed.
    pub fn set_cards(&mut self, cards: Vec<Card>, active_app: String) {
        if !same_app(&active_app, &self.active_app) {
            self.streaks.clear();
            self.last = None;
        }
        let ids: HashSet<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        self.streaks.retain(|id, _| ids.contains(id.as_str()));
        debug!("tracking {} cards for {}", cards.len(), active_app);
        self.cards = cards;
        self.active_app = active_app;
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn active_app(&self) -> &str {
        &self.active_app
    }

    /// The latest report, changed or not.
    pub fn report(&self) -> &LinkReport {
        &self.report
    }

    /// Run one cycle against `live`.  Returns the report only when it
    /// differs from the last published one.
    pub fn cycle<K>(&mut self, live: &[WindowRecord], kind: K) -> Option<LinkReport>
    where
        K: Fn(&str) -> AppKind,
    {
        if self.active_app.is_empty() {
            return None;
        }
        let app = self.active_app.clone();
        let kind = kind(&app);
        let live: Vec<&WindowRecord> = live.iter().filter(|w| same_app(&w.app, &app)).collect();
        let live_ids: HashSet<&str> = live.iter().map(|w| w.id.as_str()).collect();

        let mut claimed: HashSet<String> = self
            .cards
            .iter()
            .filter(|c| !c.archived)
            .flat_map(|c| c.windows.iter())
            .filter(|r| same_app(&r.app, &app) && live_ids.contains(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect();

        let mut repairs = Vec::new();
        let mut broken = Vec::new();

        for card in self.cards.iter_mut() {
            if card.archived {
                self.streaks.remove(&card.id);
                continue;
            }
            let mut evaluated = false;
            let mut resolved = false;
            let mut named_miss = false;
            for (index, r) in card.windows.iter_mut().enumerate() {
                if !same_app(&r.app, &app) {
                    continue;
                }
                evaluated = true;
                if live_ids.contains(r.id.as_str()) {
                    resolved = true;
                    continue;
                }
                if r.name.is_empty() && r.path.is_none() {
                    continue;
                }
                match resolve(r, &live, kind, &claimed) {
                    Some((w, via)) => {
                        let previous = r.clone();
                        r.rebind(w);
                        claimed.insert(w.id.clone());
                        info!(
                            "card {}: rebound {} -> {} via {:?}",
                            card.id, previous.id, w.id, via
                        );
                        repairs.push(Repair {
                            card_id: card.id.clone(),
                            index,
                            previous,
                            updated: r.clone(),
                            via,
                        });
                        resolved = true;
                    }
                    None => named_miss = true,
                }
            }
            if !evaluated {
                continue;
            }
            if resolved {
                self.streaks.remove(&card.id);
                continue;
            }
            let streak = self.streaks.entry(card.id.clone()).or_insert(0);
            // Nothing to fall back on: no point waiting for a recovery.
            *streak = if named_miss {
                streak.saturating_add(1)
            } else {
                self.threshold
            };
            if *streak >= self.threshold {
                broken.push(card.id.clone());
            }
        }

        let referenced: HashSet<&str> = self
            .cards
            .iter()
            .filter(|c| !c.archived)
            .flat_map(|c| c.windows.iter())
            .filter(|r| same_app(&r.app, &app))
            .map(|r| r.id.as_str())
            .collect();
        let unadded: Vec<WindowRecord> = live
            .iter()
            .filter(|w| !referenced.contains(w.id.as_str()))
            .map(|w| (*w).clone())
            .collect();

        broken.sort();
        let mut unadded_ids: Vec<String> = unadded.iter().map(|w| w.id.clone()).collect();
        unadded_ids.sort();
        let key = (unadded_ids, broken.clone());
        let changed = !repairs.is_empty() || self.last.as_ref() != Some(&key);

        self.last = Some(key);
        self.report = LinkReport {
            active_app: app,
            unadded,
            broken,
            repairs,
        };
        changed.then(|| self.report.clone())
    }
}

/// Fuzzy resolution for a reference whose id is not live.
fn resolve<'a>(
    r: &CardWindowRef,
    live: &[&'a WindowRecord],
    kind: AppKind,
    claimed: &HashSet<String>,
) -> Option<(&'a WindowRecord, MatchKind)> {
    let free = move || live.iter().copied().filter(move |w| !claimed.contains(&w.id));

    let named = !r.name.is_empty();
    if let Some(w) = free().find(|w| named && w.name == r.name) {
        return Some((w, MatchKind::Name));
    }
    if named && kind == AppKind::Generic {
        let hit = free().find(|w| {
            !w.name.is_empty() && (w.name.contains(&r.name) || r.name.contains(&w.name))
        });
        if let Some(w) = hit {
            return Some((w, MatchKind::Substring));
        }
    }
    if matches!(kind, AppKind::Generic | AppKind::FileManager) && live.len() == 1 {
        if let Some(w) = free().next() {
            return Some((w, MatchKind::AutoBind));
        }
    }
    if kind == AppKind::FileManager {
        if let Some(path) = r.path.as_deref() {
            if let Some(w) = free().find(|w| w.path.as_deref() == Some(path)) {
                return Some((w, MatchKind::Path));
            }
        }
    }
    None
}
