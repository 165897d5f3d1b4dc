//! Background reconciliation loop.
//!
//! While the board is visible a cycle runs every polling interval.  A
//! visibility or focus regain also triggers one, but only when the last
//! probe is old enough to be worth repeating.  Cycles run in their own
//! tasks and at most one is in flight; a trigger that arrives while one is
//! running is dropped rather than queued.

use crate::context::Context;
use crate::reconcile::LinkReport;
use crate::traits::WindowPlatform;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Why a cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The board became visible or regained focus.
    FocusRegained,
    /// Cards changed; reconcile right away.
    CardsChanged,
}

/// Sends triggers to a running poller.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    tx: Option<mpsc::Sender<Trigger>>,
}

impl PollerHandle {
    /// A handle connected to nothing.
    pub fn noop() -> Self {
        Self { tx: None }
    }

    pub fn trigger(&self, trigger: Trigger) {
        if let Some(tx) = &self.tx {
            if tx.try_send(trigger).is_err() {
                debug!("poller busy, dropped {:?}", trigger);
            }
        }
    }
}

/// Start the loop.  It stops once every [`PollerHandle`] is dropped.
pub fn spawn<P: WindowPlatform>(ctx: Arc<Context<P>>) -> PollerHandle {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(run(ctx, rx));
    PollerHandle { tx: Some(tx) }
}

async fn run<P: WindowPlatform>(ctx: Arc<Context<P>>, mut rx: mpsc::Receiver<Trigger>) {
    let polling = ctx.config().polling.clone();
    let mut ticker = tokio::time::interval(polling.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("poller running every {:?}", polling.interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if ctx.is_visible() {
                    kick(&ctx);
                }
            }
            trigger = rx.recv() => match trigger {
                Some(Trigger::FocusRegained) => {
                    let stale = ctx
                        .last_probe_age()
                        .map_or(true, |age| age >= polling.focus_min_age());
                    if stale {
                        kick(&ctx);
                    } else {
                        debug!("focus regained, last probe still fresh");
                    }
                }
                Some(Trigger::CardsChanged) => kick(&ctx),
                None => break,
            },
        }
    }
    info!("poller stopped");
}

fn kick<P: WindowPlatform>(ctx: &Arc<Context<P>>) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        run_cycle(&ctx).await;
    });
}

/// Run one reconciliation cycle unless one is already running.  Returns
/// the report when it changed.
pub async fn run_cycle<P: WindowPlatform>(ctx: &Context<P>) -> Option<LinkReport> {
    let Some(_guard) = ctx.begin_cycle() else {
        debug!("cycle already running, trigger dropped");
        return None;
    };
    if ctx.ensure_capable().is_err() {
        return None;
    }
    let app = ctx.active_app();
    if app.is_empty() {
        return None;
    }
    let live = ctx.windows(&[app]).await;
    ctx.reconcile(&live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mock::MockPlatform;
    use crate::model::{Card, CardWindowRef, WindowRecord};
    use crate::platform::Capability;
    use std::time::Duration;

    fn card(id: &str, window: &str, name: &str) -> Card {
        Card {
            id: id.into(),
            archived: false,
            windows: vec![CardWindowRef {
                app: "Code".into(),
                id: window.into(),
                name: name.into(),
                path: None,
            }],
        }
    }

    fn ctx() -> Arc<Context<MockPlatform>> {
        Context::new(
            MockPlatform::new().with_windows(vec![
                WindowRecord::new("Code", "", "main.rs"),
                WindowRecord::new("Code", "", "lib.rs"),
            ]),
            Config::default(),
            Capability::default(),
        )
    }

    #[tokio::test]
    async fn cycle_reports_unlinked_windows() {
        let ctx = ctx();
        ctx.sync_cards(vec![card("c1", "Code:main.rs", "main.rs")], "Code".into());
        let report = run_cycle(&ctx).await.unwrap();
        let ids: Vec<&str> = report.unadded.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["Code:lib.rs"]);
        assert!(run_cycle(&ctx).await.is_none());
    }

    #[tokio::test]
    async fn no_active_app_means_no_cycle() {
        let ctx = ctx();
        assert!(run_cycle(&ctx).await.is_none());
        assert_eq!(ctx.platform().probe_count(), 0);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_dropped() {
        let ctx = ctx();
        ctx.sync_cards(vec![], "Code".into());
        let _held = ctx.begin_cycle();
        assert!(run_cycle(&ctx).await.is_none());
        assert_eq!(ctx.platform().probe_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_only_run_while_visible() {
        let ctx = ctx();
        ctx.sync_cards(vec![], "Code".into());
        let mut rx = ctx.subscribe();
        let _handle = spawn(ctx.clone());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(ctx.platform().probe_count(), 0);

        ctx.set_visible(true);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(ctx.platform().probe_count() > 0);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().unadded.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_regain_respects_minimum_age() {
        let ctx = ctx();
        ctx.sync_cards(vec![], "Code".into());
        let handle = spawn(ctx.clone());
        tokio::task::yield_now().await;

        handle.trigger(Trigger::FocusRegained);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_first = ctx.platform().probe_count();
        assert!(after_first > 0);

        // One second later the probe is still fresh.
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.trigger(Trigger::FocusRegained);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ctx.platform().probe_count(), after_first);

        // Past the cache TTL and the minimum age, it probes again.
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.trigger(Trigger::FocusRegained);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(ctx.platform().probe_count() > after_first);
    }

    #[test]
    fn noop_handle_ignores_triggers() {
        PollerHandle::noop().trigger(Trigger::CardsChanged);
    }
}
