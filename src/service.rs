//! Command dispatcher.
//!
//! [`WindowService`] answers every [`Command`] with one [`Reply`].  It is
//! the single entry point the IPC front-end (or an embedding application)
//! talks to; the components behind it never see a `Command`.

use crate::appearance::AppearanceOutcome;
use crate::arrange;
use crate::command::{Command, Reply};
use crate::context::Context;
use crate::control::{self, Target};
use crate::model::Rgb;
use crate::poller::{PollerHandle, Trigger};
use crate::reconcile::LinkReport;
use crate::traits::WindowPlatform;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::watch;

pub struct WindowService<P: WindowPlatform> {
    ctx: Arc<Context<P>>,
    poller: PollerHandle,
}

impl<P: WindowPlatform> WindowService<P> {
    pub fn new(ctx: Arc<Context<P>>, poller: PollerHandle) -> Self {
        Self { ctx, poller }
    }

    pub fn context(&self) -> &Arc<Context<P>> {
        &self.ctx
    }

    /// Stream of reconciliation reports, updated only on change.
    pub fn subscribe(&self) -> watch::Receiver<LinkReport> {
        self.ctx.subscribe()
    }

    pub async fn handle(&self, command: Command) -> Reply {
        debug!("handling {:?}", command);
        match command {
            Command::ListWindows { extra_apps } => match self.ctx.ensure_capable() {
                Ok(()) => Reply::Windows(self.ctx.windows(&extra_apps).await),
                Err(e) => Reply::error(e.to_string()),
            },

            Command::ActivateWindow {
                app,
                id,
                name,
                animation,
                index,
            } => {
                let target = Target { app, id, name, index };
                Reply::Activated(control::activate(&self.ctx, target, animation))
            }

            Command::CloseWindow { app, id, name } => {
                let target = Target {
                    app,
                    id,
                    name,
                    index: None,
                };
                Reply::Closed(control::close(&self.ctx, &target).await)
            }

            Command::ArrangeGrid { target, options } => {
                Reply::Arranged(arrange::arrange(&self.ctx, &target, &options).await)
            }

            Command::ArrangeMulti { cells, options } => {
                Reply::Arranged(arrange::arrange_multi(&self.ctx, &cells, &options).await)
            }

            Command::GetDisplays => {
                if let Err(e) = self.ctx.ensure_capable() {
                    return Reply::error(e.to_string());
                }
                match self.ctx.displays().await {
                    Ok(displays) => Reply::Displays(displays),
                    Err(e) => Reply::error(e.to_string()),
                }
            }

            Command::SetAppearance { id, enable, color } => {
                let ids = [id];
                Reply::Appearance(
                    self.appearance(&ids, enable, color.as_deref(), &BTreeMap::new())
                        .await,
                )
            }

            Command::SetAppearanceBatch {
                ids,
                enable,
                color,
                per_window_colors,
            } => Reply::Appearance(
                self.appearance(&ids, enable, color.as_deref(), &per_window_colors)
                    .await,
            ),

            Command::ResetAppearanceCache { ids } => {
                let n = self.ctx.profiles().reset_cache(ids.as_deref());
                debug!("forgot appearance state of {} windows", n);
                Reply::Ok
            }

            Command::SyncCards { cards, active_app } => {
                self.ctx.sync_cards(cards, active_app);
                self.poller.trigger(Trigger::CardsChanged);
                Reply::Ok
            }

            Command::SetVisibility { visible } => {
                if self.ctx.set_visible(visible) {
                    self.poller.trigger(Trigger::FocusRegained);
                }
                Reply::Ok
            }

            Command::Links | Command::Subscribe => Reply::Links(self.ctx.link_report()),
        }
    }

    async fn appearance(
        &self,
        ids: &[String],
        enable: bool,
        color: Option<&str>,
        per_window: &BTreeMap<String, String>,
    ) -> AppearanceOutcome {
        if let Err(e) = self.ctx.ensure_capable() {
            return AppearanceOutcome::all_failed(ids, &e.to_string());
        }
        let Some(backend) = self.ctx.platform().appearance() else {
            return AppearanceOutcome::all_failed(
                ids,
                "translucency is not supported on this host",
            );
        };
        let color = match color.map(|c| Rgb::from_hex(c).ok_or(c)).transpose() {
            Ok(c) => c,
            Err(bad) => {
                return AppearanceOutcome::all_failed(ids, &format!("invalid color {:?}", bad))
            }
        };
        let mut colors = HashMap::new();
        for (id, hex) in per_window {
            match Rgb::from_hex(hex) {
                Some(c) => {
                    colors.insert(id.clone(), c);
                }
                None => {
                    let error = format!("invalid color {:?} for {}", hex, id);
                    return AppearanceOutcome::all_failed(ids, &error);
                }
            }
        }
        self.ctx
            .profiles()
            .set_appearance_batch(backend, ids, enable, color, &colors)
            .await
    }
}
