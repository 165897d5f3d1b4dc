//! Commands and replies exchanged with the board UI.
//!
//! This module defines the vocabulary shared by the IPC front-end and the
//! [`WindowService`](crate::service::WindowService): [`Command`] lists every
//! operation the service exposes and [`Reply`] every answer it gives.
//!
//! # Wire format
//!
//! Commands are externally tagged JSON, one per line:
//!
//! ```json
//! {"ListWindows":{"extra_apps":["Code"]}}
//! {"ActivateWindow":{"app":"Terminal","id":"4211","name":"zsh","animation":"pop"}}
//! {"ArrangeGrid":{"target":"Terminal","options":{"cols":3,"display":{"index":1}}}}
//! "GetDisplays"
//! ```

use crate::appearance::AppearanceOutcome;
use crate::arrange::{ArrangeOptions, ArrangeOutcome, CellAssignment, MultiOptions};
use crate::control::CloseOutcome;
use crate::model::{Animation, Card, DisplayInfo, WindowRecord};
use crate::reconcile::LinkReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::oneshot;

/// Every operation the service can perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Enumerate live windows of the built-in apps plus `extra_apps`.
    ListWindows {
        #[serde(default)]
        extra_apps: Vec<String>,
    },

    /// Raise one window.  Answered immediately; the work runs in the
    /// background and failures are only logged.
    ActivateWindow {
        app: String,
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        animation: Animation,
        #[serde(default)]
        index: Option<usize>,
    },

    /// Close one window.
    CloseWindow {
        app: String,
        id: String,
        #[serde(default)]
        name: String,
    },

    /// Tile the windows of `target` into a grid.
    ArrangeGrid {
        target: String,
        #[serde(default)]
        options: ArrangeOptions,
    },

    /// Tile windows of several applications into one shared grid.
    ArrangeMulti {
        cells: Vec<CellAssignment>,
        #[serde(default)]
        options: MultiOptions,
    },

    /// Report every display in unified coordinates.
    GetDisplays,

    /// Toggle translucency of one terminal window.  `color` is `#rrggbb`.
    SetAppearance {
        id: String,
        enable: bool,
        #[serde(default)]
        color: Option<String>,
    },

    /// Toggle translucency of several terminal windows at once.
    SetAppearanceBatch {
        ids: Vec<String>,
        enable: bool,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        per_window_colors: BTreeMap<String, String>,
    },

    /// Forget cached appearance state without touching any window.
    /// `None` clears every window.
    ResetAppearanceCache {
        #[serde(default)]
        ids: Option<Vec<String>>,
    },

    /// Replace the cards the reconciliation engine tracks.
    SyncCards {
        cards: Vec<Card>,
        active_app: String,
    },

    /// The board became visible (or hidden).
    SetVisibility { visible: bool },

    /// Latest reconciliation report.
    Links,

    /// Stream reconciliation reports on this connection as they change.
    Subscribe,
}

/// Answer to a [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Windows(Vec<WindowRecord>),
    Activated(bool),
    Closed(CloseOutcome),
    Arranged(ArrangeOutcome),
    Displays(Vec<DisplayInfo>),
    Appearance(AppearanceOutcome),
    Links(LinkReport),
    Ok,
    Error { message: String },
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }
}

/// A command paired with the channel its reply goes back on.
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_commands_are_plain_strings() {
        let cmd: Command = serde_json::from_str(r#""GetDisplays""#).unwrap();
        assert_eq!(cmd, Command::GetDisplays);
        assert_eq!(serde_json::to_string(&Command::Subscribe).unwrap(), r#""Subscribe""#);
    }

    #[test]
    fn activate_defaults_animation_and_index() {
        let cmd: Command =
            serde_json::from_str(r#"{"ActivateWindow":{"app":"Code","id":"Code:main.rs"}}"#)
                .unwrap();
        assert_eq!(
            cmd,
            Command::ActivateWindow {
                app: "Code".into(),
                id: "Code:main.rs".into(),
                name: String::new(),
                animation: Animation::None,
                index: None,
            }
        );
    }

    #[test]
    fn activate_parses_animation_kind() {
        let cmd: Command = serde_json::from_str(
            r#"{"ActivateWindow":{"app":"Terminal","id":"1","name":"zsh","animation":"pop","index":2}}"#,
        )
        .unwrap();
        match cmd {
            Command::ActivateWindow { animation, index, .. } => {
                assert_eq!(animation, Animation::Pop);
                assert_eq!(index, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn list_windows_extra_apps_optional() {
        let cmd: Command = serde_json::from_str(r#"{"ListWindows":{}}"#).unwrap();
        assert_eq!(cmd, Command::ListWindows { extra_apps: vec![] });
    }

    #[test]
    fn arrange_grid_options_default() {
        let cmd: Command =
            serde_json::from_str(r#"{"ArrangeGrid":{"target":"Terminal"}}"#).unwrap();
        match cmd {
            Command::ArrangeGrid { target, options } => {
                assert_eq!(target, "Terminal");
                assert_eq!(options, ArrangeOptions::default());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn sync_cards_parses_refs() {
        let cmd: Command = serde_json::from_str(
            r#"{"SyncCards":{"active_app":"Terminal","cards":[
                {"id":"c1","windows":[{"app":"Terminal","id":"7","name":"zsh"}]}
            ]}}"#,
        )
        .unwrap();
        match cmd {
            Command::SyncCards { cards, active_app } => {
                assert_eq!(active_app, "Terminal");
                assert_eq!(cards[0].windows[0].id, "7");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reply_error_serializes_message() {
        let json = serde_json::to_string(&Reply::error("boom")).unwrap();
        assert_eq!(json, r#"{"Error":{"message":"boom"}}"#);
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(serde_json::from_str::<Command>(r#""Explode""#).is_err());
    }
}
