//! Raising and closing single windows.
//!
//! Activation only ever touches the targeted window; sibling windows of
//! the same application keep their stacking order.  It is fire-and-forget:
//! the caller gets an answer immediately and the platform work runs in a
//! background task whose outcome is only logged.

use crate::bezier::pop_frames;
use crate::config::CallClass;
use crate::context::Context;
use crate::model::{Animation, AppKind, WindowRecord};
use crate::platform::{same_app, PlatformError};
use crate::traits::WindowPlatform;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Frames per phase of the pop animation.
const POP_STEPS: usize = 4;

/// Result of a close request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CloseOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// How the caller identifies the window it wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub app: String,
    pub id: String,
    pub name: String,
    pub index: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("no window of {app} matches {id:?} / {name:?}")]
    NotFound {
        app: String,
        id: String,
        name: String,
    },
    #[error("{what} timed out after {timeout:?}")]
    Timeout {
        what: &'static str,
        timeout: Duration,
    },
}

/// Find the live window `target` refers to.
///
/// Every app is tried by id, then exact title.  Generic apps additionally
/// fall back to a title substring and then to the window's position in
/// its application's list.
pub fn locate<'a>(
    records: &'a [WindowRecord],
    kind: AppKind,
    target: &Target,
) -> Option<&'a WindowRecord> {
    let own: Vec<&WindowRecord> = records
        .iter()
        .filter(|r| same_app(&r.app, &target.app))
        .collect();

    if let Some(w) = own.iter().copied().find(|w| w.id == target.id) {
        return Some(w);
    }
    if target.name.is_empty() {
        return None;
    }
    if let Some(w) = own.iter().copied().find(|w| w.name == target.name) {
        return Some(w);
    }
    if kind != AppKind::Generic {
        return None;
    }
    let substring = own.iter().copied().find(|w| {
        !w.name.is_empty() && (w.name.contains(&target.name) || target.name.contains(&w.name))
    });
    if substring.is_some() {
        return substring;
    }
    let index = target.index?;
    own.iter()
        .copied()
        .enumerate()
        .find(|(pos, w)| w.index.unwrap_or(pos + 1) == index)
        .map(|(_, w)| w)
}

/// Look `target` up in the cache, probing again once if the cached
/// snapshot does not have it.
async fn find<P: WindowPlatform>(
    ctx: &Context<P>,
    target: &Target,
) -> Result<WindowRecord, ControlError> {
    let kind = ctx.platform().app_kind(&target.app);
    let apps = [target.app.clone()];
    let cached = ctx.windows(&apps).await;
    if let Some(w) = locate(&cached, kind, target) {
        return Ok(w.clone());
    }
    let fresh = ctx.fresh_windows(&apps).await;
    locate(&fresh, kind, target)
        .cloned()
        .ok_or_else(|| ControlError::NotFound {
            app: target.app.clone(),
            id: target.id.clone(),
            name: target.name.clone(),
        })
}

/// Raise `target` in the background.
///
/// Returns `false` only when the host cannot automate windows at all.
pub fn activate<P: WindowPlatform>(
    ctx: &Arc<Context<P>>,
    target: Target,
    animation: Animation,
) -> bool {
    if let Err(e) = ctx.ensure_capable() {
        warn!("cannot activate {}/{}: {}", target.app, target.id, e);
        return false;
    }
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let timeout = ctx.timeout(CallClass::Control);
        let work = activate_now(&ctx, &target, animation);
        let result = match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(ControlError::Timeout {
                what: "activation",
                timeout,
            }),
        };
        if let Err(e) = result {
            warn!("activating {}/{} failed: {}", target.app, target.id, e);
        }
    });
    true
}

/// Raise `target` and play `animation` on it.
pub async fn activate_now<P: WindowPlatform>(
    ctx: &Context<P>,
    target: &Target,
    animation: Animation,
) -> Result<(), ControlError> {
    let window = find(ctx, target).await?;
    let platform = ctx.platform();
    debug!("activating {}/{} ({:?})", window.app, window.id, animation);
    match animation {
        Animation::None => platform.raise(&window).await?,
        Animation::Pop => {
            platform.raise(&window).await?;
            if let Some(bounds) = window.bounds {
                platform
                    .animate(&window, &pop_frames(bounds, POP_STEPS))
                    .await?;
            }
        }
        Animation::Minimize => {
            platform.minimize_restore(&window).await?;
            platform.raise(&window).await?;
        }
    }
    Ok(())
}

/// Close `target`.
pub async fn close<P: WindowPlatform>(ctx: &Context<P>, target: &Target) -> CloseOutcome {
    if let Err(e) = ctx.ensure_capable() {
        return CloseOutcome::failed(e);
    }
    let timeout = ctx.timeout(CallClass::Control);
    let result = tokio::time::timeout(timeout, async {
        let window = find(ctx, target).await?;
        ctx.platform().close(&window).await?;
        Ok::<_, ControlError>(())
    })
    .await
    .unwrap_or(Err(ControlError::Timeout {
        what: "close",
        timeout,
    }));

    match result {
        Ok(()) => {
            ctx.invalidate().await;
            CloseOutcome::ok()
        }
        Err(e) => {
            warn!("closing {}/{} failed: {}", target.app, target.id, e);
            CloseOutcome::failed(e)
        }
    }
}
