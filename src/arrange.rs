//! Grid arrangement driver.
//!
//! Planning is pure: [`plan_single`] and [`plan_multi`] turn live windows,
//! displays and options into [`Placement`]s using the math in
//! [`crate::grid`].  [`arrange`] and [`arrange_multi`] then drive the
//! platform, in corrective passes on surfaces that snap their geometry to
//! character cells.
//!
//! Windows are placed in a fixed order (filter order when a filter is
//! given, probe order otherwise), so arranging twice gives the same result.

use crate::config::CallClass;
use crate::context::Context;
use crate::display::{display_at, main_display};
use crate::grid;
use crate::model::{DisplayInfo, Rect, WindowRecord};
use crate::platform::same_app;
use crate::traits::{FrameMode, WindowPlatform};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which display a grid is laid out on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplaySelect {
    #[default]
    Main,
    Index(usize),
    /// Keep every window on the display its center is on; one grid per
    /// display.
    Auto,
}

/// Options of a single-application arrangement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrangeOptions {
    pub cols: Option<usize>,
    pub rows: Option<usize>,
    pub display: DisplaySelect,
    pub padding: i32,
    /// Only arrange these windows, in this order.
    pub window_ids: Option<Vec<String>>,
}

/// Options of a multi-application arrangement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiOptions {
    pub cols: Option<usize>,
    pub rows: Option<usize>,
    pub display: DisplaySelect,
    pub padding: i32,
    /// Tile each application's windows inside the bounding box of its
    /// cells instead of placing one window per cell.
    pub fill: bool,
}

/// One cell of a multi-application grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAssignment {
    pub app: String,
    pub col: usize,
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrangeOutcome {
    pub success: bool,
    pub arranged: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArrangeOutcome {
    fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            arranged: 0,
            error: Some(error.to_string()),
        }
    }

    fn timed_out(timeout: std::time::Duration) -> Self {
        Self::failed(format!("arrangement timed out after {:?}", timeout))
    }

    /// `arranged` of `total` windows took their frame.
    fn partial(arranged: usize, total: usize) -> Self {
        Self {
            success: arranged == total,
            arranged,
            error: (arranged < total).then(|| {
                format!(
                    "{} of {} windows could not be placed",
                    total - arranged,
                    total
                )
            }),
        }
    }
}

/// Where one window goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub window: WindowRecord,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("display {0} does not exist")]
    NoSuchDisplay(usize),
    #[error("no displays")]
    NoDisplays,
}

//  Planning

fn pick_display(
    displays: &[DisplayInfo],
    select: DisplaySelect,
) -> Result<&DisplayInfo, PlanError> {
    match select {
        DisplaySelect::Index(i) => displays
            .iter()
            .find(|d| d.index == i)
            .ok_or(PlanError::NoSuchDisplay(i)),
        DisplaySelect::Main | DisplaySelect::Auto => {
            main_display(displays).ok_or(PlanError::NoDisplays)
        }
    }
}

/// `app`'s windows in placement order.
fn ordered<'a>(
    records: &'a [WindowRecord],
    app: &str,
    filter: Option<&[String]>,
) -> Vec<&'a WindowRecord> {
    let own = records.iter().filter(|r| same_app(&r.app, app));
    match filter {
        Some(ids) => {
            let mut seen = HashSet::new();
            ids.iter()
                .filter(|id| seen.insert(id.as_str()))
                .filter_map(|id| own.clone().find(|r| &r.id == id))
                .collect()
        }
        None => own.collect(),
    }
}

/// Lay `windows` out on one display's usable area.
fn tile(
    windows: &[&WindowRecord],
    area: Rect,
    cols: Option<usize>,
    rows: Option<usize>,
    pad: i32,
) -> Vec<Placement> {
    let (cols, rows) = grid::dimensions(windows.len(), cols, rows, area.w);
    let plan = grid::plan(area, cols, rows, windows.len(), pad);
    windows
        .iter()
        .zip(plan.cells)
        .map(|(w, rect)| Placement {
            window: (*w).clone(),
            rect,
        })
        .collect()
}

/// Plan a single-application grid.
pub fn plan_single(
    records: &[WindowRecord],
    app: &str,
    displays: &[DisplayInfo],
    options: &ArrangeOptions,
    pad: i32,
) -> Result<Vec<Placement>, PlanError> {
    let windows = ordered(records, app, options.window_ids.as_deref());
    if windows.is_empty() {
        return Ok(Vec::new());
    }

    if options.display != DisplaySelect::Auto {
        let display = pick_display(displays, options.display)?;
        return Ok(tile(&windows, display.usable(), options.cols, options.rows, pad));
    }

    let main = main_display(displays).ok_or(PlanError::NoDisplays)?.index;
    let mut groups: Vec<(usize, Vec<&WindowRecord>)> = Vec::new();
    for w in windows {
        let on = w
            .bounds
            .and_then(|b| {
                let (x, y) = b.center();
                display_at(displays, x, y)
            })
            .unwrap_or(main);
        match groups.iter_mut().find(|(index, _)| *index == on) {
            Some((_, members)) => members.push(w),
            None => groups.push((on, vec![w])),
        }
    }
    groups.sort_by_key(|(index, _)| *index);

    let mut out = Vec::new();
    for (index, members) in groups {
        let display = pick_display(displays, DisplaySelect::Index(index))?;
        out.extend(tile(&members, display.usable(), options.cols, options.rows, pad));
    }
    Ok(out)
}

/// Plan a multi-application grid, returning one batch per application in
/// order of first appearance.  `pad_for` gives the padding to use for an
/// application.
pub fn plan_multi<F>(
    records: &[WindowRecord],
    cells: &[CellAssignment],
    displays: &[DisplayInfo],
    options: &MultiOptions,
    pad_for: F,
) -> Result<Vec<(String, Vec<Placement>)>, PlanError>
where
    F: Fn(&str) -> i32,
{
    let display = pick_display(displays, options.display)?;
    let area = display.usable();
    let cols = options
        .cols
        .unwrap_or(0)
        .max(cells.iter().map(|c| c.col + 1).max().unwrap_or(1));
    let rows = options
        .rows
        .unwrap_or(0)
        .max(cells.iter().map(|c| c.row + 1).max().unwrap_or(1));

    let mut groups: Vec<(String, Vec<&CellAssignment>)> = Vec::new();
    for cell in cells {
        match groups.iter_mut().find(|(app, _)| same_app(app, &cell.app)) {
            Some((_, members)) => members.push(cell),
            None => groups.push((cell.app.clone(), vec![cell])),
        }
    }

    let mut out = Vec::new();
    for (app, members) in groups {
        let pad = pad_for(&app);
        let live = ordered(records, &app, None);
        let placements = if options.fill {
            let c0 = members.iter().map(|c| c.col).min().unwrap_or(0);
            let r0 = members.iter().map(|c| c.row).min().unwrap_or(0);
            let c1 = members.iter().map(|c| c.col).max().unwrap_or(0);
            let r1 = members.iter().map(|c| c.row).max().unwrap_or(0);
            let bbox = grid::span_rect(area, cols, rows, (c0, r0), (c1, r1), 0);
            tile(&live, bbox, None, None, pad)
        } else {
            let pinned: HashSet<&str> = members
                .iter()
                .filter_map(|c| c.window_id.as_deref())
                .collect();
            let mut spare = live.iter().filter(|w| !pinned.contains(w.id.as_str()));
            members
                .iter()
                .filter_map(|cell| {
                    let window = match cell.window_id.as_deref() {
                        Some(id) => live.iter().find(|w| w.id == id),
                        None => spare.next(),
                    }?;
                    let at = (cell.col, cell.row);
                    Some(Placement {
                        window: (*window).clone(),
                        rect: grid::span_rect(area, cols, rows, at, at, pad),
                    })
                })
                .collect()
        };
        out.push((app, placements));
    }
    Ok(out)
}

//  Driving

/// Apply `placements`, returning how many windows were sized at least
/// once.
///
/// Snapping surfaces get a position-only pass first, so each window
/// lands on the target display before it is resized, then repeated
/// position-and-size passes.  A window that was sized in an earlier pass
/// still counts when a later corrective pass fails on it.
async fn apply<P: WindowPlatform>(
    ctx: &Context<P>,
    placements: &[Placement],
    snapping: bool,
) -> usize {
    let snap = &ctx.config().snap;
    let modes: Vec<FrameMode> = if snapping {
        let sized = snap.passes.max(2) as usize - 1;
        std::iter::once(FrameMode::PositionOnly)
            .chain(std::iter::repeat(FrameMode::PositionAndSize).take(sized))
            .collect()
    } else {
        vec![FrameMode::PositionAndSize]
    };

    let mut sized = vec![false; placements.len()];
    for (pass, mode) in modes.iter().enumerate() {
        if pass > 0 && snap.pass_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(snap.pass_delay_ms)).await;
        }
        let mut ok = 0;
        for (p, done) in placements.iter().zip(sized.iter_mut()) {
            match ctx.platform().set_frame(&p.window, p.rect, *mode).await {
                Ok(()) => {
                    ok += 1;
                    *done |= *mode == FrameMode::PositionAndSize;
                }
                Err(e) => warn!("placing {}/{} failed: {}", p.window.app, p.window.id, e),
            }
        }
        debug!(
            "pass {} ({:?}): {}/{} placed",
            pass + 1,
            mode,
            ok,
            placements.len()
        );
    }
    sized.iter().filter(|done| **done).count()
}

fn padding<P: WindowPlatform>(ctx: &Context<P>, app: &str, padding: i32) -> i32 {
    if ctx.platform().snaps_geometry(app) {
        padding + ctx.config().snap.padding_bias
    } else {
        padding
    }
}

/// Tile `target`'s windows into a grid.
pub async fn arrange<P: WindowPlatform>(
    ctx: &Context<P>,
    target: &str,
    options: &ArrangeOptions,
) -> ArrangeOutcome {
    if let Err(e) = ctx.ensure_capable() {
        return ArrangeOutcome::failed(e);
    }
    let snapping = ctx.platform().snaps_geometry(target);
    let timeout = ctx.timeout(CallClass::Arrange { snapping });
    let work = async {
        let displays = match ctx.displays().await {
            Ok(d) => d,
            Err(e) => return ArrangeOutcome::failed(e),
        };
        let records = ctx.fresh_windows(&[target.to_string()]).await;
        let pad = padding(ctx, target, options.padding);
        let placements = match plan_single(&records, target, &displays, options, pad) {
            Ok(p) => p,
            Err(e) => return ArrangeOutcome::failed(e),
        };
        let arranged = apply(ctx, &placements, snapping).await;
        info!("arranged {}/{} {} windows", arranged, placements.len(), target);
        ArrangeOutcome::partial(arranged, placements.len())
    };
    let outcome = tokio::time::timeout(timeout, work)
        .await
        .unwrap_or_else(|_| ArrangeOutcome::timed_out(timeout));
    ctx.invalidate().await;
    outcome
}

/// Tile windows of several applications into one shared grid, one
/// dispatch per application.
pub async fn arrange_multi<P: WindowPlatform>(
    ctx: &Context<P>,
    cells: &[CellAssignment],
    options: &MultiOptions,
) -> ArrangeOutcome {
    if let Err(e) = ctx.ensure_capable() {
        return ArrangeOutcome::failed(e);
    }
    let snapping = cells.iter().any(|c| ctx.platform().snaps_geometry(&c.app));
    let timeout = ctx.timeout(CallClass::Arrange { snapping });
    let work = async {
        let displays = match ctx.displays().await {
            Ok(d) => d,
            Err(e) => return ArrangeOutcome::failed(e),
        };
        let mut apps: Vec<String> = Vec::new();
        for c in cells {
            if !apps.iter().any(|a| same_app(a, &c.app)) {
                apps.push(c.app.clone());
            }
        }
        let records = ctx.fresh_windows(&apps).await;
        let pad_for = |app: &str| padding(ctx, app, options.padding);
        let batches = match plan_multi(&records, cells, &displays, options, pad_for) {
            Ok(b) => b,
            Err(e) => return ArrangeOutcome::failed(e),
        };
        let mut total = 0;
        let mut arranged = 0;
        for (app, placements) in &batches {
            total += placements.len();
            arranged += apply(ctx, placements, ctx.platform().snaps_geometry(app)).await;
        }
        ArrangeOutcome::partial(arranged, total)
    };
    let outcome = tokio::time::timeout(timeout, work)
        .await
        .unwrap_or_else(|_| ArrangeOutcome::timed_out(timeout));
    ctx.invalidate().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::display::NativeDisplay;
    use crate::mock::MockPlatform;
    use crate::platform::Capability;
    use std::sync::Arc;

    fn display(index: usize, x: i32, w: i32, h: i32, is_main: bool) -> DisplayInfo {
        DisplayInfo {
            index,
            frame_x: x,
            frame_y: 0,
            frame_w: w,
            frame_h: h,
            as_x: x,
            as_y: 0,
            visible_w: w,
            visible_h: h,
            is_main,
        }
    }

    fn cell(app: &str, col: usize, row: usize, window_id: Option<&str>) -> CellAssignment {
        CellAssignment {
            app: app.into(),
            col,
            row,
            window_id: window_id.map(String::from),
        }
    }

    fn generic(id: &str, bounds: Option<Rect>) -> WindowRecord {
        let w = WindowRecord::new("Code", id, id);
        match bounds {
            Some(b) => w.with_bounds(b),
            None => w,
        }
    }

    fn ctx(windows: Vec<WindowRecord>) -> Arc<Context<MockPlatform>> {
        let mut config = Config::default();
        config.snap.pass_delay_ms = 0;
        Context::new(
            MockPlatform::new()
                .with_windows(windows)
                .with_displays(vec![NativeDisplay {
                    frame: Rect::new(0, 0, 1200, 800),
                    visible: Rect::new(0, 0, 1200, 800),
                    is_main: true,
                }]),
            config,
            Capability::default(),
        )
    }

    #[test]
    fn display_select_wire_format() {
        let o: ArrangeOptions =
            serde_json::from_str(r#"{"cols":3,"display":{"index":1}}"#).unwrap();
        assert_eq!(o.cols, Some(3));
        assert_eq!(o.display, DisplaySelect::Index(1));
        let o: ArrangeOptions = serde_json::from_str(r#"{"display":"auto"}"#).unwrap();
        assert_eq!(o.display, DisplaySelect::Auto);
    }

    #[test]
    fn filter_order_wins_over_probe_order() {
        let records = vec![generic("a", None), generic("b", None), generic("c", None)];
        let displays = [display(0, 0, 900, 600, true)];
        let options = ArrangeOptions {
            window_ids: Some(vec!["c".into(), "a".into(), "missing".into(), "c".into()]),
            ..ArrangeOptions::default()
        };
        let p = plan_single(&records, "Code", &displays, &options, 0).unwrap();
        let ids: Vec<&str> = p.iter().map(|p| p.window.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(p[0].rect, Rect::new(0, 0, 450, 600));
    }

    #[test]
    fn unknown_display_index_is_an_error() {
        let records = vec![generic("a", None)];
        let displays = [display(0, 0, 900, 600, true)];
        let options = ArrangeOptions {
            display: DisplaySelect::Index(3),
            ..ArrangeOptions::default()
        };
        assert_eq!(
            plan_single(&records, "Code", &displays, &options, 0),
            Err(PlanError::NoSuchDisplay(3))
        );
    }

    #[test]
    fn auto_display_partitions_by_center() {
        let displays = [display(0, 0, 1000, 1000, true), display(1, 1000, 1000, 1000, false)];
        let records = vec![
            generic("left", Some(Rect::new(100, 100, 200, 200))),
            generic("right", Some(Rect::new(1500, 100, 200, 200))),
            generic("lost", Some(Rect::new(9000, 9000, 200, 200))),
            generic("unknown", None),
        ];
        let options = ArrangeOptions {
            display: DisplaySelect::Auto,
            ..ArrangeOptions::default()
        };
        let p = plan_single(&records, "Code", &displays, &options, 0).unwrap();
        assert_eq!(p.len(), 4);
        let on_second: Vec<&str> = p
            .iter()
            .filter(|p| p.rect.x >= 1000)
            .map(|p| p.window.id.as_str())
            .collect();
        assert_eq!(on_second, ["right"]);
        assert_eq!(
            p.iter().find(|p| p.window.id == "right").map(|p| p.rect),
            Some(Rect::new(1000, 0, 1000, 1000))
        );
    }

    #[test]
    fn multi_grid_places_one_window_per_cell() {
        let records = vec![
            WindowRecord::new("Terminal", "1", "zsh"),
            WindowRecord::new("Terminal", "2", "vim"),
            generic("ed", None),
        ];
        let cells = vec![
            cell("Terminal", 0, 0, None),
            cell("Code", 1, 0, None),
            cell("Terminal", 0, 1, Some("1")),
        ];
        let displays = [display(0, 0, 1000, 800, true)];
        let batches =
            plan_multi(&records, &cells, &displays, &MultiOptions::default(), |_| 0).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, "Terminal");
        let term: Vec<(&str, Rect)> = batches[0]
            .1
            .iter()
            .map(|p| (p.window.id.as_str(), p.rect))
            .collect();
        assert_eq!(
            term,
            [
                ("2", Rect::new(0, 0, 500, 400)),
                ("1", Rect::new(0, 400, 500, 400))
            ]
        );
        assert_eq!(batches[1].1[0].rect, Rect::new(500, 0, 500, 400));
    }

    #[test]
    fn fill_mode_tiles_inside_bounding_box() {
        let records = vec![generic("a", None), generic("b", None)];
        let cells = vec![
            cell("Code", 1, 0, None),
            cell("Code", 1, 1, None),
        ];
        let displays = [display(0, 0, 1000, 800, true)];
        let options = MultiOptions {
            cols: Some(2),
            fill: true,
            ..MultiOptions::default()
        };
        let batches = plan_multi(&records, &cells, &displays, &options, |_| 0).unwrap();
        let rects: Vec<Rect> = batches[0].1.iter().map(|p| p.rect).collect();
        assert_eq!(rects, [Rect::new(500, 0, 250, 800), Rect::new(750, 0, 250, 800)]);
    }

    #[tokio::test]
    async fn arrangement_is_idempotent() {
        let ctx = ctx(vec![
            generic("a", None),
            generic("b", None),
            generic("c", None),
            generic("d", None),
        ]);
        let options = ArrangeOptions::default();
        let first = arrange(&ctx, "Code", &options).await;
        assert!(first.success);
        assert_eq!(first.arranged, 4);
        let frames_once = ctx.platform().frames();
        ctx.platform().clear_calls();
        arrange(&ctx, "Code", &options).await;
        assert_eq!(ctx.platform().frames(), frames_once);
        assert_eq!(frames_once[3].1, Rect::new(0, 400, 400, 400));
    }

    #[tokio::test]
    async fn snapping_surface_gets_corrective_passes_and_bias() {
        let ctx = ctx(vec![
            WindowRecord::new("Terminal", "1", "zsh"),
            WindowRecord::new("Terminal", "2", "vim"),
        ]);
        let options = ArrangeOptions {
            padding: 10,
            ..ArrangeOptions::default()
        };
        let outcome = arrange(&ctx, "Terminal", &options).await;
        assert_eq!(outcome.arranged, 2);
        let frames = ctx.platform().frames();
        assert_eq!(frames.len(), 2 * 3);
        assert!(frames[..2].iter().all(|f| f.2 == FrameMode::PositionOnly));
        assert!(frames[2..].iter().all(|f| f.2 == FrameMode::PositionAndSize));
        // padding 10 with the default -4 bias.
        assert_eq!(frames[2].1, Rect::from_edges(6, 6, 594, 794));
    }

    #[tokio::test]
    async fn window_sized_before_a_failed_correction_still_counts() {
        let corrected = ctx(vec![WindowRecord::new("Terminal", "1", "zsh")]);
        // Position-only and the first sizing pass succeed, the last fails.
        corrected.platform().fail_frames_after(2);
        let outcome = arrange(&corrected, "Terminal", &ArrangeOptions::default()).await;
        assert_eq!(corrected.platform().frames().len(), 3);
        assert!(outcome.success);
        assert_eq!(outcome.arranged, 1);

        let never_sized = ctx(vec![WindowRecord::new("Terminal", "1", "zsh")]);
        // Only the position-only pass succeeds: never sized.
        never_sized.platform().fail_frames_after(1);
        let outcome = arrange(&never_sized, "Terminal", &ArrangeOptions::default()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.arranged, 0);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn plain_surface_gets_one_pass_without_bias() {
        let ctx = ctx(vec![generic("a", None)]);
        let options = ArrangeOptions {
            padding: 10,
            ..ArrangeOptions::default()
        };
        arrange(&ctx, "Code", &options).await;
        let frames = ctx.platform().frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, Rect::from_edges(10, 10, 1190, 790));
    }

    #[tokio::test]
    async fn missing_geometry_aborts() {
        let ctx = ctx(vec![generic("a", None)]);
        ctx.platform().fail_displays();
        let outcome = arrange(&ctx, "Code", &ArrangeOptions::default()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.arranged, 0);
        assert!(ctx.platform().frames().is_empty());
    }

    #[tokio::test]
    async fn multi_dispatches_per_app() {
        let ctx = ctx(vec![WindowRecord::new("Terminal", "1", "zsh"), generic("ed", None)]);
        let cells = vec![
            cell("Terminal", 0, 0, None),
            cell("Code", 1, 0, None),
        ];
        let outcome = arrange_multi(&ctx, &cells, &MultiOptions::default()).await;
        assert!(outcome.success);
        assert_eq!(outcome.arranged, 2);
        let frames = ctx.platform().frames();
        // Terminal takes three passes, Code one.
        assert_eq!(frames.iter().filter(|f| f.0 == "1").count(), 3);
        assert_eq!(frames.iter().filter(|f| f.0 == "ed").count(), 1);
    }
}
