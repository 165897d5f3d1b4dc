//! CSS-like cubic Bézier easing and the activation "pop" keyframes.

use crate::model::Rect;

/// A `cubic-bezier(x1, y1, x2, y2)` timing curve with endpoints fixed at
/// (0,0) and (1,1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

/// CSS `ease`.
pub const EASE: (f64, f64, f64, f64) = (0.25, 0.10, 0.25, 1.00);
/// CSS `ease-out`.
pub const EASE_OUT: (f64, f64, f64, f64) = (0.0, 0.0, 0.58, 1.0);
/// CSS `ease-in-out`.
pub const EASE_IN_OUT: (f64, f64, f64, f64) = (0.42, 0.0, 0.58, 1.0);

impl CubicBezier {
    pub fn new((x1, y1, x2, y2): (f64, f64, f64, f64)) -> Self {
        // Polynomial form B(t) = ((a*t + b)*t + c)*t per axis.
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        Self {
            ax: 1.0 - cx - bx,
            bx,
            cx,
            ay: 1.0 - cy - by,
            by,
            cy,
        }
    }

    fn x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn dx(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    /// Solve x(t) = u for t: Newton-Raphson, then bisection if it strays.
    fn solve(&self, u: f64) -> f64 {
        let mut t = u;
        for _ in 0..8 {
            let err = self.x(t) - u;
            if err.abs() < 1e-7 {
                return t;
            }
            let d = self.dx(t);
            if d.abs() < 1e-7 {
                break;
            }
            t -= err / d;
            if !(0.0..=1.0).contains(&t) {
                break;
            }
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        t = u;
        for _ in 0..32 {
            let x = self.x(t);
            if (x - u).abs() < 1e-7 {
                break;
            }
            if x < u {
                lo = t;
            } else {
                hi = t;
            }
            t = 0.5 * (lo + hi);
        }
        t
    }

    /// Eased progress for normalized time `u` (clamped to `[0,1]`).
    pub fn ease(&self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        self.y(self.solve(u))
    }

    /// Interpolate from `a` to `b`.
    pub fn lerp(&self, a: f64, b: f64, u: f64) -> f64 {
        a + (b - a) * self.ease(u)
    }
}

/// Scale factors the pop animation passes through: shrink, overshoot,
/// settle.
const POP_PHASES: [(f64, f64, (f64, f64, f64, f64)); 3] = [
    (1.00, 0.92, EASE_OUT),
    (0.92, 1.03, EASE_IN_OUT),
    (1.03, 1.00, EASE),
];

/// Keyframes that pop `rect` around its center.
///
/// `steps_per_phase` frames are produced for each phase; the last frame is
/// always exactly `rect`.
pub fn pop_frames(rect: Rect, steps_per_phase: usize) -> Vec<Rect> {
    let steps = steps_per_phase.max(1);
    let mut frames = Vec::with_capacity(steps * POP_PHASES.len());
    for (from, to, curve) in POP_PHASES {
        let curve = CubicBezier::new(curve);
        for i in 1..=steps {
            let scale = curve.lerp(from, to, i as f64 / steps as f64);
            frames.push(scaled(rect, scale));
        }
    }
    if let Some(last) = frames.last_mut() {
        *last = rect;
    }
    frames
}

fn scaled(rect: Rect, scale: f64) -> Rect {
    let w = (f64::from(rect.w) * scale).round() as i32;
    let h = (f64::from(rect.h) * scale).round() as i32;
    let (cx, cy) = rect.center();
    Rect::new(cx - w / 2, cy - h / 2, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_endpoints_are_fixed() {
        for c in [EASE, EASE_OUT, EASE_IN_OUT] {
            let b = CubicBezier::new(c);
            assert!(b.ease(0.0).abs() < 1e-6);
            assert!((b.ease(1.0) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn ease_is_monotonic() {
        let b = CubicBezier::new(EASE);
        let mut prev = 0.0;
        for i in 1..=100 {
            let v = b.ease(i as f64 / 100.0);
            assert!(v >= prev - 1e-9);
            prev = v;
        }
    }

    #[test]
    fn lerp_clamps_time() {
        let b = CubicBezier::new(EASE);
        assert_eq!(b.lerp(10.0, 20.0, -1.0), 10.0);
        assert!((b.lerp(10.0, 20.0, 2.0) - 20.0).abs() < 1e-6);
    }

    #[test]
    fn pop_shrinks_overshoots_and_settles() {
        let rect = Rect::new(100, 100, 1000, 600);
        let frames = pop_frames(rect, 4);
        assert_eq!(frames.len(), 12);
        assert_eq!(*frames.last().unwrap(), rect);
        let min_w = frames.iter().map(|f| f.w).min().unwrap();
        let max_w = frames.iter().map(|f| f.w).max().unwrap();
        assert_eq!(min_w, 920);
        assert_eq!(max_w, 1030);
        // Scaling keeps the center in place.
        for f in &frames {
            let (cx, cy) = f.center();
            assert!((cx - 600).abs() <= 1 && (cy - 400).abs() <= 1);
        }
    }
}
