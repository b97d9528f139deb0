//! Courant-number diagnostics for the face velocities.
//!
//! For a contravariant face velocity u and cell width Δ in computational coordinates the local Courant
//! number is C = |u|·dt/Δ. The solver never adapts dt: violations above the threshold are counted and
//! logged so a run can be flagged, but the step proceeds unchanged.

use tracing::{debug, warn};

use crate::array::PanelArray;
use crate::grid::CubedSphere;

/// CFL check configuration.
#[derive(Clone, Copy, Debug)]
pub struct CflConfig {
    /// Courant number above which a face is reported (default: 1.0).
    pub threshold: f64,
    /// Log every step's summary at debug level.
    pub debug_log: bool,
}

impl Default for CflConfig {
    fn default() -> Self {
        Self { threshold: 1.0, debug_log: false }
    }
}

/// Courant number for one face.
#[inline]
pub fn courant(dx: f64, dt: f64, ucontra: f64) -> f64 {
    ucontra.abs() * dt / dx
}

/// Maximum interior x-face Courant number.
pub fn cfl_x(grid: &CubedSphere, dt: f64, ucontra: &PanelArray<f64>) -> f64 {
    let b = grid.bounds;
    let mut c: f64 = 0.0;
    for p in 0..cubesphere_geo::PANELS {
        for j in b.j0..b.jend {
            for i in b.i0..=b.iend {
                c = c.max(courant(grid.dx, dt, ucontra[(p, i, j)]));
            }
        }
    }
    c
}

/// Maximum interior y-face Courant number.
pub fn cfl_y(grid: &CubedSphere, dt: f64, vcontra: &PanelArray<f64>) -> f64 {
    let b = grid.bounds;
    let mut c: f64 = 0.0;
    for p in 0..cubesphere_geo::PANELS {
        for j in b.j0..=b.jend {
            for i in b.i0..b.iend {
                c = c.max(courant(grid.dx, dt, vcontra[(p, i, j)]));
            }
        }
    }
    c
}

/// CFL statistics accumulated over the steps of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CflStats {
    /// Steps inspected.
    pub steps: u64,
    /// Steps whose maximum Courant number exceeded the threshold.
    pub steps_violating: u64,
    /// Largest x-direction Courant number seen.
    pub max_cfl_x: f64,
    /// Largest y-direction Courant number seen.
    pub max_cfl_y: f64,
    /// First step index that exceeded the threshold.
    pub first_violation: Option<u64>,
}

impl Default for CflStats {
    fn default() -> Self {
        Self { steps: 0, steps_violating: 0, max_cfl_x: 0.0, max_cfl_y: 0.0, first_violation: None }
    }
}

impl CflStats {
    /// Record one step's directional maxima. Returns true if the step violated the threshold.
    pub fn update(&mut self, step: u64, cx: f64, cy: f64, config: CflConfig) -> bool {
        self.steps += 1;
        self.max_cfl_x = self.max_cfl_x.max(cx);
        self.max_cfl_y = self.max_cfl_y.max(cy);
        let violated = cx > config.threshold || cy > config.threshold;
        if violated {
            self.steps_violating += 1;
            if self.first_violation.is_none() {
                self.first_violation = Some(step);
                warn!("[cfl] step {}: CFL x/y={:.3}/{:.3} exceeds {:.2}; dt is not adapted", step, cx, cy, config.threshold);
            }
        }
        if config.debug_log {
            debug!("[cfl] step {}: x={:.4} y={:.4}", step, cx, cy);
        }
        violated
    }

    /// Largest Courant number in either direction.
    pub fn max_cfl(&self) -> f64 {
        self.max_cfl_x.max(self.max_cfl_y)
    }

    /// True if any step exceeded the threshold.
    pub fn violated(&self) -> bool {
        self.steps_violating > 0
    }

    /// Log summary statistics.
    pub fn log_summary(&self, label: &str) {
        if self.steps > 0 {
            let pct = (self.steps_violating as f64 / self.steps as f64) * 100.0;
            tracing::info!(
                "[cfl] {}: {} steps, {:.1}% over threshold, CFL max x/y={:.3}/{:.3}",
                label,
                self.steps,
                pct,
                self.max_cfl_x,
                self.max_cfl_y
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courant_is_symmetric_in_sign() {
        assert_eq!(courant(0.1, 0.05, -2.0), courant(0.1, 0.05, 2.0));
        assert!((courant(0.1, 0.05, 2.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn violations_are_counted_once_per_step() {
        let mut s = CflStats::default();
        let cfg = CflConfig::default();
        assert!(!s.update(0, 0.4, 0.9, cfg));
        assert!(s.update(1, 1.2, 1.3, cfg));
        assert!(s.update(2, 0.2, 1.1, cfg));
        assert_eq!(s.steps_violating, 2);
        assert_eq!(s.first_violation, Some(1));
        assert!((s.max_cfl() - 1.3).abs() < 1e-15);
    }
}
