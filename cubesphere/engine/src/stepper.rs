//! Advection driver: one forward-Euler step of `Q ← Q − dt·div(Q·V)` and the run loop around it.
//!
//! Per step: re-evaluate and time-average the face velocities (time-dependent winds only), compute
//! fluxes and their divergence, update interior cells, then refresh ghosts from the updated interiors.

use cubesphere_geo::Projection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::array::PanelArray;
use crate::cfl::{cfl_x, cfl_y, CflConfig, CflStats};
use crate::diagnostics::{convergence_rates, error_norms, ErrorNorms};
use crate::divergence::divergence;
use crate::fields::CsField;
use crate::flux::{compute_fluxes, OperatorError};
use crate::grid::cache::CacheStore;
use crate::grid::{build_grid, CubedSphere, GridError};
use crate::initial::InitialCondition;
use crate::velocity::{TimeAveraging, Velocities, VelocityField};

/// Relative slack on the final time so round-off in `step·dt` does not add a step.
const TIME_EPS: f64 = 1.0e-12;

/// Inputs of one advection run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParams {
    /// Step length
    pub dt: f64,
    /// Final time
    pub tf: f64,
    /// Initial tracer distribution
    pub ic: InitialCondition,
    /// Wind
    pub vf: VelocityField,
    /// Monotonic limiter
    pub mono: bool,
    /// Time-averaging rule for time-dependent winds
    pub averaging: TimeAveraging,
    /// Face velocities from stream-function differences where available
    pub discrete_nondivergent: bool,
}

/// Driver failures. Non-finite tracer values are a terminal state, not an error.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AdvectionError {
    /// Operator contract violated
    #[error(transparent)]
    Operator(#[from] OperatorError),
    /// Grid for a convergence level could not be built
    #[error(transparent)]
    Grid(#[from] GridError),
    /// dt and tf must be positive
    #[error("invalid time stepping: dt={dt}, tf={tf}")]
    InvalidTimeStep {
        /// Step length
        dt: f64,
        /// Final time
        tf: f64,
    },
}

/// Driver lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Built, no step taken
    Initialized,
    /// At least one step taken, final time not reached
    Stepping,
    /// Final time reached
    Completed,
    /// Step `step` (0-based) produced non-finite values
    Diverged {
        /// Index of the failing step
        step: u64,
    },
}

impl RunState {
    /// True for `Completed` and `Diverged`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Diverged { .. })
    }
}

/// Result stats of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepStats {
    /// Simulation time after the step
    pub t: f64,
    /// Steps taken so far
    pub step_idx: u64,
    /// Maximum x-direction Courant number this step
    pub cfl_x: f64,
    /// Maximum y-direction Courant number this step
    pub cfl_y: f64,
}

/// Summary of a finished (or halted) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Cells per panel edge
    pub n: usize,
    /// Step length
    pub dt: f64,
    /// Final simulation time
    pub t: f64,
    /// Steps taken
    pub steps: u64,
    /// Terminal state
    pub state: RunState,
    /// Largest Courant number seen
    pub max_cfl: f64,
    /// Steps over the CFL threshold
    pub cfl_violations: u64,
    /// `Σ q·area` at t0
    pub mass_initial: f64,
    /// `Σ q·area` at the end
    pub mass_final: f64,
    /// `(mass_final − mass_initial) / |mass_initial|`
    pub mass_drift: f64,
    /// Interior min/max at the end
    pub range: (f64, f64),
    /// Errors against the exact solution when one exists
    pub errors: Option<ErrorNorms>,
}

/// Advection run bound to one grid. Owns its tracer and velocity arrays.
#[derive(Debug)]
pub struct Simulation<'g> {
    grid: &'g CubedSphere,
    params: SimulationParams,
    /// Tracer field
    pub q: CsField,
    /// Face velocities
    pub velocities: Velocities,
    /// Divergence of the last step
    pub div: PanelArray<f64>,
    t: f64,
    step_idx: u64,
    state: RunState,
    cfl: CflStats,
    cfl_config: CflConfig,
    mass_initial: f64,
}

impl<'g> Simulation<'g> {
    /// Set up the initial condition and the velocities at t = 0.
    pub fn new(grid: &'g CubedSphere, params: SimulationParams) -> Result<Self, AdvectionError> {
        if !(params.dt > 0.0 && params.tf > 0.0 && params.dt.is_finite() && params.tf.is_finite()) {
            return Err(AdvectionError::InvalidTimeStep { dt: params.dt, tf: params.tf });
        }
        let mut q = CsField::from_xyz_fn(grid, |r| params.ic.at_xyz(r));
        // Ghosts come from the same stencils every later step uses.
        q.fill_ghosts(grid);
        let velocities = Velocities::new(grid, params.vf, params.averaging, params.discrete_nondivergent, 0.0);
        let mass_initial = q.total_mass(grid);
        debug!(
            "[adv] init N={} ic={} vf={:?} dt={} tf={} mono={}",
            grid.n,
            params.ic.name(),
            params.vf,
            params.dt,
            params.tf,
            params.mono
        );
        Ok(Self {
            grid,
            params,
            q,
            velocities,
            div: PanelArray::filled(grid.nt(), grid.nt(), 0.0),
            t: 0.0,
            step_idx: 0,
            state: RunState::Initialized,
            cfl: CflStats::default(),
            cfl_config: CflConfig::default(),
            mass_initial,
        })
    }

    /// Override the CFL reporting threshold.
    pub fn with_cfl_config(mut self, cfg: CflConfig) -> Self {
        self.cfl_config = cfg;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.t
    }

    /// CFL statistics so far.
    pub fn cfl(&self) -> &CflStats {
        &self.cfl
    }

    /// Run parameters.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    fn finished(&self) -> bool {
        self.t >= self.params.tf * (1.0 - TIME_EPS)
    }

    /// Advance one step. A terminal simulation is left unchanged.
    pub fn step(&mut self) -> Result<StepStats, AdvectionError> {
        let grid = self.grid;
        let dt = self.params.dt;
        if self.state.is_terminal() {
            return Ok(StepStats { t: self.t, step_idx: self.step_idx, cfl_x: 0.0, cfl_y: 0.0 });
        }
        self.state = RunState::Stepping;

        self.velocities.time_averaged_velocity(grid, self.t, dt);
        let cx = cfl_x(grid, dt, &self.velocities.pu.averaged);
        let cy = cfl_y(grid, dt, &self.velocities.pv.averaged);
        self.cfl.update(self.step_idx, cx, cy, self.cfl_config);

        let fluxes = compute_fluxes(grid, &self.q, &self.velocities, dt, self.params.mono)?;
        self.div = divergence(grid, &fluxes)?;
        for c in grid.interior_cells() {
            self.q.data[c] -= dt * self.div[c];
        }
        self.q.ghosts_fresh = false;
        self.q.fill_ghosts(grid);

        let k = self.step_idx;
        self.step_idx += 1;
        self.t = self.step_idx as f64 * dt;

        if !self.q.all_finite(grid) {
            warn!("[adv] non-finite tracer after step {} (t={:.6}); halting", k, self.t);
            self.state = RunState::Diverged { step: k };
        } else if self.finished() {
            self.state = RunState::Completed;
        }
        Ok(StepStats { t: self.t, step_idx: self.step_idx, cfl_x: cx, cfl_y: cy })
    }

    /// Step until the final time or divergence, then report.
    pub fn run(&mut self) -> Result<RunReport, AdvectionError> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        let report = self.report();
        self.cfl.log_summary("advection");
        info!(
            "[adv] N={} {:?} after {} steps, t={:.4}, mass drift={:.3e}",
            report.n, report.state, report.steps, report.t, report.mass_drift
        );
        Ok(report)
    }

    /// Exact solution at the current time, if the initial condition and wind admit one.
    pub fn exact_solution(&self) -> Option<CsField> {
        let grid = self.grid;
        let mut exact = CsField::zeros(grid);
        for c in grid.interior_cells() {
            exact.data[c] = self.params.ic.exact(self.params.vf, grid.centers[c].xyz, self.t)?;
        }
        Some(exact)
    }

    /// Snapshot report of the current state.
    pub fn report(&self) -> RunReport {
        let mass_final = self.q.total_mass(self.grid);
        let drift = if self.mass_initial.abs() > 0.0 {
            (mass_final - self.mass_initial) / self.mass_initial.abs()
        } else {
            mass_final - self.mass_initial
        };
        RunReport {
            n: self.grid.n,
            dt: self.params.dt,
            t: self.t,
            steps: self.step_idx,
            state: self.state,
            max_cfl: self.cfl.max_cfl(),
            cfl_violations: self.cfl.steps_violating,
            mass_initial: self.mass_initial,
            mass_final,
            mass_drift: drift,
            range: self.q.interior_range(self.grid),
            errors: self.exact_solution().map(|e| error_norms(self.grid, &self.q, &e)),
        }
    }
}

/// One level of a convergence analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceLevel {
    /// Cells per panel edge
    pub n: usize,
    /// Run outcome at this level
    pub report: RunReport,
}

/// Error norms across resolutions and the observed orders between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    /// One entry per resolution, ascending
    pub levels: Vec<ConvergenceLevel>,
    /// Observed `[l1, l2, linf]` orders between successive levels
    pub rates: Vec<[f64; 3]>,
}

/// Run the same advection problem at each resolution with `dt` scaled by `N₀/N`.
///
/// `params.dt` applies to the first (coarsest) resolution.
pub fn run_convergence(
    resolutions: &[usize],
    projection: Projection,
    params: SimulationParams,
    load_cached: bool,
    mut cache: Option<&mut dyn CacheStore>,
) -> Result<ConvergenceReport, AdvectionError> {
    let Some(&n0) = resolutions.first() else {
        return Ok(ConvergenceReport { levels: Vec::new(), rates: Vec::new() });
    };
    let mut levels = Vec::with_capacity(resolutions.len());
    for &n in resolutions {
        let n_i = i64::try_from(n).unwrap_or(i64::MAX);
        let grid = match cache.as_mut() {
            Some(c) => {
                let store: &mut dyn CacheStore = &mut **c;
                build_grid(n_i, projection.id(), load_cached, Some(store))?
            }
            None => build_grid(n_i, projection.id(), load_cached, None)?,
        };
        let level_params = SimulationParams { dt: params.dt * n0 as f64 / n as f64, ..params };
        let report = Simulation::new(&grid, level_params)?.run()?;
        if let Some(e) = report.errors {
            info!("[adv] N={:4} dt={:.5} L1={:.4e} L2={:.4e} Linf={:.4e}", n, level_params.dt, e.l1, e.l2, e.linf);
        }
        levels.push(ConvergenceLevel { n, report });
    }

    let ns: Vec<usize> = levels.iter().map(|l| l.n).collect();
    let mut rates = Vec::new();
    if levels.iter().all(|l| l.report.errors.is_some()) {
        let col = |k: usize| -> Vec<f64> {
            levels.iter().filter_map(|l| l.report.errors.map(|e| e.as_array()[k])).collect()
        };
        let (r1, r2, ri) = (convergence_rates(&ns, &col(0)), convergence_rates(&ns, &col(1)), convergence_rates(&ns, &col(2)));
        rates = r1.iter().zip(&r2).zip(&ri).map(|((a, b), c)| [*a, *b, *c]).collect();
    }
    Ok(ConvergenceReport { levels, rates })
}
