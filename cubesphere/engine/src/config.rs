//! Run parameters and their validation.
//!
//! `Parameters` mirrors the JSON parameter file field by field. Integer ids are checked once by
//! [`Parameters::validate`] and turned into the closed enums the rest of the crate dispatches on.

use std::path::{Path, PathBuf};

use cubesphere_geo::Projection;
use serde::{Deserialize, Serialize};

use crate::grid::GridError;
use crate::initial::InitialCondition;
use crate::stepper::SimulationParams;
use crate::velocity::{TimeAveraging, VelocityField};

/// Configuration failures. All of them are reported before any grid is built.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Parameter file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Parameter file is not valid JSON for [`Parameters`]
    #[error("invalid parameter file: {0}")]
    Json(#[from] serde_json::Error),
    /// Test case id outside 1..=5
    #[error("invalid test case {0}")]
    InvalidTestCase(u32),
    /// Sub-case id outside 1..=2
    #[error("invalid sub-case {0}")]
    InvalidSubCase(u32),
    /// Initial condition id outside 1..=4
    #[error("invalid initial condition {0}")]
    InvalidInitialCondition(u32),
    /// Velocity field id outside 1..=4
    #[error("invalid velocity field {0}")]
    InvalidVelocityField(u32),
    /// Unknown time-averaging rule
    #[error("invalid time averaging '{0}'")]
    InvalidAveraging(String),
    /// Non-positive time step or final time
    #[error("invalid time stepping: dt={dt}, tf={tf}")]
    InvalidTimeStep {
        /// Step length
        dt: f64,
        /// Final time
        tf: f64,
    },
    /// Resolution or projection rejected
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Divergence test parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceParams {
    /// Sub-case: 1 single grid, 2 convergence
    pub tc: u32,
    /// Initial condition id
    pub ic: u32,
    /// Velocity field id
    pub vf: u32,
    /// Monotonic limiter
    pub mono: bool,
    /// Step length used for the swept-region averages
    pub dt: f64,
}

impl Default for DivergenceParams {
    fn default() -> Self {
        Self { tc: 1, ic: 1, vf: 1, mono: false, dt: 0.0 }
    }
}

/// Advection test parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvectionParams {
    /// Step length at resolution `n`
    pub dt: f64,
    /// Final time
    pub tf: f64,
    /// Sub-case: 1 single run, 2 convergence
    pub tc: u32,
    /// Initial condition id
    pub ic: u32,
    /// Velocity field id
    pub vf: u32,
    /// Monotonic limiter
    pub mono: bool,
    /// Time-averaging rule name
    pub averaging: String,
    /// Face velocities from stream-function differences where available
    pub discrete_nondivergent: bool,
}

impl Default for AdvectionParams {
    fn default() -> Self {
        Self {
            dt: 0.05,
            tf: 12.0,
            tc: 1,
            ic: 1,
            vf: 1,
            mono: false,
            averaging: "trapezoidal".to_string(),
            discrete_nondivergent: true,
        }
    }
}

/// Interpolation test parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationParams {
    /// Initial condition id sampled by the test
    pub ic: u32,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self { ic: 1 }
    }
}

/// Raw parameter file contents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Cells per panel edge
    pub n: i64,
    /// Projection id
    pub projection: String,
    /// Print results to the terminal as well as the log
    pub show_on_screen: bool,
    /// Reuse a cached grid when one exists
    pub grid_load: bool,
    /// Test case id 1..=5
    pub test_case: u32,
    /// Map projection for plotting collaborators (opaque here)
    pub map_projection: String,
    /// Directory of the grid cache
    pub cache_dir: PathBuf,
    /// Longitudes of the companion latlon grid
    pub nlon: usize,
    /// Latitudes of the companion latlon grid
    pub nlat: usize,
    /// Resolutions used by convergence analyses
    pub convergence_resolutions: Vec<i64>,
    /// Divergence test block
    pub divergence: DivergenceParams,
    /// Advection test block
    pub advection: AdvectionParams,
    /// Interpolation test block
    pub interpolation: InterpolationParams,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            n: 32,
            projection: "equiangular".to_string(),
            show_on_screen: false,
            grid_load: true,
            test_case: 1,
            map_projection: "mercator".to_string(),
            cache_dir: PathBuf::from("grids"),
            nlon: 360,
            nlat: 180,
            convergence_resolutions: vec![16, 32, 64],
            divergence: DivergenceParams::default(),
            advection: AdvectionParams::default(),
            interpolation: InterpolationParams::default(),
        }
    }
}

/// Single run or convergence analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubCase {
    /// One resolution
    Single,
    /// Every resolution in `convergence_resolutions`
    Convergence,
}

impl TryFrom<u32> for SubCase {
    type Error = ConfigError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::Single),
            2 => Ok(Self::Convergence),
            other => Err(ConfigError::InvalidSubCase(other)),
        }
    }
}

/// Runner test cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestCase {
    /// 1: build the grid and summarise it
    GridGeneration,
    /// 2: grid quality metrics
    GridQuality,
    /// 3: interpolation error analysis
    Interpolation,
    /// 4: divergence operator test
    Divergence(SubCase),
    /// 5: advection test
    Advection(SubCase),
}

/// Validated run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Cells per panel edge
    pub n: usize,
    /// Panel projection
    pub projection: Projection,
    /// Echo results to stdout
    pub show_on_screen: bool,
    /// Reuse cached grids
    pub grid_load: bool,
    /// Selected test case
    pub test_case: TestCase,
    /// Grid cache directory
    pub cache_dir: PathBuf,
    /// Companion latlon grid size `(nlon, nlat)`
    pub latlon: (usize, usize),
    /// Convergence resolutions, ascending
    pub resolutions: Vec<usize>,
    /// Divergence test inputs (dt, tf unused)
    pub divergence: SimulationParams,
    /// Advection inputs
    pub advection: SimulationParams,
    /// Field sampled by the interpolation test
    pub interpolation_ic: InitialCondition,
}

fn resolution(n: i64) -> Result<usize, ConfigError> {
    if n <= 0 {
        return Err(GridError::InvalidResolution(n).into());
    }
    usize::try_from(n).map_err(|_| GridError::InvalidResolution(n).into())
}

impl Parameters {
    /// Parse from a JSON string; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read and parse a JSON parameter file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every id and build the typed configuration.
    pub fn validate(&self) -> Result<RunConfig, ConfigError> {
        let n = resolution(self.n)?;
        let projection: Projection = self.projection.parse().map_err(GridError::from)?;
        let test_case = match self.test_case {
            1 => TestCase::GridGeneration,
            2 => TestCase::GridQuality,
            3 => TestCase::Interpolation,
            4 => TestCase::Divergence(SubCase::try_from(self.divergence.tc)?),
            5 => TestCase::Advection(SubCase::try_from(self.advection.tc)?),
            other => return Err(ConfigError::InvalidTestCase(other)),
        };

        let mut resolutions = self.convergence_resolutions.iter().map(|&r| resolution(r)).collect::<Result<Vec<_>, _>>()?;
        resolutions.sort_unstable();
        resolutions.dedup();

        let a = &self.advection;
        if !(a.dt > 0.0 && a.tf > 0.0) {
            return Err(ConfigError::InvalidTimeStep { dt: a.dt, tf: a.tf });
        }
        let advection = SimulationParams {
            dt: a.dt,
            tf: a.tf,
            ic: InitialCondition::try_from(a.ic)?,
            vf: VelocityField::try_from(a.vf)?,
            mono: a.mono,
            averaging: a.averaging.parse::<TimeAveraging>()?,
            discrete_nondivergent: a.discrete_nondivergent,
        };
        let d = &self.divergence;
        let divergence = SimulationParams {
            dt: d.dt.max(0.0),
            tf: 0.0,
            ic: InitialCondition::try_from(d.ic)?,
            vf: VelocityField::try_from(d.vf)?,
            mono: d.mono,
            averaging: TimeAveraging::default(),
            discrete_nondivergent: a.discrete_nondivergent,
        };

        Ok(RunConfig {
            n,
            projection,
            show_on_screen: self.show_on_screen,
            grid_load: self.grid_load,
            test_case,
            cache_dir: self.cache_dir.clone(),
            latlon: (self.nlon.max(1), self.nlat.max(1)),
            resolutions,
            divergence,
            advection,
            interpolation_ic: InitialCondition::try_from(self.interpolation.ic)?,
        })
    }
}
