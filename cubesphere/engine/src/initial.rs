//! Initial tracer distributions and their exact transported solutions.

use std::f64::consts::PI;

use cubesphere_geo::math::{arc_angle, lonlat_to_xyz, norm, sub};

use crate::config::ConfigError;
use crate::velocity::VelocityField;

/// Gaussian hill sharpness.
const B0: f64 = 5.0;
/// Cosine bell radius on the unit sphere.
const BELL_RADIUS: f64 = 1.0 / 3.0;

/// Initial condition ids 1..=4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitialCondition {
    /// Single Gaussian hill centred at (3π/2, 0)
    GaussianHill,
    /// Cosine bell of radius 1/3 centred at (3π/2, 0)
    CosineBell,
    /// Two Gaussian hills at (5π/6, 0) and (7π/6, 0)
    TwoGaussianHills,
    /// Constant 1 everywhere
    Constant,
}

impl TryFrom<u32> for InitialCondition {
    type Error = ConfigError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::GaussianHill),
            2 => Ok(Self::CosineBell),
            3 => Ok(Self::TwoGaussianHills),
            4 => Ok(Self::Constant),
            other => Err(ConfigError::InvalidInitialCondition(other)),
        }
    }
}

impl InitialCondition {
    /// Short label for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::GaussianHill => "gaussian-hill",
            Self::CosineBell => "cosine-bell",
            Self::TwoGaussianHills => "two-gaussian-hills",
            Self::Constant => "constant",
        }
    }

    /// Value at the unit vector `r`.
    pub fn at_xyz(self, r: [f64; 3]) -> f64 {
        match self {
            Self::GaussianHill => gaussian(r, lonlat_to_xyz(1.5 * PI, 0.0)),
            Self::CosineBell => {
                let d = arc_angle(r, lonlat_to_xyz(1.5 * PI, 0.0));
                if d < BELL_RADIUS {
                    0.5 * (1.0 + (PI * d / BELL_RADIUS).cos())
                } else {
                    0.0
                }
            }
            Self::TwoGaussianHills => {
                gaussian(r, lonlat_to_xyz(5.0 * PI / 6.0, 0.0)) + gaussian(r, lonlat_to_xyz(7.0 * PI / 6.0, 0.0))
            }
            Self::Constant => 1.0,
        }
    }

    /// Value at `(lon, lat)`.
    pub fn at(self, lon: f64, lat: f64) -> f64 {
        self.at_xyz(lonlat_to_xyz(lon, lat))
    }

    /// Exact solution at time `t` under `vf`, if one is known.
    ///
    /// Solid-body fields rotate the initial condition; deformational fields return to it at whole
    /// periods. A constant stays constant under non-divergent flow.
    pub fn exact(self, vf: VelocityField, r: [f64; 3], t: f64) -> Option<f64> {
        if let Some((axis, rate)) = vf.rotation() {
            return Some(self.at_xyz(cubesphere_geo::math::rotate(r, axis, -rate * t)));
        }
        if self == Self::Constant && !vf.is_divergent() {
            return Some(1.0);
        }
        let periods = t / vf.period();
        if (periods - periods.round()).abs() < 1e-12 {
            return Some(self.at_xyz(r));
        }
        None
    }
}

fn gaussian(r: [f64; 3], c: [f64; 3]) -> f64 {
    let d = norm(sub(r, c));
    (-B0 * d * d).exp()
}
