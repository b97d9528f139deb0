//! Analytic wind fields, face-normal contravariant velocities and their time averaging.

use std::f64::consts::PI;

use cubesphere_geo::{latlon_to_contravariant, math::normalize};

use crate::array::PanelArray;
use crate::config::ConfigError;
use crate::grid::{CubedSphere, PointGeometry};

/// Period of every test wind, in model time units on the unit sphere.
pub const PERIOD: f64 = 12.0;

/// Velocity field ids 1..=4. Ids 3 and 4 vary in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VelocityField {
    /// Solid-body rotation about the polar axis
    ZonalRotation,
    /// Solid-body rotation about an axis tilted by π/4
    TiltedRotation,
    /// Non-divergent deformation with zonal translation
    NondivergentDeformation,
    /// Divergent deformation with zonal translation
    DivergentDeformation,
}

impl TryFrom<u32> for VelocityField {
    type Error = ConfigError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::ZonalRotation),
            2 => Ok(Self::TiltedRotation),
            3 => Ok(Self::NondivergentDeformation),
            4 => Ok(Self::DivergentDeformation),
            other => Err(ConfigError::InvalidVelocityField(other)),
        }
    }
}

impl VelocityField {
    /// Numeric id.
    pub fn id(self) -> u32 {
        match self {
            Self::ZonalRotation => 1,
            Self::TiltedRotation => 2,
            Self::NondivergentDeformation => 3,
            Self::DivergentDeformation => 4,
        }
    }

    /// Fields with id >= 3 must be re-evaluated every step.
    pub fn is_time_dependent(self) -> bool {
        self.id() >= 3
    }

    /// True if the continuous field has non-zero divergence.
    pub fn is_divergent(self) -> bool {
        self == Self::DivergentDeformation
    }

    /// Time after which the flow returns every parcel to its start.
    pub fn period(self) -> f64 {
        PERIOD
    }

    fn tilt(self) -> f64 {
        match self {
            Self::TiltedRotation => PI / 4.0,
            _ => 0.0,
        }
    }

    /// Rotation axis and angular rate for the solid-body fields.
    pub fn rotation(self) -> Option<([f64; 3], f64)> {
        match self {
            Self::ZonalRotation | Self::TiltedRotation => {
                let a = self.tilt();
                Some((normalize([-a.sin(), 0.0, a.cos()]), 2.0 * PI / PERIOD))
            }
            _ => None,
        }
    }

    /// Eastward and northward wind at `(lon, lat)` and time `t`.
    pub fn latlon(self, lon: f64, lat: f64, t: f64) -> (f64, f64) {
        let ct = (PI * t / PERIOD).cos();
        match self {
            Self::ZonalRotation | Self::TiltedRotation => {
                let (u0, a) = (2.0 * PI / PERIOD, self.tilt());
                let u = u0 * (a.cos() * lat.cos() + a.sin() * lon.cos() * lat.sin());
                let v = -u0 * a.sin() * lon.sin();
                (u, v)
            }
            Self::NondivergentDeformation => {
                let k = 10.0 / PERIOD;
                let lp = lon - 2.0 * PI * t / PERIOD;
                let u = k * lp.sin().powi(2) * (2.0 * lat).sin() * ct + 2.0 * PI * lat.cos() / PERIOD;
                let v = k * (2.0 * lp).sin() * lat.cos() * ct;
                (u, v)
            }
            Self::DivergentDeformation => {
                let k = 5.0 / PERIOD;
                let lp = lon - 2.0 * PI * t / PERIOD;
                let u = -k * (0.5 * lp).sin().powi(2) * (2.0 * lat).sin() * lat.cos().powi(2) * ct
                    + 2.0 * PI * lat.cos() / PERIOD;
                let v = 0.5 * k * lp.sin() * lat.cos().powi(3) * ct;
                (u, v)
            }
        }
    }

    /// Stream function `ψ` with `u = -∂ψ/∂θ`, `v = ∂ψ/∂λ / cos θ`. `None` for the divergent field.
    pub fn stream_function(self, lon: f64, lat: f64, t: f64) -> Option<f64> {
        let ct = (PI * t / PERIOD).cos();
        match self {
            Self::ZonalRotation | Self::TiltedRotation => {
                let (u0, a) = (2.0 * PI / PERIOD, self.tilt());
                Some(-u0 * (lat.sin() * a.cos() - lon.cos() * lat.cos() * a.sin()))
            }
            Self::NondivergentDeformation => {
                let k = 10.0 / PERIOD;
                let lp = lon - 2.0 * PI * t / PERIOD;
                Some(k * lp.sin().powi(2) * lat.cos().powi(2) * ct - 2.0 * PI * lat.sin() / PERIOD)
            }
            Self::DivergentDeformation => None,
        }
    }
}

/// How face velocities are combined across a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeAveraging {
    /// Velocity at the start of the step
    Instantaneous,
    /// Mean of the start and end of the step
    #[default]
    Trapezoidal,
    /// `1.5 u(tₙ) − 0.5 u(tₙ₋₁)`
    Extrapolated,
}

impl std::str::FromStr for TimeAveraging {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instantaneous" => Ok(Self::Instantaneous),
            "trapezoidal" | "midpoint" => Ok(Self::Trapezoidal),
            "extrapolated" => Ok(Self::Extrapolated),
            _ => Err(ConfigError::InvalidAveraging(s.to_string())),
        }
    }
}

/// Which face family a velocity set lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceSet {
    /// x-faces, normal component `ucontra`
    Pu,
    /// y-faces, normal component `vcontra`
    Pv,
}

/// Velocity components at one family of face midpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceVelocity {
    /// Face family
    pub set: FaceSet,
    /// Eastward wind
    pub ulon: PanelArray<f64>,
    /// Northward wind
    pub vlat: PanelArray<f64>,
    /// Contravariant x component
    pub ucontra: PanelArray<f64>,
    /// Contravariant y component
    pub vcontra: PanelArray<f64>,
    /// `ucontra` from the previous evaluation
    pub ucontra_old: PanelArray<f64>,
    /// `vcontra` from the previous evaluation
    pub vcontra_old: PanelArray<f64>,
    /// Time-averaged normal component used by the flux operator
    pub averaged: PanelArray<f64>,
}

impl FaceVelocity {
    /// Evaluate `field` at time `t` on every face of `set`, ghosts included.
    pub fn evaluate(grid: &CubedSphere, set: FaceSet, field: VelocityField, t: f64, discrete_nondivergent: bool) -> Self {
        let points = match set {
            FaceSet::Pu => &grid.pu,
            FaceSet::Pv => &grid.pv,
        };
        let (ni, nj) = (points.ni(), points.nj());
        let mut ulon = PanelArray::filled(ni, nj, 0.0);
        let mut vlat = PanelArray::filled(ni, nj, 0.0);
        let mut ucontra = PanelArray::filled(ni, nj, 0.0);
        let mut vcontra = PanelArray::filled(ni, nj, 0.0);
        let use_psi = discrete_nondivergent && field.stream_function(0.0, 0.0, t).is_some();

        for p in 0..cubesphere_geo::PANELS {
            for j in 0..nj {
                for i in 0..ni {
                    let g: &PointGeometry = &points[(p, i, j)];
                    let (u, v) = field.latlon(g.lon, g.lat, t);
                    let (uc, vc) = latlon_to_contravariant(u, v, &g.products());
                    ulon[(p, i, j)] = u;
                    vlat[(p, i, j)] = v;
                    ucontra[(p, i, j)] = uc;
                    vcontra[(p, i, j)] = vc;
                    if use_psi {
                        let normal = psi_normal(grid, set, field, t, p, i, j);
                        match set {
                            FaceSet::Pu => ucontra[(p, i, j)] = normal,
                            FaceSet::Pv => vcontra[(p, i, j)] = normal,
                        }
                    }
                }
            }
        }

        let averaged = match set {
            FaceSet::Pu => ucontra.clone(),
            FaceSet::Pv => vcontra.clone(),
        };
        Self { set, ulon, vlat, ucontra_old: ucontra.clone(), vcontra_old: vcontra.clone(), ucontra, vcontra, averaged }
    }

    /// Current normal component.
    pub fn normal(&self) -> &PanelArray<f64> {
        match self.set {
            FaceSet::Pu => &self.ucontra,
            FaceSet::Pv => &self.vcontra,
        }
    }

    /// Blend `fresh` with the current values into `averaged`, then rotate current into old and
    /// fresh into current.
    fn advance(&mut self, fresh: Self, averaging: TimeAveraging) {
        {
            let cur = match self.set {
                FaceSet::Pu => self.ucontra.as_slice(),
                FaceSet::Pv => self.vcontra.as_slice(),
            };
            let new = fresh.normal().as_slice();
            for ((avg, &c), &f) in self.averaged.as_mut_slice().iter_mut().zip(cur).zip(new) {
                *avg = match averaging {
                    TimeAveraging::Instantaneous => f,
                    TimeAveraging::Trapezoidal => 0.5 * (c + f),
                    TimeAveraging::Extrapolated => 1.5 * f - 0.5 * c,
                };
            }
        }
        self.ucontra_old = std::mem::replace(&mut self.ucontra, fresh.ucontra);
        self.vcontra_old = std::mem::replace(&mut self.vcontra, fresh.vcontra);
        self.ulon = fresh.ulon;
        self.vlat = fresh.vlat;
    }
}

/// Face-normal contravariant velocity from stream-function differences at the face endpoints.
fn psi_normal(grid: &CubedSphere, set: FaceSet, field: VelocityField, t: f64, p: usize, i: usize, j: usize) -> f64 {
    let psi = |ci: usize, cj: usize| {
        let c = &grid.corners[(p, ci, cj)];
        field.stream_function(c.lon, c.lat, t).unwrap_or(0.0)
    };
    match set {
        FaceSet::Pu => (psi(i, j) - psi(i, j + 1)) / (grid.pu[(p, i, j)].sqrtg * grid.dx),
        FaceSet::Pv => (psi(i + 1, j) - psi(i, j)) / (grid.pv[(p, i, j)].sqrtg * grid.dx),
    }
}

/// Face velocities for both families plus the settings that control their update.
#[derive(Debug, Clone, PartialEq)]
pub struct Velocities {
    /// Analytic wind
    pub field: VelocityField,
    /// Averaging rule for time-dependent winds
    pub averaging: TimeAveraging,
    /// Derive normal components from the stream function when one exists
    pub discrete_nondivergent: bool,
    /// x-face velocities
    pub pu: FaceVelocity,
    /// y-face velocities
    pub pv: FaceVelocity,
}

impl Velocities {
    /// Evaluate at `t0`; `averaged` starts equal to the instantaneous normal components.
    pub fn new(grid: &CubedSphere, field: VelocityField, averaging: TimeAveraging, discrete_nondivergent: bool, t0: f64) -> Self {
        Self {
            field,
            averaging,
            discrete_nondivergent,
            pu: FaceVelocity::evaluate(grid, FaceSet::Pu, field, t0, discrete_nondivergent),
            pv: FaceVelocity::evaluate(grid, FaceSet::Pv, field, t0, discrete_nondivergent),
        }
    }

    /// Update `averaged` for the step `[t, t + dt]`.
    ///
    /// Steady fields keep their instantaneous values. Time-dependent fields are re-evaluated and
    /// blended; the previous-step copy is rotated only after the blend.
    pub fn time_averaged_velocity(&mut self, grid: &CubedSphere, t: f64, dt: f64) {
        if !self.field.is_time_dependent() {
            return;
        }
        let tau = match self.averaging {
            TimeAveraging::Trapezoidal => t + dt,
            TimeAveraging::Instantaneous | TimeAveraging::Extrapolated => t,
        };
        let fresh_u = FaceVelocity::evaluate(grid, FaceSet::Pu, self.field, tau, self.discrete_nondivergent);
        let fresh_v = FaceVelocity::evaluate(grid, FaceSet::Pv, self.field, tau, self.discrete_nondivergent);
        self.pu.advance(fresh_u, self.averaging);
        self.pv.advance(fresh_v, self.averaging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubesphere_geo::Projection;

    #[test]
    fn stream_function_matches_winds() {
        let h = 1e-6;
        for vf in [VelocityField::ZonalRotation, VelocityField::TiltedRotation, VelocityField::NondivergentDeformation] {
            for &(lon, lat, t) in &[(0.3, 0.2, 0.0), (2.0, -0.7, 1.5), (-1.2, 1.1, 4.0)] {
                let psi = |a: f64, b: f64| vf.stream_function(a, b, t).unwrap();
                let u = -(psi(lon, lat + h) - psi(lon, lat - h)) / (2.0 * h);
                let v = (psi(lon + h, lat) - psi(lon - h, lat)) / (2.0 * h) / lat.cos();
                let (ue, ve) = vf.latlon(lon, lat, t);
                assert!((u - ue).abs() < 1e-7, "{vf:?} u");
                assert!((v - ve).abs() < 1e-7, "{vf:?} v");
            }
        }
        assert!(VelocityField::DivergentDeformation.stream_function(0.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn steady_fields_are_not_reevaluated() {
        let g = CubedSphere::new(8, Projection::Equiangular).unwrap();
        let mut v = Velocities::new(&g, VelocityField::TiltedRotation, TimeAveraging::Trapezoidal, true, 0.0);
        let before = v.clone();
        v.time_averaged_velocity(&g, 0.0, 0.1);
        assert_eq!(v, before);
    }

    #[test]
    fn trapezoidal_blend_uses_both_ends() {
        let g = CubedSphere::new(6, Projection::Equidistant).unwrap();
        let vf = VelocityField::NondivergentDeformation;
        let mut v = Velocities::new(&g, vf, TimeAveraging::Trapezoidal, false, 0.0);
        let start = v.pu.ucontra.clone();
        v.time_averaged_velocity(&g, 0.0, 0.5);
        let end = FaceVelocity::evaluate(&g, FaceSet::Pu, vf, 0.5, false);
        let k = g.pu.offset(1, 5, 4);
        let expected = 0.5 * (start.as_slice()[k] + end.ucontra.as_slice()[k]);
        assert!((v.pu.averaged.as_slice()[k] - expected).abs() < 1e-14);
        // Old copy is the pre-step value, current is the end value.
        assert_eq!(v.pu.ucontra_old, start);
        assert_eq!(v.pu.ucontra, end.ucontra);
    }
}
