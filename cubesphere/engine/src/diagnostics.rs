//! Error norms, convergence rates, grid-quality metrics and the operator accuracy tests.

use cubesphere_geo::math::{arc_angle, dot, norm};
use serde::Serialize;

use crate::divergence::flux_divergence;
use crate::fields::CsField;
use crate::flux::OperatorError;
use crate::grid::CubedSphere;
use crate::initial::InitialCondition;
use crate::latlon::LatLonGrid;
use crate::stepper::SimulationParams;
use crate::velocity::{Velocities, VelocityField};

/// Normalised error norms (Williamson et al. 1992). Absolute when the reference vanishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ErrorNorms {
    /// Area-weighted L1
    pub l1: f64,
    /// Area-weighted L2
    pub l2: f64,
    /// Maximum norm
    pub linf: f64,
}

impl ErrorNorms {
    /// Norms as an array in `[l1, l2, linf]` order.
    pub fn as_array(&self) -> [f64; 3] {
        [self.l1, self.l2, self.linf]
    }
}

/// Weighted norms of `value - exact` over paired samples.
pub fn weighted_norms(samples: impl Iterator<Item = (f64, f64, f64)>) -> ErrorNorms {
    let (mut e1, mut r1, mut e2, mut r2, mut ei, mut ri) = (0.0, 0.0, 0.0, 0.0, 0.0f64, 0.0f64);
    for (value, exact, w) in samples {
        let d = (value - exact).abs();
        e1 += d * w;
        r1 += exact.abs() * w;
        e2 += d * d * w;
        r2 += exact * exact * w;
        ei = ei.max(d);
        ri = ri.max(exact.abs());
    }
    let norm_by = |e: f64, r: f64| if r > f64::EPSILON { e / r } else { e };
    ErrorNorms { l1: norm_by(e1, r1), l2: norm_by(e2, r2).sqrt(), linf: norm_by(ei, ri) }
}

/// Norms of `q - exact` over interior cells, weighted by cell area.
pub fn error_norms(grid: &CubedSphere, q: &CsField, exact: &CsField) -> ErrorNorms {
    weighted_norms(grid.interior_cells().map(|c| (q.data[c], exact.data[c], grid.area[c])))
}

/// Observed orders `log(eₖ/eₖ₊₁) / log(Nₖ₊₁/Nₖ)` between successive resolutions.
pub fn convergence_rates(resolutions: &[usize], errors: &[f64]) -> Vec<f64> {
    resolutions
        .windows(2)
        .zip(errors.windows(2))
        .map(|(n, e)| (e[0] / e[1]).ln() / (n[1] as f64 / n[0] as f64).ln())
        .collect()
}

/// Cell-shape and metric statistics over interior cells.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GridQuality {
    /// Smallest cell area
    pub area_min: f64,
    /// Largest cell area
    pub area_max: f64,
    /// `area_max / area_min`
    pub area_ratio: f64,
    /// Largest ratio of longest to shortest cell side
    pub aspect_max: f64,
    /// Mean of the same ratio
    pub aspect_mean: f64,
    /// Smallest angle between the covariant basis vectors at cell centres, degrees
    pub min_angle_deg: f64,
    /// Total interior area
    pub total_area: f64,
}

/// Compute [`GridQuality`] from the precomputed geometry.
pub fn grid_quality(grid: &CubedSphere) -> GridQuality {
    let mut area_min = f64::INFINITY;
    let mut area_max: f64 = 0.0;
    let mut aspect_max: f64 = 0.0;
    let mut aspect_sum = 0.0;
    let mut min_angle = f64::INFINITY;
    let mut count = 0usize;
    for (p, i, j) in grid.interior_cells() {
        let a = grid.area[(p, i, j)];
        area_min = area_min.min(a);
        area_max = area_max.max(a);

        let c = |ci: usize, cj: usize| grid.corners[(p, ci, cj)].xyz;
        let sides = [
            arc_angle(c(i, j), c(i + 1, j)),
            arc_angle(c(i + 1, j), c(i + 1, j + 1)),
            arc_angle(c(i + 1, j + 1), c(i, j + 1)),
            arc_angle(c(i, j + 1), c(i, j)),
        ];
        let lmax = sides.iter().copied().fold(0.0, f64::max);
        let lmin = sides.iter().copied().fold(f64::INFINITY, f64::min);
        let aspect = lmax / lmin;
        aspect_max = aspect_max.max(aspect);
        aspect_sum += aspect;

        let g = &grid.centers[(p, i, j)];
        let cos = dot(g.ex, g.ey) / (norm(g.ex) * norm(g.ey));
        min_angle = min_angle.min(cos.abs().clamp(0.0, 1.0).acos().to_degrees());
        count += 1;
    }
    GridQuality {
        area_min,
        area_max,
        area_ratio: area_max / area_min,
        aspect_max,
        aspect_mean: aspect_sum / count.max(1) as f64,
        min_angle_deg: min_angle,
        total_area: grid.total_area(),
    }
}

/// Step for the centred differences of the reference divergence.
const FD_STEP: f64 = 1.0e-6;

/// Surface divergence of `q·V` at `(lon, lat)` by centred differences.
///
/// `None` within 1e-8 of a pole, where the spherical form is singular.
pub fn reference_divergence(ic: InitialCondition, vf: VelocityField, lon: f64, lat: f64, t: f64) -> Option<f64> {
    let cl = lat.cos();
    if cl.abs() < 1.0e-8 {
        return None;
    }
    let qu = |a: f64, b: f64| ic.at(a, b) * vf.latlon(a, b, t).0;
    let qvc = |a: f64, b: f64| ic.at(a, b) * vf.latlon(a, b, t).1 * b.cos();
    let h = FD_STEP;
    let d_lon = (qu(lon + h, lat) - qu(lon - h, lat)) / (2.0 * h);
    let d_lat = (qvc(lon, lat + h) - qvc(lon, lat - h)) / (2.0 * h);
    Some((d_lon + d_lat) / cl)
}

/// Outcome of one divergence test.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DivergenceReport {
    /// Cells per panel edge
    pub n: usize,
    /// Errors of the discrete divergence against the reference
    pub norms: ErrorNorms,
    /// Largest discrete divergence magnitude
    pub max_abs: f64,
}

/// Compare the discrete divergence of `q·V` with the centred-difference reference.
pub fn divergence_test(grid: &CubedSphere, params: &SimulationParams) -> Result<DivergenceReport, OperatorError> {
    let q = CsField::from_latlon_fn(grid, |lon, lat| params.ic.at(lon, lat));
    let vel = Velocities::new(grid, params.vf, params.averaging, params.discrete_nondivergent, 0.0);
    let div = flux_divergence(grid, &q, &vel, params.dt, params.mono)?;
    let mut max_abs: f64 = 0.0;
    let samples: Vec<(f64, f64, f64)> = grid
        .interior_cells()
        .filter_map(|c| {
            let g = &grid.centers[c];
            max_abs = max_abs.max(div[c].abs());
            reference_divergence(params.ic, params.vf, g.lon, g.lat, 0.0).map(|r| (div[c], r, grid.area[c]))
        })
        .collect();
    Ok(DivergenceReport { n: grid.n, norms: weighted_norms(samples.into_iter()), max_abs })
}

/// Outcome of one interpolation test.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InterpolationReport {
    /// Cells per panel edge
    pub n: usize,
    /// Samples with a valid mapping
    pub mapped: usize,
    /// Samples rejected by the mask
    pub masked: usize,
    /// Nearest-cell errors, weighted by cos(lat)
    pub norms: ErrorNorms,
}

/// Sample `ic` on `grid`, transfer it to `ll` by nearest cell and compare with the analytic values.
///
/// Maps `ll` onto `grid` first if needed.
pub fn interpolation_test(grid: &CubedSphere, ll: &mut LatLonGrid, ic: InitialCondition) -> InterpolationReport {
    if !ll.is_mapped_to(grid) {
        ll.map(grid);
    }
    let q = CsField::from_latlon_fn(grid, |lon, lat| ic.at(lon, lat));
    let values = ll.interpolate(grid, &q);
    let mapped = ll.mask.iter().filter(|m| **m).count();
    let norms = weighted_norms(
        (0..ll.len())
            .filter(|&k| ll.mask[k])
            .map(|k| (values[k], ic.at(ll.lon[k], ll.lat[k]), ll.lat[k].cos())),
    );
    InterpolationReport { n: grid.n, mapped, masked: ll.len() - mapped, norms }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubesphere_geo::Projection;

    #[test]
    fn rates_of_exact_power_law() {
        let ns = [8, 16, 32];
        let errs = [1.0, 0.25, 0.0625];
        let r = convergence_rates(&ns, &errs);
        assert_eq!(r.len(), 2);
        assert!(r.iter().all(|x| (x - 2.0).abs() < 1e-12));
    }

    #[test]
    fn norms_are_relative() {
        let n = weighted_norms([(1.1, 1.0, 1.0), (2.0, 2.0, 1.0)].into_iter());
        assert!((n.l1 - 0.1 / 3.0).abs() < 1e-12);
        assert!((n.linf - 0.05).abs() < 1e-12);
        let z = weighted_norms([(0.5, 0.0, 2.0)].into_iter());
        assert!((z.l1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn equiangular_cells_are_nearly_uniform() {
        let g = CubedSphere::new(16, Projection::Equiangular).unwrap();
        let q = grid_quality(&g);
        assert!(q.area_ratio < 1.5, "equiangular area ratio {}", q.area_ratio);
        assert!((q.total_area - 4.0 * std::f64::consts::PI).abs() < 1e-10);
        let e = grid_quality(&CubedSphere::new(16, Projection::Equidistant).unwrap());
        assert!(e.area_ratio > q.area_ratio);
        assert!(q.min_angle_deg > 60.0 && q.min_angle_deg <= 90.0);
    }

    #[test]
    fn conformal_cells_are_orthogonal() {
        let q = grid_quality(&CubedSphere::new(16, Projection::Conformal).unwrap());
        assert!(q.min_angle_deg > 89.999, "min angle {}", q.min_angle_deg);
        assert!((q.total_area - 4.0 * std::f64::consts::PI).abs() < 1e-10);
        assert!(q.area_ratio > 2.0);
    }

    #[test]
    fn reference_divergence_vanishes_for_solid_body_constant() {
        let d = reference_divergence(InitialCondition::Constant, VelocityField::TiltedRotation, 0.7, 0.3, 0.0).unwrap();
        assert!(d.abs() < 1e-8);
        assert!(reference_divergence(InitialCondition::Constant, VelocityField::ZonalRotation, 0.0, std::f64::consts::FRAC_PI_2, 0.0).is_none());
    }
}
