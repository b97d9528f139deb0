use crate::math::{cross, dot, east_north, normalize, scale, xyz_to_lonlat};
use crate::projection::{panel_vector, PanelId, Projection};

/// Relative distance from a panel corner below which a point is flagged singular.
pub const CORNER_TOL: f64 = 1.0e-12;

/// Local curvilinear basis of a panel map at one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TangentBasis {
    /// Unit position vector.
    pub r: [f64; 3],
    /// Covariant basis `∂r/∂x`.
    pub ex: [f64; 3],
    /// Covariant basis `∂r/∂y`.
    pub ey: [f64; 3],
    /// Contravariant basis `∇x` (tangent to the sphere).
    pub ex_contra: [f64; 3],
    /// Contravariant basis `∇y`.
    pub ey_contra: [f64; 3],
    /// Metric determinant `sqrt(g) = (ex × ey) · r`.
    pub sqrtg: f64,
    /// Point sits on one of the four panel corners.
    pub singular: bool,
}

/// Dot products between the covariant and east/north bases, plus their determinant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BasisProducts {
    /// `ex · e_lon`
    pub ex_elon: f64,
    /// `ex · e_lat`
    pub ex_elat: f64,
    /// `ey · e_lon`
    pub ey_elon: f64,
    /// `ey · e_lat`
    pub ey_elat: f64,
    /// Determinant of the 2×2 latlon→contravariant system.
    pub det: f64,
}

/// Covariant/contravariant basis and metric determinant for panel coordinates `(x, y)`.
///
/// The conformal map degenerates at cube corners: there `sqrtg` is zero and the contravariant
/// basis is left at zero.
#[must_use]
pub fn tangent_basis(panel: PanelId, x: f64, y: f64, projection: Projection) -> TangentBasis {
    let m = projection.local_map(x, y);
    let r = normalize(panel_vector(panel, m.r));
    let ex = panel_vector(panel, m.dx);
    let ey = panel_vector(panel, m.dy);

    let sqrtg = dot(cross(ex, ey), r);
    let inv = if sqrtg.abs() > 0.0 { 1.0 / sqrtg } else { 0.0 };
    let ex_contra = scale(cross(ey, r), inv);
    let ey_contra = scale(cross(r, ex), inv);

    let hw = projection.half_width();
    let singular =
        (x.abs() - hw).abs() <= CORNER_TOL * hw && (y.abs() - hw).abs() <= CORNER_TOL * hw;

    TangentBasis { r, ex, ey, ex_contra, ey_contra, sqrtg, singular }
}

/// Products of `basis` with the east/north vectors at the basis point.
#[must_use]
pub fn basis_products(basis: &TangentBasis) -> BasisProducts {
    let (lon, lat) = xyz_to_lonlat(basis.r);
    let (elon, elat) = east_north(lon, lat);
    let ex_elon = dot(basis.ex, elon);
    let ex_elat = dot(basis.ex, elat);
    let ey_elon = dot(basis.ey, elon);
    let ey_elat = dot(basis.ey, elat);
    BasisProducts { ex_elon, ex_elat, ey_elon, ey_elat, det: ex_elon * ey_elat - ey_elon * ex_elat }
}

/// Solve `ulon e_lon + vlat e_lat = u ex + v ey` for the contravariant `(u, v)`.
///
/// Divides by `p.det`; callers guard points where it vanishes.
#[inline]
#[must_use]
pub fn latlon_to_contravariant(ulon: f64, vlat: f64, p: &BasisProducts) -> (f64, f64) {
    let u = (p.ey_elat * ulon - p.ey_elon * vlat) / p.det;
    let v = (-p.ex_elat * ulon + p.ex_elon * vlat) / p.det;
    (u, v)
}

/// Inverse of [`latlon_to_contravariant`].
#[inline]
#[must_use]
pub fn contravariant_to_latlon(u: f64, v: f64, p: &BasisProducts) -> (f64, f64) {
    (p.ex_elon * u + p.ey_elon * v, p.ex_elat * u + p.ey_elat * v)
}
