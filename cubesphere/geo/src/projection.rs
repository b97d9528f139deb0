use std::f64::consts::FRAC_PI_4;
use std::fmt;
use std::str::FromStr;

use crate::conformal;
use crate::math::{dot, normalize, scale, sub, xyz_to_lonlat};

/// Number of cube panels.
pub const PANELS: usize = 6;

/// Panel identifier, 0..6. Panels 0-3 ring the equator eastward from lon 0, 4 is north, 5 south.
pub type PanelId = usize;

/// Orthonormal frame `(n, a, b)` per panel: the tangent-plane point is `n + X a + Y b`.
pub const PANEL_FRAMES: [[[f64; 3]; 3]; PANELS] = [
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
    [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]],
    [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
    [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]],
    [[0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
];

/// Errors from resolving a projection identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// Identifier is not a known projection
    #[error("unknown projection '{0}'")]
    Unknown(String),
}

/// Unit position and its derivatives along x and y, in panel-frame components `(a, b, n)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalMap {
    /// Unit position vector
    pub r: [f64; 3],
    /// `∂r/∂x`
    pub dx: [f64; 3],
    /// `∂r/∂y`
    pub dy: [f64; 3],
}

/// Cube-face to sphere map projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Equal angular spacing: `X = tan(x)`, `x ∈ [-π/4, π/4]`.
    Equiangular,
    /// Equidistant gnomonic: `X = x`, `x ∈ [-1, 1]`.
    Equidistant,
    /// Conformal cube (Rančić, Purser & Mesinger), `x ∈ [-1, 1]`.
    Conformal,
}

impl Projection {
    /// Stable identifier used in parameter files and cache keys.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Equiangular => "equiangular",
            Self::Equidistant => "equidistant",
            Self::Conformal => "conformal",
        }
    }

    /// Numeric code stored in binary caches.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Equiangular => 1,
            Self::Equidistant => 2,
            Self::Conformal => 3,
        }
    }

    /// Inverse of [`Projection::code`].
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Equiangular),
            2 => Some(Self::Equidistant),
            3 => Some(Self::Conformal),
            _ => None,
        }
    }

    /// Half-width of the panel in computational coordinates.
    #[must_use]
    pub fn half_width(self) -> f64 {
        match self {
            Self::Equiangular => FRAC_PI_4,
            Self::Equidistant | Self::Conformal => 1.0,
        }
    }

    /// Panel-frame position and derivatives at computational coordinates `(x, y)`.
    ///
    /// Coordinates past the panel edge extend the map: along gnomonic lines for the gnomonic
    /// projections, by reflection across the edge for the conformal one.
    #[must_use]
    pub fn local_map(self, x: f64, y: f64) -> LocalMap {
        match self {
            Self::Equiangular => gnomonic_map(x, y, |t| {
                let c = t.cos();
                (t.tan(), 1.0 / (c * c))
            }),
            Self::Equidistant => gnomonic_map(x, y, |t| (t, 1.0)),
            Self::Conformal => conformal::local_map(x, y),
        }
    }

    /// Computational coordinates of a panel-frame unit vector, `None` outside the panel's hemisphere.
    #[must_use]
    pub fn local_coords(self, l: [f64; 3]) -> Option<(f64, f64)> {
        match self {
            Self::Equiangular => gnomonic_coords(l).map(|(gx, gy)| (gx.atan(), gy.atan())),
            Self::Equidistant => gnomonic_coords(l),
            Self::Conformal => conformal::local_coords(l),
        }
    }
}

/// `r = (X, Y, 1) / |(X, Y, 1)|` with `axis(t) = (X(t), dX/dt)`.
fn gnomonic_map(x: f64, y: f64, axis: impl Fn(f64) -> (f64, f64)) -> LocalMap {
    let (gx, dgx) = axis(x);
    let (gy, dgy) = axis(y);
    let p = [gx, gy, 1.0];
    let rho = dot(p, p).sqrt();
    let r = scale(p, 1.0 / rho);
    // d(P/|P|)/dX = (e_X - r (r·e_X)) / |P|
    let dx = scale(sub([1.0, 0.0, 0.0], scale(r, r[0])), dgx / rho);
    let dy = scale(sub([0.0, 1.0, 0.0], scale(r, r[1])), dgy / rho);
    LocalMap { r, dx, dy }
}

fn gnomonic_coords(l: [f64; 3]) -> Option<(f64, f64)> {
    if l[2] <= 0.0 {
        return None;
    }
    Some((l[0] / l[2], l[1] / l[2]))
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Projection {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equiangular" | "gnomonic_equiangular" => Ok(Self::Equiangular),
            "equidistant" | "gnomonic_equidistant" => Ok(Self::Equidistant),
            "conformal" => Ok(Self::Conformal),
            _ => Err(ProjectionError::Unknown(s.to_string())),
        }
    }
}

/// Outward unit normal of a panel.
#[inline]
#[must_use]
pub fn panel_normal(panel: PanelId) -> [f64; 3] {
    PANEL_FRAMES[panel][0]
}

/// Global vector from panel-frame components `(a, b, n)`.
#[inline]
#[must_use]
pub fn panel_vector(panel: PanelId, l: [f64; 3]) -> [f64; 3] {
    let [n, a, b] = PANEL_FRAMES[panel];
    [
        l[2] * n[0] + l[0] * a[0] + l[1] * b[0],
        l[2] * n[1] + l[0] * a[1] + l[1] * b[1],
        l[2] * n[2] + l[0] * a[2] + l[1] * b[2],
    ]
}

/// Panel-frame components of a global vector.
#[inline]
#[must_use]
pub fn panel_components(panel: PanelId, r: [f64; 3]) -> [f64; 3] {
    let [n, a, b] = PANEL_FRAMES[panel];
    [dot(r, a), dot(r, b), dot(r, n)]
}

/// Unit vector for computational coordinates `(x, y)` on `panel`.
#[inline]
#[must_use]
pub fn panel_to_xyz(panel: PanelId, x: f64, y: f64, projection: Projection) -> [f64; 3] {
    normalize(panel_vector(panel, projection.local_map(x, y).r))
}

/// Forward map: panel coordinates to (lon, lat) in radians.
#[must_use]
pub fn panel_to_latlon(panel: PanelId, x: f64, y: f64, projection: Projection) -> (f64, f64) {
    xyz_to_lonlat(panel_to_xyz(panel, x, y, projection))
}

/// Argmax `dot(n_p, r)`. Ties resolve to the lower panel index.
#[inline]
#[must_use]
pub fn pick_panel(r: [f64; 3]) -> PanelId {
    let mut best = 0;
    let mut best_d = f64::NEG_INFINITY;
    for p in 0..PANELS {
        let d = dot(panel_normal(p), r);
        if d > best_d {
            best_d = d;
            best = p;
        }
    }
    best
}

/// Computational coordinates of `r` on a fixed panel, `None` outside the panel's hemisphere.
#[inline]
#[must_use]
pub fn xyz_to_panel_coords(panel: PanelId, r: [f64; 3], projection: Projection) -> Option<(f64, f64)> {
    projection.local_coords(panel_components(panel, r))
}

/// Inverse map: (lon, lat) to the owning panel and its computational coordinates.
#[must_use]
pub fn latlon_to_panel(lon: f64, lat: f64, projection: Projection) -> (PanelId, f64, f64) {
    let r = crate::math::lonlat_to_xyz(lon, lat);
    let panel = pick_panel(r);
    // The owning panel always has dot(n, r) >= 1/sqrt(3).
    let (x, y) = xyz_to_panel_coords(panel, r, projection).unwrap_or((0.0, 0.0));
    (panel, x, y)
}

/// True when `r` points (within `tol`) at one of the eight cube corners.
#[must_use]
pub fn is_cube_corner(r: [f64; 3], tol: f64) -> bool {
    let r = normalize(r);
    let ax = r.map(f64::abs);
    let hi = ax[0].max(ax[1]).max(ax[2]);
    let lo = ax[0].min(ax[1]).min(ax[2]);
    hi - lo <= tol
}
