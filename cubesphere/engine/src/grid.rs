//! Cubed-sphere grid: six panels of N×N cells plus ghost margins, with all metric terms precomputed.

pub mod cache;
pub mod halo;

use bytemuck::{Pod, Zeroable};
use cubesphere_geo::{
    basis_products, math, tangent_basis, PanelId, Projection, ProjectionError, PANELS,
};
use tracing::{debug, info, warn};

use crate::array::PanelArray;
use cache::{CacheKey, CacheStore};
use halo::Halo;

/// Ghost-cell width on every panel side. PPM flux stencils reach three cells.
pub const GHOST: usize = 3;

/// Everything the operators need at one grid point (cell centre, face midpoint or corner).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointGeometry {
    /// Longitude in radians, (-π, π]
    pub lon: f64,
    /// Latitude in radians
    pub lat: f64,
    /// Unit position vector
    pub xyz: [f64; 3],
    /// Local east unit vector
    pub east: [f64; 3],
    /// Local north unit vector
    pub north: [f64; 3],
    /// Covariant basis along x
    pub ex: [f64; 3],
    /// Covariant basis along y
    pub ey: [f64; 3],
    /// Contravariant basis along x
    pub ex_contra: [f64; 3],
    /// Contravariant basis along y
    pub ey_contra: [f64; 3],
    /// Metric determinant sqrt(g)
    pub sqrtg: f64,
    /// `ex · east`
    pub prod_ex_elon: f64,
    /// `ex · north`
    pub prod_ex_elat: f64,
    /// `ey · east`
    pub prod_ey_elon: f64,
    /// `ey · north`
    pub prod_ey_elat: f64,
    /// Determinant of the latlon → contravariant transform
    pub det_ll2contra: f64,
}

impl PointGeometry {
    /// Evaluate the geometry kernels at panel coordinates `(x, y)`.
    pub fn compute(panel: PanelId, x: f64, y: f64, projection: Projection) -> Self {
        let basis = tangent_basis(panel, x, y, projection);
        let prods = basis_products(&basis);
        let (lon, lat) = math::xyz_to_lonlat(basis.r);
        let (east, north) = math::east_north(lon, lat);
        Self {
            lon,
            lat,
            xyz: basis.r,
            east,
            north,
            ex: basis.ex,
            ey: basis.ey,
            ex_contra: basis.ex_contra,
            ey_contra: basis.ey_contra,
            sqrtg: basis.sqrtg,
            prod_ex_elon: prods.ex_elon,
            prod_ex_elat: prods.ex_elat,
            prod_ey_elon: prods.ey_elon,
            prod_ey_elat: prods.ey_elat,
            det_ll2contra: prods.det,
        }
    }

    /// The four basis products and their determinant in kernel form.
    #[inline]
    pub fn products(&self) -> cubesphere_geo::BasisProducts {
        cubesphere_geo::BasisProducts {
            ex_elon: self.prod_ex_elon,
            ex_elat: self.prod_ex_elat,
            ey_elon: self.prod_ey_elon,
            ey_elat: self.prod_ey_elat,
            det: self.det_ll2contra,
        }
    }
}

/// Index bounds of non-ghost cells; `iend`/`jend` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InteriorBounds {
    /// First interior column
    pub i0: usize,
    /// One past the last interior column
    pub iend: usize,
    /// First interior row
    pub j0: usize,
    /// One past the last interior row
    pub jend: usize,
}

impl InteriorBounds {
    /// True for non-ghost cell indices.
    #[inline]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        i >= self.i0 && i < self.iend && j >= self.j0 && j < self.jend
    }
}

/// Construction-time failures. Neither can produce a usable grid.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// N must be at least 1
    #[error("invalid resolution N={0}: must be positive")]
    InvalidResolution(i64),
    /// Projection id is not one of the known maps
    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),
}

impl From<ProjectionError> for GridError {
    fn from(e: ProjectionError) -> Self {
        Self::UnsupportedProjection(e.to_string())
    }
}

/// Immutable cubed-sphere mesh. Metric quantities are computed once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CubedSphere {
    /// Cells per panel edge
    pub n: usize,
    /// Map projection used for every panel
    pub projection: Projection,
    /// Ghost width (always [`GHOST`])
    pub ghost: usize,
    /// Cell width in computational coordinates (same along x and y)
    pub dx: f64,
    /// Computational coordinate of the panel's lower edge
    pub x_min: f64,
    /// Interior index range
    pub bounds: InteriorBounds,
    /// Cell centres, `nt × nt`
    pub centers: PanelArray<PointGeometry>,
    /// x-face midpoints, `(nt+1) × nt`; face `i` sits left of cell `i`
    pub pu: PanelArray<PointGeometry>,
    /// y-face midpoints, `nt × (nt+1)`; face `j` sits below cell `j`
    pub pv: PanelArray<PointGeometry>,
    /// Cell corners, `(nt+1) × (nt+1)`
    pub corners: PanelArray<PointGeometry>,
    /// Exact spherical cell areas, `nt × nt`
    pub area: PanelArray<f64>,
    /// Ghost interpolation stencils and panel edge links
    pub halo: Halo,
}

impl CubedSphere {
    /// Build the grid for `n` cells per edge, evaluating the kernels at every point including ghosts.
    pub fn new(n: usize, projection: Projection) -> Result<Self, GridError> {
        if n == 0 {
            return Err(GridError::InvalidResolution(0));
        }
        let nt = n + 2 * GHOST;
        let hw = projection.half_width();
        let dx = 2.0 * hw / n as f64;
        if projection == Projection::Equiangular && hw + (GHOST as f64 - 0.5) * dx >= std::f64::consts::FRAC_PI_2 {
            warn!("[grid] N={} too coarse for equiangular ghost cells; transport operators need N >= 6", n);
        }
        let x_min = -hw;
        let face = |k: usize| x_min + (k as f64 - GHOST as f64) * dx;
        let center = |k: usize| x_min + (k as f64 - GHOST as f64 + 0.5) * dx;

        let centers =
            PanelArray::from_fn(nt, nt, |p, i, j| PointGeometry::compute(p, center(i), center(j), projection));
        let pu = PanelArray::from_fn(nt + 1, nt, |p, i, j| PointGeometry::compute(p, face(i), center(j), projection));
        let pv = PanelArray::from_fn(nt, nt + 1, |p, i, j| PointGeometry::compute(p, center(i), face(j), projection));
        let corners =
            PanelArray::from_fn(nt + 1, nt + 1, |p, i, j| PointGeometry::compute(p, face(i), face(j), projection));
        let area = PanelArray::from_fn(nt, nt, |p, i, j| {
            math::spherical_quad_area(
                corners[(p, i, j)].xyz,
                corners[(p, i + 1, j)].xyz,
                corners[(p, i + 1, j + 1)].xyz,
                corners[(p, i, j + 1)].xyz,
            )
        });

        let grid = Self::from_parts(n, projection, centers, pu, pv, corners, area);
        debug!("[grid] built N={} projection={} total_area={:.15}", n, projection, grid.total_area());
        Ok(grid)
    }

    /// Assemble from precomputed point sets and derive the halo. Used by fresh builds and cache loads.
    pub(crate) fn from_parts(
        n: usize,
        projection: Projection,
        centers: PanelArray<PointGeometry>,
        pu: PanelArray<PointGeometry>,
        pv: PanelArray<PointGeometry>,
        corners: PanelArray<PointGeometry>,
        area: PanelArray<f64>,
    ) -> Self {
        let hw = projection.half_width();
        let bounds = InteriorBounds { i0: GHOST, iend: GHOST + n, j0: GHOST, jend: GHOST + n };
        let mut grid = Self {
            n,
            projection,
            ghost: GHOST,
            dx: 2.0 * hw / n as f64,
            x_min: -hw,
            bounds,
            centers,
            pu,
            pv,
            corners,
            area,
            halo: Halo::default(),
        };
        grid.halo = Halo::build(&grid);
        grid
    }

    /// Padded cells per panel edge, `n + 2g`.
    #[inline]
    pub fn nt(&self) -> usize {
        self.n + 2 * self.ghost
    }

    /// Cache key for this grid.
    pub fn key(&self) -> CacheKey {
        CacheKey { n: self.n, projection: self.projection }
    }

    /// Computational coordinate of cell centre index `k` (ghost indices extrapolate).
    #[inline]
    pub fn center_coord(&self, k: usize) -> f64 {
        self.x_min + (k as f64 - self.ghost as f64 + 0.5) * self.dx
    }

    /// Iterate all interior `(panel, i, j)` triples.
    pub fn interior_cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let b = self.bounds;
        (0..PANELS).flat_map(move |p| (b.j0..b.jend).flat_map(move |j| (b.i0..b.iend).map(move |i| (p, i, j))))
    }

    /// Sum of interior cell areas (4π up to round-off).
    pub fn total_area(&self) -> f64 {
        self.interior_cells().map(|c| self.area[c]).sum()
    }

    /// True when the corner point `(i, j)` is one of the four singular panel corners.
    pub fn is_singular_corner(&self, i: usize, j: usize) -> bool {
        let b = self.bounds;
        (i == b.i0 || i == b.iend) && (j == b.j0 || j == b.jend)
    }
}

/// Build (or load) a grid from raw boundary inputs.
///
/// With `load_cached` and a store holding a readable entry, the cached mesh is returned. Otherwise the
/// grid is built and written back, replacing any entry that failed to load. Cache failures fall back to
/// a fresh build and are only logged.
pub fn build_grid(
    n: i64,
    projection_id: &str,
    load_cached: bool,
    cache: Option<&mut dyn CacheStore>,
) -> Result<CubedSphere, GridError> {
    if n <= 0 {
        return Err(GridError::InvalidResolution(n));
    }
    let n = usize::try_from(n).map_err(|_| GridError::InvalidResolution(n))?;
    let projection: Projection = projection_id.parse()?;
    let key = CacheKey { n, projection };

    let Some(store) = cache else {
        return CubedSphere::new(n, projection);
    };

    if load_cached && store.exists(&key) {
        match store.load(&key) {
            Ok(grid) => {
                info!("[cache] loaded grid N={} projection={}", n, projection);
                return Ok(grid);
            }
            Err(e) => warn!("[cache] load failed for {}: {}; rebuilding and replacing", key, e),
        }
    }

    let grid = CubedSphere::new(n, projection)?;
    match store.save(&key, &grid) {
        Ok(()) => info!("[cache] saved grid N={} projection={}", n, projection),
        Err(e) => warn!("[cache] save failed for {}: {}", key, e),
    }
    Ok(grid)
}
