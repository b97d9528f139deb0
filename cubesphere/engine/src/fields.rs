//! Cell-average scalar fields on the padded cubed-sphere layout.

use crate::array::PanelArray;
use crate::grid::CubedSphere;

/// Scalar field of cell averages, `nt × nt` per panel including ghosts.
#[derive(Debug, Clone, PartialEq)]
pub struct CsField {
    /// Values indexed `(panel, i, j)`
    pub data: PanelArray<f64>,
    /// Ghost cells reflect the current interior values
    pub ghosts_fresh: bool,
}

impl CsField {
    /// Field of zeros; ghosts count as fresh.
    pub fn zeros(grid: &CubedSphere) -> Self {
        Self { data: PanelArray::filled(grid.nt(), grid.nt(), 0.0), ghosts_fresh: true }
    }

    /// Evaluate `f(lon, lat)` at every cell centre, ghosts included.
    pub fn from_latlon_fn(grid: &CubedSphere, f: impl Fn(f64, f64) -> f64) -> Self {
        let data = PanelArray::from_fn(grid.nt(), grid.nt(), |p, i, j| {
            let c = &grid.centers[(p, i, j)];
            f(c.lon, c.lat)
        });
        Self { data, ghosts_fresh: true }
    }

    /// Evaluate `f(xyz)` at every cell centre, ghosts included.
    pub fn from_xyz_fn(grid: &CubedSphere, f: impl Fn([f64; 3]) -> f64) -> Self {
        let data = PanelArray::from_fn(grid.nt(), grid.nt(), |p, i, j| f(grid.centers[(p, i, j)].xyz));
        Self { data, ghosts_fresh: true }
    }

    /// Value at `(panel, i, j)`.
    #[inline]
    pub fn get(&self, p: usize, i: usize, j: usize) -> f64 {
        self.data[(p, i, j)]
    }

    /// Overwrite an interior value; marks ghosts stale.
    #[inline]
    pub fn set(&mut self, p: usize, i: usize, j: usize, v: f64) {
        self.data[(p, i, j)] = v;
        self.ghosts_fresh = false;
    }

    /// Refill every ghost cell from the owning panel's interior.
    ///
    /// Stencils read interior cells only, so the result is independent of panel order.
    pub fn fill_ghosts(&mut self, grid: &CubedSphere) {
        let nt = grid.nt();
        let mut out = self.data.clone();
        for p in 0..cubesphere_geo::PANELS {
            for j in 0..nt {
                for i in 0..nt {
                    let Some(s) = grid.halo.stencil(p, i, j) else { continue };
                    let mut v = 0.0;
                    for (b, wy) in s.wy.iter().enumerate() {
                        let mut row = 0.0;
                        for (a, wx) in s.wx.iter().enumerate() {
                            row += wx * self.data[(s.panel, s.i + a, s.j + b)];
                        }
                        v += wy * row;
                    }
                    out[(p, i, j)] = v;
                }
            }
        }
        self.data = out;
        self.ghosts_fresh = true;
    }

    /// Mass `Σ q·area` over interior cells.
    pub fn total_mass(&self, grid: &CubedSphere) -> f64 {
        grid.interior_cells().map(|c| self.data[c] * grid.area[c]).sum()
    }

    /// Interior minimum and maximum.
    pub fn interior_range(&self, grid: &CubedSphere) -> (f64, f64) {
        grid.interior_cells()
            .map(|c| self.data[c])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
    }

    /// True if every interior value is finite.
    pub fn all_finite(&self, grid: &CubedSphere) -> bool {
        grid.interior_cells().all(|c| self.data[c].is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubesphere_geo::Projection;

    #[test]
    fn ghost_fill_reproduces_smooth_field() {
        let g = CubedSphere::new(24, Projection::Equiangular).unwrap();
        let f = |r: [f64; 3]| 1.0 + 0.3 * r[0] - 0.2 * r[2] + 0.1 * r[1] * r[2];
        let exact = CsField::from_xyz_fn(&g, f);
        let mut q = exact.clone();
        // Corrupt ghosts, then refill.
        for p in 0..6 {
            for j in 0..g.nt() {
                for i in 0..g.nt() {
                    if !g.bounds.contains(i, j) {
                        q.data[(p, i, j)] = -99.0;
                    }
                }
            }
        }
        q.ghosts_fresh = false;
        q.fill_ghosts(&g);
        assert!(q.ghosts_fresh);
        let mut worst: f64 = 0.0;
        for p in 0..6 {
            for j in 0..g.nt() {
                for i in 0..g.nt() {
                    worst = worst.max((q.data[(p, i, j)] - exact.data[(p, i, j)]).abs());
                }
            }
        }
        assert!(worst < 1e-3, "worst ghost error {worst}");
    }

    #[test]
    fn set_marks_ghosts_stale() {
        let g = CubedSphere::new(3, Projection::Equidistant).unwrap();
        let mut q = CsField::zeros(&g);
        q.set(0, 4, 4, 1.0);
        assert!(!q.ghosts_fresh);
        assert!(q.total_mass(&g) > 0.0);
    }
}
