//! Latitude-longitude sample grid and its nearest-cell mapping onto a cubed sphere.

use std::f64::consts::{FRAC_PI_2, PI};

use cubesphere_geo::{is_cube_corner, math, pick_panel, xyz_to_panel_coords, PanelId};
use tracing::debug;

use crate::fields::CsField;
use crate::grid::cache::CacheKey;
use crate::grid::CubedSphere;

/// Directions closer than this to a cube corner cannot be assigned a unique panel.
pub const CORNER_TOL: f64 = 1.0e-9;
/// Index overshoot (in cells) that still snaps to the boundary cell.
pub const EDGE_SNAP: f64 = 1.0e-9;

/// Why a latlon sample has no owning cell. Recorded in the mask, never propagated.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    /// Sample sits on a cube corner
    #[error("sample lies on a panel corner singularity")]
    Singularity,
    /// Inverted index falls outside the panel interior
    #[error("inverted cell index outside panel bounds")]
    OutOfBounds,
}

/// Owning cell of a sample: panel plus padded `(i, j)` indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellIndex {
    /// Panel
    pub panel: PanelId,
    /// Padded column index
    pub i: usize,
    /// Padded row index
    pub j: usize,
}

/// Locate the interior cell containing `(lon, lat)`.
pub fn locate(grid: &CubedSphere, lon: f64, lat: f64) -> Result<CellIndex, MappingError> {
    let r = math::lonlat_to_xyz(lon, lat);
    if is_cube_corner(r, CORNER_TOL) {
        return Err(MappingError::Singularity);
    }
    let panel = pick_panel(r);
    let (x, y) = xyz_to_panel_coords(panel, r, grid.projection).ok_or(MappingError::OutOfBounds)?;
    let i = cell_of(x, grid)?;
    let j = cell_of(y, grid)?;
    Ok(CellIndex { panel, i: i + grid.ghost, j: j + grid.ghost })
}

fn cell_of(x: f64, grid: &CubedSphere) -> Result<usize, MappingError> {
    let s = (x - grid.x_min) / grid.dx;
    let n = grid.n as f64;
    if (0.0..n).contains(&s) {
        return Ok((s.floor() as usize).min(grid.n - 1));
    }
    if s >= n && s - n <= EDGE_SNAP {
        return Ok(grid.n - 1);
    }
    if s < 0.0 && s >= -EDGE_SNAP {
        return Ok(0);
    }
    Err(MappingError::OutOfBounds)
}

/// Latlon samples plus their mapping `(panel, ix, jy, mask)` onto one cubed-sphere grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonGrid {
    /// Sample longitudes, radians
    pub lon: Vec<f64>,
    /// Sample latitudes, radians
    pub lat: Vec<f64>,
    /// `(nlon, nlat)` for regular grids (lon fastest)
    pub shape: Option<(usize, usize)>,
    /// Owning panel per sample
    pub panel: Vec<PanelId>,
    /// Padded column index per sample
    pub ix: Vec<usize>,
    /// Padded row index per sample
    pub jy: Vec<usize>,
    /// False for samples that could not be mapped
    pub mask: Vec<bool>,
    mapped_for: Option<CacheKey>,
}

impl LatLonGrid {
    /// Regular cell-centred grid: lon in [-π, π), lat in (-π/2, π/2).
    pub fn regular(nlon: usize, nlat: usize) -> Self {
        let dlon = 2.0 * PI / nlon as f64;
        let dlat = PI / nlat as f64;
        let mut lon = Vec::with_capacity(nlon * nlat);
        let mut lat = Vec::with_capacity(nlon * nlat);
        for b in 0..nlat {
            for a in 0..nlon {
                lon.push(-PI + (a as f64 + 0.5) * dlon);
                lat.push(-FRAC_PI_2 + (b as f64 + 0.5) * dlat);
            }
        }
        let mut g = Self::from_points(lon, lat);
        g.shape = Some((nlon, nlat));
        g
    }

    /// Arbitrary samples; mismatched lengths are truncated to the shorter.
    pub fn from_points(mut lon: Vec<f64>, mut lat: Vec<f64>) -> Self {
        let len = lon.len().min(lat.len());
        lon.truncate(len);
        lat.truncate(len);
        Self {
            lon,
            lat,
            shape: None,
            panel: vec![0; len],
            ix: vec![0; len],
            jy: vec![0; len],
            mask: vec![false; len],
            mapped_for: None,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.lon.len()
    }

    /// True if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    /// Compute the mapping against `grid`. Unmappable samples get `mask = false`.
    pub fn map(&mut self, grid: &CubedSphere) {
        let mut rejected = 0usize;
        for k in 0..self.len() {
            match locate(grid, self.lon[k], self.lat[k]) {
                Ok(c) => {
                    self.panel[k] = c.panel;
                    self.ix[k] = c.i;
                    self.jy[k] = c.j;
                    self.mask[k] = true;
                }
                Err(_) => {
                    self.mask[k] = false;
                    rejected += 1;
                }
            }
        }
        self.mapped_for = Some(grid.key());
        debug!("[interp] mapped {} samples onto {}, {} masked", self.len(), grid.key(), rejected);
    }

    /// True when the current mapping was computed for `grid`.
    pub fn is_mapped_to(&self, grid: &CubedSphere) -> bool {
        self.mapped_for == Some(grid.key())
    }

    /// Nearest-cell sample of `field`; masked or unmapped samples are NaN.
    pub fn interpolate(&self, grid: &CubedSphere, field: &CsField) -> Vec<f64> {
        if !self.is_mapped_to(grid) {
            return vec![f64::NAN; self.len()];
        }
        (0..self.len())
            .map(|k| if self.mask[k] { field.get(self.panel[k], self.ix[k], self.jy[k]) } else { f64::NAN })
            .collect()
    }

    /// Nearest latlon sample for every cell centre, ghosts refilled afterwards.
    ///
    /// Returns `None` if `values` does not hold one entry per sample or there are no samples.
    pub fn to_cubed_sphere(&self, grid: &CubedSphere, values: &[f64]) -> Option<CsField> {
        if values.len() != self.len() || self.is_empty() {
            return None;
        }
        let mut out = CsField::zeros(grid);
        for (p, i, j) in grid.interior_cells() {
            let c = &grid.centers[(p, i, j)];
            out.data[(p, i, j)] = values[self.nearest(c.lon, c.lat, c.xyz)];
        }
        out.ghosts_fresh = false;
        out.fill_ghosts(grid);
        Some(out)
    }

    fn nearest(&self, lon: f64, lat: f64, xyz: [f64; 3]) -> usize {
        if let Some((nlon, nlat)) = self.shape {
            let a = ((lon + PI) / (2.0 * PI) * nlon as f64).floor();
            let b = ((lat + FRAC_PI_2) / PI * nlat as f64).floor();
            let a = (a.max(0.0) as usize) % nlon;
            let b = (b.max(0.0) as usize).min(nlat - 1);
            return b * nlon + a;
        }
        let mut best = 0;
        let mut best_d = f64::NEG_INFINITY;
        for k in 0..self.len() {
            let d = math::dot(xyz, math::lonlat_to_xyz(self.lon[k], self.lat[k]));
            if d > best_d {
                best_d = d;
                best = k;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubesphere_geo::Projection;

    #[test]
    fn regular_grid_is_cell_centred() {
        let g = LatLonGrid::regular(8, 4);
        assert_eq!(g.len(), 32);
        assert!((g.lon[0] + PI - PI / 8.0).abs() < 1e-15);
        assert!((g.lat[0] + FRAC_PI_2 - PI / 8.0).abs() < 1e-15);
        assert!(g.lat.iter().all(|l| l.abs() < FRAC_PI_2));
    }

    #[test]
    fn unmapped_grid_interpolates_to_nan() {
        let cs = CubedSphere::new(4, Projection::Equiangular).unwrap();
        let ll = LatLonGrid::regular(4, 2);
        let q = CsField::zeros(&cs);
        assert!(ll.interpolate(&cs, &q).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn poles_map_to_polar_panels() {
        let cs = CubedSphere::new(6, Projection::Equidistant).unwrap();
        let c = locate(&cs, 0.0, FRAC_PI_2).unwrap();
        assert_eq!(c.panel, 4);
        let c = locate(&cs, 0.0, -FRAC_PI_2).unwrap();
        assert_eq!(c.panel, 5);
    }
}
