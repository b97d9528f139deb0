//! Discrete divergence theorem on the curvilinear mesh.

use crate::array::PanelArray;
use crate::fields::CsField;
use crate::flux::{compute_fluxes, Fluxes, OperatorError};
use crate::grid::CubedSphere;
use crate::velocity::Velocities;

/// Net outward flux of every interior cell divided by its area. Ghost entries are zero.
pub fn divergence(grid: &CubedSphere, fluxes: &Fluxes) -> Result<PanelArray<f64>, OperatorError> {
    if !fluxes.synced {
        return Err(OperatorError::StaleGhostCell("panel-edge fluxes not exchanged before divergence"));
    }
    let nt = grid.nt();
    let mut div = PanelArray::filled(nt, nt, 0.0);
    for (p, i, j) in grid.interior_cells() {
        let net = fluxes.fx[(p, i + 1, j)] - fluxes.fx[(p, i, j)] + fluxes.gy[(p, i, j + 1)] - fluxes.gy[(p, i, j)];
        div[(p, i, j)] = net / grid.area[(p, i, j)];
    }
    Ok(div)
}

/// Fluxes then divergence of `q` under `vel`.
pub fn flux_divergence(
    grid: &CubedSphere,
    q: &CsField,
    vel: &Velocities,
    dt: f64,
    mono: bool,
) -> Result<PanelArray<f64>, OperatorError> {
    let fluxes = compute_fluxes(grid, q, vel, dt, mono)?;
    divergence(grid, &fluxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::velocity::{TimeAveraging, VelocityField};
    use cubesphere_geo::Projection;

    #[test]
    fn unsynced_fluxes_are_rejected() {
        let g = CubedSphere::new(8, Projection::Equiangular).unwrap();
        let q = CsField::from_latlon_fn(&g, |_, _| 1.0);
        let v = Velocities::new(&g, VelocityField::ZonalRotation, TimeAveraging::default(), true, 0.0);
        let mut f = compute_fluxes(&g, &q, &v, 0.01, false).unwrap();
        f.synced = false;
        assert_eq!(divergence(&g, &f), Err(OperatorError::StaleGhostCell("panel-edge fluxes not exchanged before divergence")));
    }
}
