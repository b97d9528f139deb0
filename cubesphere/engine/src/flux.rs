//! Finite-volume face fluxes on the cubed sphere.
//!
//! Fluxes are mass-weighted: `F = m · q̂` with mass flux `m = u·sqrt(g)·Δ` and `q̂` the PPM average of the
//! swept region. The x-flux is evaluated on the field after a half inner y-advection and the y-flux on the
//! field after a half inner x-advection. With `mono` the parabolas are limited and the result is corrected
//! against donor-cell fluxes so no new extrema appear.

use cubesphere_geo::PANELS;

use crate::array::PanelArray;
use crate::fields::CsField;
use crate::grid::halo::{edge_face, Edge};
use crate::grid::CubedSphere;
use crate::velocity::Velocities;

/// Contract violations between the ghost exchange and the operators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OperatorError {
    /// Operator called on data whose ghost/edge values were not refreshed
    #[error("stale ghost cells: {0}")]
    StaleGhostCell(&'static str),
}

type Cell = (usize, usize, usize);

/// Face fluxes for both directions plus the mass fluxes they were built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fluxes {
    /// x-face tracer flux, `(nt+1) × nt`
    pub fx: PanelArray<f64>,
    /// y-face tracer flux, `nt × (nt+1)`
    pub gy: PanelArray<f64>,
    /// x-face mass flux
    pub mx: PanelArray<f64>,
    /// y-face mass flux
    pub my: PanelArray<f64>,
    /// Panel-edge fluxes agree on both sides
    pub synced: bool,
}

/// Mass fluxes `m = u·sqrt(g)·Δ` from the averaged face velocities, made antisymmetric across panel edges.
pub fn mass_fluxes(grid: &CubedSphere, vel: &Velocities) -> (PanelArray<f64>, PanelArray<f64>) {
    let d = grid.dx;
    let u = &vel.pu.averaged;
    let v = &vel.pv.averaged;
    let mut mx = PanelArray::from_fn(u.ni(), u.nj(), |p, i, j| u[(p, i, j)] * grid.pu[(p, i, j)].sqrtg * d);
    let mut my = PanelArray::from_fn(v.ni(), v.nj(), |p, i, j| v[(p, i, j)] * grid.pv[(p, i, j)].sqrtg * d);
    sync_edges(grid, &mut mx, &mut my);
    (mx, my)
}

fn slot<'a>(grid: &CubedSphere, fx: &'a mut PanelArray<f64>, gy: &'a mut PanelArray<f64>, p: usize, edge: Edge, k: usize) -> &'a mut f64 {
    let (i, j) = edge_face(grid, edge, k);
    if edge.is_x_face() {
        &mut fx[(p, i, j)]
    } else {
        &mut gy[(p, i, j)]
    }
}

/// Replace both copies of every panel-edge flux with their mean outward value, so what leaves one
/// panel enters its neighbour.
pub fn sync_edges(grid: &CubedSphere, fx: &mut PanelArray<f64>, gy: &mut PanelArray<f64>) {
    let n = grid.n;
    for p in 0..PANELS {
        for edge in Edge::ALL {
            let Some(link) = grid.halo.link(p, edge) else { continue };
            for k in 0..n {
                let k2 = link.map_index(k, n);
                let own = *slot(grid, fx, gy, p, edge, k) * edge.outward_sign();
                let nb = *slot(grid, fx, gy, link.panel, link.edge, k2) * link.edge.outward_sign();
                let avg = 0.5 * (own - nb);
                *slot(grid, fx, gy, p, edge, k) = avg * edge.outward_sign();
                *slot(grid, fx, gy, link.panel, link.edge, k2) = -avg * link.edge.outward_sign();
            }
        }
    }
}

/// Cells on either side of x-face `k` in row `j`, using the true neighbour across panel edges.
fn x_face_cells(grid: &CubedSphere, p: usize, k: usize, j: usize) -> (Cell, Cell) {
    let b = grid.bounds;
    let left = if k == b.i0 {
        grid.halo.across(grid, p, Edge::West, j - b.j0).unwrap_or((p, k - 1, j))
    } else {
        (p, k - 1, j)
    };
    let right = if k == b.iend {
        grid.halo.across(grid, p, Edge::East, j - b.j0).unwrap_or((p, k, j))
    } else {
        (p, k, j)
    };
    (left, right)
}

/// Cells below and above y-face `k` in column `i`.
fn y_face_cells(grid: &CubedSphere, p: usize, i: usize, k: usize) -> (Cell, Cell) {
    let b = grid.bounds;
    let below = if k == b.j0 {
        grid.halo.across(grid, p, Edge::South, i - b.i0).unwrap_or((p, i, k - 1))
    } else {
        (p, i, k - 1)
    };
    let above = if k == b.jend {
        grid.halo.across(grid, p, Edge::North, i - b.i0).unwrap_or((p, i, k))
    } else {
        (p, i, k)
    };
    (below, above)
}

/// Left and right parabola edge values of cell `c`, optionally limited.
fn parabola(a: &[f64], edges: &[f64], c: usize, mono: bool) -> (f64, f64) {
    let q = a[c];
    let mut ql = edges[c];
    let mut qr = edges[c + 1];
    if !mono {
        return (ql, qr);
    }
    // f64::clamp panics on NaN bounds.
    ql = ql.max(a[c - 1].min(q)).min(a[c - 1].max(q));
    qr = qr.max(q.min(a[c + 1])).min(q.max(a[c + 1]));
    if (qr - q) * (q - ql) <= 0.0 {
        return (q, q);
    }
    let dq = qr - ql;
    let q6 = 6.0 * (q - 0.5 * (ql + qr));
    if dq * q6 > dq * dq {
        ql = 3.0 * q - 2.0 * qr;
    } else if -dq * dq > dq * q6 {
        qr = 3.0 * q - 2.0 * ql;
    }
    (ql, qr)
}

/// PPM swept-region averages along one line of `m` cells.
///
/// `courant[k]` is the Courant number at face `k` (between cells `k-1` and `k`). Faces outside
/// `[3, m-3]` lack a full stencil and are left at zero.
pub fn ppm_line(a: &[f64], courant: &[f64], mono: bool, out: &mut [f64]) {
    let m = a.len();
    out.iter_mut().for_each(|v| *v = 0.0);
    if m < 6 {
        return;
    }
    let mut edges = vec![0.0; m + 1];
    for k in 2..=m - 2 {
        edges[k] = 7.0 / 12.0 * (a[k - 1] + a[k]) - 1.0 / 12.0 * (a[k - 2] + a[k + 1]);
    }
    for k in 3..=m - 3 {
        let c = courant[k];
        out[k] = if c >= 0.0 {
            let (ql, qr) = parabola(a, &edges, k - 1, mono);
            let q6 = 6.0 * (a[k - 1] - 0.5 * (ql + qr));
            qr - 0.5 * c * ((qr - ql) - (1.0 - 2.0 * c / 3.0) * q6)
        } else {
            let cc = -c;
            let (ql, qr) = parabola(a, &edges, k, mono);
            let q6 = 6.0 * (a[k] - 0.5 * (ql + qr));
            ql + 0.5 * cc * ((qr - ql) + (1.0 - 2.0 * cc / 3.0) * q6)
        };
    }
}

/// Face values along every x line of `q`.
fn ppm_x(grid: &CubedSphere, q: &PanelArray<f64>, mx: &PanelArray<f64>, dt: f64, mono: bool) -> PanelArray<f64> {
    let nt = grid.nt();
    let d2 = grid.dx * grid.dx;
    let mut out = PanelArray::filled(nt + 1, nt, 0.0);
    let mut line = vec![0.0; nt];
    let mut cour = vec![0.0; nt + 1];
    let mut vals = vec![0.0; nt + 1];
    for p in 0..PANELS {
        for j in 0..nt {
            for i in 0..nt {
                line[i] = q[(p, i, j)];
            }
            for k in 0..=nt {
                cour[k] = mx[(p, k, j)] * dt / (grid.pu[(p, k, j)].sqrtg * d2);
            }
            ppm_line(&line, &cour, mono, &mut vals);
            for k in 0..=nt {
                out[(p, k, j)] = vals[k];
            }
        }
    }
    out
}

/// Face values along every y line of `q`.
fn ppm_y(grid: &CubedSphere, q: &PanelArray<f64>, my: &PanelArray<f64>, dt: f64, mono: bool) -> PanelArray<f64> {
    let nt = grid.nt();
    let d2 = grid.dx * grid.dx;
    let mut out = PanelArray::filled(nt, nt + 1, 0.0);
    let mut line = vec![0.0; nt];
    let mut cour = vec![0.0; nt + 1];
    let mut vals = vec![0.0; nt + 1];
    for p in 0..PANELS {
        for i in 0..nt {
            for j in 0..nt {
                line[j] = q[(p, i, j)];
            }
            for k in 0..=nt {
                cour[k] = my[(p, i, k)] * dt / (grid.pv[(p, i, k)].sqrtg * d2);
            }
            ppm_line(&line, &cour, mono, &mut vals);
            for k in 0..=nt {
                out[(p, i, k)] = vals[k];
            }
        }
    }
    out
}

/// Compute face fluxes of `q` under the averaged velocities in `vel` for a step of length `dt`.
///
/// Fails if the ghost cells of `q` are stale.
pub fn compute_fluxes(grid: &CubedSphere, q: &CsField, vel: &Velocities, dt: f64, mono: bool) -> Result<Fluxes, OperatorError> {
    if !q.ghosts_fresh {
        return Err(OperatorError::StaleGhostCell("compute_fluxes called before fill_ghosts"));
    }
    let nt = grid.nt();
    let (mx, my) = mass_fluxes(grid, vel);
    let qd = &q.data;

    // Half inner advections in advective form.
    let hx = ppm_x(grid, qd, &mx, dt, mono);
    let hy = ppm_y(grid, qd, &my, dt, mono);
    let mut inner_x = qd.clone();
    let mut inner_y = qd.clone();
    for p in 0..PANELS {
        for j in 0..nt {
            for i in 0..nt {
                let q0 = qd[(p, i, j)];
                let s = 0.5 * dt / grid.area[(p, i, j)];
                if (3..=nt - 4).contains(&i) {
                    let (m0, m1) = (mx[(p, i, j)], mx[(p, i + 1, j)]);
                    inner_x[(p, i, j)] = q0 - s * ((m1 * hx[(p, i + 1, j)] - m0 * hx[(p, i, j)]) - q0 * (m1 - m0));
                }
                if (3..=nt - 4).contains(&j) {
                    let (m0, m1) = (my[(p, i, j)], my[(p, i, j + 1)]);
                    inner_y[(p, i, j)] = q0 - s * ((m1 * hy[(p, i, j + 1)] - m0 * hy[(p, i, j)]) - q0 * (m1 - m0));
                }
            }
        }
    }

    let vx = ppm_x(grid, &inner_y, &mx, dt, mono);
    let vy = ppm_y(grid, &inner_x, &my, dt, mono);
    let mut fx = PanelArray::from_fn(nt + 1, nt, |p, i, j| mx[(p, i, j)] * vx[(p, i, j)]);
    let mut gy = PanelArray::from_fn(nt, nt + 1, |p, i, j| my[(p, i, j)] * vy[(p, i, j)]);
    sync_edges(grid, &mut fx, &mut gy);

    if mono {
        limit_fct(grid, qd, &mx, &my, dt, &mut fx, &mut gy);
    }
    Ok(Fluxes { fx, gy, mx, my, synced: true })
}

/// Zalesak flux-corrected transport against donor-cell fluxes with 5-point bounds.
fn limit_fct(
    grid: &CubedSphere,
    q: &PanelArray<f64>,
    mx: &PanelArray<f64>,
    my: &PanelArray<f64>,
    dt: f64,
    fx: &mut PanelArray<f64>,
    gy: &mut PanelArray<f64>,
) {
    let nt = grid.nt();
    let b = grid.bounds;

    let mut lx = PanelArray::filled(nt + 1, nt, 0.0);
    let mut ly = PanelArray::filled(nt, nt + 1, 0.0);
    for p in 0..PANELS {
        for j in b.j0..b.jend {
            for k in b.i0..=b.iend {
                let (l, r) = x_face_cells(grid, p, k, j);
                let m = mx[(p, k, j)];
                lx[(p, k, j)] = if m >= 0.0 { m * q[l] } else { m * q[r] };
            }
        }
        for k in b.j0..=b.jend {
            for i in b.i0..b.iend {
                let (lo, hi) = y_face_cells(grid, p, i, k);
                let m = my[(p, i, k)];
                ly[(p, i, k)] = if m >= 0.0 { m * q[lo] } else { m * q[hi] };
            }
        }
    }

    let mut q_low = q.clone();
    for (p, i, j) in grid.interior_cells() {
        let net = lx[(p, i + 1, j)] - lx[(p, i, j)] + ly[(p, i, j + 1)] - ly[(p, i, j)];
        q_low[(p, i, j)] = q[(p, i, j)] - dt / grid.area[(p, i, j)] * net;
    }

    let ax = PanelArray::from_fn(nt + 1, nt, |p, i, j| fx[(p, i, j)] - lx[(p, i, j)]);
    let ay = PanelArray::from_fn(nt, nt + 1, |p, i, j| gy[(p, i, j)] - ly[(p, i, j)]);

    let mut r_plus = PanelArray::filled(nt, nt, 0.0);
    let mut r_minus = PanelArray::filled(nt, nt, 0.0);
    for (p, i, j) in grid.interior_cells() {
        let (aw, ae) = (ax[(p, i, j)], ax[(p, i + 1, j)]);
        let (as_, an) = (ay[(p, i, j)], ay[(p, i, j + 1)]);
        let s = dt / grid.area[(p, i, j)];
        let p_in = s * (aw.max(0.0) - ae.min(0.0) + as_.max(0.0) - an.min(0.0));
        let p_out = s * (ae.max(0.0) - aw.min(0.0) + an.max(0.0) - as_.min(0.0));

        let mut qmax = q_low[(p, i, j)].max(q[(p, i, j)]);
        let mut qmin = q_low[(p, i, j)].min(q[(p, i, j)]);
        for c in grid.halo.face_neighbors(grid, p, i, j) {
            qmax = qmax.max(q[c]);
            qmin = qmin.min(q[c]);
        }
        let ql = q_low[(p, i, j)];
        r_plus[(p, i, j)] = if p_in > 0.0 { ((qmax - ql) / p_in).clamp(0.0, 1.0) } else { 0.0 };
        r_minus[(p, i, j)] = if p_out > 0.0 { ((ql - qmin) / p_out).clamp(0.0, 1.0) } else { 0.0 };
    }

    let coeff = |a: f64, l: Cell, r: Cell| if a >= 0.0 { r_plus[r].min(r_minus[l]) } else { r_plus[l].min(r_minus[r]) };
    for p in 0..PANELS {
        for j in b.j0..b.jend {
            for k in b.i0..=b.iend {
                let (l, r) = x_face_cells(grid, p, k, j);
                let a = ax[(p, k, j)];
                fx[(p, k, j)] = lx[(p, k, j)] + coeff(a, l, r) * a;
            }
        }
        for k in b.j0..=b.jend {
            for i in b.i0..b.iend {
                let (lo, hi) = y_face_cells(grid, p, i, k);
                let a = ay[(p, i, k)];
                gy[(p, i, k)] = ly[(p, i, k)] + coeff(a, lo, hi) * a;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ppm_is_exact_for_linear_profiles() {
        let a: Vec<f64> = (0..12).map(|k| 2.0 + 0.5 * k as f64).collect();
        let cour = vec![0.4; 13];
        let mut out = vec![0.0; 13];
        ppm_line(&a, &cour, false, &mut out);
        // Swept average over [x_k - cΔ, x_k] of a linear profile.
        for k in 3..=9 {
            let edge = 2.0 + 0.5 * (k as f64 - 0.5);
            assert!((out[k] - (edge - 0.5 * 0.4 * 0.5)).abs() < 1e-12);
        }
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn limited_parabola_stays_in_cell_range() {
        let a = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let mut out = vec![0.0; 11];
        for c in [0.9, -0.9, 0.3] {
            ppm_line(&a, &vec![c; 11], true, &mut out);
            for v in &out[3..=7] {
                assert!((-1e-14..=1.0 + 1e-14).contains(v), "value {v} for c={c}");
            }
        }
    }
}
