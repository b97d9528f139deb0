use cubesphere_geo::Projection;
use engine::diagnostics::{convergence_rates, divergence_test};
use engine::divergence::{divergence, flux_divergence};
use engine::fields::CsField;
use engine::flux::{compute_fluxes, OperatorError};
use engine::grid::CubedSphere;
use engine::initial::InitialCondition;
use engine::stepper::SimulationParams;
use engine::velocity::{TimeAveraging, Velocities, VelocityField};

fn params(ic: InitialCondition, vf: VelocityField, dt: f64, mono: bool) -> SimulationParams {
    SimulationParams { dt, tf: dt, ic, vf, mono, averaging: TimeAveraging::Trapezoidal, discrete_nondivergent: true }
}

#[test]
fn divergence_of_constant_vanishes() {
    for proj in [Projection::Equiangular, Projection::Equidistant] {
        let g = CubedSphere::new(12, proj).unwrap();
        let q = CsField::from_latlon_fn(&g, |_, _| 1.0);
        for vf in [VelocityField::ZonalRotation, VelocityField::TiltedRotation, VelocityField::NondivergentDeformation] {
            let v = Velocities::new(&g, vf, TimeAveraging::Trapezoidal, true, 0.0);
            for mono in [false, true] {
                let div = flux_divergence(&g, &q, &v, 0.02, mono).unwrap();
                let worst = g.interior_cells().map(|c| div[c].abs()).fold(0.0, f64::max);
                assert!(worst < 1e-10, "{proj} {vf:?} mono={mono}: max |div| = {worst:e}");
            }
        }
    }
}

#[test]
fn stale_ghosts_are_rejected() {
    let g = CubedSphere::new(8, Projection::Equiangular).unwrap();
    let mut q = CsField::from_latlon_fn(&g, |lon, _| lon.cos());
    let v = Velocities::new(&g, VelocityField::ZonalRotation, TimeAveraging::Trapezoidal, true, 0.0);
    q.set(2, 5, 5, 4.0);
    let err = compute_fluxes(&g, &q, &v, 0.05, false).unwrap_err();
    assert!(matches!(err, OperatorError::StaleGhostCell(_)));

    q.fill_ghosts(&g);
    let mut f = compute_fluxes(&g, &q, &v, 0.05, false).unwrap();
    assert!(f.synced);
    f.synced = false;
    assert!(matches!(divergence(&g, &f), Err(OperatorError::StaleGhostCell(_))));
}

#[test]
fn edge_fluxes_cancel_across_panels() {
    let g = CubedSphere::new(10, Projection::Equidistant).unwrap();
    let q = CsField::from_latlon_fn(&g, |lon, lat| InitialCondition::TwoGaussianHills.at(lon, lat));
    let v = Velocities::new(&g, VelocityField::DivergentDeformation, TimeAveraging::Trapezoidal, true, 0.0);
    for mono in [false, true] {
        let div = flux_divergence(&g, &q, &v, 0.05, mono).unwrap();
        let net: f64 = g.interior_cells().map(|c| div[c] * g.area[c]).sum();
        assert!(net.abs() < 1e-13, "net flux {net:e}");
    }
}

#[test]
fn limiter_creates_no_new_extrema() {
    let g = CubedSphere::new(16, Projection::Equiangular).unwrap();
    let p = params(InitialCondition::CosineBell, VelocityField::TiltedRotation, 0.03, true);
    let q = CsField::from_xyz_fn(&g, |r| p.ic.at_xyz(r));
    let v = Velocities::new(&g, p.vf, p.averaging, true, 0.0);
    let div = flux_divergence(&g, &q, &v, p.dt, true).unwrap();
    for (pn, i, j) in g.interior_cells() {
        let c = (pn, i, j);
        let updated = q.data[c] - p.dt * div[c];
        let mut lo = q.data[c];
        let mut hi = q.data[c];
        for nb in g.halo.face_neighbors(&g, pn, i, j) {
            lo = lo.min(q.data[nb]);
            hi = hi.max(q.data[nb]);
        }
        assert!(updated >= lo - 1e-12 && updated <= hi + 1e-12, "cell {c:?}: {updated} outside [{lo}, {hi}]");
    }
}

#[test]
fn divergence_converges_for_smooth_flux() {
    let ns = [16, 32];
    let p = SimulationParams { dt: 0.0, ..params(InitialCondition::GaussianHill, VelocityField::TiltedRotation, 0.0, false) };
    let errs: Vec<f64> = ns
        .iter()
        .map(|&n| divergence_test(&CubedSphere::new(n, Projection::Equiangular).unwrap(), &p).unwrap().norms.l2)
        .collect();
    let rates = convergence_rates(&ns, &errs);
    println!("divergence L2: {errs:?}, rate {rates:?}");
    assert!(rates[0] > 1.0, "observed order {:.2}", rates[0]);
}
