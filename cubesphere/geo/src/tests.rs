use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::math::{cross, dot, lonlat_to_xyz, norm, rotate, spherical_quad_area};
use crate::*;

const PROJECTIONS: [Projection; 3] = [Projection::Equiangular, Projection::Equidistant, Projection::Conformal];

#[test]
fn frames_are_orthonormal_and_outward() {
    for [n, a, b] in PANEL_FRAMES {
        assert_abs_diff_eq!(dot(n, a), 0.0);
        assert_abs_diff_eq!(dot(n, b), 0.0);
        assert_abs_diff_eq!(dot(a, b), 0.0);
        // a × b points along the outward normal
        assert_abs_diff_eq!(dot(cross(a, b), n), 1.0);
    }
}

#[test]
fn round_trip_is_identity_in_panel_interiors() {
    let mut rng = StdRng::seed_from_u64(7);
    for proj in PROJECTIONS {
        let hw = proj.half_width();
        for _ in 0..2000 {
            let panel = rng.gen_range(0..PANELS);
            let x = rng.gen_range(-0.999..0.999) * hw;
            let y = rng.gen_range(-0.999..0.999) * hw;
            let (lon, lat) = panel_to_latlon(panel, x, y, proj);
            let (p2, x2, y2) = latlon_to_panel(lon, lat, proj);
            assert_eq!(p2, panel, "panel mismatch for ({x}, {y}) on {panel}");
            assert_abs_diff_eq!(x2, x, epsilon = 1e-12);
            assert_abs_diff_eq!(y2, y, epsilon = 1e-12);
        }
    }
}

#[test]
fn shared_edges_are_continuous() {
    // East edge of each equatorial panel is the west edge of the next one.
    for proj in PROJECTIONS {
        let hw = proj.half_width();
        for p in 0..4 {
            for k in 0..=10 {
                let y = -hw + 2.0 * hw * f64::from(k) / 10.0;
                let a = panel_to_xyz(p, hw, y, proj);
                let b = panel_to_xyz((p + 1) % 4, -hw, y, proj);
                assert!(norm(crate::math::sub(a, b)) < 1e-14);
            }
        }
        // North panel bottom edge meets panel 0 top edge.
        for k in 0..=10 {
            let x = -hw + 2.0 * hw * f64::from(k) / 10.0;
            let a = panel_to_xyz(0, x, hw, proj);
            let b = panel_to_xyz(4, x, -hw, proj);
            assert!(norm(crate::math::sub(a, b)) < 1e-14);
        }
    }
}

#[test]
fn metric_determinant_matches_closed_form() {
    let proj = Projection::Equiangular;
    for &(x, y) in &[(0.0, 0.0), (0.3, -0.2), (0.7, 0.7), (-0.78, 0.1)] {
        let b = tangent_basis(2, x, y, proj);
        let (gx, gy) = (x.tan(), y.tan());
        let rho = (1.0 + gx * gx + gy * gy).sqrt();
        let expected = (1.0 + gx * gx) * (1.0 + gy * gy) / rho.powi(3);
        assert_abs_diff_eq!(b.sqrtg, expected, epsilon = 1e-12);
        assert!(b.sqrtg > 0.0);
    }
}

#[test]
fn contravariant_basis_is_dual() {
    for proj in PROJECTIONS {
        let b = tangent_basis(4, 0.31 * proj.half_width(), -0.55 * proj.half_width(), proj);
        assert_abs_diff_eq!(dot(b.ex_contra, b.ex), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dot(b.ex_contra, b.ey), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dot(b.ey_contra, b.ey), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dot(b.ey_contra, b.ex), 0.0, epsilon = 1e-12);
        let p = basis_products(&b);
        assert_abs_diff_eq!(p.det, b.sqrtg, epsilon = 1e-12);
    }
}

#[test]
fn latlon_contravariant_conversion_round_trips() {
    let b = tangent_basis(1, 0.4, 0.2, Projection::Equiangular);
    let p = basis_products(&b);
    let (u, v) = latlon_to_contravariant(0.3, -1.1, &p);
    let (ulon, vlat) = contravariant_to_latlon(u, v, &p);
    assert_abs_diff_eq!(ulon, 0.3, epsilon = 1e-12);
    assert_abs_diff_eq!(vlat, -1.1, epsilon = 1e-12);
}

#[test]
fn panel_corners_are_flagged_singular() {
    for proj in PROJECTIONS {
        let hw = proj.half_width();
        assert!(tangent_basis(0, hw, hw, proj).singular);
        assert!(tangent_basis(5, -hw, hw, proj).singular);
        assert!(!tangent_basis(0, hw, 0.0, proj).singular);
        assert!(!tangent_basis(3, 0.0, 0.0, proj).singular);
    }
}

#[test]
fn ties_go_to_lower_panel() {
    // Edge between panel 0 and panel 1
    let r = [1.0, 1.0, 0.0];
    assert_eq!(pick_panel(r), 0);
    // Edge between panel 1 and the north panel
    assert_eq!(pick_panel([0.0, 1.0, 1.0]), 1);
    // Cube corner
    assert_eq!(pick_panel([-1.0, 1.0, 1.0]), 1);
    assert!(is_cube_corner([-1.0, 1.0, 1.0], 1e-12));
    assert!(!is_cube_corner([1.0, 1.0, 0.0], 1e-12));
}

#[test]
fn projection_ids_parse() {
    assert_eq!("equiangular".parse::<Projection>(), Ok(Projection::Equiangular));
    assert_eq!("Equidistant".parse::<Projection>(), Ok(Projection::Equidistant));
    assert_eq!("conformal".parse::<Projection>(), Ok(Projection::Conformal));
    assert!(matches!("mercator".parse::<Projection>(), Err(ProjectionError::Unknown(_))));
    for p in PROJECTIONS {
        assert_eq!(Projection::from_code(p.code()), Some(p));
    }
}

#[test]
fn one_panel_covers_a_sixth_of_the_sphere() {
    let a = panel_to_xyz(0, -1.0, -1.0, Projection::Equidistant);
    let b = panel_to_xyz(0, 1.0, -1.0, Projection::Equidistant);
    let c = panel_to_xyz(0, 1.0, 1.0, Projection::Equidistant);
    let d = panel_to_xyz(0, -1.0, 1.0, Projection::Equidistant);
    assert_abs_diff_eq!(spherical_quad_area(a, b, c, d), 4.0 * std::f64::consts::PI / 6.0, epsilon = 1e-12);
}

#[test]
fn conformal_edges_lie_on_cube_edges() {
    for p in 0..PANELS {
        for k in 0..=16 {
            let t = -1.0 + f64::from(k) / 8.0;
            for (x, y) in [(1.0, t), (-1.0, t), (t, 1.0), (t, -1.0)] {
                let r = panel_to_xyz(p, x, y, Projection::Conformal);
                let [gx, gy, _] = panel_components(p, r).map(|c| c / dot(r, panel_normal(p)));
                let edge = if x.abs() == 1.0 { gx * x } else { gy * y };
                assert_abs_diff_eq!(edge, 1.0, epsilon = 1e-14);
            }
        }
    }
}

#[test]
fn conformal_grid_lines_meet_at_right_angles() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let (x, y) = (rng.gen_range(-0.99..0.99), rng.gen_range(-0.99..0.99));
        let b = tangent_basis(rng.gen_range(0..PANELS), x, y, Projection::Conformal);
        let (lx, ly) = (dot(b.ex, b.ex), dot(b.ey, b.ey));
        assert_abs_diff_eq!(dot(b.ex, b.ey) / lx, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lx / ly, 1.0, epsilon = 1e-12);
        assert!(b.sqrtg > 0.0);
    }
    let corner = tangent_basis(3, 1.0, -1.0, Projection::Conformal);
    assert!(corner.singular);
    assert_eq!(corner.sqrtg, 0.0);
    assert_eq!(corner.ex_contra, [0.0; 3]);
}

#[test]
fn rotation_preserves_axis_and_length() {
    let axis = crate::math::normalize([-1.0, 0.0, 1.0]);
    let v = lonlat_to_xyz(0.4, 0.2);
    let w = rotate(v, axis, 1.3);
    assert_abs_diff_eq!(norm(w), 1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(dot(w, axis), dot(v, axis), epsilon = 1e-14);
    let back = rotate(w, axis, -1.3);
    for k in 0..3 {
        assert_abs_diff_eq!(back[k], v[k], epsilon = 1e-14);
    }
}
