use std::f64::consts::PI;

use approx::assert_abs_diff_eq;
use cubesphere_geo::{panel_to_latlon, Projection, PANELS};
use engine::grid::{build_grid, CubedSphere, GridError};

const PROJECTIONS: [Projection; 3] = [Projection::Equiangular, Projection::Equidistant, Projection::Conformal];

#[test]
fn metric_determinant_positive_in_interior() {
    for proj in PROJECTIONS {
        for n in [1, 2, 5, 8, 16, 33] {
            let g = CubedSphere::new(n, proj).unwrap();
            for c in g.interior_cells() {
                assert!(g.centers[c].sqrtg > 0.0, "sqrtg <= 0 at {c:?} N={n} {proj}");
            }
            let b = g.bounds;
            for p in 0..PANELS {
                for j in b.j0..b.jend {
                    for i in b.i0..=b.iend {
                        assert!(g.pu[(p, i, j)].sqrtg > 0.0);
                    }
                }
            }
        }
    }
}

#[test]
fn cell_areas_sum_to_sphere() {
    for proj in PROJECTIONS {
        for n in [3, 10, 24] {
            let g = CubedSphere::new(n, proj).unwrap();
            assert_abs_diff_eq!(g.total_area(), 4.0 * PI, epsilon = 1e-11);
        }
    }
}

#[test]
fn centres_match_forward_map() {
    let g = CubedSphere::new(7, Projection::Equiangular).unwrap();
    for (p, i, j) in g.interior_cells() {
        let (lon, lat) = panel_to_latlon(p, g.center_coord(i), g.center_coord(j), g.projection);
        let c = &g.centers[(p, i, j)];
        assert_abs_diff_eq!(c.lon, lon, epsilon = 1e-14);
        assert_abs_diff_eq!(c.lat, lat, epsilon = 1e-14);
    }
}

#[test]
fn latlon_contravariant_determinant_matches_metric() {
    let g = CubedSphere::new(6, Projection::Equidistant).unwrap();
    for c in g.interior_cells() {
        let pt = &g.centers[c];
        assert_abs_diff_eq!(pt.det_ll2contra, pt.sqrtg, epsilon = 1e-12);
    }
}

#[test]
fn panel_corners_coincide_across_panels() {
    let g = CubedSphere::new(4, Projection::Equiangular).unwrap();
    let b = g.bounds;
    // East edge of panel 0 is the west edge of panel 1.
    for k in b.j0..=b.jend {
        let a = g.corners[(0, b.iend, k)].xyz;
        let c = g.corners[(1, b.i0, k)].xyz;
        for d in 0..3 {
            assert_abs_diff_eq!(a[d], c[d], epsilon = 1e-14);
        }
    }
}

#[test]
fn builder_rejects_bad_inputs() {
    assert_eq!(build_grid(0, "equiangular", false, None).unwrap_err(), GridError::InvalidResolution(0));
    assert_eq!(build_grid(-8, "equidistant", true, None).unwrap_err(), GridError::InvalidResolution(-8));
    assert!(matches!(build_grid(8, "octahedral", false, None), Err(GridError::UnsupportedProjection(_))));
}

#[test]
fn conformal_ghosts_sit_on_neighbour_cells() {
    let g = CubedSphere::new(8, Projection::Conformal).unwrap();
    let b = g.bounds;
    // Ghost columns east of panel 0 mirror the first interior columns of panel 1.
    for k in 0..g.ghost {
        for j in b.j0..b.jend {
            let ghost = g.centers[(0, b.iend + k, j)].xyz;
            let cell = g.centers[(1, b.i0 + k, j)].xyz;
            for d in 0..3 {
                assert_abs_diff_eq!(ghost[d], cell[d], epsilon = 1e-13);
            }
        }
    }
}

#[test]
fn conformal_corner_cells_shrink() {
    let g = CubedSphere::new(16, Projection::Conformal).unwrap();
    let b = g.bounds;
    let corner = g.area[(0, b.i0, b.j0)];
    let centre = g.area[(0, b.i0 + 8, b.j0 + 8)];
    assert!(corner < 0.5 * centre, "corner {corner:e} centre {centre:e}");
    assert_eq!(g.corners[(0, b.i0, b.j0)].sqrtg, 0.0);
}
