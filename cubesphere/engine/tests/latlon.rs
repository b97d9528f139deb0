use std::f64::consts::{FRAC_PI_4, PI};

use cubesphere_geo::math::{arc_angle, lonlat_to_xyz};
use cubesphere_geo::Projection;
use engine::diagnostics::interpolation_test;
use engine::fields::CsField;
use engine::grid::CubedSphere;
use engine::initial::InitialCondition;
use engine::latlon::{locate, LatLonGrid, MappingError};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[test]
fn cell_centre_samples_map_back_exactly() {
    for proj in [Projection::Equiangular, Projection::Equidistant, Projection::Conformal] {
        let g = CubedSphere::new(9, proj).unwrap();
        let cells: Vec<_> = g.interior_cells().collect();
        let lon = cells.iter().map(|&c| g.centers[c].lon).collect();
        let lat = cells.iter().map(|&c| g.centers[c].lat).collect();
        let mut ll = LatLonGrid::from_points(lon, lat);
        ll.map(&g);

        let q = CsField::from_xyz_fn(&g, |r| 3.0 * r[0] - r[1] * r[2]);
        let values = ll.interpolate(&g, &q);
        for (k, &(p, i, j)) in cells.iter().enumerate() {
            assert!(ll.mask[k]);
            assert_eq!((ll.panel[k], ll.ix[k], ll.jy[k]), (p, i, j), "{proj}");
            assert_eq!(values[k], q.get(p, i, j));
        }
    }
}

#[test]
fn cube_corner_is_masked() {
    let g = CubedSphere::new(8, Projection::Equiangular).unwrap();
    // Corner shared by panels 0, 1 and 4.
    let lat = (1.0f64 / 3.0f64.sqrt()).asin();
    assert_eq!(locate(&g, FRAC_PI_4, lat), Err(MappingError::Singularity));

    let mut ll = LatLonGrid::from_points(vec![FRAC_PI_4, 0.1], vec![lat, 0.2]);
    ll.map(&g);
    assert_eq!(ll.mask, vec![false, true]);
    let v = ll.interpolate(&g, &CsField::from_latlon_fn(&g, |_, _| 2.0));
    assert!(v[0].is_nan());
    assert_eq!(v[1], 2.0);
}

#[test]
fn panel_edges_go_to_lower_index() {
    let g = CubedSphere::new(8, Projection::Equidistant).unwrap();
    // lon = 45°, lat = 0 lies on the edge between panels 0 and 1.
    let c = locate(&g, FRAC_PI_4, 0.0).unwrap();
    assert_eq!(c.panel, 0);
    assert_eq!(c.i, g.bounds.iend - 1);
}

#[test]
fn regular_grid_maps_every_sample_and_error_shrinks() {
    let mut errs = Vec::new();
    for n in [8, 16, 32] {
        let g = CubedSphere::new(n, Projection::Equiangular).unwrap();
        let mut ll = LatLonGrid::regular(90, 45);
        let report = interpolation_test(&g, &mut ll, InitialCondition::GaussianHill);
        assert_eq!(report.mapped + report.masked, 90 * 45);
        assert_eq!(report.masked, 0);
        errs.push(report.norms.linf);
    }
    assert!(errs[1] < errs[0] && errs[2] < errs[1], "{errs:?}");
}

#[test]
fn latlon_field_transfers_to_cube() {
    let g = CubedSphere::new(6, Projection::Equiangular).unwrap();
    let ll = LatLonGrid::regular(72, 36);
    let values: Vec<f64> = ll.lat.iter().map(|l| l.sin()).collect();
    let q = ll.to_cubed_sphere(&g, &values).unwrap();
    assert!(q.ghosts_fresh);
    for c in g.interior_cells() {
        assert!((q.data[c] - g.centers[c].lat.sin()).abs() < 0.1);
    }
    assert!(ll.to_cubed_sphere(&g, &values[1..]).is_none());
}

#[test]
fn random_points_locate_to_nearby_interior_cell() {
    let n = 10;
    let g = CubedSphere::new(n, Projection::Equidistant).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..2000 {
        let lon = rng.gen_range(-PI..PI);
        let lat = rng.gen_range(-1.5..1.5);
        let c = locate(&g, lon, lat).unwrap();
        assert!(g.bounds.contains(c.i, c.j), "{c:?}");
        let d = arc_angle(g.centers[(c.panel, c.i, c.j)].xyz, lonlat_to_xyz(lon, lat));
        assert!(d < 2.0 / n as f64, "({lon}, {lat}) is {d} from the centre of {c:?}");
    }
}
