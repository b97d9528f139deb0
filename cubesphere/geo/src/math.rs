// Keep imports minimal; everything here is plain f64 arithmetic on [f64; 3].

/// Dot product of 3D vectors.
#[inline]
#[must_use]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product of 3D vectors.
#[inline]
#[must_use]
pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

/// Euclidean norm of a 3D vector.
#[inline]
#[must_use]
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// `a * k`.
#[inline]
#[must_use]
pub fn scale(a: [f64; 3], k: f64) -> [f64; 3] {
    [a[0] * k, a[1] * k, a[2] * k]
}

/// `a + b`.
#[inline]
#[must_use]
pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// `a - b`.
#[inline]
#[must_use]
pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Normalize a 3D vector (returns zero if input is zero).
#[inline]
#[must_use]
pub fn normalize(mut a: [f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n > 0.0 {
        a[0] /= n;
        a[1] /= n;
        a[2] /= n;
    }
    a
}

/// Unit vector for longitude/latitude in radians.
#[inline]
#[must_use]
pub fn lonlat_to_xyz(lon: f64, lat: f64) -> [f64; 3] {
    let (slon, clon) = lon.sin_cos();
    let (slat, clat) = lat.sin_cos();
    [clat * clon, clat * slon, slat]
}

/// Longitude in (-π, π] and latitude in [-π/2, π/2] of a (not necessarily unit) vector.
#[inline]
#[must_use]
pub fn xyz_to_lonlat(p: [f64; 3]) -> (f64, f64) {
    let lon = p[1].atan2(p[0]);
    let lat = p[2].atan2((p[0] * p[0] + p[1] * p[1]).sqrt());
    (lon, lat)
}

/// Local (east, north) unit vectors at longitude/latitude.
///
/// Defined from the angles rather than from `r`, so at the poles the basis follows
/// whatever longitude the caller carries.
#[inline]
#[must_use]
pub fn east_north(lon: f64, lat: f64) -> ([f64; 3], [f64; 3]) {
    let (slon, clon) = lon.sin_cos();
    let (slat, clat) = lat.sin_cos();
    ([-slon, clon, 0.0], [-slat * clon, -slat * slon, clat])
}

/// Great-circle angle between two unit vectors.
#[inline]
#[must_use]
pub fn arc_angle(a: [f64; 3], b: [f64; 3]) -> f64 {
    let s = norm(cross(a, b));
    let d = dot(a, b).clamp(-1.0, 1.0);
    s.atan2(d).abs()
}

/// Spherical triangle area on the unit sphere using the robust vector formula.
#[inline]
#[must_use]
pub fn spherical_triangle_area(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> f64 {
    let numerator = dot(cross(a, b), c).abs();
    let denom = 1.0 + dot(a, b) + dot(b, c) + dot(c, a);
    2.0 * numerator.atan2(denom)
}

/// Area of a spherical quadrilateral with corners in cyclic order.
#[inline]
#[must_use]
pub fn spherical_quad_area(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    spherical_triangle_area(a, b, c) + spherical_triangle_area(a, c, d)
}

/// Rotate `v` by `angle` radians about the unit `axis` (Rodrigues).
#[must_use]
pub fn rotate(v: [f64; 3], axis: [f64; 3], angle: f64) -> [f64; 3] {
    let (s, c) = angle.sin_cos();
    let k_cross_v = cross(axis, v);
    let k_dot_v = dot(axis, v);
    [
        v[0] * c + k_cross_v[0] * s + axis[0] * k_dot_v * (1.0 - c),
        v[1] * c + k_cross_v[1] * s + axis[1] * k_dot_v * (1.0 - c),
        v[2] * c + k_cross_v[2] * s + axis[2] * k_dot_v * (1.0 - c),
    ]
}
