//! Conversions between geographic coordinates, unit vectors and cube-face coordinates.
//!
//! The sphere is projected onto the six faces of a cube. Each face carries a
//! `(u, v)` plane in `[-1, 1]`, remapped to `(s, t)` in `[0, 1]` by a quadratic
//! transform that evens out cell areas, then discretized into integer `(i, j)`
//! leaf coordinates.

use geo::Coord;
use glam::DVec3;

/// Deepest level of the hierarchy (leaf cells).
pub const MAX_LEVEL: u8 = 30;

/// Number of leaf cells along one edge of a face.
pub const MAX_SIZE: u32 = 1 << MAX_LEVEL;

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Convert a geographic coordinate (`x` = longitude, `y` = latitude, degrees) to a unit vector.
pub fn point_from_coord(coord: Coord<f64>) -> DVec3 {
    let lat = coord.y.to_radians();
    let lon = coord.x.to_radians();
    let cos_lat = lat.cos();
    DVec3::new(cos_lat * lon.cos(), cos_lat * lon.sin(), lat.sin())
}

/// Convert a (not necessarily normalized) vector back to a geographic coordinate.
pub fn coord_from_point(point: DVec3) -> Coord<f64> {
    let lat = point.z.atan2((point.x * point.x + point.y * point.y).sqrt());
    let lon = point.y.atan2(point.x);
    Coord {
        x: lon.to_degrees(),
        y: lat.to_degrees(),
    }
}

/// Face holding the point: the axis of the largest absolute component, +3 when negative.
pub fn face_of(point: DVec3) -> u8 {
    let abs = point.abs();
    let axis = if abs.x > abs.y {
        if abs.x > abs.z {
            0
        } else {
            2
        }
    } else if abs.y > abs.z {
        1
    } else {
        2
    };
    if point[axis] < 0.0 {
        axis as u8 + 3
    } else {
        axis as u8
    }
}

/// Project a point onto the `(u, v)` plane of the given face.
///
/// The point must lie in the hemisphere of that face.
pub fn face_xyz_to_uv(face: u8, p: DVec3) -> (f64, f64) {
    match face {
        0 => (p.y / p.x, p.z / p.x),
        1 => (-p.x / p.y, p.z / p.y),
        2 => (-p.x / p.z, -p.y / p.z),
        3 => (p.z / p.x, p.y / p.x),
        4 => (p.z / p.y, -p.x / p.y),
        _ => (-p.y / p.z, -p.x / p.z),
    }
}

/// Inverse of [`face_xyz_to_uv`]; the result is not normalized.
pub fn face_uv_to_xyz(face: u8, u: f64, v: f64) -> DVec3 {
    match face {
        0 => DVec3::new(1.0, u, v),
        1 => DVec3::new(-u, 1.0, v),
        2 => DVec3::new(-u, -v, 1.0),
        3 => DVec3::new(-1.0, -v, -u),
        4 => DVec3::new(v, -1.0, -u),
        _ => DVec3::new(v, u, -1.0),
    }
}

pub fn xyz_to_face_uv(point: DVec3) -> (u8, f64, f64) {
    let face = face_of(point);
    let (u, v) = face_xyz_to_uv(face, point);
    (face, u, v)
}

pub fn st_to_uv(s: f64) -> f64 {
    if s >= 0.5 {
        (4.0 * s * s - 1.0) / 3.0
    } else {
        (1.0 - 4.0 * (1.0 - s) * (1.0 - s)) / 3.0
    }
}

pub fn uv_to_st(u: f64) -> f64 {
    if u >= 0.0 {
        0.5 * (1.0 + 3.0 * u).sqrt()
    } else {
        1.0 - 0.5 * (1.0 - 3.0 * u).sqrt()
    }
}

/// Discretize an `s` or `t` value into a leaf coordinate, clamped to the face.
pub fn st_to_ij(s: f64) -> u32 {
    let scaled = (s * MAX_SIZE as f64).floor();
    scaled.clamp(0.0, (MAX_SIZE - 1) as f64) as u32
}

pub fn ij_to_st(i: u32) -> f64 {
    i as f64 / MAX_SIZE as f64
}

/// Area of the spherical triangle `abc` on the unit sphere (steradians).
pub fn triangle_area(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    let triple = a.dot(b.cross(c)).abs();
    let denominator = 1.0 + a.dot(b) + b.dot(c) + c.dot(a);
    2.0 * triple.atan2(denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_round_trip() {
        let coord = Coord { x: 8.5417, y: 47.3769 };
        let back = coord_from_point(point_from_coord(coord));
        assert!((back.x - coord.x).abs() < 1e-9);
        assert!((back.y - coord.y).abs() < 1e-9);
    }

    #[test]
    fn test_face_of_axes() {
        assert_eq!(face_of(DVec3::X), 0);
        assert_eq!(face_of(DVec3::Y), 1);
        assert_eq!(face_of(DVec3::Z), 2);
        assert_eq!(face_of(DVec3::NEG_X), 3);
        assert_eq!(face_of(DVec3::NEG_Y), 4);
        assert_eq!(face_of(DVec3::NEG_Z), 5);
    }

    #[test]
    fn test_face_uv_inverse() {
        for face in 0..6 {
            let p = face_uv_to_xyz(face, 0.25, -0.6);
            assert_eq!(face_of(p), face);
            let (u, v) = face_xyz_to_uv(face, p);
            assert!((u - 0.25).abs() < 1e-12, "face {face}: u = {u}");
            assert!((v + 0.6).abs() < 1e-12, "face {face}: v = {v}");
        }
    }

    #[test]
    fn test_st_uv_inverse() {
        for s in [0.0, 0.1, 0.25, 0.5, 0.6, 0.9, 1.0] {
            assert!((uv_to_st(st_to_uv(s)) - s).abs() < 1e-12);
        }
        assert_eq!(st_to_ij(1.0), MAX_SIZE - 1);
        assert_eq!(st_to_ij(-0.1), 0);
    }

    #[test]
    fn test_octant_triangle_area() {
        // One eighth of the sphere
        let area = triangle_area(DVec3::X, DVec3::Y, DVec3::Z);
        assert!((area - std::f64::consts::PI / 2.0).abs() < 1e-12);
    }
}
