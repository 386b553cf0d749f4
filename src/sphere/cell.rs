//! Hierarchical cell identifiers.
//!
//! A [`CellId`] packs a cell into 64 bits:
//!
//! ```text
//! | face (3) | position (2 bits per level, i above j) | 1 | 0 ... 0 |
//! ```
//!
//! The trailing marker bit encodes the level, so identifiers of all the
//! descendants of a cell fall into the contiguous range
//! `[range_min, range_max]` around it and sorting the identifiers keeps
//! every subtree together.

use std::fmt;

use geo::Coord;
use glam::DVec3;

use super::coords::{
    face_uv_to_xyz, ij_to_st, point_from_coord, st_to_ij, st_to_uv, triangle_area, uv_to_st,
    xyz_to_face_uv, MAX_LEVEL, MAX_SIZE,
};

const POS_BITS: u32 = 2 * MAX_LEVEL as u32 + 1;
const FACE_COUNT: u8 = 6;

/// Identifier of a cell in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub u64);

#[inline]
fn lsb_for_level(level: u8) -> u64 {
    1u64 << (2 * (MAX_LEVEL - level) as u32)
}

/// Spread the low 30 bits of `v` onto the even bits of a `u64`.
#[inline]
fn spread(v: u32) -> u64 {
    let mut x = (v & (MAX_SIZE - 1)) as u64;
    x = (x | (x << 16)) & 0x0000_ffff_0000_ffff;
    x = (x | (x << 8)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

#[inline]
fn compact(v: u64) -> u32 {
    let mut x = v & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x >> 4)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x >> 8)) & 0x0000_ffff_0000_ffff;
    x = (x | (x >> 16)) & 0x0000_0000_ffff_ffff;
    x as u32
}

impl CellId {
    /// The level-0 cell of a face.
    pub fn from_face(face: u8) -> Self {
        CellId(((face as u64) << POS_BITS) + lsb_for_level(0))
    }

    /// The six face cells, covering the whole sphere.
    pub fn roots() -> [CellId; 6] {
        [0, 1, 2, 3, 4, 5].map(CellId::from_face)
    }

    /// Leaf cell at integer coordinates `(i, j)` of a face.
    pub fn from_face_ij(face: u8, i: u32, j: u32) -> Self {
        let position = (spread(i) << 1) | spread(j);
        CellId(((face as u64) << POS_BITS) | (position << 1) | 1)
    }

    /// Cell at `level` containing the leaf `(i, j)` of a face.
    pub fn from_face_ij_level(face: u8, i: u32, j: u32, level: u8) -> Self {
        Self::from_face_ij(face, i, j).parent(level)
    }

    /// Leaf cell containing a point on the sphere.
    pub fn from_point(point: DVec3) -> Self {
        let (face, u, v) = xyz_to_face_uv(point);
        Self::from_face_ij(face, st_to_ij(uv_to_st(u)), st_to_ij(uv_to_st(v)))
    }

    /// Leaf cell containing a geographic coordinate.
    pub fn from_coord(coord: Coord<f64>) -> Self {
        Self::from_point(point_from_coord(coord))
    }

    pub fn id(self) -> u64 {
        self.0
    }

    pub fn face(self) -> u8 {
        (self.0 >> POS_BITS) as u8
    }

    /// Lowest set bit, the level marker.
    pub fn lsb(self) -> u64 {
        self.0 & self.0.wrapping_neg()
    }

    pub fn level(self) -> u8 {
        MAX_LEVEL - (self.0.trailing_zeros() / 2) as u8
    }

    pub fn is_leaf(self) -> bool {
        self.0 & 1 != 0
    }

    /// Whether the identifier has a valid face and a marker bit on an even position.
    pub fn is_valid(self) -> bool {
        self.face() < FACE_COUNT && (self.lsb() & 0x1555_5555_5555_5555) != 0
    }

    /// Ancestor at `level`; `level` must not be deeper than the cell's own level.
    pub fn parent(self, level: u8) -> Self {
        let lsb = lsb_for_level(level);
        CellId((self.0 & lsb.wrapping_neg()) | lsb)
    }

    /// The four children in position order; must not be called on a leaf.
    pub fn children(self) -> [CellId; 4] {
        let lsb = self.lsb();
        let child_lsb = lsb >> 2;
        let begin = self.0 - lsb + child_lsb;
        [0u64, 1, 2, 3].map(|k| CellId(begin + k * (child_lsb << 1)))
    }

    pub fn range_min(self) -> CellId {
        CellId(self.0 - (self.lsb() - 1))
    }

    pub fn range_max(self) -> CellId {
        CellId(self.0 + (self.lsb() - 1))
    }

    /// Whether `other` is this cell or one of its descendants.
    pub fn contains(self, other: CellId) -> bool {
        other >= self.range_min() && other <= self.range_max()
    }

    /// Whether the two cells overlap, i.e. one contains the other.
    pub fn intersects(self, other: CellId) -> bool {
        other.range_min() <= self.range_max() && other.range_max() >= self.range_min()
    }

    /// Face and integer coordinates of the cell's lower-left leaf.
    pub fn face_ij(self) -> (u8, u32, u32) {
        let position = (self.range_min().0 >> 1) & ((1u64 << (POS_BITS - 1)) - 1);
        (self.face(), compact(position >> 1), compact(position))
    }

    /// Edge length of a cell at `level`, in leaf coordinates.
    pub fn step(level: u8) -> u32 {
        1 << (MAX_LEVEL - level)
    }

    /// Point at the fractional position `(ds, dt)` of the cell, both in `[0, 1]`.
    pub fn point_at(self, ds: f64, dt: f64) -> DVec3 {
        let (face, i, j) = self.face_ij();
        let size = Self::step(self.level()) as f64;
        let s = ij_to_st(i) + ds * size / MAX_SIZE as f64;
        let t = ij_to_st(j) + dt * size / MAX_SIZE as f64;
        face_uv_to_xyz(face, st_to_uv(s), st_to_uv(t)).normalize()
    }

    pub fn center(self) -> DVec3 {
        self.point_at(0.5, 0.5)
    }

    /// Corner points in counter-clockwise order, starting at the lower-left corner.
    pub fn vertices(self) -> [DVec3; 4] {
        [
            self.point_at(0.0, 0.0),
            self.point_at(1.0, 0.0),
            self.point_at(1.0, 1.0),
            self.point_at(0.0, 1.0),
        ]
    }

    /// Area on the unit sphere, in steradians.
    pub fn area(self) -> f64 {
        let [a, b, c, d] = self.vertices();
        triangle_area(a, b, c) + triangle_area(a, c, d)
    }

    /// Hex rendering with trailing zero nibbles removed.
    pub fn to_token(self) -> String {
        if self.0 == 0 {
            return "X".to_string();
        }
        let hex = format!("{:016x}", self.0);
        hex.trim_end_matches('0').to_string()
    }

}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_cells() {
        for (face, cell) in CellId::roots().into_iter().enumerate() {
            assert_eq!(cell.face(), face as u8);
            assert_eq!(cell.level(), 0);
            assert!(cell.is_valid());
            assert_eq!(cell.face_ij(), (face as u8, 0, 0));
        }
        assert_eq!(CellId::from_face(0).id(), 0x1000_0000_0000_0000);
        assert_eq!(CellId::from_face(5).id(), 0xb000_0000_0000_0000);
    }

    #[test]
    fn test_children_and_parent() {
        let face = CellId::from_face(2);
        let children = face.children();
        let expected_ij = [(0, 0), (0, 1), (1, 0), (1, 1)];
        for (child, (di, dj)) in children.iter().zip(expected_ij) {
            assert_eq!(child.level(), 1);
            assert_eq!(child.parent(0), face);
            assert!(face.contains(*child));
            assert!(!child.contains(face));
            assert!(child.intersects(face));
            let half = MAX_SIZE / 2;
            assert_eq!(child.face_ij(), (2, di * half, dj * half));
        }
        assert!(!children[0].intersects(children[1]));
        assert!(children.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_leaf_round_trip() {
        let cell = CellId::from_face_ij(4, 123_456_789, 987_654_321);
        assert!(cell.is_leaf());
        assert_eq!(cell.level(), MAX_LEVEL);
        assert_eq!(cell.face_ij(), (4, 123_456_789, 987_654_321));
        assert_eq!(cell.range_min(), cell);
        assert_eq!(cell.range_max(), cell);
    }

    #[test]
    fn test_from_face_ij_level() {
        let cell = CellId::from_face_ij_level(1, 700_000, 900_000, 10);
        assert_eq!(cell.level(), 10);
        let step = CellId::step(10);
        let (face, i, j) = cell.face_ij();
        assert_eq!(face, 1);
        assert_eq!(i, 700_000 / step * step);
        assert_eq!(j, 900_000 / step * step);
        assert!(cell.contains(CellId::from_face_ij(1, 700_000, 900_000)));
    }

    #[test]
    fn test_point_lands_in_its_cell() {
        let coord = Coord { x: 2.3522, y: 48.8566 };
        let leaf = CellId::from_coord(coord);
        for level in [0, 5, 12, 20] {
            let cell = leaf.parent(level);
            assert!(cell.contains(leaf));
            assert_eq!(CellId::from_point(cell.center()).parent(level), cell);
        }
    }

    #[test]
    fn test_face_areas_sum_to_sphere() {
        let total: f64 = CellId::roots().iter().map(|c| c.area()).sum();
        assert!((total - 4.0 * std::f64::consts::PI).abs() < 1e-9);

        let cell = CellId::from_face(3).children()[2];
        let children: f64 = cell.children().iter().map(|c| c.area()).sum();
        assert!((children - cell.area()).abs() < 1e-12);
    }

    #[test]
    fn test_token() {
        let cell = CellId::from_face(0).children()[3].children()[1];
        assert_eq!(cell.to_token(), "1b");
        assert_eq!(cell.to_string(), "1b");
        assert_eq!(CellId(0).to_token(), "X");
    }
}
