//! Classifying cells against polygons.
//!
//! Vertex containment is planar (longitude / latitude), edge crossings are
//! geodesic: boundary edges and cell diagonals are great-circle arcs between
//! unit vectors.

use geo::{Coord, Intersects, MultiPolygon, Polygon};
use glam::DVec3;

use crate::sphere::{coord_from_point, point_from_coord, CellId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellRelation {
    Disjoint,
    Intersect,
    Contain,
}

#[derive(Debug, Clone, Copy)]
struct PreparedPoint {
    point: DVec3,
    leaf: CellId,
}

impl PreparedPoint {
    fn new(coord: Coord<f64>) -> Self {
        let point = point_from_coord(coord);
        Self {
            point,
            leaf: CellId::from_point(point),
        }
    }
}

/// A great-circle arc with its normal.
#[derive(Debug, Clone, Copy)]
struct GreatArc {
    a: DVec3,
    b: DVec3,
    normal: DVec3,
}

impl GreatArc {
    fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            a,
            b,
            normal: a.cross(b),
        }
    }

    /// Whether the arc crosses `other`.
    fn crosses(&self, other: &GreatArc) -> bool {
        let mut candidate = self.normal.cross(other.normal);
        if candidate.dot(other.a) < 0.0 && candidate.dot(other.b) < 0.0 {
            candidate = -candidate;
        }
        between(candidate, other.a, other.b) && between(candidate, self.a, self.b)
    }
}

/// Whether `x`, a point on the great circle through `a` and `b`, lies on the
/// minor arc between them.
fn between(x: DVec3, a: DVec3, b: DVec3) -> bool {
    if x.dot(a) < 0.0 && x.dot(b) < 0.0 {
        return false;
    }
    a.cross(x).dot(b.cross(x)) < 0.0
}

/// The two diagonals of a cell.
fn diagonals(vertices: &[DVec3; 4]) -> [GreatArc; 2] {
    [
        GreatArc::new(vertices[0], vertices[2]),
        GreatArc::new(vertices[1], vertices[3]),
    ]
}

/// A polygon list with every ring vertex projected onto the sphere once.
#[derive(Debug, Clone, Default)]
pub struct PreparedGeometry {
    polygons: Vec<Polygon<f64>>,
    rings: Vec<Vec<PreparedPoint>>,
}

impl PreparedGeometry {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        let rings = polygons
            .iter()
            .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
            .filter(|ring| ring.0.len() >= 2)
            .map(|ring| ring.coords().map(|&c| PreparedPoint::new(c)).collect())
            .collect();
        Self { polygons, rings }
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    fn contains(&self, coord: Coord<f64>) -> bool {
        self.polygons.iter().any(|polygon| polygon.intersects(&coord))
    }

    /// Classify `cell` against the polygons.
    pub fn relation(&self, cell: CellId) -> CellRelation {
        if self.is_empty() {
            return CellRelation::Disjoint;
        }

        let vertices = cell.vertices();
        let contained = vertices
            .iter()
            .filter(|&&vertex| self.contains(coord_from_point(vertex)))
            .count();

        match contained {
            0 if self.crosses(cell, &vertices) => CellRelation::Intersect,
            0 => CellRelation::Disjoint,
            4 if self.crosses(cell, &vertices) => CellRelation::Intersect,
            4 => CellRelation::Contain,
            _ => CellRelation::Intersect,
        }
    }

    /// Whether any boundary edge touches the cell.
    fn crosses(&self, cell: CellId, vertices: &[DVec3; 4]) -> bool {
        let bounds = CellBounds::new(cell);
        let diagonals = diagonals(vertices);
        self.rings.iter().any(|ring| {
            if cell.intersects(ring[0].leaf) {
                return true;
            }
            ring.windows(2)
                .any(|edge| bounds.edge_crosses(&edge[0], &edge[1], &diagonals))
        })
    }
}

impl From<Polygon<f64>> for PreparedGeometry {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::new(vec![polygon])
    }
}

impl From<MultiPolygon<f64>> for PreparedGeometry {
    fn from(multi_polygon: MultiPolygon<f64>) -> Self {
        Self::new(multi_polygon.0)
    }
}

/// Face and leaf-coordinate extent of a cell.
struct CellBounds {
    cell: CellId,
    face: u8,
    i: u32,
    j: u32,
    step: u32,
}

impl CellBounds {
    fn new(cell: CellId) -> Self {
        let (face, i, j) = cell.face_ij();
        Self {
            cell,
            face,
            i,
            j,
            step: CellId::step(cell.level()),
        }
    }

    fn edge_crosses(&self, a: &PreparedPoint, b: &PreparedPoint, diagonals: &[GreatArc; 2]) -> bool {
        if self.cell.intersects(b.leaf) {
            return true;
        }
        if a.point == b.point {
            return false;
        }

        let (a_face, a_i, a_j) = a.leaf.face_ij();
        let (b_face, b_i, b_j) = b.leaf.face_ij();
        if a_face == self.face && b_face == self.face {
            let (i_max, j_max) = (self.i + self.step, self.j + self.step);
            if (a_i < self.i && b_i < self.i) || (a_j < self.j && b_j < self.j) {
                return false;
            }
            if (a_i > i_max && b_i > i_max) || (a_j > j_max && b_j > j_max) {
                return false;
            }

            let i_range = self.i..=i_max;
            if i_range.contains(&a_i) && i_range.contains(&b_i) {
                return true;
            }
            let j_range = self.j..=j_max;
            if j_range.contains(&a_j) && j_range.contains(&b_j) {
                return true;
            }
        }

        let edge = GreatArc::new(a.point, b.point);
        diagonals.iter().any(|diagonal| diagonal.crosses(&edge))
    }
}
