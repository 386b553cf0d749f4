use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::candidate::{Candidate, CandidateQueue};
use super::relation::{CellRelation, PreparedGeometry};
use crate::error::CoverError;
use crate::sphere::{CellCollection, CellId, MAX_LEVEL};

/// What to do with the candidates left at the deepest level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Keep every one of them, nothing inside the geometry is left uncovered
    Exterior,
    /// Keep those more than half covered
    #[default]
    Balanced,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exterior" => Ok(Mode::Exterior),
            "balanced" => Ok(Mode::Balanced),
            _ => Err(format!("unknown cover mode: {}", s)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Exterior => write!(f, "exterior"),
            Mode::Balanced => write!(f, "balanced"),
        }
    }
}

/// Best-first search for the cells covering a geometry.
#[derive(Debug, Clone)]
pub struct Coverer {
    level_range: RangeInclusive<u8>,
    mode: Mode,
}

impl Coverer {
    /// The upper bound of `level_range` is the deepest level of the result. The
    /// lower bound is kept for reference and does not constrain the search.
    pub fn new(level_range: RangeInclusive<u8>, mode: Mode) -> Result<Self, CoverError> {
        let (lower, upper) = (*level_range.start(), *level_range.end());
        if upper >= MAX_LEVEL {
            return Err(CoverError::LevelOutOfRange {
                level: upper,
                max: MAX_LEVEL - 1,
            });
        }
        if lower > upper {
            return Err(CoverError::InvalidLevelRange { lower, upper });
        }
        Ok(Self { level_range, mode })
    }

    /// Cover starting from the six face cells.
    pub fn cover(&self, geometry: &PreparedGeometry) -> CellCollection {
        self.cover_from(geometry, CellId::roots())
    }

    pub fn cover_from<I>(&self, geometry: &PreparedGeometry, initial: I) -> CellCollection
    where
        I: IntoIterator<Item = CellId>,
    {
        let upper = *self.level_range.end();
        let mut queue = CandidateQueue::new();
        let mut result = CellCollection::new();

        for cell in initial {
            match geometry.relation(cell) {
                CellRelation::Intersect => queue.push(Candidate::new(cell, geometry)),
                CellRelation::Contain => {
                    result.insert(cell);
                }
                CellRelation::Disjoint => {}
            }
        }

        while let Some(candidate) = queue.pop() {
            if candidate.cell.level() >= upper {
                if self.mode == Mode::Exterior || candidate.covers_more_than_half() {
                    result.insert(candidate.cell);
                }
                continue;
            }

            result.extend(candidate.contained.iter().copied());
            for &child in &candidate.intersected {
                queue.push(Candidate::new(child, geometry));
            }
        }

        result
    }

    /// Cover every polygon on its own and union the results.
    pub fn cover_polygons<'a, I>(&self, polygons: I) -> CellCollection
    where
        I: IntoIterator<Item = &'a geo::Polygon<f64>>,
    {
        let mut result = CellCollection::new();
        for polygon in polygons {
            let geometry = PreparedGeometry::from(polygon.clone());
            result.form_union(self.cover(&geometry));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Coord, MultiPolygon};

    fn square(x: f64, y: f64, size: f64) -> geo::Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn test_level_bounds() {
        assert!(Coverer::new(0..=29, Mode::Exterior).is_ok());
        assert!(matches!(
            Coverer::new(0..=30, Mode::Exterior),
            Err(CoverError::LevelOutOfRange { level: 30, max: 29 })
        ));
        assert!(matches!(
            Coverer::new(8..=4, Mode::Balanced),
            Err(CoverError::InvalidLevelRange { lower: 8, upper: 4 })
        ));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Exterior".parse(), Ok(Mode::Exterior));
        assert_eq!("balanced".parse(), Ok(Mode::Balanced));
        assert!("interior".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Balanced);
    }

    #[test]
    fn test_cover_is_deterministic() {
        let geometry = PreparedGeometry::from(square(2.0, 46.0, 3.0));
        let coverer = Coverer::new(0..=9, Mode::Balanced).unwrap();
        let first = coverer.cover(&geometry);
        let second = coverer.cover(&geometry);
        assert!(!first.is_empty());
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_cells_not_deeper_than_upper_bound() {
        let geometry = PreparedGeometry::from(square(2.0, 46.0, 3.0));
        let coverer = Coverer::new(0..=7, Mode::Exterior).unwrap();
        let cells = coverer.cover(&geometry);
        assert!(cells.iter().all(|cell| cell.level() <= 7));
        assert!(cells.contains(CellId::from_coord(Coord { x: 3.5, y: 47.5 })));
    }

    #[test]
    fn test_lower_bound_has_no_effect() {
        let geometry = PreparedGeometry::from(square(-70.0, -30.0, 4.0));
        let a = Coverer::new(0..=8, Mode::Exterior).unwrap().cover(&geometry);
        let b = Coverer::new(6..=8, Mode::Exterior).unwrap().cover(&geometry);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_geometry_covers_nothing() {
        let coverer = Coverer::new(0..=10, Mode::Exterior).unwrap();
        assert!(coverer.cover(&PreparedGeometry::default()).is_empty());
    }

    #[test]
    fn test_cover_from_initial_cells() {
        let geometry = PreparedGeometry::from(square(2.0, 46.0, 3.0));
        let coverer = Coverer::new(0..=6, Mode::Exterior).unwrap();
        // The square lies on face 2, face 5 is on the other side of the globe
        let cells = coverer.cover_from(&geometry, [CellId::from_face(5)]);
        assert!(cells.is_empty());
        let cells = coverer.cover_from(&geometry, [CellId::from_face(2)]);
        assert_eq!(cells, coverer.cover(&geometry));
    }

    #[test]
    fn test_cover_polygons_unions() {
        let a = square(2.0, 46.0, 1.0);
        let b = square(20.0, -10.0, 1.0);
        let coverer = Coverer::new(0..=8, Mode::Exterior).unwrap();
        let multi = MultiPolygon::new(vec![a.clone(), b.clone()]);
        let union = coverer.cover_polygons(&multi.0);

        let mut expected = coverer.cover(&PreparedGeometry::from(a));
        expected.form_union(coverer.cover(&PreparedGeometry::from(b)));
        assert_eq!(union, expected);
    }
}
