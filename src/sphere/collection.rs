//! Ordered sets of cells.

use std::collections::BTreeSet;

use super::cell::CellId;
use super::coords::{EARTH_RADIUS_KM, MAX_LEVEL};
use crate::error::CoverError;

/// A set of cells, iterated in ascending identifier order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellCollection {
    cells: BTreeSet<CellId>,
}

impl CellCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cell: CellId) -> bool {
        self.cells.insert(cell)
    }

    /// Add every cell of `other` to this collection.
    pub fn form_union(&mut self, other: CellCollection) {
        self.cells.extend(other.cells);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.iter().copied()
    }

    /// Whether `cell` is in the collection, exactly or through one of its ancestors.
    pub fn contains(&self, cell: CellId) -> bool {
        (0..=cell.level()).any(|level| self.cells.contains(&cell.parent(level)))
    }

    /// Every cell replaced by its ancestor at `level`; coarser cells are expanded
    /// into their descendants at `level`.
    pub fn aligned(&self, level: u8) -> CellCollection {
        let mut aligned = CellCollection::new();
        for cell in self.iter() {
            if cell.level() >= level {
                aligned.insert(cell.parent(level));
                continue;
            }
            let mut frontier = vec![cell];
            while let Some(current) = frontier.pop() {
                if current.level() == level {
                    aligned.insert(current);
                } else {
                    frontier.extend(current.children());
                }
            }
        }
        aligned
    }

    /// Replace every complete group of four siblings by their parent, repeatedly,
    /// without producing cells coarser than `min_level`.
    pub fn normalized(&self, min_level: u8) -> CellCollection {
        let mut cells = self.cells.clone();
        for level in (min_level + 1..=MAX_LEVEL).rev() {
            let parents: BTreeSet<CellId> = cells
                .iter()
                .filter(|cell| cell.level() == level)
                .map(|cell| cell.parent(level - 1))
                .collect();
            for parent in parents {
                let children = parent.children();
                if children.iter().all(|child| cells.contains(child)) {
                    for child in children {
                        cells.remove(&child);
                    }
                    cells.insert(parent);
                }
            }
        }
        CellCollection { cells }
    }

    /// Total area covered, in square kilometres. Overlapping cells are counted twice.
    pub fn area_km2(&self) -> f64 {
        self.iter().map(|cell| cell.area()).sum::<f64>() * EARTH_RADIUS_KM * EARTH_RADIUS_KM
    }

    /// Raw little-endian identifiers, ascending, no header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.cells.len() * 8);
        for cell in &self.cells {
            bytes.extend_from_slice(&cell.id().to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoverError> {
        if bytes.len() % 8 != 0 {
            return Err(CoverError::MalformedCellData { len: bytes.len() });
        }
        let mut collection = CellCollection::new();
        for chunk in bytes.chunks_exact(8) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            let cell = CellId(u64::from_le_bytes(raw));
            if !cell.is_valid() {
                return Err(CoverError::InvalidCell(cell.id()));
            }
            collection.insert(cell);
        }
        Ok(collection)
    }
}

impl FromIterator<CellId> for CellCollection {
    fn from_iter<I: IntoIterator<Item = CellId>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Extend<CellId> for CellCollection {
    fn extend<I: IntoIterator<Item = CellId>>(&mut self, iter: I) {
        self.cells.extend(iter);
    }
}

impl IntoIterator for CellCollection {
    type Item = CellId;
    type IntoIter = std::collections::btree_set::IntoIter<CellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(face: u8, path: &[usize]) -> CellId {
        path.iter()
            .fold(CellId::from_face(face), |cell, &k| cell.children()[k])
    }

    #[test]
    fn test_contains_through_ancestor() {
        let collection: CellCollection = [cell(1, &[2])].into_iter().collect();
        assert!(collection.contains(cell(1, &[2, 0, 3])));
        assert!(collection.contains(cell(1, &[2])));
        assert!(!collection.contains(cell(1, &[1, 0])));
        assert!(!collection.contains(cell(1, &[])));
    }

    #[test]
    fn test_union_collapses_duplicates() {
        let mut a: CellCollection = [cell(0, &[1]), cell(0, &[2])].into_iter().collect();
        let b: CellCollection = [cell(0, &[2]), cell(4, &[])].into_iter().collect();
        a.form_union(b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_aligned() {
        let collection: CellCollection = [cell(2, &[0, 1, 3]), cell(2, &[0, 1, 2]), cell(5, &[])]
            .into_iter()
            .collect();
        let aligned = collection.aligned(1);
        let expected: CellCollection = std::iter::once(cell(2, &[0]))
            .chain(cell(5, &[]).children())
            .collect();
        assert_eq!(aligned, expected);
    }

    #[test]
    fn test_normalized_merges_complete_siblings() {
        let parent = cell(3, &[1, 1]);
        let mut collection: CellCollection = parent.children().into_iter().collect();
        collection.insert(cell(3, &[1, 0, 2]));
        let normalized = collection.normalized(0);
        let expected: CellCollection = [parent, cell(3, &[1, 0, 2])].into_iter().collect();
        assert_eq!(normalized, expected);

        // Never coarser than the requested level
        assert_eq!(collection.normalized(3), collection);
    }

    #[test]
    fn test_bytes_round_trip() {
        let collection: CellCollection = [cell(0, &[3, 3]), cell(2, &[1])].into_iter().collect();
        let bytes = collection.to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(CellCollection::from_bytes(&bytes).unwrap(), collection);
        assert!(matches!(
            CellCollection::from_bytes(&bytes[..9]),
            Err(CoverError::MalformedCellData { len: 9 })
        ));
    }
}
