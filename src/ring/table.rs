//! Working state for closing the boundary of one region.
//!
//! Open segments are stored by id and indexed by their endpoint nodes. Walking
//! the endpoint index consumes segments, so every segment ends up in exactly one
//! ring.

use geo::{Coord, Intersects, LineString, Polygon};
use hashbrown::{HashMap, HashSet};

use crate::error::GeometryError;
use crate::models::Fragment;

/// Preferred id of the segment bridging the antimeridian over the south pole.
/// The next free id is used when a fragment already holds it.
pub const ANTARCTIC_SEGMENT_ID: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Inner,
    Outer,
}

/// A directed polyline between two endpoint nodes.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: u64,
    pub role: Role,
    pub start: u64,
    pub end: u64,
    pub line: Vec<Coord<f64>>,
}

impl Segment {
    pub fn is_closed(&self) -> bool {
        self.start == self.end
    }

    fn ring(self) -> LineString<f64> {
        let mut ring = LineString::new(self.line);
        ring.close();
        ring
    }
}

#[derive(Debug, Default)]
pub struct GeometryTable {
    segments: HashMap<u64, Segment>,
    endpoints: HashMap<u64, HashSet<u64>>,
    coastlines: HashSet<u64>,
    pub outer_rings: Vec<LineString<f64>>,
    pub inner_rings: Vec<LineString<f64>>,
}

impl GeometryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// File a well-formed fragment: closed ones become rings right away, open
    /// ones are indexed at both endpoints.
    pub fn insert(&mut self, fragment: &Fragment) {
        let role = if fragment.inner {
            Role::Inner
        } else {
            Role::Outer
        };
        let (Some(start), Some(end)) = (fragment.start_node(), fragment.end_node()) else {
            return;
        };

        if fragment.is_closed() {
            self.file_ring(role, LineString::new(fragment.coords()));
            return;
        }

        if fragment.coastline {
            self.coastlines.insert(fragment.id);
        }
        self.insert_segment(Segment {
            id: fragment.id,
            role,
            start,
            end,
            line: fragment.coords(),
        });
    }

    fn insert_segment(&mut self, segment: Segment) {
        self.insert_node(segment.start, segment.id);
        self.insert_node(segment.end, segment.id);
        self.segments.insert(segment.id, segment);
    }

    fn insert_node(&mut self, node: u64, segment: u64) {
        self.endpoints.entry(node).or_default().insert(segment);
    }

    fn file_ring(&mut self, role: Role, mut ring: LineString<f64>) {
        ring.close();
        match role {
            Role::Inner => self.inner_rings.push(ring),
            Role::Outer => self.outer_rings.push(ring),
        }
    }

    /// Close a boundary that stops at the antimeridian on both sides by joining
    /// its westmost and eastmost endpoints along the south pole.
    ///
    /// Returns the id of the bridging segment, or `None` when there is nothing
    /// to bridge.
    pub fn connect_across_antimeridian(&mut self) -> Option<u64> {
        let mut ids: Vec<u64> = self.segments.keys().copied().collect();
        ids.sort_unstable();

        let first = ids.first().and_then(|id| self.segments.get(id))?;
        let &first_coord = first.line.first()?;
        let mut west = (first.start, first_coord);
        let mut east = west;

        for id in &ids {
            let segment = &self.segments[id];
            let ends = [
                (segment.start, segment.line.first()),
                (segment.end, segment.line.last()),
            ];
            for (node, coord) in ends {
                let Some(&coord) = coord else {
                    continue;
                };
                if coord.x < west.1.x {
                    west = (node, coord);
                } else if coord.x > east.1.x {
                    east = (node, coord);
                }
            }
        }

        let id = (ANTARCTIC_SEGMENT_ID..=u64::MAX).find(|id| !self.segments.contains_key(id))?;
        self.insert_segment(Segment {
            id,
            role: Role::Outer,
            start: west.0,
            end: east.0,
            line: vec![
                west.1,
                Coord { x: -180.0, y: -90.0 },
                Coord { x: 180.0, y: -90.0 },
                east.1,
            ],
        });
        Some(id)
    }

    fn degree(&self, node: u64) -> usize {
        self.endpoints.get(&node).map_or(0, |segments| segments.len())
    }

    /// Drop coastline segments with a dangling endpoint until none is left.
    ///
    /// Returns the number of removed segments.
    pub fn prune_open_coastlines(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let mut coastlines: Vec<u64> = self.coastlines.iter().copied().collect();
            coastlines.sort_unstable();

            let mut modified = false;
            for id in coastlines {
                let Some(segment) = self.segments.get(&id) else {
                    self.coastlines.remove(&id);
                    continue;
                };
                let (start, end) = (segment.start, segment.end);
                if self.degree(start) != 1 && self.degree(end) != 1 {
                    continue;
                }

                self.segments.remove(&id);
                self.coastlines.remove(&id);
                for node in [start, end] {
                    if let Some(segments) = self.endpoints.get_mut(&node) {
                        segments.remove(&id);
                        if segments.is_empty() {
                            self.endpoints.remove(&node);
                        }
                    }
                }
                removed += 1;
                modified = true;
            }

            if !modified {
                return removed;
            }
        }
    }

    /// Endpoint nodes not shared by exactly two segments, ascending.
    pub fn unpaired_nodes(&self) -> Vec<u64> {
        let mut nodes: Vec<u64> = self
            .endpoints
            .iter()
            .filter(|(_, segments)| segments.len() != 2)
            .map(|(&node, _)| node)
            .collect();
        nodes.sort_unstable();
        nodes
    }

    /// Remaining segment ids in consumption order: popping from the back yields
    /// non-coastline outer segments with the highest ids first and coastline
    /// segments last.
    pub fn concatenation_queue(&self) -> Vec<u64> {
        let mut queue: Vec<u64> = self.segments.keys().copied().collect();
        queue.sort_unstable_by_key(|id| {
            let segment = &self.segments[id];
            (
                !self.coastlines.contains(id),
                segment.role == Role::Outer,
                *id,
            )
        });
        queue
    }

    /// Walk the endpoint index from `segment_id` until the ring closes.
    ///
    /// Returns `None` when the segment was already consumed by an earlier walk.
    pub fn concatenate(&mut self, segment_id: u64) -> Result<Option<Segment>, GeometryError> {
        let Some(mut segment) = self.segments.remove(&segment_id) else {
            return Ok(None);
        };

        let mut last_id = segment.id;
        while !segment.is_closed() {
            let next = self
                .pop_partner(last_id, segment.end)
                .and_then(|id| self.segments.remove(&id));
            let Some(next) = next else {
                return Err(GeometryError::OpenSegmentExists {
                    segment: segment.id,
                    node: segment.end,
                });
            };

            if segment.end == next.start {
                segment.line.extend(next.line.iter().skip(1));
                segment.end = next.end;
            } else {
                let take = next.line.len().saturating_sub(1);
                segment.line.extend(next.line[..take].iter().rev());
                segment.end = next.start;
            }
            last_id = next.id;
        }

        Ok(Some(segment))
    }

    /// Take the endpoint entry of `node` and return the segment other than `segment`.
    fn pop_partner(&mut self, segment: u64, node: u64) -> Option<u64> {
        let mut pair = self.endpoints.remove(&node)?;
        pair.remove(&segment);
        pair.into_iter().next()
    }

    /// Concatenate every remaining segment and file the resulting rings.
    pub fn close_rings(&mut self) -> Result<(), GeometryError> {
        let mut queue = self.concatenation_queue();
        while let Some(id) = queue.pop() {
            if let Some(segment) = self.concatenate(id)? {
                let role = segment.role;
                self.file_ring(role, segment.ring());
            }
        }
        Ok(())
    }

    /// Pair every outer ring with the inner rings it owns. Owned inner rings are
    /// taken out of `inner_rings`; whatever stays there has no owner.
    pub fn build_polygons(&mut self) -> Vec<Polygon<f64>> {
        let outer_rings = std::mem::take(&mut self.outer_rings);
        outer_rings
            .into_iter()
            .map(|outer| {
                if self.inner_rings.is_empty() {
                    return Polygon::new(outer, vec![]);
                }

                let shell = Polygon::new(outer, vec![]);
                let (owned, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.inner_rings)
                    .into_iter()
                    .partition(|inner| inner.coords().any(|coord| shell.intersects(coord)));
                self.inner_rings = rest;

                let (exterior, _) = shell.into_inner();
                Polygon::new(exterior, owned)
            })
            .collect()
    }
}
