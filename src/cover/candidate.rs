use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use super::relation::{CellRelation, PreparedGeometry};
use crate::sphere::CellId;

/// A cell under evaluation, with its children classified against the geometry.
/// Disjoint children are dropped.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub cell: CellId,
    pub intersected: Vec<CellId>,
    pub contained: Vec<CellId>,
}

impl Candidate {
    pub fn new(cell: CellId, geometry: &PreparedGeometry) -> Self {
        let mut intersected = Vec::new();
        let mut contained = Vec::new();
        for child in cell.children() {
            match geometry.relation(child) {
                CellRelation::Intersect => intersected.push(child),
                CellRelation::Contain => contained.push(child),
                CellRelation::Disjoint => {}
            }
        }
        Self {
            cell,
            intersected,
            contained,
        }
    }

    /// Smaller is processed first: shallow cells, then fewer intersected and
    /// fewer contained children.
    pub fn priority(&self) -> u32 {
        ((self.cell.level() as u32) << 6)
            + ((self.intersected.len() as u32) << 3)
            + self.contained.len() as u32
    }

    /// Contained children weigh twice as much as intersected ones.
    pub fn covers_more_than_half(&self) -> bool {
        self.intersected.len() + 2 * self.contained.len() >= 4
    }
}

struct QueueEntry {
    priority: u32,
    sequence: u64,
    candidate: Candidate,
}

impl QueueEntry {
    fn key(&self) -> (u32, u64) {
        (self.priority, self.sequence)
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Min-priority queue of candidates; equal priorities pop in insertion order.
#[derive(Default)]
pub struct CandidateQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    sequence: u64,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: Candidate) {
        let entry = QueueEntry {
            priority: candidate.priority(),
            sequence: self.sequence,
            candidate,
        };
        self.sequence += 1;
        self.heap.push(Reverse(entry));
    }

    pub fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop().map(|Reverse(entry)| entry.candidate)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
