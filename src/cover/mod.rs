//! Covering polygons with cells.

mod candidate;
mod coverer;
mod relation;

pub use candidate::{Candidate, CandidateQueue};
pub use coverer::{Coverer, Mode};
pub use relation::{CellRelation, PreparedGeometry};
