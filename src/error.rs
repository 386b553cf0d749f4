//! Error types for geometry reconstruction and covering.

use geo::LineString;
use thiserror::Error;

/// Topology errors raised while closing the boundary of one region.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// Some endpoint nodes are not shared by exactly two open segments.
    #[error("Unpaired nodes exist: {nodes:?}")]
    UnpairedNodeExists { nodes: Vec<u64> },

    /// Concatenation ran out of partners before the ring closed.
    #[error("Segment {segment} is open at node {node}")]
    OpenSegmentExists { segment: u64, node: u64 },

    /// Inner rings not contained by any outer ring.
    #[error("{} inner ring(s) are not owned by any outer ring", .rings.len())]
    UnownedInnerRing { rings: Vec<LineString<f64>> },
}

/// Covering errors.
#[derive(Error, Debug)]
pub enum CoverError {
    #[error("Level {level} is out of range, the deepest searchable level is {max}")]
    LevelOutOfRange { level: u8, max: u8 },

    #[error("Invalid level range {lower}..={upper}")]
    InvalidLevelRange { lower: u8, upper: u8 },

    #[error("Malformed cell data: {len} bytes is not a multiple of 8")]
    MalformedCellData { len: usize },

    #[error("Invalid cell identifier {0:#018x}")]
    InvalidCell(u64),
}
