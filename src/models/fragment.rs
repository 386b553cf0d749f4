//! Raw boundary fragments as supplied by the boundary data source.

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl From<GeoPoint> for Coord<f64> {
    fn from(point: GeoPoint) -> Self {
        Coord {
            x: point.lon,
            y: point.lat,
        }
    }
}

impl From<Coord<f64>> for GeoPoint {
    fn from(coord: Coord<f64>) -> Self {
        GeoPoint {
            lat: coord.y,
            lon: coord.x,
        }
    }
}

/// One way of a boundary relation: a polyline between two endpoint nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: u64,

    /// Node ids, one per coordinate
    pub nodes: Vec<u64>,

    pub geometry: Vec<GeoPoint>,

    /// Member of the relation with the `inner` role
    #[serde(default)]
    pub inner: bool,

    /// Tagged `natural=coastline`
    #[serde(default)]
    pub coastline: bool,
}

impl Fragment {
    /// Node and coordinate lists agree and hold at least two entries.
    pub fn is_well_formed(&self) -> bool {
        self.nodes.len() == self.geometry.len() && self.nodes.len() > 1
    }

    /// Starts and ends at the same node.
    pub fn is_closed(&self) -> bool {
        self.nodes.first() == self.nodes.last()
    }

    pub fn start_node(&self) -> Option<u64> {
        self.nodes.first().copied()
    }

    pub fn end_node(&self) -> Option<u64> {
        self.nodes.last().copied()
    }

    pub fn coords(&self) -> Vec<Coord<f64>> {
        self.geometry.iter().map(|&point| point.into()).collect()
    }
}

/// Bounding box, serialized GeoJSON style as `[west, south, east, north]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct GeoBbox {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl GeoBbox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            south_west: GeoPoint {
                lat: min_lat,
                lon: min_lon,
            },
            north_east: GeoPoint {
                lat: max_lat,
                lon: max_lon,
            },
        }
    }

    /// Smallest box holding every box of the iterator, `None` when it is empty.
    pub fn enclosing<I: IntoIterator<Item = GeoBbox>>(boxes: I) -> Option<GeoBbox> {
        boxes.into_iter().reduce(|a, b| {
            GeoBbox::new(
                a.south_west.lon.min(b.south_west.lon),
                a.south_west.lat.min(b.south_west.lat),
                a.north_east.lon.max(b.north_east.lon),
                a.north_east.lat.max(b.north_east.lat),
            )
        })
    }
}

impl From<Rect<f64>> for GeoBbox {
    fn from(rect: Rect<f64>) -> Self {
        GeoBbox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<[f64; 4]> for GeoBbox {
    fn from([west, south, east, north]: [f64; 4]) -> Self {
        GeoBbox::new(west, south, east, north)
    }
}

impl From<GeoBbox> for [f64; 4] {
    fn from(bbox: GeoBbox) -> Self {
        [
            bbox.south_west.lon,
            bbox.south_west.lat,
            bbox.north_east.lon,
            bbox.north_east.lat,
        ]
    }
}
