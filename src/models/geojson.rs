//! GeoJSON rendering of multipolygons.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

/// A GeoJSON `MultiPolygon` geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonMultiPolygon {
    #[serde(rename = "type")]
    pub geo_type: String,

    /// Polygons, then rings (outer first), then `[lon, lat]` positions
    pub coordinates: Vec<Vec<Vec<[f64; 2]>>>,
}

fn ring_positions(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    let mut positions: Vec<[f64; 2]> = ring.coords().map(|c| [c.x, c.y]).collect();
    if positions.len() > 1 && positions.first() != positions.last() {
        positions.push(positions[0]);
    }
    positions
}

fn ring_from_positions(positions: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(
        positions
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect(),
    )
}

impl From<&MultiPolygon<f64>> for GeoJsonMultiPolygon {
    fn from(multi_polygon: &MultiPolygon<f64>) -> Self {
        let coordinates = multi_polygon
            .iter()
            .map(|polygon| {
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(ring_positions)
                    .collect()
            })
            .collect();

        Self {
            geo_type: "MultiPolygon".to_string(),
            coordinates,
        }
    }
}

impl From<&GeoJsonMultiPolygon> for MultiPolygon<f64> {
    fn from(document: &GeoJsonMultiPolygon) -> Self {
        let polygons = document
            .coordinates
            .iter()
            .filter_map(|rings| {
                let (exterior, interiors) = rings.split_first()?;
                Some(Polygon::new(
                    ring_from_positions(exterior),
                    interiors.iter().map(|r| ring_from_positions(r)).collect(),
                ))
            })
            .collect();
        MultiPolygon::new(polygons)
    }
}
