use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::table::GeometryTable;
use crate::error::GeometryError;
use crate::models::Fragment;

/// Which coastline fragments to leave out of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoastlineOmission {
    /// Every coastline fragment
    All,
    /// Coastline chains that do not connect back to the boundary
    Open,
}

impl FromStr for CoastlineOmission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(CoastlineOmission::All),
            "open" => Ok(CoastlineOmission::Open),
            _ => Err(format!("unknown coastline omission: {}", s)),
        }
    }
}

impl fmt::Display for CoastlineOmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoastlineOmission::All => write!(f, "all"),
            CoastlineOmission::Open => write!(f, "open"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub omit_coastlines: Option<CoastlineOmission>,

    /// Fragment ids to ignore
    pub omit_segments: BTreeSet<u64>,

    /// Drop inner rings outside every outer ring instead of failing
    pub allow_unowned_inners: bool,

    /// Close the boundary over the south pole
    pub antarctic: bool,
}

/// Reassembles boundary fragments into polygons with holes.
#[derive(Debug, Clone, Default)]
pub struct RingBuilder {
    options: BuildOptions,
}

impl RingBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    fn accepts(&self, fragment: &Fragment) -> bool {
        if !fragment.is_well_formed() || self.options.omit_segments.contains(&fragment.id) {
            return false;
        }
        !(fragment.coastline && self.options.omit_coastlines == Some(CoastlineOmission::All))
    }

    pub fn build(&self, fragments: &[Fragment]) -> Result<MultiPolygon<f64>, GeometryError> {
        let mut table = GeometryTable::new();
        for fragment in fragments.iter().filter(|f| self.accepts(f)) {
            table.insert(fragment);
        }

        if self.options.antarctic {
            if let Some(id) = table.connect_across_antimeridian() {
                debug!("Bridged the antimeridian with segment {}", id);
            }
        }

        if self.options.omit_coastlines == Some(CoastlineOmission::Open) {
            let removed = table.prune_open_coastlines();
            if removed > 0 {
                debug!("Pruned {} open coastline segments", removed);
            }
        }

        let unpaired = table.unpaired_nodes();
        if !unpaired.is_empty() {
            return Err(GeometryError::UnpairedNodeExists { nodes: unpaired });
        }

        debug!("Concatenating {} open segments", table.segment_count());
        table.close_rings()?;

        let polygons = table.build_polygons();
        if !table.inner_rings.is_empty() {
            if !self.options.allow_unowned_inners {
                return Err(GeometryError::UnownedInnerRing {
                    rings: std::mem::take(&mut table.inner_rings),
                });
            }
            warn!("Dropping {} unowned inner rings", table.inner_rings.len());
        }

        Ok(MultiPolygon::new(polygons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use geo::{Coord, LineString};

    fn fragment(id: u64, nodes: &[u64], coords: &[(f64, f64)]) -> Fragment {
        Fragment {
            id,
            nodes: nodes.to_vec(),
            geometry: coords
                .iter()
                .map(|&(lon, lat)| GeoPoint { lat, lon })
                .collect(),
            inner: false,
            coastline: false,
        }
    }

    fn closed(id: u64, first_node: u64, coords: &[(f64, f64)], inner: bool) -> Fragment {
        let mut nodes: Vec<u64> = (first_node..first_node + coords.len() as u64).collect();
        let mut coords = coords.to_vec();
        nodes.push(first_node);
        coords.push(coords[0]);
        let mut fragment = fragment(id, &nodes, &coords);
        fragment.inner = inner;
        fragment
    }

    fn square(x: f64, y: f64, size: f64) -> Vec<(f64, f64)> {
        vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]
    }

    #[test]
    fn test_closed_fragments_unchanged() {
        let a = closed(1, 100, &square(0.0, 0.0, 1.0), false);
        let b = closed(2, 200, &square(5.0, 5.0, 2.0), false);
        let result = RingBuilder::default().build(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(result.0.len(), 2);
        assert_eq!(result.0[0].exterior(), &LineString::new(a.coords()));
        assert_eq!(result.0[1].exterior(), &LineString::new(b.coords()));
        assert!(result.0.iter().all(|p| p.interiors().is_empty()));
    }

    #[test]
    fn test_split_ring_reassembles() {
        let fragments = vec![
            fragment(3, &[1, 2, 3], &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            fragment(4, &[5, 4, 3], &[(2.0, 2.0), (2.0, 1.0), (2.0, 0.0)]),
            fragment(5, &[5, 6, 1], &[(2.0, 2.0), (0.0, 2.0), (0.0, 0.0)]),
        ];
        let result = RingBuilder::default().build(&fragments).unwrap();
        assert_eq!(result.0.len(), 1);
        let ring = result.0[0].exterior();
        assert!(ring.is_closed());
        assert_eq!(ring.0.len(), 7);
    }

    #[test]
    fn test_unpaired_node_fails() {
        let fragments = vec![
            fragment(1, &[1, 2], &[(0.0, 0.0), (1.0, 0.0)]),
            fragment(2, &[2, 3], &[(1.0, 0.0), (1.0, 1.0)]),
        ];
        let err = RingBuilder::default().build(&fragments).unwrap_err();
        match err {
            GeometryError::UnpairedNodeExists { nodes } => assert_eq!(nodes, vec![1, 3]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inner_ring_attached_to_owner() {
        let fragments = vec![
            closed(1, 100, &square(0.0, 0.0, 10.0), false),
            closed(2, 200, &square(20.0, 0.0, 10.0), false),
            closed(3, 300, &square(22.0, 2.0, 1.0), true),
        ];
        let result = RingBuilder::default().build(&fragments).unwrap();
        assert!(result.0[0].interiors().is_empty());
        assert_eq!(result.0[1].interiors().len(), 1);
        assert_eq!(
            result.0[1].interiors()[0].0[0],
            Coord { x: 22.0, y: 2.0 }
        );
    }

    #[test]
    fn test_unowned_inner_ring() {
        let fragments = vec![
            closed(1, 100, &square(0.0, 0.0, 10.0), false),
            closed(2, 200, &square(50.0, 50.0, 1.0), true),
        ];
        let err = RingBuilder::default().build(&fragments).unwrap_err();
        assert!(matches!(err, GeometryError::UnownedInnerRing { ref rings } if rings.len() == 1));

        let builder = RingBuilder::new(BuildOptions {
            allow_unowned_inners: true,
            ..Default::default()
        });
        let result = builder.build(&fragments).unwrap();
        assert_eq!(result.0.len(), 1);
        assert!(result.0[0].interiors().is_empty());
    }

    #[test]
    fn test_omissions() {
        let mut coast = fragment(7, &[2, 9], &[(1.0, 0.0), (3.0, 3.0)]);
        coast.coastline = true;
        let fragments = vec![
            fragment(1, &[1, 2], &[(0.0, 0.0), (1.0, 0.0)]),
            fragment(2, &[2, 3, 1], &[(1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            coast,
            fragment(8, &[40, 41], &[(5.0, 5.0), (6.0, 6.0)]),
        ];

        // The stray fragment 8 and the dangling coastline break the ring
        assert!(RingBuilder::default().build(&fragments).is_err());

        let options = BuildOptions {
            omit_coastlines: Some(CoastlineOmission::Open),
            omit_segments: [8].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(RingBuilder::new(options).build(&fragments).unwrap().0.len(), 1);

        let options = BuildOptions {
            omit_coastlines: Some(CoastlineOmission::All),
            omit_segments: [8].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(RingBuilder::new(options).build(&fragments).unwrap().0.len(), 1);
    }

    #[test]
    fn test_malformed_fragments_skipped() {
        let mut broken = fragment(9, &[1, 2, 3], &[(0.0, 0.0), (1.0, 0.0)]);
        broken.nodes.push(4);
        let single = fragment(10, &[5], &[(0.0, 0.0)]);
        let result = RingBuilder::default()
            .build(&[broken, single, closed(1, 100, &square(0.0, 0.0, 1.0), false)])
            .unwrap();
        assert_eq!(result.0.len(), 1);
    }

    #[test]
    fn test_coastline_omission_parse() {
        assert_eq!("open".parse(), Ok(CoastlineOmission::Open));
        assert_eq!("ALL".parse(), Ok(CoastlineOmission::All));
        assert!("some".parse::<CoastlineOmission>().is_err());
        let options: BuildOptions =
            serde_json::from_str(r#"{"omit_coastlines":"open","omit_segments":[3]}"#).unwrap();
        assert_eq!(options.omit_coastlines, Some(CoastlineOmission::Open));
        assert!(!options.allow_unowned_inners);
    }
}
