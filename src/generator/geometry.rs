use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{ensure_directory, read_json, write_json, Generator};
use crate::models::{Fragment, GeoJsonMultiPolygon, RegionCode};
use crate::ring::{BuildOptions, RingBuilder};

/// Antarctica is closed over the south pole from its coastline alone, so the
/// options given for every other region do not apply to it.
fn region_options(code: &RegionCode, options: &BuildOptions) -> BuildOptions {
    if code.is_antarctica() {
        BuildOptions {
            antarctic: true,
            ..Default::default()
        }
    } else {
        options.clone()
    }
}

struct GeometryJob {
    fragment_file: PathBuf,
    geometry_file: PathBuf,
}

impl Generator {
    /// Build `geometry/<CODE>.json` for every region missing one.
    pub async fn ensure_geometries(&self, options: &BuildOptions) -> Result<()> {
        ensure_directory(&self.geometry_directory())?;

        let mut inputs = Vec::new();
        for region in self.flat_regions() {
            let geometry_file = self.geometry_file(&region.code);
            if geometry_file.exists() {
                debug!("[{}] Geometry exists, skipping", region.code);
                continue;
            }
            let job = GeometryJob {
                fragment_file: self.fragment_file(&region.code),
                geometry_file,
            };
            inputs.push((region.code, job));
        }
        info!("Building geometry for {} regions", inputs.len());

        let options = options.clone();
        self.run_stage("Geometry", inputs, move |code, job| {
            let start = Instant::now();
            let fragments: Vec<Fragment> = read_json(&job.fragment_file)?;
            let builder = RingBuilder::new(region_options(code, &options));
            let geometry = builder
                .build(&fragments)
                .with_context(|| format!("Failed to close the boundary of {}", code))?;

            write_json(&job.geometry_file, &GeoJsonMultiPolygon::from(&geometry))?;
            info!(
                "[{}] Built {} polygons from {} fragments in {:?}",
                code,
                geometry.0.len(),
                fragments.len(),
                start.elapsed()
            );
            Ok(())
        })
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::ring::CoastlineOmission;

    fn coastline(id: u64, nodes: [u64; 2], coords: [(f64, f64); 2]) -> Fragment {
        Fragment {
            id,
            nodes: nodes.to_vec(),
            geometry: coords
                .iter()
                .map(|&(lon, lat)| GeoPoint { lat, lon })
                .collect(),
            inner: false,
            coastline: true,
        }
    }

    #[test]
    fn test_region_options() {
        let options = BuildOptions {
            omit_coastlines: Some(CoastlineOmission::All),
            omit_segments: [1, 2].into_iter().collect(),
            allow_unowned_inners: true,
            antarctic: false,
        };

        let aq = region_options(&"AQ".parse().unwrap(), &options);
        assert_eq!(
            aq,
            BuildOptions {
                antarctic: true,
                ..Default::default()
            }
        );
        assert_eq!(region_options(&"CH".parse().unwrap(), &options), options);
        assert_eq!(region_options(&"FR-IDF".parse().unwrap(), &options), options);
    }

    #[test]
    fn test_antarctica_ignores_coastline_omission() {
        let fragments = vec![
            coastline(1, [1, 2], [(-180.0, -70.0), (0.0, -65.0)]),
            coastline(2, [2, 3], [(0.0, -65.0), (180.0, -70.0)]),
        ];
        let options = BuildOptions {
            omit_coastlines: Some(CoastlineOmission::All),
            ..Default::default()
        };

        let geometry = RingBuilder::new(region_options(&"AQ".parse().unwrap(), &options))
            .build(&fragments)
            .unwrap();
        assert_eq!(geometry.0.len(), 1);

        // Other regions lose every coastline fragment
        let geometry = RingBuilder::new(region_options(&"NZ".parse().unwrap(), &options))
            .build(&fragments)
            .unwrap();
        assert!(geometry.0.is_empty());
    }
}
