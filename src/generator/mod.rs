//! Per-region pipeline over a working directory.
//!
//! ```text
//! <working directory>/
//!   metadata/regions.json        countries and subdivisions
//!   fragments/<CODE>.json        raw boundary fragments
//!   geometry/<CODE>.json         reconstructed boundary (GeoJSON)
//!   cover/raw/<CODE>.cells       cell identifiers, little-endian u64
//!   cover/compressed/<CODE>.cells.gz
//!   cover/<CODE>.json            cells as GeoJSON, for inspection
//!   index/regions.json           area, bounding box and subdivisions per region
//!   index/cells.json             region codes per aligned cell
//! ```
//!
//! Every stage skips outputs that already exist.

mod cover;
mod geometry;
mod index;
mod tasks;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};

use crate::models::{filter_regions, flat_regions, Region, RegionCode};

pub use index::{CellIndex, RegionIndex, RegionMetadata, ALIGNED_LEVEL};
pub use tasks::TaskLimiter;

pub struct Generator {
    working_directory: PathBuf,
    countries: Vec<Region>,
    limiter: TaskLimiter,
}

impl Generator {
    pub fn new(working_directory: impl Into<PathBuf>, countries: Vec<Region>, limiter: TaskLimiter) -> Self {
        Self {
            working_directory: working_directory.into(),
            countries,
            limiter,
        }
    }

    /// Load `metadata/regions.json`, keeping only the requested regions (all when empty).
    pub fn load(
        working_directory: impl Into<PathBuf>,
        include: &[RegionCode],
        limiter: TaskLimiter,
    ) -> Result<Self> {
        let working_directory = working_directory.into();
        let metadata_file = working_directory.join("metadata").join("regions.json");
        let countries: Vec<Region> = read_json(&metadata_file)?;
        let countries = filter_regions(countries, include);
        info!(
            "Loaded {} countries ({} regions) from {}",
            countries.len(),
            flat_regions(&countries).len(),
            metadata_file.display()
        );
        Ok(Self::new(working_directory, countries, limiter))
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn countries(&self) -> &[Region] {
        &self.countries
    }

    /// Regions owning a boundary: subdivisions, or the country itself when it has none.
    pub fn flat_regions(&self) -> Vec<Region> {
        flat_regions(&self.countries)
    }

    /// Flat regions for which `predicate` holds, in metadata order.
    pub fn regions_matching<F>(&self, predicate: F) -> Vec<Region>
    where
        F: Fn(&Region) -> bool,
    {
        self.flat_regions()
            .into_iter()
            .filter(|region| predicate(region))
            .collect()
    }

    pub fn fragment_file(&self, code: &RegionCode) -> PathBuf {
        self.working_directory
            .join("fragments")
            .join(format!("{}.json", code))
    }

    pub fn geometry_directory(&self) -> PathBuf {
        self.working_directory.join("geometry")
    }

    pub fn geometry_file(&self, code: &RegionCode) -> PathBuf {
        self.geometry_directory().join(format!("{}.json", code))
    }

    pub fn cover_directory(&self) -> PathBuf {
        self.working_directory.join("cover")
    }

    pub fn raw_cell_file(&self, code: &RegionCode) -> PathBuf {
        self.cover_directory()
            .join("raw")
            .join(format!("{}.cells", code))
    }

    pub fn compressed_cell_file(&self, code: &RegionCode) -> PathBuf {
        self.cover_directory()
            .join("compressed")
            .join(format!("{}.cells.gz", code))
    }

    pub fn cover_visualization_file(&self, code: &RegionCode) -> PathBuf {
        self.cover_directory().join(format!("{}.json", code))
    }

    pub fn index_directory(&self) -> PathBuf {
        self.working_directory.join("index")
    }

    pub fn region_index_file(&self) -> PathBuf {
        self.index_directory().join("regions.json")
    }

    pub fn cell_index_file(&self) -> PathBuf {
        self.index_directory().join("cells.json")
    }

    /// Run `job` for every region input on the limiter. All regions run even when
    /// some fail; the failures are logged and reported together afterwards.
    async fn run_stage<J, T, F>(
        &self,
        stage: &str,
        inputs: Vec<(RegionCode, J)>,
        job: F,
    ) -> Result<Vec<T>>
    where
        J: Send + 'static,
        T: Send + 'static,
        F: Fn(&RegionCode, J) -> Result<T> + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let tasks = inputs.into_iter().map(|(code, input)| {
            let job = Arc::clone(&job);
            let limiter = self.limiter.clone();
            async move {
                let task_code = code.clone();
                let result = limiter
                    .run_blocking(move || job(&task_code, input))
                    .await;
                (code, result)
            }
        });

        let mut outputs = Vec::new();
        let mut failed = Vec::new();
        for (code, result) in futures::future::join_all(tasks).await {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    error!("[{}] {} failed: {:#}", code, stage, e);
                    failed.push(code.to_string());
                }
            }
        }

        if !failed.is_empty() {
            bail!(
                "{} failed for {} region(s): {}",
                stage,
                failed.len(),
                failed.join(", ")
            );
        }
        Ok(outputs)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let generator = Generator::new("/data", Vec::new(), TaskLimiter::default());
        let code: RegionCode = "FR-IDF".parse().unwrap();
        assert_eq!(
            generator.fragment_file(&code),
            PathBuf::from("/data/fragments/FR-IDF.json")
        );
        assert_eq!(
            generator.raw_cell_file(&code),
            PathBuf::from("/data/cover/raw/FR-IDF.cells")
        );
        assert_eq!(
            generator.compressed_cell_file(&code),
            PathBuf::from("/data/cover/compressed/FR-IDF.cells.gz")
        );
        assert_eq!(
            generator.cell_index_file(),
            PathBuf::from("/data/index/cells.json")
        );
    }

    #[test]
    fn test_regions_matching() {
        let dir = tempfile::tempdir().unwrap();
        let mut fr = Region::new(2, "FR".parse().unwrap());
        fr.subdivisions = Some(vec![
            Region::new(3, "FR-IDF".parse().unwrap()),
            Region::new(4, "FR-BRE".parse().unwrap()),
        ]);
        let countries = vec![Region::new(1, "CH".parse().unwrap()), fr];
        let generator = Generator::new(dir.path(), countries, TaskLimiter::default());

        ensure_directory(&generator.geometry_directory()).unwrap();
        fs::write(generator.geometry_file(&"FR-IDF".parse().unwrap()), "{}").unwrap();

        let missing: Vec<String> = generator
            .regions_matching(|region| !generator.geometry_file(&region.code).exists())
            .iter()
            .map(|region| region.code.to_string())
            .collect();
        assert_eq!(missing, vec!["CH", "FR-BRE"]);
        assert_eq!(generator.regions_matching(|_| true).len(), 3);
    }

    #[tokio::test]
    async fn test_stage_reports_failures_after_all_regions() {
        let countries = vec![
            Region::new(1, "CH".parse().unwrap()),
            Region::new(2, "LI".parse().unwrap()),
            Region::new(3, "AT".parse().unwrap()),
        ];
        let generator = Generator::new("/data", countries, TaskLimiter::new(2));
        let inputs = || {
            generator
                .flat_regions()
                .into_iter()
                .map(|region| (region.code, region.id))
                .collect::<Vec<_>>()
        };

        let err = generator
            .run_stage("test", inputs(), |code, id| {
                if code.country() == "LI" {
                    bail!("no data");
                }
                Ok(id)
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "test failed for 1 region(s): LI");

        let mut ids = generator
            .run_stage("test", inputs(), |_, id| Ok(id))
            .await
            .unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
