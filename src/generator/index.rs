use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use geo::{BoundingRect, MultiPolygon};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ensure_directory, read_json, write_json, Generator};
use crate::models::{GeoBbox, GeoJsonMultiPolygon, RegionCode};
use crate::sphere::{CellCollection, CellId};

/// Level the cell index is keyed at.
pub const ALIGNED_LEVEL: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMetadata {
    /// Covered area in square kilometres
    pub area: f64,

    pub bbox: GeoBbox,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivisions: Option<BTreeMap<RegionCode, RegionMetadata>>,

    #[serde(skip)]
    pub cells: BTreeSet<CellId>,
}

pub type RegionIndex = BTreeMap<RegionCode, RegionMetadata>;

/// Region codes per aligned cell, keyed by cell token.
pub type CellIndex = BTreeMap<String, BTreeSet<RegionCode>>;

struct RegionFiles {
    raw_file: PathBuf,
    geometry_file: PathBuf,
}

struct IndexJob {
    country: RegionFiles,
    subdivisions: Option<Vec<(RegionCode, RegionFiles)>>,
}

impl RegionMetadata {
    fn load(files: &RegionFiles) -> Result<Self> {
        let data = fs::read(&files.raw_file)
            .with_context(|| format!("Failed to read {}", files.raw_file.display()))?;
        let cells = CellCollection::from_bytes(&data)
            .with_context(|| format!("Failed to decode {}", files.raw_file.display()))?;

        let document: GeoJsonMultiPolygon = read_json(&files.geometry_file)?;
        let bbox = MultiPolygon::from(&document)
            .bounding_rect()
            .map(GeoBbox::from)
            .with_context(|| format!("Empty geometry in {}", files.geometry_file.display()))?;

        Ok(Self {
            area: cells.area_km2(),
            bbox,
            subdivisions: None,
            cells: cells.aligned(ALIGNED_LEVEL).iter().collect(),
        })
    }

    fn from_subdivisions(subdivisions: BTreeMap<RegionCode, RegionMetadata>) -> Result<Self> {
        let area = subdivisions.values().map(|s| s.area).sum();
        let bbox = GeoBbox::enclosing(subdivisions.values().map(|s| s.bbox))
            .context("Country without subdivisions")?;
        Ok(Self {
            area,
            bbox,
            subdivisions: Some(subdivisions),
            cells: BTreeSet::new(),
        })
    }
}

impl IndexJob {
    fn run(self) -> Result<RegionMetadata> {
        match self.subdivisions {
            None => RegionMetadata::load(&self.country),
            Some(subdivisions) => {
                let subdivisions = subdivisions
                    .into_iter()
                    .map(|(code, files)| {
                        let metadata = RegionMetadata::load(&files)
                            .with_context(|| format!("Failed to index subdivision {}", code))?;
                        Ok((code, metadata))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?;
                RegionMetadata::from_subdivisions(subdivisions)
            }
        }
    }
}

/// Add the cells of a region, or of its subdivisions, to the cell index.
fn index_cells(cell_index: &mut CellIndex, code: &RegionCode, metadata: &RegionMetadata) {
    match &metadata.subdivisions {
        Some(subdivisions) => {
            for (code, subdivision) in subdivisions {
                index_cells(cell_index, code, subdivision);
            }
        }
        None => {
            for cell in &metadata.cells {
                cell_index
                    .entry(cell.to_token())
                    .or_default()
                    .insert(code.clone());
            }
        }
    }
}

impl Generator {
    fn region_files(&self, code: &RegionCode) -> RegionFiles {
        RegionFiles {
            raw_file: self.raw_cell_file(code),
            geometry_file: self.geometry_file(code),
        }
    }

    /// Write `index/regions.json` and `index/cells.json`, merged into existing ones.
    pub async fn generate_indices(&self) -> Result<()> {
        ensure_directory(&self.index_directory())?;

        let inputs: Vec<_> = self
            .countries()
            .iter()
            .map(|country| {
                let job = IndexJob {
                    country: self.region_files(&country.code),
                    subdivisions: country.subdivisions.as_ref().map(|subdivisions| {
                        subdivisions
                            .iter()
                            .map(|s| (s.code.clone(), self.region_files(&s.code)))
                            .collect()
                    }),
                };
                (country.code.clone(), job)
            })
            .collect();

        let computed = self
            .run_stage("Index", inputs, |code, job| Ok((code.clone(), job.run()?)))
            .await?;

        let mut region_index = RegionIndex::new();
        let mut cell_index = CellIndex::new();
        for (code, metadata) in computed {
            index_cells(&mut cell_index, &code, &metadata);
            region_index.insert(code, metadata);
        }

        let region_index_file = self.region_index_file();
        if region_index_file.exists() {
            let existing: RegionIndex = read_json(&region_index_file)?;
            for (code, metadata) in existing {
                region_index.entry(code).or_insert(metadata);
            }
        }

        let cell_index_file = self.cell_index_file();
        if cell_index_file.exists() {
            let existing: CellIndex = read_json(&cell_index_file)?;
            for (token, codes) in existing {
                cell_index.entry(token).or_default().extend(codes);
            }
        }

        write_json(&region_index_file, &region_index)?;
        write_json(&cell_index_file, &cell_index)?;
        info!(
            "Indexed {} regions over {} cells at level {}",
            region_index.len(),
            cell_index.len(),
            ALIGNED_LEVEL
        );
        Ok(())
    }
}
