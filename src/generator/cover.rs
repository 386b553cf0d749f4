use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::{ensure_directory, read_json, write_json, Generator};
use crate::cover::{Coverer, Mode};
use crate::models::{GeoJsonMultiPolygon, RegionCode};
use crate::sphere::{coord_from_point, CellCollection, CellId};

struct CoverJob {
    geometry_file: PathBuf,
    raw_file: PathBuf,
    compressed_file: PathBuf,
    visualization_file: PathBuf,
}

impl Generator {
    /// Cover every region missing a raw cell file, and compress raw files when asked.
    pub async fn ensure_covers(&self, level: u8, mode: Mode, compress: bool) -> Result<()> {
        let coverer = Coverer::new(0..=level, mode)?;

        ensure_directory(&self.cover_directory().join("raw"))?;
        if compress {
            ensure_directory(&self.cover_directory().join("compressed"))?;
        }

        let mut inputs = Vec::new();
        for region in self.flat_regions() {
            let job = CoverJob {
                geometry_file: self.geometry_file(&region.code),
                raw_file: self.raw_cell_file(&region.code),
                compressed_file: self.compressed_cell_file(&region.code),
                visualization_file: self.cover_visualization_file(&region.code),
            };
            if job.raw_file.exists() && (!compress || job.compressed_file.exists()) {
                debug!("[{}] Cover exists, skipping", region.code);
                continue;
            }
            inputs.push((region.code, job));
        }
        info!(
            "Covering {} regions at level {} ({} mode)",
            inputs.len(),
            level,
            mode
        );

        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );

        let progress = pb.clone();
        let result = self
            .run_stage("Cover", inputs, move |code, job| {
                let result = cover_region(&coverer, code, &job, compress);
                progress.set_message(code.to_string());
                progress.inc(1);
                result
            })
            .await;
        pb.finish_with_message("done");

        result.map(|_| ())
    }
}

fn cover_region(
    coverer: &Coverer,
    code: &RegionCode,
    job: &CoverJob,
    compress: bool,
) -> Result<()> {
    let data = if !job.raw_file.exists() {
        let document: GeoJsonMultiPolygon = read_json(&job.geometry_file)?;
        let geometry = MultiPolygon::from(&document);

        let start = Instant::now();
        let cells = coverer.cover_polygons(&geometry.0);
        info!(
            "[{}] Generated {} cells in {:?}",
            code,
            cells.len(),
            start.elapsed()
        );

        let data = cells.to_bytes();
        fs::write(&job.raw_file, &data)
            .with_context(|| format!("Failed to write {}", job.raw_file.display()))?;

        if let Err(e) = write_json(&job.visualization_file, &visualize(&cells)) {
            warn!("[{}] Skipped cover visualization: {:#}", code, e);
        }
        data
    } else {
        fs::read(&job.raw_file)
            .with_context(|| format!("Failed to read {}", job.raw_file.display()))?
    };

    if compress && !job.compressed_file.exists() {
        write_compressed(&job.compressed_file, &data)?;
    }
    Ok(())
}

fn write_compressed(path: &Path, data: &[u8]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Outline of a cell in longitude / latitude, unwrapped across the antimeridian.
fn cell_outline(cell: CellId) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = cell.vertices().into_iter().map(coord_from_point).collect();
    let west = coords.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
    let east = coords.iter().map(|c| c.x).fold(f64::NEG_INFINITY, f64::max);
    if east - west > 180.0 {
        for coord in &mut coords {
            if coord.x < 0.0 {
                coord.x += 360.0;
            }
        }
    }
    LineString::new(coords)
}

/// Cells as polygons, complete sibling groups merged into their parent.
fn visualize(cells: &CellCollection) -> GeoJsonMultiPolygon {
    let polygons = cells
        .normalized(0)
        .iter()
        .map(|cell| Polygon::new(cell_outline(cell), vec![]))
        .collect();
    GeoJsonMultiPolygon::from(&MultiPolygon::new(polygons))
}
