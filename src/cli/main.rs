//! Boundary dataset generator.
//!
//! Closes region boundaries from raw fragments, covers them with cells and
//! builds the lookup index, one stage per subcommand.

mod config;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cellmap::generator::{Generator, TaskLimiter};
use cellmap::ring::{BuildOptions, CoastlineOmission};
use cellmap::{Mode, RegionCode};

use crate::config::Config;

const DEFAULT_LEVEL: u8 = 20;

#[derive(Parser, Debug)]
#[command(name = "cellmap")]
#[command(about = "Build administrative boundary cell sets")]
struct Args {
    /// Working directory holding metadata, fragments and outputs
    #[arg(short = 'd', long, global = true)]
    working_directory: Option<PathBuf>,

    /// Maximum number of regions processed at once
    #[arg(short, long, global = true)]
    tasks: Option<usize>,

    /// Only process these regions (country or subdivision codes)
    #[arg(short, long, global = true, value_delimiter = ',')]
    regions: Vec<RegionCode>,

    /// TOML file with defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Close region boundaries from their fragments
    Geometry(GeometryArgs),

    /// Cover region boundaries with cells
    Cover(CoverArgs),

    /// Build the region and cell index from the covers
    Index,

    /// Run the geometry, cover and index stages in order
    All {
        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        cover: CoverArgs,
    },

    /// Print the codes of regions whose outputs are missing
    List {
        #[arg(value_enum)]
        target: ListTarget,
    },
}

#[derive(clap::Args, Debug, Default)]
struct GeometryArgs {
    /// Leave out coastline fragments: all, or only open chains
    #[arg(long)]
    omit_coastlines: Option<CoastlineOmission>,

    /// Fragment ids to ignore
    #[arg(long, value_delimiter = ',')]
    omit_segments: Vec<u64>,

    /// Drop inner rings outside every outer ring instead of failing
    #[arg(long)]
    allow_unowned_inners: bool,
}

impl GeometryArgs {
    fn options(self, config: &Config) -> BuildOptions {
        let mut options = config.geometry.clone();
        if self.omit_coastlines.is_some() {
            options.omit_coastlines = self.omit_coastlines;
        }
        options.omit_segments.extend(self.omit_segments);
        options.allow_unowned_inners |= self.allow_unowned_inners;
        options
    }
}

#[derive(clap::Args, Debug, Default)]
struct CoverArgs {
    /// Deepest cell level
    #[arg(short, long)]
    level: Option<u8>,

    /// exterior or balanced
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Skip the gzip-compressed cell files
    #[arg(long)]
    no_compress: bool,
}

impl CoverArgs {
    /// Level, mode and compression after falling back to the config file.
    fn settings(&self, config: &Config) -> (u8, Mode, bool) {
        let level = self.level.or(config.cover.level).unwrap_or(DEFAULT_LEVEL);
        let mode = self.mode.or(config.cover.mode).unwrap_or_default();
        let compress = !self.no_compress && config.cover.compress.unwrap_or(true);
        (level, mode, compress)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ListTarget {
    /// Regions without a geometry file
    MissingGeometry,
    /// Regions without a raw cell file
    MissingCovers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    let working_directory = args
        .working_directory
        .clone()
        .or(config.global.working_directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let regions = if args.regions.is_empty() {
        config.global.regions.clone()
    } else {
        args.regions.clone()
    };
    let mut limiter = TaskLimiter::new(
        args.tasks
            .or(config.global.tasks)
            .unwrap_or(TaskLimiter::DEFAULT_MAX_TASKS),
    );
    if let Some(cooldown) = config.global.cooldown_ms {
        limiter = limiter.with_cooldown(Duration::from_millis(cooldown));
    }

    info!("Cellmap Generator");
    info!("Working directory: {}", working_directory.display());

    let generator = Generator::load(&working_directory, &regions, limiter)?;
    let start = Instant::now();

    match args.command {
        Command::Geometry(geometry) => {
            generator.ensure_geometries(&geometry.options(&config)).await?;
        }
        Command::Cover(cover) => {
            let (level, mode, compress) = cover.settings(&config);
            generator.ensure_covers(level, mode, compress).await?;
        }
        Command::Index => {
            generator.generate_indices().await?;
        }
        Command::All { geometry, cover } => {
            let (level, mode, compress) = cover.settings(&config);
            generator.ensure_geometries(&geometry.options(&config)).await?;
            generator.ensure_covers(level, mode, compress).await?;
            generator.generate_indices().await?;
        }
        Command::List { target } => {
            let regions = match target {
                ListTarget::MissingGeometry => generator
                    .regions_matching(|region| !generator.geometry_file(&region.code).exists()),
                ListTarget::MissingCovers => generator
                    .regions_matching(|region| !generator.raw_cell_file(&region.code).exists()),
            };
            info!("{} regions match", regions.len());
            for region in regions {
                println!("{}", region.code);
            }
        }
    }

    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
