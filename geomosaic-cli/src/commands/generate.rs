//! Generate command - download tiles and assemble a mosaic.

use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use geomosaic::coord;
use geomosaic::fetch::FetchConfig;
use geomosaic::job::{JobConfig, MosaicJob};
use geomosaic::mosaic::AssemblyMode;
use geomosaic::refgrid::{self, RefGridConfig};
use geomosaic::strategy::StrategyKind;

use super::{api_key_from_env, signing_secret_from_env};

#[derive(Args)]
pub struct GenerateArgs {
    /// Southern edge of the bounding box, decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat_min: Option<f64>,

    /// Northern edge of the bounding box, decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat_max: Option<f64>,

    /// Western edge of the bounding box, decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon_min: Option<f64>,

    /// Eastern edge of the bounding box, decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon_max: Option<f64>,

    /// Center latitude (alternative to an explicit bounding box)
    #[arg(long, allow_hyphen_values = true)]
    pub center_lat: Option<f64>,

    /// Center longitude (alternative to an explicit bounding box)
    #[arg(long, allow_hyphen_values = true)]
    pub center_lon: Option<f64>,

    /// Half-extent in meters in every direction around the center
    #[arg(long, default_value = "500")]
    pub extent_m: f64,

    /// Zoom level
    #[arg(long, default_value = "19")]
    pub zoom: u8,

    /// Requested tile edge length in pixels
    #[arg(long, default_value = "640")]
    pub tile_size: u32,

    /// Provider scale factor (pixel density multiplier)
    #[arg(long, default_value = "2")]
    pub scale: u8,

    /// Watermark strip height to crop, pixels
    #[arg(long, default_value = "40")]
    pub crop: u32,

    /// Concurrency strategy: sequential, worker_pool, async_semaphore,
    /// partitioned
    #[arg(long, default_value = "worker_pool")]
    pub strategy: String,

    /// Worker count for the pool and partitioned strategies
    #[arg(long, default_value = "30")]
    pub workers: usize,

    /// Concurrency cap for the async-semaphore strategy
    #[arg(long, default_value = "50")]
    pub max_in_flight: usize,

    /// Assembly mode: auto, memory, streaming
    #[arg(long, default_value = "auto")]
    pub assembly: String,

    /// Output image path
    #[arg(long, default_value = "mosaic.jpg")]
    pub output: PathBuf,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Also resample the mosaic into a reference dataset in this directory
    #[arg(long)]
    pub refgrid: Option<PathBuf>,

    /// Provider API key (overrides GOOGLE_MAPS_API_KEY / GMAPS_KEY)
    #[arg(long)]
    pub api_key: Option<String>,
}

fn parse_assembly(s: &str) -> Result<AssemblyMode, String> {
    match s {
        "auto" => Ok(AssemblyMode::Auto),
        "memory" => Ok(AssemblyMode::InMemory),
        "streaming" => Ok(AssemblyMode::Streaming),
        other => Err(format!("unknown assembly mode '{}'", other)),
    }
}

fn resolve_bounds(args: &GenerateArgs) -> Result<(f64, f64, f64, f64), String> {
    match (args.lat_min, args.lat_max, args.lon_min, args.lon_max) {
        (Some(lat_min), Some(lat_max), Some(lon_min), Some(lon_max)) => {
            if lat_min >= lat_max || lon_min >= lon_max {
                return Err("bounding box is empty (min must be below max)".to_string());
            }
            Ok((lat_min, lat_max, lon_min, lon_max))
        }
        (None, None, None, None) => match (args.center_lat, args.center_lon) {
            (Some(lat), Some(lon)) => Ok(coord::bounds_from_center(
                lat,
                lon,
                args.extent_m,
                args.extent_m,
                args.extent_m,
                args.extent_m,
            )),
            _ => Err(
                "no area given: pass --lat-min/--lat-max/--lon-min/--lon-max \
                 or --center-lat/--center-lon"
                    .to_string(),
            ),
        },
        _ => Err("incomplete bounding box: all four of --lat-min/--lat-max/\
                  --lon-min/--lon-max are required"
            .to_string()),
    }
}

pub fn run(args: GenerateArgs) -> Result<(), Box<dyn Error>> {
    let api_key = args
        .api_key
        .clone()
        .or_else(api_key_from_env)
        .ok_or("no API key: set GOOGLE_MAPS_API_KEY or pass --api-key")?;

    let strategy: StrategyKind = args.strategy.parse()?;
    let assembly = parse_assembly(&args.assembly)?;
    let (lat_min, lat_max, lon_min, lon_max) = resolve_bounds(&args)?;

    let mut fetch = FetchConfig::new(api_key)
        .with_zoom(args.zoom)
        .with_tile_size_px(args.tile_size)
        .with_scale(args.scale)
        .with_crop_bottom_px(args.crop);
    if let Some(secret) = signing_secret_from_env() {
        fetch = fetch.with_signing_secret(secret);
    }

    let config = JobConfig::new(lat_min, lat_max, lon_min, lon_max, fetch)
        .with_strategy(strategy)
        .with_workers(args.workers)
        .with_max_in_flight(args.max_in_flight)
        .with_assembly(assembly);

    println!("Geomosaic Generate");
    println!("==================");
    println!();
    println!("Area:     {:.6},{:.6} .. {:.6},{:.6}", lat_min, lon_min, lat_max, lon_max);
    println!("Zoom:     {}", args.zoom);
    println!("Strategy: {} ({} workers)", strategy.name(), config.parallelism());
    println!("Output:   {}", args.output.display());
    println!();

    let output = MosaicJob::new(config).run()?;
    output.mosaic.save(&args.output)?;

    let report = &output.report;
    println!(
        "Done: {}x{} tiles, {}/{} fetched in {:.1}s ({:.1} tiles/s)",
        report.grid.num_rows,
        report.grid.num_cols,
        report.tiles_success,
        report.tiles_total,
        report.elapsed_secs,
        report.tiles_per_sec
    );
    println!("Mosaic saved to {}", args.output.display());

    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_string_pretty(report)?)?;
        println!("Report saved to {}", path.display());
    }

    if let Some(dir) = &args.refgrid {
        let config = RefGridConfig::new(report.grid.center_lat, report.grid.center_lon)
            .with_zoom(report.grid.zoom);
        let refs = refgrid::build(&output.mosaic, dir, &config)?;
        println!(
            "Reference dataset: {} tiles in {}",
            refs.metadata.total_refs,
            dir.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: GenerateArgs,
    }

    fn parse(argv: &[&str]) -> GenerateArgs {
        let mut full = vec!["geomosaic"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[test]
    fn test_explicit_bounds_win() {
        let args = parse(&[
            "--lat-min", "50.447", "--lat-max", "50.453",
            "--lon-min", "30.520", "--lon-max", "30.530",
        ]);
        let bounds = resolve_bounds(&args).unwrap();
        assert_eq!(bounds, (50.447, 50.453, 30.520, 30.530));
    }

    #[test]
    fn test_center_and_extent_derive_bounds() {
        let args = parse(&["--center-lat", "50.45", "--center-lon", "30.525", "--extent-m", "333"]);
        let (lat_min, lat_max, lon_min, lon_max) = resolve_bounds(&args).unwrap();
        assert!(lat_min < 50.45 && lat_max > 50.45);
        assert!(lon_min < 30.525 && lon_max > 30.525);
        assert!((lat_max - 50.45 - (50.45 - lat_min)).abs() < 1e-12);
    }

    #[test]
    fn test_partial_bounds_rejected() {
        let args = parse(&["--lat-min", "50.0", "--lat-max", "50.1"]);
        assert!(resolve_bounds(&args).is_err());
    }

    #[test]
    fn test_empty_box_rejected() {
        let args = parse(&[
            "--lat-min", "50.5", "--lat-max", "50.4",
            "--lon-min", "30.5", "--lon-max", "30.6",
        ]);
        assert!(resolve_bounds(&args).is_err());
    }

    #[test]
    fn test_assembly_mode_parsing() {
        assert_eq!(parse_assembly("auto").unwrap(), AssemblyMode::Auto);
        assert_eq!(parse_assembly("memory").unwrap(), AssemblyMode::InMemory);
        assert_eq!(parse_assembly("streaming").unwrap(), AssemblyMode::Streaming);
        assert!(parse_assembly("ram").is_err());
    }
}
