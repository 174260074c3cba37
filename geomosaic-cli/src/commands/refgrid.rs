//! Refgrid command - resample a mosaic into a reference tile dataset.

use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use geomosaic::refgrid::{self, RefGridConfig};

#[derive(Args)]
pub struct RefgridArgs {
    /// Path to the mosaic image
    #[arg(long)]
    pub mosaic: PathBuf,

    /// Output directory for the reference dataset
    #[arg(long, default_value = "refs")]
    pub output: PathBuf,

    /// Reference tile edge length in pixels
    #[arg(long, default_value = "500")]
    pub tile_size: u32,

    /// Grid spacing in meters
    #[arg(long, default_value = "40")]
    pub spacing: f64,

    /// Tile overlap ratio (0.0 to 0.99)
    #[arg(long, default_value = "0")]
    pub overlap: f64,

    /// Zoom level the mosaic was fetched at
    #[arg(long, default_value = "19")]
    pub zoom: u8,

    /// Center latitude of the mosaic
    #[arg(long, allow_hyphen_values = true)]
    pub center_lat: f64,

    /// Center longitude of the mosaic
    #[arg(long, allow_hyphen_values = true)]
    pub center_lon: f64,
}

pub fn run(args: RefgridArgs) -> Result<(), Box<dyn Error>> {
    let mosaic = image::open(&args.mosaic)?.to_rgb8();

    println!("Geomosaic Refgrid");
    println!("=================");
    println!();
    println!("Mosaic:    {} ({}x{})", args.mosaic.display(), mosaic.width(), mosaic.height());
    println!("Tile size: {}px, spacing {}m", args.tile_size, args.spacing);
    println!("Output:    {}", args.output.display());
    println!();

    let config = RefGridConfig::new(args.center_lat, args.center_lon)
        .with_zoom(args.zoom)
        .with_tile_size_px(args.tile_size)
        .with_spacing_m(args.spacing)
        .with_overlap(args.overlap);

    let report = refgrid::build(&mosaic, &args.output, &config)?;
    println!(
        "Done: {} reference tiles ({} rows x {} cols planned)",
        report.metadata.total_refs,
        report.metadata.grid_rows,
        report.metadata.grid_cols
    );

    Ok(())
}
