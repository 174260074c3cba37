//! Geomosaic CLI - Command-line interface
//!
//! This binary provides a command-line interface to the geomosaic library.

mod commands;

use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser)]
#[command(name = "geomosaic")]
#[command(about = "Generate satellite mosaics from static-map tiles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download tiles and assemble a mosaic
    Generate(commands::generate::GenerateArgs),
    /// Resample an existing mosaic into a reference tile dataset
    Refgrid(commands::refgrid::RefgridArgs),
}

fn main() {
    geomosaic::logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Generate(args) => commands::generate::run(args),
        Command::Refgrid(args) => commands::refgrid::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
