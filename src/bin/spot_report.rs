//! spot_report - dump the spot regions a mask yields.
//!
//! The external persistence layer keys on region ids, so operators need a
//! way to see exactly which id lands on which rectangle before wiring up
//! the database. Prints one JSON object per region.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use lotwatch::{extract_regions, load_mask};

#[derive(Parser)]
#[command(name = "spot_report", about = "List spot regions extracted from a mask image")]
struct Args {
    /// Mask image path (non-zero pixels mark spot interiors).
    mask: PathBuf,

    /// Discard connected components below this pixel area.
    #[arg(long, default_value_t = 100, env = "LOTWATCH_MIN_SPOT_AREA")]
    min_area: u32,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct SpotRow {
    id: usize,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    area: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mask = load_mask(&args.mask)?;
    let regions = extract_regions(&mask, args.min_area)?;

    let rows: Vec<SpotRow> = regions
        .iter()
        .map(|region| SpotRow {
            id: region.id,
            x: region.rect.x,
            y: region.rect.y,
            width: region.rect.width,
            height: region.rect.height,
            area: region.rect.area(),
        })
        .collect();

    let json = if args.pretty {
        serde_json::to_string_pretty(&rows)?
    } else {
        serde_json::to_string(&rows)?
    };
    println!("{}", json);

    Ok(())
}
