//! Write the synthetic demonstration rate sheet
//!
//! Usage:
//!   generate_table [--output data/synthetic_rates.csv] [--params params.json]

use anyhow::{Context, Result};
use clap::Parser;
use policy_quote::table::generator::{self, GeneratorParams};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "generate_table")]
#[command(about = "Generate a synthetic life-insurance rate sheet")]
struct Args {
    /// Output CSV path
    #[arg(long, short, default_value = "data/synthetic_rates.csv")]
    output: PathBuf,

    /// JSON file overriding generator parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Prefix the file with a UTF-8 byte-order mark for spreadsheet apps
    #[arg(long)]
    bom: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let start = Instant::now();

    let params: GeneratorParams = match &args.params {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("Invalid generator parameters in {}", path.display()))?
        }
        None => GeneratorParams::default(),
    };

    let rows = generator::generate(&params);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    if args.bom {
        writer.write_all("\u{feff}".as_bytes())?;
    }
    generator::write_csv(&rows, &params, writer)?;

    println!(
        "Wrote {} rows to {} in {:.2?}",
        rows.len(),
        args.output.display(),
        start.elapsed()
    );
    Ok(())
}
