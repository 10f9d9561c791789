//! Policy Quote CLI
//!
//! Quote a single plan, rank every matching plan, or inspect a rate sheet.
//! Table settings come from `QUOTE_*` environment variables; flags override them.
//!
//! Usage:
//!   policy_quote quote --sex F --age 40 --pay-years 6 --face 500000 [--company A公司] [--years 1,5,10]
//!   policy_quote rank  --sex F --age 40 --pay-years 6 --face 1000000 --year 30
//!   policy_quote inspect [--table data/reference_rates.csv]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use policy_quote::export::{self, HeaderStyle};
use policy_quote::{Query, QuoteConfig, QuoteSession, ScalingPolicy, Sex};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "policy_quote")]
#[command(version)]
#[command(about = "Look up and prorate policy values from a reference rate table")]
struct Cli {
    /// Reference table path or http(s) URL (overrides QUOTE_TABLE)
    #[arg(long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quote the first plan matching the insured
    Quote {
        #[command(flatten)]
        insured: InsuredArgs,

        /// Write the milestone schedule to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print the quote as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank every matching plan by surrender value at a policy year
    Rank {
        #[command(flatten)]
        insured: InsuredArgs,

        /// Policy year to compare surrender values at
        #[arg(long, default_value_t = 30)]
        year: u32,

        /// Write the ranking to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print the ranked quotes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the table and print the load report
    Inspect,
}

#[derive(Args, Debug)]
struct InsuredArgs {
    /// M/F (also 男/女)
    #[arg(long)]
    sex: Sex,

    #[arg(long)]
    age: u8,

    #[arg(long)]
    pay_years: u32,

    /// Requested face amount
    #[arg(long)]
    face: Decimal,

    #[arg(long)]
    company: Option<String>,

    #[arg(long)]
    product: Option<String>,

    /// Milestone years to report, comma separated
    #[arg(long, value_delimiter = ',')]
    years: Vec<u32>,

    /// Only match rows whose face amount equals --face (no scaling)
    #[arg(long)]
    exact_bracket: bool,

    /// English CSV headers
    #[arg(long)]
    english: bool,
}

impl InsuredArgs {
    fn query(&self) -> Query {
        let mut query = Query::new(self.sex, self.age, self.pay_years, self.face);
        query.company = self.company.clone();
        query.product = self.product.clone();
        if !self.years.is_empty() {
            query = query.years(self.years.iter().copied());
        }
        query
    }

    fn header_style(&self) -> HeaderStyle {
        if self.english {
            HeaderStyle::English
        } else {
            HeaderStyle::Chinese
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = QuoteConfig::from_env();
    if let Some(table) = &cli.table {
        config.table = table.clone();
    }
    if let Command::Quote { insured, .. } | Command::Rank { insured, .. } = &cli.command {
        if insured.exact_bracket {
            config.scaling = ScalingPolicy::ExactBracket;
        }
    }

    let session = QuoteSession::open(&config)
        .with_context(|| format!("Failed to load reference table {}", config.table))?;

    match cli.command {
        Command::Quote { insured, csv, json } => {
            let quote = session.quote(&insured.query())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&quote)?);
            } else {
                print!("{}", export::render_quote(&quote));
            }

            if let Some(path) = csv {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                export::write_quote_csv(&quote, BufWriter::new(file), insured.header_style())?;
                println!("Milestone schedule written to: {}", path.display());
            }
        }

        Command::Rank { insured, year, csv, json } => {
            let ranked = session.best_plans(&insured.query(), year)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else {
                print!("{}", export::render_ranking(&ranked, year));
            }

            if let Some(path) = csv {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                export::write_ranking_csv(&ranked, year, BufWriter::new(file), insured.header_style())?;
                println!("Ranking written to: {}", path.display());
            }
        }

        Command::Inspect => {
            let table = session.table();
            let report = session.report();

            println!("Source: {}", session.source());
            println!("Loaded at: {}", session.loaded_at().to_rfc3339());
            println!(
                "Rows: {} read, {} loaded, {} dropped, {} duplicate keys",
                report.rows_read, report.rows_loaded, report.rows_dropped, report.duplicate_keys
            );
            if report.bracketed_keys > 0 {
                println!(
                    "Face-amount brackets: {} extra rows share a plan key; the first bracket is scaled",
                    report.bracketed_keys
                );
            }

            let columns = table.columns();
            let years: Vec<String> = columns.years.iter().map(|y| y.to_string()).collect();
            println!("Milestone years: {}", years.join(", "));
            println!(
                "Columns: surrender_value={} death_benefit={} bonus={}",
                columns.surrender_value, columns.death_benefit, columns.bonus
            );

            println!("Plans:");
            for (company, product) in table.products() {
                println!("  {} {}", company.unwrap_or("-"), product.unwrap_or("-"));
            }

            if !report.ignored_columns.is_empty() {
                println!("Ignored columns: {}", report.ignored_columns.join(", "));
            }
            for err in &report.errors {
                println!("  dropped {}", err);
            }
        }
    }

    Ok(())
}
