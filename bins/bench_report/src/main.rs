//! Benchmark report CLI tool.
//!
//! Turns vector search benchmark logs into JSON records, Pareto frontiers
//! and search-cost fits.
//!
//! ## Commands
//!
//! ```bash
//! # Haystack log to JSON records
//! bench_report parse haystack.log --output haystack.json
//!
//! # Recall/throughput frontier per dataset
//! bench_report pareto grid.log --merge --output-dir ./frontiers
//!
//! # Fit search cost against K for the build with N=92923
//! bench_report fit haystack.json --model cost-vs-k --n 92923
//!
//! # Nodes visited per budget at K=1, as CSV
//! bench_report slice haystack.json --k 1
//!
//! # Merge result files into results.json
//! bench_report combine run-*.json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use haybench_analysis::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "bench_report")]
#[command(version, about = "Vector search benchmark log analysis")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a haystack log into JSON records
    Parse(commands::ParseArgs),

    /// Extract recall/throughput points and report the Pareto frontier
    Pareto(commands::ParetoArgs),

    /// Fit a search cost model to parsed records
    Fit(commands::FitArgs),

    /// Nodes visited per budget at a fixed K, as CSV
    Slice(commands::SliceArgs),

    /// Combine JSON result files into one object keyed by file name
    Combine(commands::CombineArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_subscriber_with_env_filter(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Parse(args) => commands::parse(args),
        Commands::Pareto(args) => commands::pareto(args),
        Commands::Fit(args) => commands::fit(args),
        Commands::Slice(args) => commands::slice(args),
        Commands::Combine(args) => commands::combine(args),
    }
}
