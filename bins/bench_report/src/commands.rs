//! CLI command implementations for benchmark reports.
//!
//! - Parse: haystack log to JSON records
//! - Pareto: grid benchmark log to per-dataset frontiers
//! - Fit: search cost models over parsed records
//! - Slice: flat N,B,F rows at a fixed K
//! - Combine: merge JSON result files

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use haybench_analysis::combine::{combine_json_files, DEFAULT_OUTPUT};
use haybench_analysis::extract::DEFAULT_THROUGHPUT_REPEATS;
use haybench_analysis::report::FrontierReport;
use haybench_analysis::slice::{budget_slice, write_csv};
use haybench_analysis::{
    merge_summaries, BenchDialect, CostModel, ExtractorConfig, HaystackRecords, LevenbergMarquardt,
    LogFormat, LogRecordParser, MetricExtractor,
};

// ============================================================================
// Parse Command
// ============================================================================

#[derive(Parser)]
pub struct ParseArgs {
    /// Haystack log file (reads stdin when omitted)
    pub log: Option<PathBuf>,

    /// Log format: haystack, haystack-legacy
    #[arg(long, default_value = "haystack")]
    pub format: LogFormat,

    /// Write JSON here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn parse(args: ParseArgs) -> Result<()> {
    let parser = LogRecordParser::new(args.format);
    let records = match &args.log {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("Failed to open log {}", path.display()))?;
            parser
                .parse_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => parser
            .parse_reader(io::stdin().lock())
            .context("Failed to parse log from stdin")?,
    };

    info!(
        datasets = records.len(),
        format = %args.format,
        "Parsed haystack log"
    );

    match &args.output {
        Some(path) => {
            records
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote records");
        }
        None => println!("{}", records.to_json_pretty()?),
    }
    Ok(())
}

// ============================================================================
// Pareto Command
// ============================================================================

#[derive(Parser)]
pub struct ParetoArgs {
    /// Grid benchmark log file
    pub log: PathBuf,

    /// Log dialect: bench, bench-legacy
    #[arg(long, default_value = "bench")]
    pub dialect: BenchDialect,

    /// Keep in-memory query results
    #[arg(long)]
    pub include_memory: bool,

    /// Timed repetitions behind each elapsed time
    #[arg(long, default_value_t = DEFAULT_THROUGHPUT_REPEATS)]
    pub repeats: u32,

    /// Merge blocks describing the same dataset
    #[arg(long)]
    pub merge: bool,

    /// Write one <dataset>_pareto.csv per dataset into this directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Print frontiers as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

pub fn pareto(args: ParetoArgs) -> Result<()> {
    if args.repeats == 0 {
        anyhow::bail!("--repeats must be at least 1");
    }

    let text = fs::read_to_string(&args.log)
        .with_context(|| format!("Failed to read log {}", args.log.display()))?;

    let config = ExtractorConfig::default()
        .with_dialect(args.dialect)
        .with_throughput_repeats(args.repeats)
        .with_include_memory(args.include_memory);
    let mut summaries = MetricExtractor::new(config)
        .extract_log(&text)
        .with_context(|| format!("Failed to extract metrics from {}", args.log.display()))?;
    if args.merge {
        summaries = merge_summaries(summaries);
    }

    if summaries.is_empty() {
        warn!(path = %args.log.display(), "No dataset blocks found");
    }

    let reports: Vec<FrontierReport> = summaries.iter().map(FrontierReport::from_summary).collect();

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        for report in &reports {
            let path = report
                .save_csv(dir)
                .with_context(|| format!("Failed to write frontier for {}", report.name))?;
            info!(dataset = %report.name, path = %path.display(), "Wrote frontier");
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &reports)?;
        writeln!(out)?;
    } else {
        for report in &reports {
            report.write_table(&mut out)?;
        }
    }
    Ok(())
}

// ============================================================================
// Fit Command
// ============================================================================

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModelKind {
    /// A + B·K^X at a fixed N
    CostVsK,
    /// A + B·ln(N)^X at a fixed K
    CostVsN,
    /// A + B·ln(N)^X·K^Y
    CostVsNk,
}

#[derive(Parser)]
pub struct FitArgs {
    /// Records JSON produced by `parse`
    pub json: PathBuf,

    /// Model to fit
    #[arg(long, value_enum)]
    pub model: ModelKind,

    /// Dataset name (may be omitted when the file holds one dataset)
    #[arg(long)]
    pub dataset: Option<String>,

    /// Pool size of the build to fit (cost-vs-k)
    #[arg(long)]
    pub n: Option<u64>,

    /// Requested result count to fit (cost-vs-n)
    #[arg(long)]
    pub k: Option<u64>,

    /// Solver iteration limit
    #[arg(long)]
    pub max_iterations: Option<usize>,
}

fn cost_model(args: &FitArgs) -> Result<CostModel> {
    Ok(match args.model {
        ModelKind::CostVsK => CostModel::CostVsK {
            n: args.n.context("--n is required for cost-vs-k")?,
        },
        ModelKind::CostVsN => CostModel::CostVsN {
            k: args.k.context("--k is required for cost-vs-n")?,
        },
        ModelKind::CostVsNk => CostModel::CostVsNAndK,
    })
}

pub fn fit(args: FitArgs) -> Result<()> {
    let model = cost_model(&args)?;
    let records = HaystackRecords::load(&args.json)?;
    let (name, dataset) = records.select(args.dataset.as_deref())?;

    let mut solver = LevenbergMarquardt::default();
    if let Some(max) = args.max_iterations {
        solver = solver.with_max_iterations(max);
    }

    let report = model
        .fit(&dataset.builds, &solver)
        .with_context(|| format!("Failed to fit {} for dataset {}", model, name))?;

    println!("{}: {}", name, report);
    Ok(())
}

// ============================================================================
// Slice Command
// ============================================================================

#[derive(Parser)]
pub struct SliceArgs {
    /// Records JSON produced by `parse`
    pub json: PathBuf,

    /// Dataset name (may be omitted when the file holds one dataset)
    #[arg(long)]
    pub dataset: Option<String>,

    /// Requested result count
    #[arg(long, default_value_t = 1)]
    pub k: u64,
}

pub fn slice(args: SliceArgs) -> Result<()> {
    let records = HaystackRecords::load(&args.json)?;
    let (name, dataset) = records.select(args.dataset.as_deref())?;

    let rows = budget_slice(dataset, args.k);
    info!(dataset = name, k = args.k, rows = rows.len(), "Sliced records");

    write_csv(&rows, io::stdout().lock())?;
    Ok(())
}

// ============================================================================
// Combine Command
// ============================================================================

#[derive(Parser)]
pub struct CombineArgs {
    /// JSON files to combine
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output file
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

pub fn combine(args: CombineArgs) -> Result<()> {
    let outcome = combine_json_files(args.files.as_slice());
    outcome
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        combined = outcome.combined.len(),
        skipped = outcome.skipped.len(),
        path = %args.output.display(),
        "Combined result files"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_args(model: ModelKind, n: Option<u64>, k: Option<u64>) -> FitArgs {
        FitArgs {
            json: PathBuf::from("records.json"),
            model,
            dataset: None,
            n,
            k,
            max_iterations: None,
        }
    }

    #[test]
    fn test_cost_model_requires_fixed_axis() {
        assert!(cost_model(&fit_args(ModelKind::CostVsK, None, Some(1))).is_err());
        assert!(cost_model(&fit_args(ModelKind::CostVsN, Some(1), None)).is_err());
        assert_eq!(
            cost_model(&fit_args(ModelKind::CostVsK, Some(100), None)).unwrap(),
            CostModel::CostVsK { n: 100 }
        );
        assert_eq!(
            cost_model(&fit_args(ModelKind::CostVsNk, None, None)).unwrap(),
            CostModel::CostVsNAndK
        );
    }

    #[test]
    fn test_model_names_on_command_line() {
        assert_eq!(
            ModelKind::from_str("cost-vs-nk", false).unwrap() as u8,
            ModelKind::CostVsNk as u8
        );
        assert!(ModelKind::from_str("cost_vs_K", false).is_err());
    }
}
