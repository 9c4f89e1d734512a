//! Analysis of vector search benchmark logs.
//!
//! Two log families are handled:
//!
//! - **haystack logs** report nodes visited per search
//!   (`Looking for top K of B ordinals required visiting F nodes`). The
//!   [`parser`] turns them into [`record::HaystackRecords`], which the [`fit`]
//!   module uses to fit search-cost scaling laws.
//! - **grid benchmark logs** report recall and elapsed time per parameter
//!   setting. The [`extract`] module turns them into measurement points and
//!   [`pareto`] reduces those to the recall/throughput frontier.
//!
//! ## Example
//!
//! ```
//! use haybench_analysis::parser::parse_haystack;
//! use haybench_analysis::fit::{CostModel, LevenbergMarquardt};
//!
//! let log = "\
//! mydata: 100 base and 50 query vectors loaded, dimensions 8
//! Build N=100 M=16 ef=64 in 1.0s with 20.0 short edges
//! Looking for top 1 of 100 ordinals required visiting 20 nodes
//! Looking for top 2 of 100 ordinals required visiting 35 nodes
//! Looking for top 4 of 100 ordinals required visiting 70 nodes
//! ";
//! let records = parse_haystack(log)?;
//! let builds = &records.get("mydata").unwrap().builds;
//! let report = CostModel::CostVsK { n: 100 }.fit(builds, &LevenbergMarquardt::default())?;
//! assert_eq!(report.samples, 3);
//! # Ok::<(), haybench_analysis::AnalysisError>(())
//! ```

pub mod combine;
pub mod error;
pub mod extract;
pub mod fit;
pub mod format;
pub mod pareto;
pub mod parser;
pub mod record;
pub mod report;
pub mod slice;
pub mod telemetry;

pub use error::{AnalysisError, Result};
pub use extract::{
    merge_summaries, DatasetSummary, ExtractorConfig, MeasurementPoint, MetricExtractor,
    Quantization,
};
pub use fit::{CostModel, FitReport, LeastSquaresSolver, LevenbergMarquardt};
pub use format::{BenchDialect, LogFormat};
pub use pareto::{dominates, pareto_frontier, Tradeoff};
pub use parser::LogRecordParser;
pub use record::{Build, Dataset, HaystackRecords, Trial};
