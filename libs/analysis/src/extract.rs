//! Recall/throughput extraction from grid benchmark logs.
//!
//! A log is a sequence of blank-line separated blocks. Each block starts with
//! a dataset header and is followed by context lines (quantization mode, graph
//! parameters) and query result lines. Every query result becomes one
//! [`MeasurementPoint`] tagged with the context active at that point.

use std::fmt;

use indexmap::IndexMap;
use regex::Captures;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{
    parse_count, parse_float, parse_positive_u32, parse_u32, AnalysisError, Result,
};
use crate::format::{dataset_header, BenchDialect, BenchPatterns};
use crate::pareto::Tradeoff;

/// Default number of timed repetitions behind each reported elapsed time.
pub const DEFAULT_THROUGHPUT_REPEATS: u32 = 10;

/// Vector compression scheme active for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantization {
    /// Product quantization; `subspaces` is the codebook count when logged.
    Product { subspaces: Option<u32> },
    Binary,
    Uncompressed,
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantization::Product {
                subspaces: Some(n),
            } => write!(f, "PQ@{}", n),
            Quantization::Product { subspaces: None } => f.write_str("PQ"),
            Quantization::Binary => f.write_str("BQ"),
            Quantization::Uncompressed => f.write_str("UC"),
        }
    }
}

/// One query result, flattened for analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    pub quantization: Quantization,
    pub recall: f64,
    /// Queries per second
    pub throughput: f64,
    pub m: u32,
    pub ef: u32,
    pub top_k: u32,
    pub overquery: u32,
    /// `Some(true)` for on-disk searches, `Some(false)` for in-memory ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_disk: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes_visited: Option<u64>,
}

impl MeasurementPoint {
    /// Short label with the configuration that produced this point.
    pub fn label(&self) -> String {
        format!(
            "Q={}, M={}, ef={}, oq={}",
            self.quantization, self.m, self.ef, self.overquery
        )
    }
}

impl Tradeoff for MeasurementPoint {
    fn recall(&self) -> f64 {
        self.recall
    }

    fn throughput(&self) -> f64 {
        self.throughput
    }
}

/// Extracted points for one dataset block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub base_vector_count: u64,
    pub query_vector_count: u64,
    pub dimensions: u64,
    pub points: Vec<MeasurementPoint>,
}

/// A blank-line separated section of a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBlock<'a> {
    /// 1-based line number of the header
    pub start_line: usize,
    pub header: &'a str,
    pub lines: Vec<&'a str>,
}

/// Split a log into blank-line separated blocks.
///
/// Lines consisting only of whitespace count as separators.
pub fn split_blocks(text: &str) -> Vec<LogBlock<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<LogBlock<'_>> = None;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            blocks.extend(current.take());
            continue;
        }
        match current.as_mut() {
            Some(block) => block.lines.push(line),
            None => {
                current = Some(LogBlock {
                    start_line: idx + 1,
                    header: line,
                    lines: Vec::new(),
                })
            }
        }
    }
    blocks.extend(current);
    blocks
}

/// Extractor configuration.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Line grammar of the log
    pub dialect: BenchDialect,
    /// Repetitions behind each reported elapsed time
    pub throughput_repeats: u32,
    /// Keep `(memory)` results instead of dropping them
    pub include_memory: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            dialect: BenchDialect::Bench,
            throughput_repeats: DEFAULT_THROUGHPUT_REPEATS,
            include_memory: false,
        }
    }
}

impl ExtractorConfig {
    pub fn with_dialect(mut self, dialect: BenchDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_throughput_repeats(mut self, repeats: u32) -> Self {
        self.throughput_repeats = repeats;
        self
    }

    pub fn with_include_memory(mut self, include: bool) -> Self {
        self.include_memory = include;
        self
    }
}

/// Queries per second given the query count and the elapsed time of
/// `repeats` passes over them.
pub fn compute_throughput(query_vector_count: u64, repeats: u32, elapsed_secs: f64) -> f64 {
    query_vector_count as f64 * repeats as f64 / elapsed_secs
}

/// Running context within one dataset block.
#[derive(Debug, Default)]
struct BlockContext {
    quantization: Option<Quantization>,
    graph: Option<(u32, u32)>,
}

/// Turns benchmark log blocks into measurement points.
#[derive(Debug, Clone, Default)]
pub struct MetricExtractor {
    config: ExtractorConfig,
}

impl MetricExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract every dataset block of a log.
    ///
    /// Blocks that do not start with a dataset header carry no results and
    /// are skipped.
    pub fn extract_log(&self, text: &str) -> Result<Vec<DatasetSummary>> {
        let mut summaries = Vec::new();
        for block in split_blocks(text) {
            if !dataset_header().is_match(block.header) {
                debug!(line = block.start_line, "Block without dataset header; skipped");
                continue;
            }
            summaries.push(self.extract_block(&block)?);
        }
        debug!(datasets = summaries.len(), "Extracted benchmark log");
        Ok(summaries)
    }

    /// Extract one dataset block.
    pub fn extract_block(&self, block: &LogBlock<'_>) -> Result<DatasetSummary> {
        let header_line = block.start_line;
        let caps = dataset_header().captures(block.header).ok_or_else(|| {
            AnalysisError::FormatMismatch {
                line: header_line,
                field: "header",
                value: block.header.to_string(),
                expected: "a dataset header",
            }
        })?;

        let mut summary = DatasetSummary {
            name: caps["name"].trim().to_string(),
            base_vector_count: parse_count(header_line, "base vectors", &caps["base"])?,
            query_vector_count: parse_count(header_line, "query vectors", &caps["query"])?,
            dimensions: parse_count(header_line, "dimensions", &caps["dims"])?,
            points: Vec::new(),
        };

        let patterns = self.config.dialect.patterns();
        let mut context = BlockContext::default();

        for (offset, line) in block.lines.iter().enumerate() {
            let line_no = header_line + offset + 1;

            if let Some(caps) = patterns.query.captures(line) {
                if let Some(point) =
                    self.query_point(&caps, &context, summary.query_vector_count, line_no)?
                {
                    summary.points.push(point);
                }
                continue;
            }

            if let Some(quantization) = quantization_of(patterns, line, line_no)? {
                context.quantization = Some(quantization);
                continue;
            }

            if let Some(caps) = patterns.graph.captures(line) {
                context.graph = Some((
                    parse_u32(line_no, "M", &caps["m"])?,
                    parse_u32(line_no, "ef", &caps["ef"])?,
                ));
            }
        }

        Ok(summary)
    }

    fn query_point(
        &self,
        caps: &Captures<'_>,
        context: &BlockContext,
        query_vector_count: u64,
        line_no: usize,
    ) -> Result<Option<MeasurementPoint>> {
        let location = caps.name("location").map(|m| m.as_str());
        if location == Some("memory") && !self.config.include_memory {
            return Ok(None);
        }

        let pq_flag = caps.name("pq").map(|m| m.as_str() == "true");
        let quantization = match (pq_flag, context.quantization) {
            (Some(true), _) => Quantization::Product { subspaces: None },
            (Some(false), _) => Quantization::Uncompressed,
            (None, Some(q)) => q,
            (None, None) => {
                return Err(AnalysisError::MissingContext {
                    line: line_no,
                    missing: "quantization",
                })
            }
        };
        let (m, ef) = context.graph.ok_or(AnalysisError::MissingContext {
            line: line_no,
            missing: "M/ef",
        })?;

        let recall = parse_float(line_no, "recall", &caps["recall"])?;
        if !(0.0..=1.0).contains(&recall) {
            return Err(AnalysisError::FormatMismatch {
                line: line_no,
                field: "recall",
                value: caps["recall"].to_string(),
                expected: "a fraction between 0 and 1",
            });
        }
        let elapsed = parse_float(line_no, "query time", &caps["secs"])?;
        if elapsed <= 0.0 {
            return Err(AnalysisError::FormatMismatch {
                line: line_no,
                field: "query time",
                value: caps["secs"].to_string(),
                expected: "a positive duration",
            });
        }

        let nodes_visited = caps
            .name("visited")
            .map(|m| parse_count(line_no, "nodes visited", &m.as_str().replace(',', "")))
            .transpose()?;

        Ok(Some(MeasurementPoint {
            quantization,
            recall,
            throughput: compute_throughput(
                query_vector_count,
                self.config.throughput_repeats,
                elapsed,
            ),
            m,
            ef,
            top_k: parse_positive_u32(line_no, "top K", &caps["k"])?,
            overquery: parse_positive_u32(line_no, "overquery", &caps["overquery"])?,
            on_disk: match location {
                Some("memory") => Some(false),
                Some(_) => Some(true),
                None => pq_flag,
            },
            nodes_visited,
        }))
    }
}

/// Quantization mode named on a context line, if any.
///
/// A line naming more than one mode is rejected. The PQ codebook count is
/// kept when the line prints it bare.
fn quantization_of(
    patterns: &BenchPatterns,
    line: &str,
    line_no: usize,
) -> Result<Option<Quantization>> {
    let mut found = Vec::with_capacity(1);
    if let Some(caps) = patterns.product_quantization.captures(line) {
        let subspaces = caps
            .name("subspaces")
            .map(|m| parse_u32(line_no, "PQ subspaces", m.as_str()))
            .transpose()?;
        found.push(Quantization::Product { subspaces });
    }
    if patterns.binary_quantization.is_match(line) {
        found.push(Quantization::Binary);
    }
    if patterns.uncompressed.is_match(line) {
        found.push(Quantization::Uncompressed);
    }
    match found.len() {
        0 | 1 => Ok(found.pop()),
        _ => Err(AnalysisError::AmbiguousQuantization { line: line_no }),
    }
}

/// Merge summaries that describe the same dataset.
///
/// Summaries sharing name, base vector count and dimensions are combined by
/// concatenating their points. Output follows first appearance.
pub fn merge_summaries(summaries: Vec<DatasetSummary>) -> Vec<DatasetSummary> {
    let mut merged: IndexMap<(String, u64, u64), DatasetSummary> = IndexMap::new();
    for summary in summaries {
        let key = (
            summary.name.clone(),
            summary.base_vector_count,
            summary.dimensions,
        );
        match merged.get_mut(&key) {
            Some(existing) => existing.points.extend(summary.points),
            None => {
                merged.insert(key, summary);
            }
        }
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
Heap space available is 8589934592

glove-100: 1000 base and 100 query vectors loaded, dimensions 100
ProductQuantization(16) encoded 1000 vectors [0.02 MB] in 0.10s
Build M=16 ef=100 in 0.50s with avg degree 15.20 and 0.80 short edges
  Query top 100/1 recall 0.8000 in 2.00s after 1,234 nodes visited
  Query top 100/2 recall 0.9000 in 4.00s after 2,468 nodes visited
Uncompressed vectors
Build M=32 ef=200 in 0.90s with avg degree 30.00 and 0.85 short edges
  Query (memory) top 100/1 recall 0.9500 in 1.00s after 999 nodes visited
  Query (disk) top 100/1 recall 0.9400 in 5.00s after 999 nodes visited
";

    #[test]
    fn test_throughput_derivation() {
        assert!((compute_throughput(1000, 10, 2.0) - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_blocks() {
        let blocks = split_blocks(LOG);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].start_line, 1);
        assert_eq!(blocks[1].start_line, 3);
        assert!(blocks[1].header.starts_with("glove-100:"));
        assert_eq!(blocks[1].lines.len(), 8);
        assert!(split_blocks("\n\n   \n").is_empty());
    }

    #[test]
    fn test_extract_log() {
        let summaries = MetricExtractor::default().extract_log(LOG).unwrap();
        assert_eq!(summaries.len(), 1);

        let s = &summaries[0];
        assert_eq!(s.name, "glove-100");
        assert_eq!(s.base_vector_count, 1000);
        assert_eq!(s.query_vector_count, 100);
        assert_eq!(s.dimensions, 100);
        assert_eq!(s.points.len(), 3);

        let first = &s.points[0];
        assert_eq!(first.quantization, Quantization::Product { subspaces: Some(16) });
        assert_eq!((first.m, first.ef), (16, 100));
        assert_eq!(first.top_k, 100);
        assert_eq!(first.overquery, 1);
        assert!((first.throughput - 500.0).abs() < 1e-9);
        assert_eq!(first.nodes_visited, Some(1234));
        assert_eq!(first.on_disk, None);

        let disk = &s.points[2];
        assert_eq!(disk.quantization, Quantization::Uncompressed);
        assert_eq!((disk.m, disk.ef), (32, 200));
        assert_eq!(disk.on_disk, Some(true));
        assert!((disk.recall - 0.94).abs() < 1e-12);
    }

    #[test]
    fn test_memory_lines_never_extracted() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
  Query (memory) top 10/1 recall 0.9900 in 1.00s
BinaryQuantization encoded 10 vectors
  Query (memory) top 10/2 recall 0.9900 in 1.00s
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query (memory) top 10/4 recall 0.9900 in 1.00s
";
        let summaries = MetricExtractor::default().extract_log(log).unwrap();
        assert!(summaries[0].points.is_empty());

        let config = ExtractorConfig::default().with_include_memory(true);
        let summaries = MetricExtractor::new(config).extract_log(log);
        // Included memory lines are held to the same context requirements.
        assert!(matches!(
            summaries,
            Err(AnalysisError::MissingContext { line: 2, .. })
        ));
    }

    #[test]
    fn test_include_memory_tags_points() {
        let config = ExtractorConfig::default().with_include_memory(true);
        let summaries = MetricExtractor::new(config).extract_log(LOG).unwrap();
        let points = &summaries[0].points;
        assert_eq!(points.len(), 4);
        assert_eq!(points[2].on_disk, Some(false));
    }

    #[test]
    fn test_query_before_context_fails() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.5000 in 1.00s
";
        match MetricExtractor::default().extract_log(log) {
            Err(AnalysisError::MissingContext { line, missing }) => {
                assert_eq!(line, 3);
                assert_eq!(missing, "quantization");
            }
            other => panic!("expected missing context, got {other:?}"),
        }

        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
  Query top 10/1 recall 0.5000 in 1.00s
";
        assert!(matches!(
            MetricExtractor::default().extract_log(log),
            Err(AnalysisError::MissingContext { missing: "M/ef", .. })
        ));
    }

    #[test]
    fn test_context_does_not_leak_between_blocks() {
        let log = "\
a: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.5000 in 1.00s

b: 10 base and 10 query vectors loaded, dimensions 4
  Query top 10/1 recall 0.5000 in 1.00s
";
        assert!(matches!(
            MetricExtractor::default().extract_log(log),
            Err(AnalysisError::MissingContext { line: 7, .. })
        ));
    }

    #[test]
    fn test_ambiguous_quantization_rejected() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
BinaryQuantization vs Uncompressed comparison
";
        assert!(matches!(
            MetricExtractor::default().extract_log(log),
            Err(AnalysisError::AmbiguousQuantization { line: 2 })
        ));
    }

    #[test]
    fn test_zero_elapsed_time_rejected() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.5000 in 0.00s
";
        assert!(matches!(
            MetricExtractor::default().extract_log(log),
            Err(AnalysisError::FormatMismatch { line: 4, field: "query time", .. })
        ));
    }

    #[test]
    fn test_product_quantization_without_bare_size() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
ProductQuantization encoded 10 vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.5000 in 1.00s
";
        let summaries = MetricExtractor::default().extract_log(log).unwrap();
        assert_eq!(
            summaries[0].points[0].quantization,
            Quantization::Product { subspaces: None }
        );
    }

    #[test]
    fn test_product_quantization_replaces_earlier_context() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.9000 in 1.00s
ProductQuantization(M=16, clusters=256) encoded 10 vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.6000 in 1.00s
";
        let summaries = MetricExtractor::default().extract_log(log).unwrap();
        let labels: Vec<String> = summaries[0]
            .points
            .iter()
            .map(|p| p.quantization.to_string())
            .collect();
        assert_eq!(labels, vec!["UC", "PQ"]);
    }

    #[test]
    fn test_oversized_graph_parameters_rejected() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=4294967312 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.5000 in 1.00s
";
        assert!(matches!(
            MetricExtractor::default().extract_log(log),
            Err(AnalysisError::FormatMismatch { line: 3, field: "M", .. })
        ));

        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/4294967297 recall 0.5000 in 1.00s
";
        assert!(matches!(
            MetricExtractor::default().extract_log(log),
            Err(AnalysisError::FormatMismatch { line: 4, field: "overquery", .. })
        ));
    }

    #[test]
    fn test_recall_outside_unit_interval_rejected() {
        let log = "\
ds: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 1.5000 in 1.00s
";
        assert!(matches!(
            MetricExtractor::default().extract_log(log),
            Err(AnalysisError::FormatMismatch { line: 4, field: "recall", .. })
        ));
    }

    #[test]
    fn test_legacy_dialect_uses_pq_flag() {
        let log = "\
sift: 10000 base and 100 query vectors loaded, dimensions 128
Build M=16 ef=100 in 2.00s with 0.80 short edges
  Query PQ=false top 100/1 recall 0.9500 in 10.00s after 5000 nodes visited
  Query PQ=true top 100/1 recall 0.8500 in 2.00s after 5000 nodes visited
";
        let config = ExtractorConfig::default()
            .with_dialect(BenchDialect::BenchLegacy)
            .with_throughput_repeats(1);
        let summaries = MetricExtractor::new(config).extract_log(log).unwrap();
        let points = &summaries[0].points;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].quantization, Quantization::Uncompressed);
        assert_eq!(points[1].quantization, Quantization::Product { subspaces: None });
        assert_eq!(points[1].on_disk, Some(true));
        assert!((points[1].throughput - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_summaries() {
        let log = "\
a: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.5000 in 1.00s

b: 10 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.6000 in 1.00s

a: 10 base and 10 query vectors loaded, dimensions 4
BinaryQuantization encoded 10 vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.7000 in 1.00s

a: 20 base and 10 query vectors loaded, dimensions 4
Uncompressed vectors
Build M=8 ef=16 in 0.01s with 0.50 short edges
  Query top 10/1 recall 0.8000 in 1.00s
";
        let summaries = MetricExtractor::default().extract_log(log).unwrap();
        assert_eq!(summaries.len(), 4);

        let merged = merge_summaries(summaries);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].name, "a");
        assert_eq!(merged[0].points.len(), 2);
        assert_eq!(merged[0].points[1].quantization, Quantization::Binary);
        assert_eq!(merged[1].name, "b");
        assert_eq!(merged[2].base_vector_count, 20);
    }

    #[test]
    fn test_quantization_labels() {
        assert_eq!(Quantization::Product { subspaces: Some(32) }.to_string(), "PQ@32");
        assert_eq!(Quantization::Binary.to_string(), "BQ");
        assert_eq!(Quantization::Uncompressed.to_string(), "UC");
        let point = MeasurementPoint {
            quantization: Quantization::Binary,
            recall: 0.9,
            throughput: 100.0,
            m: 16,
            ef: 100,
            top_k: 100,
            overquery: 2,
            on_disk: None,
            nodes_visited: None,
        };
        assert_eq!(point.label(), "Q=BQ, M=16, ef=100, oq=2");
    }
}
