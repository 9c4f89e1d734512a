//! Text and CSV output for Pareto frontiers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::extract::{DatasetSummary, MeasurementPoint};
use crate::pareto::{pareto_frontier, sort_by_recall};

/// A dataset reduced to its Pareto-optimal points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontierReport {
    pub name: String,
    pub base_vector_count: u64,
    pub dimensions: u64,
    /// Number of points before filtering
    pub candidates: usize,
    /// Pareto-optimal points, sorted by recall
    pub frontier: Vec<MeasurementPoint>,
}

impl FrontierReport {
    pub fn from_summary(summary: &DatasetSummary) -> Self {
        let mut frontier = pareto_frontier(&summary.points);
        sort_by_recall(&mut frontier);
        Self {
            name: summary.name.clone(),
            base_vector_count: summary.base_vector_count,
            dimensions: summary.dimensions,
            candidates: summary.points.len(),
            frontier,
        }
    }

    /// Title line for this dataset.
    pub fn title(&self) -> String {
        format!(
            "Dataset: {} (base vectors: {}, dimensions: {})",
            self.name, self.base_vector_count, self.dimensions
        )
    }

    /// File the CSV for this dataset is written to under `output_dir`.
    ///
    /// Characters other than ASCII alphanumerics, `-`, `_` and `.` in the
    /// dataset name become `_`, so the file always lands directly in
    /// `output_dir`.
    pub fn csv_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_pareto.csv", file_stem(&self.name)))
    }

    /// Write the frontier as CSV into `output_dir`, returning the file path.
    pub fn save_csv(&self, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let path = self.csv_path(output_dir);
        let mut csv = csv::Writer::from_path(&path)?;
        csv.write_record(["quantization", "m", "ef", "top_k", "overquery", "recall", "qps"])?;
        for p in &self.frontier {
            csv.write_record([
                p.quantization.to_string(),
                p.m.to_string(),
                p.ef.to_string(),
                p.top_k.to_string(),
                p.overquery.to_string(),
                format!("{:.4}", p.recall),
                format!("{:.1}", p.throughput),
            ])?;
        }
        csv.flush()?;
        Ok(path)
    }

    /// Fixed-width table of the frontier.
    pub fn write_table<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "\n{}", self.title())?;
        writeln!(out, "{}", "-".repeat(70))?;
        writeln!(
            out,
            "{:>8} {:>4} {:>6} {:>4} {:>6} {:>10} {:>12}",
            "quant", "M", "ef", "k", "oq", "recall", "QPS"
        )?;
        writeln!(out, "{}", "-".repeat(70))?;
        for p in &self.frontier {
            writeln!(
                out,
                "{:>8} {:>4} {:>6} {:>4} {:>6} {:>9.2}% {:>12.1}",
                p.quantization.to_string(),
                p.m,
                p.ef,
                p.top_k,
                p.overquery,
                p.recall * 100.0,
                p.throughput
            )?;
        }
        writeln!(out, "{}", "-".repeat(70))?;
        writeln!(
            out,
            "{} of {} points on the frontier",
            self.frontier.len(),
            self.candidates
        )?;
        Ok(())
    }
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();
    match stem.trim_matches('.') {
        "" => "dataset".to_string(),
        _ => stem,
    }
}
