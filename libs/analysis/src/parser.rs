//! Line-oriented parser for haystack benchmark logs.
//!
//! The parser is a three-state machine:
//!
//! | State          | Dataset header | Build line        | Probe line     |
//! |----------------|----------------|-------------------|----------------|
//! | no dataset     | open dataset   | ignored           | ignored        |
//! | dataset        | open dataset   | open build        | ignored        |
//! | dataset+build  | open dataset   | open build        | append trial   |
//!
//! Every other line is ignored. State lives only for the duration of one call,
//! so parsing the same text twice yields identical records.

use std::io::BufRead;

use tracing::debug;

use crate::error::{parse_count, parse_float, parse_positive_count, parse_u32, Result};
use crate::format::{dataset_header, LogFormat};
use crate::record::{Build, Dataset, DatasetShape, HaystackRecords, Trial};

/// Parser for haystack logs in a given format.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecordParser {
    format: LogFormat,
}

/// Position of the parser within the record hierarchy.
enum Cursor {
    Idle,
    Dataset { name: String },
    Build { name: String },
}

impl LogRecordParser {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Parse a whole log held in memory.
    pub fn parse_str(&self, text: &str) -> Result<HaystackRecords> {
        self.parse_lines(text.lines())
    }

    /// Parse lines from a reader, in one pass.
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<HaystackRecords> {
        let mut records = HaystackRecords::new();
        let mut cursor = Cursor::Idle;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            self.step(&mut records, &mut cursor, idx + 1, &line)?;
        }
        Ok(records)
    }

    /// Parse a sequence of lines, in one pass.
    pub fn parse_lines<I, S>(&self, lines: I) -> Result<HaystackRecords>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records = HaystackRecords::new();
        let mut cursor = Cursor::Idle;
        for (idx, line) in lines.into_iter().enumerate() {
            self.step(&mut records, &mut cursor, idx + 1, line.as_ref())?;
        }
        debug!(
            datasets = records.len(),
            format = %self.format,
            "Parsed haystack log"
        );
        Ok(records)
    }

    fn step(
        &self,
        records: &mut HaystackRecords,
        cursor: &mut Cursor,
        line_no: usize,
        line: &str,
    ) -> Result<()> {
        let patterns = self.format.patterns();

        if let Some(caps) = dataset_header().captures(line) {
            let name = caps["name"].to_string();
            let shape = DatasetShape {
                base_vectors: parse_count(line_no, "base vectors", &caps["base"])?,
                query_vectors: parse_count(line_no, "query vectors", &caps["query"])?,
                dimensions: parse_count(line_no, "dimensions", &caps["dims"])?,
            };
            if records
                .insert(name.clone(), Dataset::with_shape(shape))
                .is_some()
            {
                debug!(
                    line = line_no,
                    dataset = %name,
                    "Dataset announced again; earlier builds discarded"
                );
            }
            *cursor = Cursor::Dataset { name };
            return Ok(());
        }

        if let Some(caps) = patterns.build.captures(line) {
            let name = match cursor {
                Cursor::Idle => {
                    debug!(line = line_no, "Build line with no open dataset; ignored");
                    return Ok(());
                }
                Cursor::Dataset { name } | Cursor::Build { name } => std::mem::take(name),
            };
            let mut build = Build::new(parse_positive_count(line_no, "N", &caps["n"])?);
            build.m = Some(parse_u32(line_no, "M", &caps["m"])?);
            build.ef = Some(parse_u32(line_no, "ef", &caps["ef"])?);
            build.build_seconds = Some(parse_float(line_no, "build time", &caps["secs"])?);
            build.short_edges = Some(parse_float(line_no, "short edges", &caps["short"])?);

            if let Some(dataset) = records.get_mut(&name) {
                dataset.builds.push(build);
            }
            *cursor = Cursor::Build { name };
            return Ok(());
        }

        if let Some(caps) = patterns.probe.captures(line) {
            let Cursor::Build { name } = cursor else {
                debug!(line = line_no, "Probe line with no open build; ignored");
                return Ok(());
            };
            let trial = Trial {
                k: parse_positive_count(line_no, "K", &caps["k"])?,
                budget: parse_count(line_no, "B", &caps["budget"])?,
                visited: parse_count(line_no, "F", &caps["visited"])?,
            };
            if let Some(build) = records
                .get_mut(name)
                .and_then(|dataset| dataset.builds.last_mut())
            {
                build.trials.push(trial);
            }
        }

        Ok(())
    }
}

/// Parse a haystack log with the default format.
pub fn parse_haystack(text: &str) -> Result<HaystackRecords> {
    LogRecordParser::default().parse_str(text)
}
