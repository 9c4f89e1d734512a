//! Error types for benchmark log analysis.
//!
//! Parsing is lenient about structure (orphan lines are dropped and logged) but
//! strict about values: a line that matches a pattern and then fails numeric
//! conversion aborts the pass with its line number attached.

use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by the parsing, extraction and fitting pipelines.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A captured field could not be converted to the type it stands for.
    #[error("line {line}: {field} value {value:?} is not {expected}")]
    FormatMismatch {
        /// 1-based line number in the input
        line: usize,
        /// Name of the captured field
        field: &'static str,
        /// Raw captured text
        value: String,
        /// Human readable description of what was expected
        expected: &'static str,
    },

    /// A query result arrived before the context it must be attributed to.
    #[error("line {line}: query result appears before any {missing} context line")]
    MissingContext {
        line: usize,
        missing: &'static str,
    },

    /// A context line named more than one quantization mode.
    #[error("line {line}: more than one quantization mode named on a single line")]
    AmbiguousQuantization { line: usize },

    /// The sample selection for a model left too few distinct points to fit it.
    ///
    /// `samples` counts distinct values of the model's independent variables,
    /// so repeated measurements at one K or N count once.
    #[error(
        "insufficient data for {model}: {samples} distinct samples selected, \
         at least {required} required"
    )]
    InsufficientData {
        model: String,
        samples: usize,
        required: usize,
    },

    /// The least-squares solver gave up.
    #[error("solver did not converge after {iterations} iterations: {reason}")]
    Convergence { iterations: usize, reason: String },

    /// The requested dataset is not present in the records.
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    /// An input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ResourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file was read but is not the JSON we expected.
    #[error("invalid JSON in {}: {source}", path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// True for failures that come from the data rather than from I/O.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::FormatMismatch { .. }
                | AnalysisError::MissingContext { .. }
                | AnalysisError::AmbiguousQuantization { .. }
                | AnalysisError::InsufficientData { .. }
        )
    }
}

/// Parse an unsigned integer capture, reporting the line on failure.
pub(crate) fn parse_count(line: usize, field: &'static str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|_| AnalysisError::FormatMismatch {
        line,
        field,
        value: raw.to_string(),
        expected: "an unsigned integer",
    })
}

/// Parse an unsigned integer capture that must be at least 1.
pub(crate) fn parse_positive_count(line: usize, field: &'static str, raw: &str) -> Result<u64> {
    let value = parse_count(line, field, raw)?;
    if value == 0 {
        return Err(AnalysisError::FormatMismatch {
            line,
            field,
            value: raw.to_string(),
            expected: "at least 1",
        });
    }
    Ok(value)
}

/// Parse an unsigned integer capture that must fit in 32 bits.
pub(crate) fn parse_u32(line: usize, field: &'static str, raw: &str) -> Result<u32> {
    let value = parse_count(line, field, raw)?;
    u32::try_from(value).map_err(|_| AnalysisError::FormatMismatch {
        line,
        field,
        value: raw.to_string(),
        expected: "an unsigned 32-bit integer",
    })
}

/// Parse a 32-bit count that must be at least 1.
pub(crate) fn parse_positive_u32(line: usize, field: &'static str, raw: &str) -> Result<u32> {
    let value = parse_u32(line, field, raw)?;
    if value == 0 {
        return Err(AnalysisError::FormatMismatch {
            line,
            field,
            value: raw.to_string(),
            expected: "at least 1",
        });
    }
    Ok(value)
}

/// Parse a floating point capture, reporting the line on failure.
pub(crate) fn parse_float(line: usize, field: &'static str, raw: &str) -> Result<f64> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AnalysisError::FormatMismatch {
            line,
            field,
            value: raw.to_string(),
            expected: "a finite number",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_rejects_overflow() {
        let err = parse_count(7, "N", "99999999999999999999999").unwrap_err();
        match err {
            AnalysisError::FormatMismatch { line, field, .. } => {
                assert_eq!(line, 7);
                assert_eq!(field, "N");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_positive_count_rejects_zero() {
        assert!(parse_positive_count(1, "K", "0").is_err());
        assert_eq!(parse_positive_count(1, "K", "12").unwrap(), 12);
    }

    #[test]
    fn test_parse_u32_rejects_values_past_u32() {
        match parse_u32(3, "M", "4294967312") {
            Err(AnalysisError::FormatMismatch { line, field, value, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(field, "M");
                assert_eq!(value, "4294967312");
            }
            other => panic!("expected format mismatch, got {other:?}"),
        }
        assert_eq!(parse_u32(3, "M", "4294967295").unwrap(), u32::MAX);
        assert!(parse_positive_u32(3, "overquery", "0").is_err());
        assert_eq!(parse_positive_u32(3, "overquery", "4").unwrap(), 4);
    }

    #[test]
    fn test_parse_float() {
        assert!((parse_float(1, "recall", "0.9512").unwrap() - 0.9512).abs() < 1e-12);
        assert!(parse_float(1, "recall", "NaN").is_err());
        assert!(parse_float(1, "recall", "1.2.3").is_err());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = AnalysisError::InsufficientData {
            model: "cost_vs_K".to_string(),
            samples: 2,
            required: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("cost_vs_K"));
        assert!(msg.contains("2 distinct samples"));
        assert!(err.is_data_error());

        let err = AnalysisError::Convergence {
            iterations: 10,
            reason: "step stalled".to_string(),
        };
        assert!(!err.is_data_error());
    }
}
