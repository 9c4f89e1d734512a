//! Merge independent JSON result files into one object.
//!
//! Each input lands under the key of its file stem. A file that cannot be read
//! or parsed is skipped with a warning; the rest still make it into the
//! output.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tracing::warn;

use crate::error::{AnalysisError, Result};

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "results.json";

/// Result of combining a set of files.
#[derive(Debug, Default)]
pub struct CombineOutcome {
    /// File stem → parsed JSON, in input order
    pub combined: IndexMap<String, Value>,
    /// Files left out, with the reason
    pub skipped: Vec<(PathBuf, AnalysisError)>,
}

impl CombineOutcome {
    /// Write the combined object with four-space indentation.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut serializer =
            serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
        self.combined.serialize(&mut serializer)?;
        Ok(())
    }

    /// Write the combined object to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|source| AnalysisError::ResourceRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| AnalysisError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Key for a file: its name without directory or final extension.
pub fn file_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Combine JSON files, best effort.
///
/// Files sharing a stem overwrite earlier entries, keeping the first position.
pub fn combine_json_files<P: AsRef<Path>>(paths: &[P]) -> CombineOutcome {
    let mut outcome = CombineOutcome::default();
    for path in paths {
        let path = path.as_ref();
        match read_json(path) {
            Ok(value) => {
                outcome.combined.insert(file_key(path), value);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable result file");
                outcome.skipped.push((path.to_path_buf(), e));
            }
        }
    }
    outcome
}
