//! Structured records produced from haystack benchmark logs.
//!
//! The JSON shape is fixed by downstream tooling:
//!
//! ```text
//! { "<dataset_name>": [ { "N": 2048, "data": [ {"K": 1, "B": 20, "F": 807}, ... ] }, ... ] }
//! ```
//!
//! Dataset order and build order follow the order of appearance in the log.
//! Fields that are parsed but not part of that shape (dataset dimensions, build
//! parameters) are kept in memory only.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// One query measurement within a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    /// Requested result count
    #[serde(rename = "K")]
    pub k: u64,
    /// Search budget (ordinals eligible for the search)
    #[serde(rename = "B")]
    pub budget: u64,
    /// Nodes visited
    #[serde(rename = "F")]
    pub visited: u64,
}

/// One index construction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    /// Candidate pool size (graph size). Fixed at creation.
    #[serde(rename = "N")]
    pub n: u64,

    /// Trials in order of appearance
    #[serde(rename = "data")]
    pub trials: Vec<Trial>,

    #[serde(skip)]
    pub m: Option<u32>,

    #[serde(skip)]
    pub ef: Option<u32>,

    /// Construction time in seconds, as logged
    #[serde(skip)]
    pub build_seconds: Option<f64>,

    /// Average short-edge fraction, as logged
    #[serde(skip)]
    pub short_edges: Option<f64>,
}

impl Build {
    /// Create a build with no trials and no recorded parameters.
    pub fn new(n: u64) -> Self {
        Self {
            n,
            trials: Vec::new(),
            m: None,
            ef: None,
            build_seconds: None,
            short_edges: None,
        }
    }

    /// Trials whose budget covered the whole graph.
    pub fn full_budget_trials(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter().filter(move |t| t.budget == self.n)
    }
}

/// Counts announced by a dataset header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetShape {
    pub base_vectors: u64,
    pub query_vectors: u64,
    pub dimensions: u64,
}

/// All builds recorded for one dataset.
///
/// Serializes as a bare array of builds; `shape` is only known when the
/// records came straight from a log.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Build>", into = "Vec<Build>")]
pub struct Dataset {
    pub shape: Option<DatasetShape>,
    pub builds: Vec<Build>,
}

impl Dataset {
    pub fn with_shape(shape: DatasetShape) -> Self {
        Self {
            shape: Some(shape),
            builds: Vec::new(),
        }
    }

    /// Total number of trials across all builds.
    pub fn trial_count(&self) -> usize {
        self.builds.iter().map(|b| b.trials.len()).sum()
    }
}

impl From<Vec<Build>> for Dataset {
    fn from(builds: Vec<Build>) -> Self {
        Self {
            shape: None,
            builds,
        }
    }
}

impl From<Dataset> for Vec<Build> {
    fn from(dataset: Dataset) -> Self {
        dataset.builds
    }
}

/// Dataset name → builds, in order of appearance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HaystackRecords {
    datasets: IndexMap<String, Dataset>,
}

impl HaystackRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Dataset> {
        self.datasets.get_mut(name)
    }

    /// Insert a dataset, replacing any earlier one with the same name.
    ///
    /// A replaced dataset keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, dataset: Dataset) -> Option<Dataset> {
        self.datasets.insert(name.into(), dataset)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.datasets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a dataset by name, or pick the only one when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<(&str, &Dataset)> {
        match name {
            Some(name) => self
                .datasets
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| AnalysisError::DatasetNotFound(name.to_string())),
            None if self.datasets.len() == 1 => self
                .datasets
                .get_index(0)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| AnalysisError::DatasetNotFound(String::new())),
            None => Err(AnalysisError::DatasetNotFound(format!(
                "<unspecified>; available: {}",
                self.names().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load records from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| AnalysisError::ResourceRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| AnalysisError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save records to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}
