use std::{
    collections::HashSet,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use comms::{DataPoint, PointId};
use serde::Deserialize;

use crate::{MasterErr, Result};

/// The parameters of one classification run, as read from the JSON config file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterConfig {
    pub addr: String,
    pub workers: NonZeroUsize,
    pub k: NonZeroUsize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub collect: CollectConfig,
    pub training: DatasetConfig,
    pub queries: DatasetConfig,
}

fn default_shuffle() -> bool {
    true
}

/// Bounds the waits for a worker's requests during collection.
///
/// Without a timeout the master waits for as long as the connection stays open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectConfig {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: usize,
}

impl CollectConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetConfig {
    /// A CSV file, one point per line.
    Local { path: PathBuf },
    Inline { points: Vec<PointConfig> },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointConfig {
    pub features: Vec<f64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl MasterConfig {
    /// Reads and parses the config file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            MasterErr::InvalidConfig(format!("can't read {}: {e}", path.display()))
        })?;

        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| MasterErr::InvalidConfig(e.to_string()))
    }

    /// Loads both datasets and checks they can be classified together.
    ///
    /// # Returns
    /// The training set and the query set, in file order.
    ///
    /// # Errors
    /// `MasterErr::InvalidConfig` if a dataset can't be read or the validation fails.
    pub fn load_datasets(&self) -> Result<(Vec<DataPoint>, Vec<DataPoint>)> {
        let training = self.training.load(true)?;
        let queries = self.queries.load(false)?;
        validate(&training, &queries)?;
        Ok((training, queries))
    }
}

impl DatasetConfig {
    /// Materializes the dataset.
    ///
    /// # Arguments
    /// * `labeled` - Whether points carry a label. For CSV files the label is the last column,
    ///   query labels are dropped.
    pub fn load(&self, labeled: bool) -> Result<Vec<DataPoint>> {
        match self {
            DatasetConfig::Local { path } => {
                let text = fs::read_to_string(path).map_err(|e| {
                    MasterErr::InvalidConfig(format!("can't read {}: {e}", path.display()))
                })?;

                parse_csv(&text, labeled)
                    .map_err(|e| MasterErr::InvalidConfig(format!("{}: {e}", path.display())))
            }
            DatasetConfig::Inline { points } => points
                .iter()
                .map(|point| point.to_point(labeled))
                .collect(),
        }
    }
}

impl PointConfig {
    fn to_point(&self, labeled: bool) -> Result<DataPoint> {
        let label = self.label.clone().filter(|_| labeled);
        let features = self.features.clone();

        match &self.id {
            Some(id) => {
                let id = PointId::new(id.as_str())
                    .map_err(|e| MasterErr::InvalidConfig(e.to_string()))?;
                Ok(DataPoint::with_id(id, features, label))
            }
            None => Ok(DataPoint::new(features, label)),
        }
    }
}

/// Parses comma separated points, blank lines and lines starting with `#` are skipped.
fn parse_csv(text: &str, labeled: bool) -> std::result::Result<Vec<DataPoint>, String> {
    let mut points = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut columns: Vec<&str> = line.split(',').map(str::trim).collect();
        let label = if labeled {
            columns.pop().map(str::to_string)
        } else {
            None
        };

        let features = columns
            .iter()
            .map(|value| value.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("line {}: {e}", i + 1))?;

        points.push(DataPoint::new(features, label));
    }

    Ok(points)
}

/// Every training point labeled, one dimensionality for all points, unique query ids.
pub fn validate(training: &[DataPoint], queries: &[DataPoint]) -> Result<()> {
    if let Some(point) = training.iter().find(|p| p.label().is_none()) {
        return Err(MasterErr::InvalidConfig(format!(
            "training point {} has no label",
            point.id()
        )));
    }

    let mut points = training.iter().chain(queries);
    if let Some(first) = points.next() {
        let dim = first.dim();
        if let Some(point) = points.find(|p| p.dim() != dim) {
            return Err(MasterErr::InvalidConfig(format!(
                "point {} has {} features, expected {dim}",
                point.id(),
                point.dim()
            )));
        }
    }

    let mut seen = HashSet::with_capacity(queries.len());
    if let Some(point) = queries.iter().find(|p| !seen.insert(p.id())) {
        return Err(MasterErr::InvalidConfig(format!(
            "duplicated query id {}",
            point.id()
        )));
    }

    Ok(())
}
