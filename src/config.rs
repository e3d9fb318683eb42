//! Session configuration: feature spaces, clustering parameters and plots.
//!
//! A session is either filled in through the setup form or read from a JSON
//! file (see [`SessionFile`]). Both paths end in a [`SessionConfig`] that is
//! passed by value into [`Session::run`](crate::pipeline::Session::run).

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::data::model::Table;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Setting<T> – a value or the literal "auto"
// ---------------------------------------------------------------------------

/// A parameter that is either an explicit value or `"auto"`.
///
/// What "auto" means is up to the clustering routine; configuration code
/// only carries it through.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Setting<T> {
    #[default]
    Auto,
    Value(T),
}

impl<T: Copy> Setting<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Setting::Auto => None,
            Setting::Value(v) => Some(*v),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Auto => write!(f, "auto"),
            Setting::Value(v) => write!(f, "{v}"),
        }
    }
}

impl<T: FromStr> FromStr for Setting<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            Ok(Setting::Auto)
        } else {
            s.parse().map(Setting::Value)
        }
    }
}

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Setting::Auto => serializer.serialize_str("auto"),
            Setting::Value(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Value(T),
            Keyword(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Value(v) => Ok(Setting::Value(v)),
            Repr::Keyword(k) if k.eq_ignore_ascii_case("auto") => Ok(Setting::Auto),
            Repr::Keyword(k) => Err(serde::de::Error::custom(format!(
                "expected a number or \"auto\", got \"{k}\""
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Clustering parameters
// ---------------------------------------------------------------------------

/// Per-feature-space parameter bundle, handed to the clustering routine as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// Feature rescaling mode (1 = standardise every feature).
    pub adaptive: i32,
    /// Nearest-neighbour count used for the density estimate.
    pub k_den: usize,
    /// Significance threshold for clusters.
    #[serde(rename = "S")]
    pub s: Setting<f64>,
    /// Nearest-neighbour count used when linking points into groups.
    pub k_link: Setting<usize>,
    /// Hierarchy behaviour selector.
    pub h_style: i32,
    /// Parallelism hint; -1 uses every available core.
    pub workers: i32,
    pub verbose: i32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            adaptive: 1,
            k_den: 20,
            s: Setting::Auto,
            k_link: Setting::Auto,
            h_style: 1,
            workers: -1,
            verbose: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Feature spaces
// ---------------------------------------------------------------------------

/// A named column subset over which clustering runs independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpace {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub params: ClusterParams,
}

impl FeatureSpace {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            params: ClusterParams::default(),
        }
    }

    pub fn with_params(mut self, params: ClusterParams) -> Self {
        self.params = params;
        self
    }

    /// Name of the rank column this space contributes to the master table.
    pub fn ordered_index_column(&self) -> String {
        ordered_index_column(&self.name)
    }

    /// Name of the density column this space contributes to the master table.
    pub fn log_rho_column(&self) -> String {
        log_rho_column(&self.name)
    }
}

pub fn ordered_index_column(space: &str) -> String {
    format!("ordered_index_{space}")
}

pub fn log_rho_column(space: &str) -> String {
    format!("log_rho_{space}")
}

/// Synthetic join key: the 0-based original row position.
pub const INPUT_ORDER: &str = "input order";

// ---------------------------------------------------------------------------
// Plot specifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlotKind {
    #[serde(rename = "histogram_1d", alias = "1D Histogram")]
    Histogram1D,
    #[serde(rename = "scatter_2d", alias = "2D Scatter Plot (rectilinear)")]
    Scatter2D,
    #[serde(rename = "scatter_aitoff", alias = "2D Scatter Plot (aitoff)")]
    ScatterAitoff,
    #[serde(rename = "scatter_3d", alias = "3D Scatter Plot")]
    Scatter3D,
}

impl PlotKind {
    pub const ALL: [PlotKind; 4] = [
        PlotKind::Histogram1D,
        PlotKind::Scatter2D,
        PlotKind::ScatterAitoff,
        PlotKind::Scatter3D,
    ];

    /// Number of column references the kind needs.
    pub fn axis_count(self) -> usize {
        match self {
            PlotKind::Histogram1D => 1,
            PlotKind::Scatter2D | PlotKind::ScatterAitoff => 2,
            PlotKind::Scatter3D => 3,
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlotKind::Histogram1D => "1D Histogram",
            PlotKind::Scatter2D => "2D Scatter Plot (rectilinear)",
            PlotKind::ScatterAitoff => "2D Scatter Plot (aitoff)",
            PlotKind::Scatter3D => "3D Scatter Plot",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub kind: PlotKind,
    pub axes: Vec<String>,
}

impl PlotSpec {
    pub fn new(kind: PlotKind, axes: &[&str]) -> Self {
        Self {
            kind,
            axes: axes.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Reject a spec whose axis count does not match its kind.
    pub fn check_arity(&self) -> Result<()> {
        let expected = self.kind.axis_count();
        if self.axes.len() != expected {
            return Err(PipelineError::AxisCountMismatch {
                kind: self.kind.to_string(),
                expected,
                found: self.axes.len(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Everything one orchestrator run needs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub source: Table,
    pub feature_spaces: Vec<FeatureSpace>,
    pub plots: Vec<PlotSpec>,
}

impl SessionConfig {
    /// Check everything that can be checked before any clustering runs.
    pub fn validate(&self) -> Result<()> {
        let available = self.source.column_names();
        let mut seen = HashSet::new();

        for space in &self.feature_spaces {
            if space.name.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "feature space name must not be empty".into(),
                ));
            }
            if !seen.insert(space.name.as_str()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "feature space '{}' is defined twice",
                    space.name
                )));
            }
            if space.columns.is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "feature space '{}' has no columns",
                    space.name
                )));
            }
            let mut cols = HashSet::new();
            for col in &space.columns {
                if !cols.insert(col.as_str()) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "column '{col}' listed twice in feature space '{}'",
                        space.name
                    )));
                }
                if !available.contains(col) {
                    return Err(PipelineError::unknown_column(
                        col,
                        format!("feature space '{}'", space.name),
                    ));
                }
            }
            if space.params.k_den == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "k_den must be positive in feature space '{}'",
                    space.name
                )));
            }
            if space.params.k_link == Setting::Value(0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "k_link must be positive in feature space '{}'",
                    space.name
                )));
            }
        }

        let produced = self.produced_columns();
        for plot in &self.plots {
            plot.check_arity()?;
            if let Some(missing) = plot.axes.iter().find(|a| !produced.contains(a.as_str())) {
                return Err(PipelineError::unknown_column(
                    missing,
                    format!("plot '{}'", plot.kind),
                ));
            }
        }
        Ok(())
    }

    /// Columns the master table will hold once every feature space is merged.
    pub fn produced_columns(&self) -> HashSet<String> {
        let mut cols: HashSet<String> = self.source.column_names().iter().cloned().collect();
        if !self.feature_spaces.is_empty() {
            cols.insert(INPUT_ORDER.to_string());
        }
        for space in &self.feature_spaces {
            cols.insert(space.ordered_index_column());
            cols.insert(space.log_rho_column());
        }
        cols
    }
}

// ---------------------------------------------------------------------------
// JSON session file
// ---------------------------------------------------------------------------

/// On-disk form of a session: the data path instead of the loaded table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub data: PathBuf,
    /// Column names for headerless inputs (`.npy`).
    #[serde(default)]
    pub column_names: Option<Vec<String>>,
    #[serde(default)]
    pub feature_spaces: Vec<FeatureSpace>,
    #[serde(default)]
    pub plots: Vec<PlotSpec>,
}

impl SessionFile {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        let mut file: SessionFile = serde_json::from_str(&text).context("parsing session file")?;
        if file.data.is_relative() {
            if let Some(dir) = path.parent() {
                file.data = dir.join(&file.data);
            }
        }
        Ok(file)
    }

    /// Load the referenced data and produce a runnable config.
    pub fn into_config(self) -> anyhow::Result<SessionConfig> {
        let source = crate::data::loader::load_file_with_names(
            &self.data,
            self.column_names.as_deref(),
        )?;
        Ok(SessionConfig {
            source,
            feature_spaces: self.feature_spaces,
            plots: self.plots,
        })
    }
}
