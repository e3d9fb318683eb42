use thiserror::Error;

/// Error type returned by routines plugged in through
/// [`ClusteringRoutine`](crate::clustering::ClusteringRoutine).
pub type RoutineError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong between configuration and the viewer handoff.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A requested or plotted column is absent from the table in scope.
    #[error("unknown column '{column}' in {scope}")]
    UnknownColumn { column: String, scope: String },

    /// The clustering routine failed or returned a result that breaks its contract.
    #[error("clustering failed for feature space '{space}': {source}")]
    ClusteringFailed {
        space: String,
        #[source]
        source: RoutineError,
    },

    /// The ordering is not a permutation of `0..N`.
    #[error("malformed ordering for feature space '{space}': {reason}")]
    MalformedOrdering { space: String, reason: String },

    /// An inner join on `input order` eliminated every row.
    #[error("merging feature space '{space}' left no rows")]
    FeatureSpaceMergeEmpty { space: String },

    /// A plot references the wrong number of columns for its kind.
    #[error("{kind} needs {expected} axis column(s), got {found}")]
    AxisCountMismatch {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("column length mismatch: {0}")]
    ShapeMismatch(String),

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

impl PipelineError {
    pub(crate) fn unknown_column(column: &str, scope: impl Into<String>) -> Self {
        PipelineError::UnknownColumn {
            column: column.to_string(),
            scope: scope.into(),
        }
    }

    pub(crate) fn clustering_failed(space: &str, source: impl Into<RoutineError>) -> Self {
        PipelineError::ClusteringFailed {
            space: space.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
