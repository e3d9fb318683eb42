use crate::clustering::{ClusteringResult, ClusteringRoutine};
use crate::config::FeatureSpace;
use crate::data::model::Table;
use crate::error::{PipelineError, Result};

use super::columns::resolve_columns;

/// Run the routine over one feature space and check what comes back.
///
/// The call blocks until the routine returns; parameters are passed through
/// untouched.
pub fn run_clustering(
    routine: &dyn ClusteringRoutine,
    source: &Table,
    space: &FeatureSpace,
) -> Result<ClusteringResult> {
    let indices = resolve_columns(source.column_names(), &space.columns)?;
    let data = source.dense(&indices);
    log::info!(
        "Clustering feature space '{}' over {:?} ({} × {})",
        space.name,
        space.columns,
        data.nrows(),
        data.ncols()
    );

    let result = routine
        .cluster(&data, &space.params)
        .map_err(|e| PipelineError::ClusteringFailed {
            space: space.name.clone(),
            source: e,
        })?;
    result.validate(&space.name, source.n_rows())?;

    log::info!(
        "Feature space '{}': {} cluster(s) found",
        space.name,
        result.clusters.len().saturating_sub(1)
    );
    Ok(result)
}
