use crate::config::INPUT_ORDER;
use crate::data::model::Table;
use crate::error::{PipelineError, Result};

use super::feature_table::FeatureTable;

/// Fold the per-feature tables into the master table.
///
/// The first table is the accumulator; every later one contributes only its
/// `ordered_index_<space>` and `log_rho_<space>` columns through an inner join
/// on `input order`. Merge order follows configuration order. With no
/// feature spaces the source table is returned as is.
pub fn merge_feature_tables(source: &Table, tables: Vec<FeatureTable>) -> Result<Table> {
    let mut tables = tables.into_iter();
    let Some(first) = tables.next() else {
        log::info!("No feature spaces configured; master table is the source table");
        return Ok(source.clone());
    };

    let master = tables.try_fold(first.table, |acc, next| {
        let oi = next.ordered_index_column();
        let lr = next.log_rho_column();
        let slim = next.table.project(&[INPUT_ORDER, oi.as_str(), lr.as_str()])?;
        let merged = acc.inner_join(&slim, INPUT_ORDER)?;
        if merged.n_rows() == 0 {
            return Err(PipelineError::FeatureSpaceMergeEmpty { space: next.space });
        }
        log::debug!("Merged feature space '{}': {merged}", next.space);
        Ok(merged)
    })?;

    log::info!("Master table: {master}");
    Ok(master)
}
