use crate::clustering::{ClusteringResult, inverse_permutation};
use crate::config::{INPUT_ORDER, log_rho_column, ordered_index_column};
use crate::data::model::{Column, Table};
use crate::error::{PipelineError, Result};

/// The source table plus one feature space's derived columns:
/// `ordered_index_<space>`, `log_rho_<space>` and `input order`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub space: String,
    pub table: Table,
}

impl FeatureTable {
    pub fn ordered_index_column(&self) -> String {
        ordered_index_column(&self.space)
    }

    pub fn log_rho_column(&self) -> String {
        log_rho_column(&self.space)
    }
}

/// Attach one clustering result to the source table, in original row order.
///
/// The densities are first laid out by rank (`logRho[ordering[i]]` at rank
/// `i`) and then joined back onto the source rows through each row's rank,
/// so `log_rho_<space>[r]` ends up equal to `logRho[r]`.
pub fn build_feature_table(
    source: &Table,
    space: &str,
    result: &ClusteringResult,
) -> Result<FeatureTable> {
    let n = source.n_rows();
    let malformed = |reason: String| PipelineError::MalformedOrdering {
        space: space.to_string(),
        reason,
    };
    let rank = inverse_permutation(&result.ordering, n).map_err(malformed)?;
    if result.log_rho.len() != n {
        return Err(PipelineError::clustering_failed(
            space,
            format!("logRho has {} values for {n} rows", result.log_rho.len()),
        ));
    }

    let oi_name = ordered_index_column(space);
    let lr_name = log_rho_column(space);

    let by_rank = Table::new(
        vec![oi_name.clone(), lr_name],
        vec![
            Column::Index((0..n).collect()),
            Column::Float(result.log_rho_ordered()),
        ],
    )?;
    let with_rank = source.clone().with_column(oi_name.clone(), Column::Index(rank))?;

    let joined = with_rank.inner_join(&by_rank, &oi_name)?;
    if joined.n_rows() != n {
        return Err(malformed(format!(
            "join on '{oi_name}' produced {} rows for {n} input rows",
            joined.n_rows()
        )));
    }
    let table = joined.with_column(INPUT_ORDER, Column::Index((0..n).collect()))?;

    log::debug!("Built per-feature table for '{space}': {table}");
    Ok(FeatureTable {
        space: space.to_string(),
        table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Table {
        Table::from_float_columns(
            vec!["x".into(), "y".into(), "z".into()],
            vec![
                vec![0.0, 1.0, 2.0, 3.0],
                vec![0.0, 1.0, 2.0, 3.0],
                vec![0.0, 1.0, 2.0, 3.0],
            ],
        )
        .unwrap()
    }

    fn result(ordering: Vec<usize>) -> ClusteringResult {
        ClusteringResult {
            n_samples: 4,
            log_rho: vec![-1.0, -2.0, -3.0, -4.0],
            ordering,
            clusters: vec![(0, 4)],
            ids: vec!["1".into()],
        }
    }

    #[test]
    fn ranks_and_densities_for_worked_example() {
        let ft = build_feature_table(&source(), "all", &result(vec![3, 1, 0, 2])).unwrap();
        let t = &ft.table;

        assert_eq!(t.n_rows(), 4);
        assert_eq!(
            t.column_names(),
            &["x", "y", "z", "ordered_index_all", "log_rho_all", "input order"].map(String::from)[..]
        );
        assert_eq!(t.column("ordered_index_all"), Some(&Column::Index(vec![2, 1, 3, 0])));
        assert_eq!(t.column("log_rho_all"), Some(&Column::Float(vec![-1.0, -2.0, -3.0, -4.0])));
        assert_eq!(t.column("input order"), Some(&Column::Index(vec![0, 1, 2, 3])));
        assert_eq!(t.column("x"), source().column("x"));
    }

    #[test]
    fn density_round_trips_for_every_row() {
        let res = ClusteringResult {
            n_samples: 6,
            log_rho: vec![0.1, 0.9, 0.4, 0.7, 0.2, 0.5],
            ordering: vec![1, 3, 5, 2, 4, 0],
            clusters: vec![(0, 6)],
            ids: vec!["1".into()],
        };
        let src = Table::from_float_columns(vec!["a".into()], vec![vec![0.0; 6]]).unwrap();
        let ft = build_feature_table(&src, "s", &res).unwrap();

        let ranks = ft.table.column("ordered_index_s").unwrap().as_index().unwrap().to_vec();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..6).collect::<Vec<_>>());

        let rho = ft.table.column("log_rho_s").unwrap().to_f64();
        assert_eq!(rho, res.log_rho);
    }

    #[test]
    fn duplicate_in_ordering_is_rejected() {
        let res = build_feature_table(&source(), "all", &result(vec![3, 1, 1, 2]));
        assert!(matches!(res, Err(PipelineError::MalformedOrdering { .. })));
    }

    #[test]
    fn short_ordering_is_rejected() {
        let res = build_feature_table(&source(), "all", &result(vec![0, 1, 2]));
        assert!(matches!(res, Err(PipelineError::MalformedOrdering { .. })));
    }

    #[test]
    fn clashing_source_column_is_reported() {
        let src = source()
            .with_column("ordered_index_all", Column::Index(vec![0, 1, 2, 3]))
            .unwrap();
        let res = build_feature_table(&src, "all", &result(vec![0, 1, 2, 3]));
        assert!(matches!(res, Err(PipelineError::DuplicateColumn(_))));
    }
}
