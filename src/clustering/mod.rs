//! Clustering routines and the result contract the pipeline relies on.
//!
//! The pipeline only talks to [`ClusteringRoutine`]. [`DensityLink`] is the
//! built-in routine; anything else (bindings to an external library, a
//! precomputed result loader, test doubles) plugs in through the same trait.

mod density_link;

use nalgebra::DMatrix;

use crate::config::ClusterParams;
use crate::error::{PipelineError, Result, RoutineError};

pub use density_link::{DensityLink, DensityLinkError};

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Output of one clustering run over an N×K feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringResult {
    pub n_samples: usize,
    /// Log density per sample, indexed by original row.
    pub log_rho: Vec<f64>,
    /// `ordering[i]` is the original row of the i-th point in processing order.
    pub ordering: Vec<usize>,
    /// Half-open `[start, end)` ranges into `ordering`; the root comes first.
    pub clusters: Vec<(usize, usize)>,
    /// One label per entry of `clusters`.
    pub ids: Vec<String>,
}

impl ClusteringResult {
    /// Density values rearranged into processing order.
    pub fn log_rho_ordered(&self) -> Vec<f64> {
        self.ordering.iter().map(|&r| self.log_rho[r]).collect()
    }

    /// Check the result against a table of `n_rows` rows.
    ///
    /// Shape problems are reported as `ClusteringFailed`; a bad ordering as
    /// `MalformedOrdering`.
    pub fn validate(&self, space: &str, n_rows: usize) -> Result<()> {
        if self.n_samples != n_rows {
            return Err(PipelineError::clustering_failed(
                space,
                format!("n_samples is {} but the table has {n_rows} rows", self.n_samples),
            ));
        }
        if self.log_rho.len() != n_rows {
            return Err(PipelineError::clustering_failed(
                space,
                format!("logRho has {} values for {n_rows} rows", self.log_rho.len()),
            ));
        }
        inverse_permutation(&self.ordering, n_rows).map_err(|reason| {
            PipelineError::MalformedOrdering {
                space: space.to_string(),
                reason,
            }
        })?;
        if self.ids.len() != self.clusters.len() {
            return Err(PipelineError::clustering_failed(
                space,
                format!("{} ids for {} clusters", self.ids.len(), self.clusters.len()),
            ));
        }
        if let Some(&(start, end)) = self
            .clusters
            .iter()
            .find(|&&(start, end)| start > end || end > n_rows)
        {
            return Err(PipelineError::clustering_failed(
                space,
                format!("cluster range [{start}, {end}) is outside 0..{n_rows}"),
            ));
        }
        Ok(())
    }
}

/// Rank of every original row within `ordering`, i.e. the inverse permutation.
///
/// Fails when `ordering` is not a permutation of `0..n`.
pub fn inverse_permutation(ordering: &[usize], n: usize) -> std::result::Result<Vec<usize>, String> {
    if ordering.len() != n {
        return Err(format!("length {} for {n} rows", ordering.len()));
    }
    let mut rank = vec![usize::MAX; n];
    for (pos, &row) in ordering.iter().enumerate() {
        if row >= n {
            return Err(format!("index {row} at position {pos} is out of range"));
        }
        if rank[row] != usize::MAX {
            return Err(format!("index {row} appears more than once"));
        }
        rank[row] = pos;
    }
    Ok(rank)
}

// ---------------------------------------------------------------------------
// Routine seam
// ---------------------------------------------------------------------------

/// A hierarchical density-clustering routine.
///
/// Implementations receive the parameters untouched, including `"auto"`
/// settings, and run to completion before returning.
pub trait ClusteringRoutine {
    fn cluster(
        &self,
        data: &DMatrix<f64>,
        params: &ClusterParams,
    ) -> std::result::Result<ClusteringResult, RoutineError>;
}

impl<F> ClusteringRoutine for F
where
    F: Fn(&DMatrix<f64>, &ClusterParams) -> std::result::Result<ClusteringResult, RoutineError>,
{
    fn cluster(
        &self,
        data: &DMatrix<f64>,
        params: &ClusterParams,
    ) -> std::result::Result<ClusteringResult, RoutineError> {
        self(data, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn inverse_of_example_ordering() {
        assert_eq!(inverse_permutation(&[3, 1, 0, 2], 4).unwrap(), vec![2, 1, 3, 0]);
    }

    #[test]
    fn duplicate_index_is_malformed() {
        let res = result(vec![3, 1, 1, 2]).validate("pos", 4);
        assert!(matches!(res, Err(PipelineError::MalformedOrdering { space, .. }) if space == "pos"));
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        let res = result(vec![0, 1, 2, 4]).validate("pos", 4);
        assert!(matches!(res, Err(PipelineError::MalformedOrdering { .. })));
    }

    #[test]
    fn wrong_sample_count_fails_clustering() {
        let res = result(vec![0, 1, 2, 3]).validate("pos", 5);
        assert!(matches!(res, Err(PipelineError::ClusteringFailed { .. })));
    }

    #[test]
    fn cluster_range_past_end_fails() {
        let mut r = result(vec![0, 1, 2, 3]);
        r.clusters.push((2, 6));
        r.ids.push("1-1".into());
        assert!(matches!(r.validate("pos", 4), Err(PipelineError::ClusteringFailed { .. })));
    }

    #[test]
    fn ordered_density() {
        assert_eq!(result(vec![3, 1, 0, 2]).log_rho_ordered(), vec![-4.0, -2.0, -1.0, -3.0]);
    }
}
