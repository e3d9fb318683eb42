use crate::clustering::{ClusteringResult, ClusteringRoutine};
use crate::config::{PlotSpec, SessionConfig, log_rho_column, ordered_index_column};
use crate::data::model::Table;
use crate::error::{PipelineError, Result};

use super::adapter::run_clustering;
use super::feature_table::build_feature_table;
use super::merge::merge_feature_tables;

/// Number of distinct colours cycled through by non-root cluster bands.
pub const BAND_COLOURS: usize = 9;

// ---------------------------------------------------------------------------
// View requests handed to the viewer
// ---------------------------------------------------------------------------

/// One cluster drawn as a coloured band on an ordered-density plot.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterBand {
    pub id: String,
    /// Half-open range of ordered indices.
    pub start: usize,
    pub end: usize,
    /// `None` for the root cluster.
    pub colour_slot: Option<usize>,
}

impl ClusterBand {
    pub fn contains_rank(&self, rank: usize) -> bool {
        (self.start..self.end).contains(&rank)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewRequest {
    /// Density against ordered index for one feature space, banded by cluster.
    OrderedDensity {
        space: String,
        x_column: String,
        y_column: String,
        bands: Vec<ClusterBand>,
    },
    Plot(PlotSpec),
}

impl ViewRequest {
    pub fn title(&self) -> String {
        match self {
            ViewRequest::OrderedDensity { space, .. } => {
                format!("Ordered-Density Plot for {space} Space (coloured by cluster ID)")
            }
            ViewRequest::Plot(spec) => format!("{}: {}", spec.kind, spec.axes.join(" / ")),
        }
    }

    /// Every master-table column the view reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ViewRequest::OrderedDensity { x_column, y_column, .. } => vec![x_column.as_str(), y_column.as_str()],
            ViewRequest::Plot(spec) => spec.axes.iter().map(String::as_str).collect(),
        }
    }
}

fn ordered_density_view(space: &str, result: &ClusteringResult) -> ViewRequest {
    let bands = result
        .clusters
        .iter()
        .zip(&result.ids)
        .enumerate()
        .map(|(i, (&(start, end), id))| ClusterBand {
            id: id.clone(),
            start,
            end,
            colour_slot: (i > 0).then(|| (i - 1) % BAND_COLOURS),
        })
        .collect();
    ViewRequest::OrderedDensity {
        space: space.to_string(),
        x_column: ordered_index_column(space),
        y_column: log_rho_column(space),
        bands,
    }
}

// ---------------------------------------------------------------------------
// Session – one orchestrated run
// ---------------------------------------------------------------------------

/// The outcome of one run: the master table and the views to open.
#[derive(Debug, Clone)]
pub struct Session {
    pub master: Table,
    /// Clustering output per feature space, in configuration order.
    pub results: Vec<(String, ClusteringResult)>,
    /// Ordered-density overlays first, then the requested plots.
    pub views: Vec<ViewRequest>,
}

impl Session {
    /// Validate, cluster each feature space in turn, merge, then check plots.
    ///
    /// Any failure aborts the whole run; nothing is returned for the viewer.
    pub fn run(config: SessionConfig, routine: &dyn ClusteringRoutine) -> Result<Session> {
        config.validate()?;
        let SessionConfig {
            source,
            feature_spaces,
            plots,
        } = config;
        log::info!(
            "Starting session: {source}, {} feature space(s), {} plot(s)",
            feature_spaces.len(),
            plots.len()
        );

        let mut results = Vec::with_capacity(feature_spaces.len());
        let mut tables = Vec::with_capacity(feature_spaces.len());
        for space in &feature_spaces {
            let result = run_clustering(routine, &source, space)?;
            tables.push(build_feature_table(&source, &space.name, &result)?);
            results.push((space.name.clone(), result));
        }

        let master = merge_feature_tables(&source, tables)?;

        let mut views: Vec<ViewRequest> = results
            .iter()
            .map(|(space, result)| ordered_density_view(space, result))
            .collect();
        views.extend(plots.into_iter().map(ViewRequest::Plot));

        for view in &views {
            if let Some(missing) = view.columns().into_iter().find(|c| master.index_of(c).is_none()) {
                return Err(PipelineError::unknown_column(missing, format!("view '{}'", view.title())));
            }
        }

        Ok(Session {
            master,
            results,
            views,
        })
    }

    /// The ordered-density view of `space`, if it was clustered.
    pub fn density_view(&self, space: &str) -> Option<&ViewRequest> {
        self.views.iter().find(|v| matches!(v, ViewRequest::OrderedDensity { space: s, .. } if s == space))
    }
}
