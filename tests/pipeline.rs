//! End-to-end runs of the session pipeline through the public API.

use std::cell::Cell;
use std::io::Write;

use nalgebra::DMatrix;

use astroglue::PipelineError;
use astroglue::clustering::{ClusteringResult, DensityLink};
use astroglue::config::{ClusterParams, FeatureSpace, PlotKind, PlotSpec, SessionConfig, SessionFile, Setting};
use astroglue::data::filter::{SelectionState, highlighted_rows, toggle_band};
use astroglue::data::model::{Column, Table};
use astroglue::error::RoutineError;
use astroglue::pipeline::{Session, ViewRequest};

fn four_rows() -> Table {
    Table::from_float_columns(
        vec!["x".into(), "y".into()],
        vec![vec![0.0, 1.0, 2.0, 3.0], vec![10.0, 11.0, 12.0, 13.0]],
    )
    .unwrap()
}

/// A routine that ignores the data and returns a fixed result.
fn fixed(
    ordering: Vec<usize>,
    log_rho: Vec<f64>,
) -> impl Fn(&DMatrix<f64>, &ClusterParams) -> Result<ClusteringResult, RoutineError> {
    move |data: &DMatrix<f64>, _: &ClusterParams| -> Result<ClusteringResult, RoutineError> {
        Ok(ClusteringResult {
            n_samples: data.nrows(),
            log_rho: log_rho.clone(),
            ordering: ordering.clone(),
            clusters: vec![(0, data.nrows()), (0, 2)],
            ids: vec!["1".into(), "1-1".into()],
        })
    }
}

#[test]
fn worked_example_produces_ranks_and_densities() {
    let config = SessionConfig {
        source: four_rows(),
        feature_spaces: vec![FeatureSpace::new("all", &["x", "y"])],
        plots: vec![],
    };
    let routine = fixed(vec![3, 1, 0, 2], vec![-1.0, -2.0, -3.0, -4.0]);
    let session = Session::run(config, &routine).unwrap();

    let master = &session.master;
    assert_eq!(
        master.column_names(),
        ["x", "y", "ordered_index_all", "log_rho_all", "input order"]
    );
    assert_eq!(master.column("ordered_index_all"), Some(&Column::Index(vec![2, 1, 3, 0])));
    assert_eq!(master.column("log_rho_all"), Some(&Column::Float(vec![-1.0, -2.0, -3.0, -4.0])));
    assert_eq!(master.column("input order"), Some(&Column::Index(vec![0, 1, 2, 3])));
}

#[test]
fn two_spaces_merge_into_one_master_table() {
    let config = SessionConfig {
        source: four_rows(),
        feature_spaces: vec![
            FeatureSpace::new("pos", &["x"]),
            FeatureSpace::new("vel", &["y"]),
        ],
        plots: vec![PlotSpec::new(
            PlotKind::Scatter2D,
            &["ordered_index_pos", "log_rho_vel"],
        )],
    };
    let routine = fixed(vec![0, 1, 2, 3], vec![0.1, 0.2, 0.3, 0.4]);
    let session = Session::run(config, &routine).unwrap();

    assert_eq!(session.master.n_rows(), 4);
    assert_eq!(session.master.n_columns(), 7);
    for col in ["ordered_index_pos", "log_rho_pos", "ordered_index_vel", "log_rho_vel"] {
        assert!(session.master.index_of(col).is_some(), "missing {col}");
    }
    assert_eq!(session.views.len(), 3);
    assert!(matches!(&session.views[0], ViewRequest::OrderedDensity { space, .. } if space == "pos"));
    assert!(matches!(&session.views[1], ViewRequest::OrderedDensity { space, .. } if space == "vel"));
    assert!(matches!(&session.views[2], ViewRequest::Plot(spec) if spec.kind == PlotKind::Scatter2D));
}

#[test]
fn no_feature_spaces_returns_the_source() {
    let config = SessionConfig {
        source: four_rows(),
        feature_spaces: vec![],
        plots: vec![PlotSpec::new(PlotKind::Histogram1D, &["x"])],
    };
    let session = Session::run(config, &DensityLink).unwrap();
    assert_eq!(session.master, four_rows());
    assert_eq!(session.views.len(), 1);
}

#[test]
fn malformed_ordering_stops_the_session() {
    let config = SessionConfig {
        source: four_rows(),
        feature_spaces: vec![FeatureSpace::new("pos", &["x"])],
        plots: vec![],
    };
    let routine = fixed(vec![0, 0, 1, 2], vec![0.0; 4]);
    let res = Session::run(config, &routine);
    assert!(matches!(res, Err(PipelineError::MalformedOrdering { space, .. }) if space == "pos"));
}

#[test]
fn routine_failure_names_the_space() {
    let config = SessionConfig {
        source: four_rows(),
        feature_spaces: vec![FeatureSpace::new("vel", &["y"])],
        plots: vec![],
    };
    let failing = |_: &DMatrix<f64>, _: &ClusterParams| -> Result<ClusteringResult, RoutineError> {
        Err("out of memory".into())
    };
    let err = Session::run(config, &failing).unwrap_err();
    assert!(matches!(&err, PipelineError::ClusteringFailed { space, .. } if space == "vel"));
    assert!(err.to_string().contains("out of memory"));
}

#[test]
fn three_d_plot_with_two_axes_is_rejected() {
    let config = SessionConfig {
        source: four_rows(),
        feature_spaces: vec![],
        plots: vec![PlotSpec::new(PlotKind::Scatter3D, &["x", "y"])],
    };
    let res = Session::run(config, &DensityLink);
    assert!(matches!(
        res,
        Err(PipelineError::AxisCountMismatch { expected: 3, found: 2, .. })
    ));
}

/// Run `config` with a routine that only counts how often it was called.
fn run_counting(config: SessionConfig) -> (Result<Session, PipelineError>, usize) {
    let calls = Cell::new(0);
    let counting = |data: &DMatrix<f64>, _: &ClusterParams| -> Result<ClusteringResult, RoutineError> {
        calls.set(calls.get() + 1);
        let n = data.nrows();
        Ok(ClusteringResult {
            n_samples: n,
            log_rho: vec![0.0; n],
            ordering: (0..n).collect(),
            clusters: vec![(0, n)],
            ids: vec!["1".into()],
        })
    };
    let res = Session::run(config, &counting);
    (res, calls.get())
}

fn two_space_config(plots: Vec<PlotSpec>) -> SessionConfig {
    SessionConfig {
        source: four_rows(),
        feature_spaces: vec![
            FeatureSpace::new("pos", &["x"]),
            FeatureSpace::new("vel", &["y"]),
        ],
        plots,
    }
}

#[test]
fn configuration_errors_stop_before_clustering() {
    let (res, calls) = run_counting(two_space_config(vec![PlotSpec::new(PlotKind::Scatter3D, &["x", "y"])]));
    assert!(matches!(res, Err(PipelineError::AxisCountMismatch { expected: 3, found: 2, .. })));
    assert_eq!(calls, 0);

    let (res, calls) = run_counting(two_space_config(vec![PlotSpec::new(PlotKind::Histogram1D, &["nope"])]));
    assert!(matches!(res, Err(PipelineError::UnknownColumn { column, .. }) if column == "nope"));
    assert_eq!(calls, 0);

    let mut config = two_space_config(vec![]);
    config.feature_spaces[1].name = "pos".into();
    let (res, calls) = run_counting(config);
    assert!(matches!(res, Err(PipelineError::InvalidConfig(_))));
    assert_eq!(calls, 0);
}

#[test]
fn valid_configuration_clusters_every_space_once() {
    let plots = vec![PlotSpec::new(PlotKind::Scatter2D, &["log_rho_pos", "log_rho_vel"])];
    let (res, calls) = run_counting(two_space_config(plots));
    assert!(res.is_ok());
    assert_eq!(calls, 2);
}

#[test]
fn plot_of_unclustered_space_is_unknown() {
    let config = SessionConfig {
        source: four_rows(),
        feature_spaces: vec![],
        plots: vec![PlotSpec::new(PlotKind::Histogram1D, &["log_rho_pos"])],
    };
    let res = Session::run(config, &DensityLink);
    assert!(matches!(res, Err(PipelineError::UnknownColumn { column, .. }) if column == "log_rho_pos"));
}

// ---------------------------------------------------------------------------
// Built-in routine
// ---------------------------------------------------------------------------

fn two_blobs() -> Table {
    let offsets = [
        (0.0, 0.0), (0.3, 0.1), (-0.2, 0.4), (0.1, -0.3), (-0.4, -0.1),
        (0.5, 0.5), (-0.5, 0.2), (0.2, 0.3), (-0.1, -0.5), (0.4, -0.2),
    ];
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (i, &(dx, dy)) in offsets.iter().enumerate() {
        x.push(dx);
        y.push(dy);
        let (ox, oy) = offsets[(i + 3) % 10];
        x.push(100.0 + ox);
        y.push(100.0 + oy);
    }
    Table::from_float_columns(vec!["x".into(), "y".into()], vec![x, y]).unwrap()
}

#[test]
fn density_link_session_end_to_end() {
    let params = ClusterParams {
        k_den: 5,
        k_link: Setting::Value(9),
        ..ClusterParams::default()
    };
    let config = SessionConfig {
        source: two_blobs(),
        feature_spaces: vec![FeatureSpace::new("pos", &["x", "y"]).with_params(params)],
        plots: vec![PlotSpec::new(PlotKind::Scatter2D, &["x", "y"])],
    };
    let session = Session::run(config, &DensityLink).unwrap();

    let (space, result) = &session.results[0];
    assert_eq!(space, "pos");
    assert_eq!(result.clusters[0], (0, 20));
    assert_eq!(result.ids[0], "1");

    let ranks = session
        .master
        .column("ordered_index_pos")
        .and_then(|c| c.as_index())
        .unwrap();
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..20).collect::<Vec<_>>());

    let log_rho = session.master.column("log_rho_pos").unwrap().to_f64();
    assert!(log_rho.iter().all(|v| (0.0..=1.0).contains(v)));

    // Selecting the root band lights up every row.
    let mut selection = SelectionState::new();
    toggle_band(&mut selection, "pos", 0);
    let lit = highlighted_rows(&session, &selection);
    assert!(lit.iter().all(|h| h.is_some()));
}

// ---------------------------------------------------------------------------
// Session files
// ---------------------------------------------------------------------------

#[test]
fn session_file_runs_relative_to_its_directory() {
    let dir = tempfile::tempdir().unwrap();

    let mut csv = std::fs::File::create(dir.path().join("stars.csv")).unwrap();
    writeln!(csv, "x,y,name").unwrap();
    for i in 0..12 {
        writeln!(csv, "{},{},star{i}", i as f64 * 0.5, (i % 3) as f64).unwrap();
    }
    drop(csv);

    let session_path = dir.path().join("session.json");
    std::fs::write(
        &session_path,
        r#"{
            "data": "stars.csv",
            "feature_spaces": [
                { "name": "pos", "columns": ["x", "y"], "params": { "k_den": 4, "S": "auto" } }
            ],
            "plots": [
                { "kind": "1D Histogram", "axes": ["log_rho_pos"] }
            ]
        }"#,
    )
    .unwrap();

    let file = SessionFile::read(&session_path).unwrap();
    assert_eq!(file.data, dir.path().join("stars.csv"));
    assert_eq!(file.feature_spaces[0].params.k_den, 4);

    let config = file.into_config().unwrap();
    // The text column is skipped by the loader.
    assert_eq!(config.source.column_names(), ["x", "y"]);

    let session = Session::run(config, &DensityLink).unwrap();
    assert_eq!(session.master.n_rows(), 12);
    assert_eq!(session.views.len(), 2);
}
