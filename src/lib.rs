//! AstroGlue: run hierarchical density clustering over feature spaces of an
//! astrophysical table, merge the results back in input order, and describe
//! the linked views to open.
//!
//! ```no_run
//! use astroglue::clustering::DensityLink;
//! use astroglue::config::{FeatureSpace, PlotKind, PlotSpec, SessionConfig};
//! use astroglue::data::loader::load_file;
//! use astroglue::pipeline::Session;
//!
//! let config = SessionConfig {
//!     source: load_file("galaxy.csv".as_ref())?,
//!     feature_spaces: vec![FeatureSpace::new("pos", &["x", "y", "z"])],
//!     plots: vec![PlotSpec::new(PlotKind::Scatter2D, &["x", "y"])],
//! };
//! let session = Session::run(config, &DensityLink)?;
//! println!("{}", session.master);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod clustering;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod projection;

pub use error::{PipelineError, Result};
