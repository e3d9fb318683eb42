//! Data-preparation pipeline.
//!
//! ```text
//!  SessionConfig
//!       │
//!       ▼
//!  columns::resolve_columns ──► adapter::run_clustering      (per feature space)
//!                                      │
//!                                      ▼
//!                          feature_table::build_feature_table
//!                                      │
//!                                      ▼
//!                          merge::merge_feature_tables  (left fold on "input order")
//!                                      │
//!                                      ▼
//!                           Session { master, views }
//! ```

pub mod adapter;
pub mod columns;
pub mod feature_table;
pub mod merge;
pub mod session;

pub use adapter::run_clustering;
pub use columns::resolve_columns;
pub use feature_table::{FeatureTable, build_feature_table};
pub use merge::merge_feature_tables;
pub use session::{ClusterBand, Session, ViewRequest};
