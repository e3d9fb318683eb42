/// Data layer: table model, loading, column groups and cluster selection.
///
/// Architecture:
/// ```text
///  .csv / .npy / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  named columns, input order preserved
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  selected clusters → highlighted rows
///   └──────────┘
/// ```

pub mod filter;
pub mod groups;
pub mod loader;
pub mod model;
