use crate::error::{PipelineError, Result};

/// Positions of `requested` within `available`, in requested order.
pub fn resolve_columns(available: &[String], requested: &[String]) -> Result<Vec<usize>> {
    requested
        .iter()
        .map(|name| {
            available
                .iter()
                .position(|a| a == name)
                .ok_or_else(|| PipelineError::unknown_column(name, "source table"))
        })
        .collect()
}
