use std::collections::{BTreeMap, BTreeSet};

use crate::pipeline::{Session, ViewRequest};

// ---------------------------------------------------------------------------
// Cluster selection: which bands are picked per feature space
// ---------------------------------------------------------------------------

/// Per-feature-space selection: space name → indices of selected bands.
/// An absent or empty set selects nothing.
pub type SelectionState = BTreeMap<String, BTreeSet<usize>>;

/// Where a highlighted row's colour comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    /// Index into `Session::views`.
    pub view: usize,
    /// Index into that view's bands.
    pub band: usize,
}

/// For every master-table row, the selected band it falls in (if any).
///
/// A row is in a band when its `ordered_index_<space>` lies in the band's
/// range. When several selected bands hold a row, the one listed last wins,
/// which for nested clusters is the innermost.
pub fn highlighted_rows(session: &Session, selection: &SelectionState) -> Vec<Option<Highlight>> {
    let mut out = vec![None; session.master.n_rows()];

    for (view_idx, view) in session.views.iter().enumerate() {
        let ViewRequest::OrderedDensity { space, x_column, bands, .. } = view else {
            continue;
        };
        let Some(selected) = selection.get(space).filter(|s| !s.is_empty()) else {
            continue;
        };
        let Some(ranks) = session.master.column(x_column).and_then(|c| c.as_index()) else {
            log::warn!("Column '{x_column}' missing from master table; selection ignored");
            continue;
        };

        for &band_idx in selected {
            let Some(band) = bands.get(band_idx) else {
                continue;
            };
            for (row, &rank) in ranks.iter().enumerate() {
                if band.contains_rank(rank) {
                    out[row] = Some(Highlight {
                        view: view_idx,
                        band: band_idx,
                    });
                }
            }
        }
    }
    out
}

/// Flip one band in the selection.
pub fn toggle_band(selection: &mut SelectionState, space: &str, band: usize) {
    let selected = selection.entry(space.to_string()).or_default();
    if !selected.remove(&band) {
        selected.insert(band);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::ClusteringResult;
    use crate::config::{FeatureSpace, SessionConfig};
    use crate::data::model::Table;
    use crate::error::RoutineError;
    use nalgebra::DMatrix;

    fn session() -> Session {
        let source = Table::from_float_columns(
            vec!["x".into()],
            vec![vec![0.0, 1.0, 2.0, 3.0, 4.0]],
        )
        .unwrap();
        let routine = |_: &DMatrix<f64>, _: &crate::config::ClusterParams| -> Result<ClusteringResult, RoutineError> {
            Ok(ClusteringResult {
                n_samples: 5,
                log_rho: vec![0.5; 5],
                ordering: vec![4, 3, 2, 1, 0],
                clusters: vec![(0, 5), (0, 2), (0, 1)],
                ids: vec!["1".into(), "1-1".into(), "1-1-1".into()],
            })
        };
        let config = SessionConfig {
            source,
            feature_spaces: vec![FeatureSpace::new("pos", &["x"])],
            plots: vec![],
        };
        Session::run(config, &routine).unwrap()
    }

    #[test]
    fn nothing_selected_highlights_nothing() {
        let s = session();
        assert!(highlighted_rows(&s, &SelectionState::new()).iter().all(Option::is_none));
    }

    #[test]
    fn selected_band_maps_back_to_rows() {
        let s = session();
        let mut sel = SelectionState::new();
        toggle_band(&mut sel, "pos", 1);

        let rows = highlighted_rows(&s, &sel);
        // ranks 0 and 1 are rows 4 and 3
        let lit: Vec<usize> = rows.iter().enumerate().filter(|(_, h)| h.is_some()).map(|(r, _)| r).collect();
        assert_eq!(lit, vec![3, 4]);
    }

    #[test]
    fn innermost_band_wins_and_toggle_clears() {
        let s = session();
        let mut sel = SelectionState::new();
        toggle_band(&mut sel, "pos", 1);
        toggle_band(&mut sel, "pos", 2);

        let rows = highlighted_rows(&s, &sel);
        assert_eq!(rows[4], Some(Highlight { view: 0, band: 2 }));
        assert_eq!(rows[3], Some(Highlight { view: 0, band: 1 }));

        toggle_band(&mut sel, "pos", 1);
        toggle_band(&mut sel, "pos", 2);
        assert!(highlighted_rows(&s, &sel).iter().all(Option::is_none));
    }
}
