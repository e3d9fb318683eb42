use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use astroglue::clustering::DensityLink;
use astroglue::config::{ClusterParams, FeatureSpace, PlotKind, PlotSpec, SessionConfig};
use astroglue::data::filter::{Highlight, SelectionState, highlighted_rows, toggle_band};
use astroglue::data::groups::suggest_groups;
use astroglue::data::loader;
use astroglue::data::model::Table;
use astroglue::pipeline::Session;

use crate::color::BandColours;

// ---------------------------------------------------------------------------
// Setup form state
// ---------------------------------------------------------------------------

/// Text fields of the feature space being edited. Kept as strings so the
/// user can type freely; parsed when the space is added.
#[derive(Debug, Clone)]
pub struct FeatureSpaceDraft {
    pub name: String,
    pub selected: BTreeSet<String>,
    pub adaptive: String,
    pub k_den: String,
    pub s: String,
    pub k_link: String,
    pub h_style: String,
    pub workers: String,
    pub verbose: String,
}

impl Default for FeatureSpaceDraft {
    fn default() -> Self {
        let p = ClusterParams::default();
        Self {
            name: String::new(),
            selected: BTreeSet::new(),
            adaptive: p.adaptive.to_string(),
            k_den: p.k_den.to_string(),
            s: p.s.to_string(),
            k_link: p.k_link.to_string(),
            h_style: p.h_style.to_string(),
            workers: p.workers.to_string(),
            verbose: p.verbose.to_string(),
        }
    }
}

impl FeatureSpaceDraft {
    /// Parse the draft. `column_order` fixes the order of selected columns.
    pub fn to_feature_space(&self, column_order: &[String]) -> Result<FeatureSpace> {
        let name = self.name.trim();
        if name.is_empty() {
            bail!("Give the feature space a name");
        }
        let columns: Vec<String> = column_order
            .iter()
            .filter(|c| self.selected.contains(*c))
            .cloned()
            .collect();
        if columns.is_empty() {
            bail!("Select at least one column for '{name}'");
        }
        let params = ClusterParams {
            adaptive: self.adaptive.trim().parse().context("adaptive must be an integer")?,
            k_den: self.k_den.trim().parse().context("k_den must be a positive integer")?,
            s: self.s.parse().context("S must be a number or \"auto\"")?,
            k_link: self.k_link.parse().context("k_link must be an integer or \"auto\"")?,
            h_style: self.h_style.trim().parse().context("h_style must be an integer")?,
            workers: self.workers.trim().parse().context("workers must be an integer")?,
            verbose: self.verbose.trim().parse().context("verbose must be an integer")?,
        };
        Ok(FeatureSpace {
            name: name.to_string(),
            columns,
            params,
        })
    }
}

/// The plot being edited.
#[derive(Debug, Clone)]
pub struct PlotDraft {
    pub kind: PlotKind,
    pub axes: [String; 3],
}

impl Default for PlotDraft {
    fn default() -> Self {
        Self {
            kind: PlotKind::Scatter2D,
            axes: Default::default(),
        }
    }
}

impl PlotDraft {
    pub fn to_plot_spec(&self) -> Result<PlotSpec> {
        let axes: Vec<String> = self.axes[..self.kind.axis_count()].to_vec();
        if let Some(i) = axes.iter().position(|a| a.is_empty()) {
            bail!("Choose axis {} for the {}", i + 1, self.kind);
        }
        Ok(PlotSpec {
            kind: self.kind,
            axes,
        })
    }
}

/// Everything the setup form collects before a session starts.
#[derive(Debug, Default)]
pub struct SetupState {
    pub file_path: Option<PathBuf>,
    /// Shared so the form can hold it across a frame cheaply.
    pub table: Option<Arc<Table>>,
    /// Column names as typed in the rename editor, one per table column.
    pub column_names: Vec<String>,
    /// False until a headerless file (`.npy`) has had its columns named.
    pub names_confirmed: bool,
    /// Suggested column groups (e.g. "Position" → x, y, z).
    pub groups: BTreeMap<String, Vec<String>>,
    pub feature_spaces: Vec<FeatureSpace>,
    pub draft: FeatureSpaceDraft,
    pub plots: Vec<PlotSpec>,
    pub plot_draft: PlotDraft,
}

impl SetupState {
    /// Columns the plot editor can offer: source columns plus the derived
    /// columns of every feature space added so far.
    pub fn plottable_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .table
            .as_ref()
            .map(|t| t.column_names().to_vec())
            .unwrap_or_default();
        for fs in &self.feature_spaces {
            cols.push(fs.ordered_index_column());
            cols.push(fs.log_rho_column());
        }
        cols
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub setup: SetupState,

    /// Result of the last successful run (None while in the setup form).
    pub session: Option<Session>,

    /// Selected cluster bands per feature space.
    pub selection: SelectionState,

    /// Per master-table row, the selected band it belongs to (cached).
    pub highlights: Vec<Option<Highlight>>,

    pub colours: BandColours,

    /// (yaw, pitch) per view, used by 3D scatter views.
    pub view_angles: Vec<(f64, f64)>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            setup: SetupState::default(),
            session: None,
            selection: SelectionState::new(),
            highlights: Vec::new(),
            colours: BandColours::default(),
            view_angles: Vec::new(),
            status_message: None,
        }
    }
}

impl AppState {
    pub fn with_session(session: Session) -> Self {
        let mut state = Self::default();
        state.set_session(session);
        state
    }

    /// Ingest a finished session and reset the selection.
    pub fn set_session(&mut self, session: Session) {
        self.selection = SelectionState::new();
        self.highlights = vec![None; session.master.n_rows()];
        self.view_angles = vec![(0.6, 0.4); session.views.len()];
        self.session = Some(session);
        self.status_message = None;
    }

    /// Back to the setup form, keeping what was entered.
    pub fn close_session(&mut self) {
        self.session = None;
        self.selection.clear();
        self.highlights.clear();
        self.view_angles.clear();
    }

    /// Load a data file into the setup form.
    pub fn load_source(&mut self, path: &Path) -> Result<()> {
        let table = loader::load_file(path)?;
        let headerless = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("npy"));
        self.setup.column_names = if headerless {
            vec![String::new(); table.n_columns()]
        } else {
            table.column_names().to_vec()
        };
        self.setup.names_confirmed = !headerless;
        self.setup.file_path = Some(path.to_path_buf());
        self.install_table(table);
        Ok(())
    }

    /// Apply the names typed in the rename editor to the loaded table.
    pub fn rename_columns(&mut self) -> Result<()> {
        let table = self.setup.table.as_deref().context("Load a data file first")?;
        let renamed = table.renamed(&self.setup.column_names)?;
        log::info!("Renamed columns to {:?}", renamed.column_names());
        self.setup.column_names = renamed.column_names().to_vec();
        self.setup.names_confirmed = true;
        self.install_table(renamed);
        Ok(())
    }

    /// Swap in a new source table; everything that refers to column names
    /// is derived again.
    fn install_table(&mut self, table: Table) {
        self.setup.groups = suggest_groups(table.column_names());
        self.setup.feature_spaces.clear();
        self.setup.plots.clear();
        self.setup.draft = FeatureSpaceDraft::default();
        self.setup.plot_draft = PlotDraft::default();
        self.setup.table = Some(Arc::new(table));
        self.status_message = None;
    }

    pub fn add_feature_space(&mut self) -> Result<()> {
        let columns = self
            .setup
            .table
            .as_ref()
            .map(|t| t.column_names().to_vec())
            .context("Load a data file first")?;
        let space = self.setup.draft.to_feature_space(&columns)?;
        if self.setup.feature_spaces.iter().any(|f| f.name == space.name) {
            bail!("A feature space named '{}' already exists", space.name);
        }
        log::info!("Added feature space '{}' over {:?}", space.name, space.columns);
        self.setup.feature_spaces.push(space);
        self.setup.draft = FeatureSpaceDraft::default();
        Ok(())
    }

    pub fn add_plot(&mut self) -> Result<()> {
        let plot = self.setup.plot_draft.to_plot_spec()?;
        self.setup.plots.push(plot);
        Ok(())
    }

    /// Run the pipeline on the form's contents and switch to the viewer.
    pub fn start_session(&mut self) -> Result<()> {
        let source = self
            .setup
            .table
            .as_deref()
            .cloned()
            .context("Load a data file first")?;
        let config = SessionConfig {
            source,
            feature_spaces: self.setup.feature_spaces.clone(),
            plots: self.setup.plots.clone(),
        };
        let session = Session::run(config, &DensityLink)?;
        self.set_session(session);
        Ok(())
    }

    /// Toggle one band and recompute the highlighted rows.
    pub fn toggle_band(&mut self, space: &str, band: usize) {
        toggle_band(&mut self.selection, space, band);
        self.refilter();
    }

    /// Clear the selection of one feature space.
    pub fn select_none(&mut self, space: &str) {
        self.selection.remove(space);
        self.refilter();
    }

    /// Recompute `highlights` after a selection change.
    pub fn refilter(&mut self) {
        if let Some(session) = &self.session {
            self.highlights = highlighted_rows(session, &self.selection);
        }
    }

    pub fn export_master(&self, path: &Path) -> Result<()> {
        let session = self.session.as_ref().context("No session to export")?;
        loader::save_parquet(&session.master, path)
    }
}
