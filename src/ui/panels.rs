use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use astroglue::pipeline::ViewRequest;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – cluster selection widgets
// ---------------------------------------------------------------------------

/// Render the left panel: one collapsible cluster list per feature space.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Clusters");
    ui.separator();

    let Some(session) = &state.session else {
        ui.label("No session running.");
        return;
    };

    // Clone what we need so we can mutate state inside the loop.
    let spaces: Vec<(String, Vec<(String, Color32)>)> = session
        .views
        .iter()
        .filter_map(|view| match view {
            ViewRequest::OrderedDensity { space, bands, .. } => {
                Some((space.clone(), state.colours.legend_entries(bands)))
            }
            ViewRequest::Plot(_) => None,
        })
        .collect();

    if spaces.is_empty() {
        ui.label("No feature spaces were clustered.");
        return;
    }

    let mut toggled: Option<(String, usize)> = None;
    let mut cleared: Option<String> = None;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (space, legend) in &spaces {
                let selected = state.selection.get(space);
                let n_selected = selected.map_or(0, |s| s.len());
                let header_text = format!("{space}  ({n_selected}/{})", legend.len());

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(space)
                    .default_open(true)
                    .show(ui, |ui: &mut Ui| {
                        if ui.small_button("None").clicked() {
                            cleared = Some(space.clone());
                        }
                        for (band_idx, (id, colour)) in legend.iter().enumerate() {
                            let mut checked = selected.is_some_and(|s| s.contains(&band_idx));
                            let text = RichText::new(id).color(*colour);
                            if ui.checkbox(&mut checked, text).changed() {
                                toggled = Some((space.clone(), band_idx));
                            }
                        }
                    });
            }
        });

    if let Some((space, band)) = toggled {
        state.toggle_band(&space, band);
    }
    if let Some(space) = cleared {
        state.select_none(&space);
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let has_session = state.session.is_some();
            if ui
                .add_enabled(has_session, egui::Button::new("Export master table…"))
                .clicked()
            {
                export_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(has_session, egui::Button::new("Back to setup"))
                .clicked()
            {
                state.close_session();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(session) = &state.session {
            let lit = state.highlights.iter().filter(|h| h.is_some()).count();
            ui.label(format!(
                "{} rows, {} feature space(s), {lit} selected",
                session.master.n_rows(),
                session.results.len(),
            ));
        } else if let Some(path) = &state.setup.file_path {
            ui.label(format!("Setup: {}", path.display()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open galaxy data")
        .add_filter("Supported files", &["csv", "npy", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("NumPy", &["npy"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.close_session();
        if let Err(e) = state.load_source(&path) {
            log::error!("Failed to load file: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

pub fn export_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export master table")
        .add_filter("Parquet", &["parquet"])
        .set_file_name("master.parquet")
        .save_file();

    if let Some(path) = file {
        if let Err(e) = state.export_master(&path) {
            log::error!("Failed to export: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
