use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use astroglue::config::PlotKind;
use astroglue::data::model::Table;

use crate::state::AppState;

/// Rows shown in the data preview.
const PREVIEW_ROWS: usize = 200;

// ---------------------------------------------------------------------------
// Setup form (central panel before a session starts)
// ---------------------------------------------------------------------------

pub fn setup_form(ui: &mut Ui, state: &mut AppState) {
    ui.heading("AstroGlue");
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Upload File").clicked() {
            super::panels::open_file_dialog(state);
        }
        match &state.setup.file_path {
            Some(path) => ui.label(path.display().to_string()),
            None => ui.label("No file loaded (.csv, .npy or .parquet)"),
        };
    });
    ui.separator();

    let Some(table) = state.setup.table.clone() else {
        return;
    };

    egui::CollapsingHeader::new(RichText::new("Data Table").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| data_preview(ui, &table));
    ui.separator();

    egui::CollapsingHeader::new(RichText::new("Column Names").strong())
        .default_open(!state.setup.names_confirmed)
        .show(ui, |ui: &mut Ui| column_name_editor(ui, state, &table));
    if !state.setup.names_confirmed {
        return;
    }
    ui.separator();

    ui.columns(2, |cols| {
        feature_space_editor(&mut cols[0], state, &table);
        plot_editor(&mut cols[1], state);
    });

    ui.separator();
    ui.vertical_centered(|ui: &mut Ui| {
        if ui
            .button(RichText::new("Save Preferences and Start -->").strong())
            .clicked()
        {
            if let Err(e) = state.start_session() {
                log::error!("Session failed: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    });
}

fn data_preview(ui: &mut Ui, table: &Table) {
    let n_rows = table.n_rows().min(PREVIEW_ROWS);
    ui.label(format!("{table}"));
    ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .max_scroll_height(220.0)
            .columns(TableColumn::auto().at_least(60.0), table.n_columns())
            .header(20.0, |mut header| {
                for name in table.column_names() {
                    header.col(|ui| {
                        ui.strong(name.as_str());
                    });
                }
            })
            .body(|body| {
                body.rows(18.0, n_rows, |mut row| {
                    let r = row.index();
                    for c in 0..table.n_columns() {
                        row.col(|ui| {
                            ui.label(format!("{:.4}", table.column_at(c).value(r)));
                        });
                    }
                });
            });
    });
}

/// One text field per column; headerless files must be named before the
/// rest of the form opens.
fn column_name_editor(ui: &mut Ui, state: &mut AppState, table: &Table) {
    ScrollArea::vertical()
        .id_salt("column_names")
        .max_height(200.0)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("column_names_grid").num_columns(2).show(ui, |ui: &mut Ui| {
                for (current, entry) in table.column_names().iter().zip(&mut state.setup.column_names) {
                    ui.label(current.as_str());
                    ui.text_edit_singleline(entry);
                    ui.end_row();
                }
            });
        });

    let all_named = state.setup.column_names.iter().all(|n| !n.trim().is_empty());
    if ui
        .add_enabled(all_named, egui::Button::new("Save and Next"))
        .clicked()
    {
        if let Err(e) = state.rename_columns() {
            state.status_message = Some(format!("{e:#}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Feature spaces
// ---------------------------------------------------------------------------

fn feature_space_editor(ui: &mut Ui, state: &mut AppState, table: &Table) {
    ui.strong("AstroLink Feature Spaces");

    let mut remove = None;
    for (i, fs) in state.setup.feature_spaces.iter().enumerate() {
        ui.horizontal(|ui: &mut Ui| {
            ui.label(format!("{}: {}", fs.name, fs.columns.join(", ")));
            if ui.small_button("✖").clicked() {
                remove = Some(i);
            }
        });
    }
    if let Some(i) = remove {
        let fs = state.setup.feature_spaces.remove(i);
        log::info!("Removed feature space '{}'", fs.name);
    }
    ui.separator();

    let draft = &mut state.setup.draft;

    if !state.setup.groups.is_empty() {
        ui.horizontal_wrapped(|ui: &mut Ui| {
            ui.label("Groups:");
            for (group, cols) in &state.setup.groups {
                if ui.small_button(group.as_str()).clicked() {
                    draft.selected = cols.iter().cloned().collect();
                    if draft.name.is_empty() {
                        draft.name = group.clone();
                    }
                }
            }
        });
    }

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Name");
        ui.text_edit_singleline(&mut draft.name);
    });

    ScrollArea::vertical()
        .id_salt("fs_columns")
        .max_height(160.0)
        .show(ui, |ui: &mut Ui| {
            for col in table.column_names() {
                let mut checked = draft.selected.contains(col);
                if ui.checkbox(&mut checked, col.as_str()).changed() {
                    if checked {
                        draft.selected.insert(col.clone());
                    } else {
                        draft.selected.remove(col);
                    }
                }
            }
        });

    egui::CollapsingHeader::new("Modify other parameters")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("fs_params").num_columns(2).show(ui, |ui: &mut Ui| {
                for (label, field) in [
                    ("adaptive", &mut draft.adaptive),
                    ("k_den", &mut draft.k_den),
                    ("S", &mut draft.s),
                    ("k_link", &mut draft.k_link),
                    ("h_style", &mut draft.h_style),
                    ("workers", &mut draft.workers),
                    ("verbose", &mut draft.verbose),
                ] {
                    ui.label(label);
                    ui.text_edit_singleline(field);
                    ui.end_row();
                }
            });
            ui.hyperlink_to("Parameter docs", "https://astrolink.readthedocs.io/en/latest/api.html");
        });

    if ui.button("Add to Feature Space").clicked() {
        if let Err(e) = state.add_feature_space() {
            state.status_message = Some(format!("{e:#}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Plots
// ---------------------------------------------------------------------------

fn plot_editor(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Choose Plots");

    let mut remove = None;
    for (i, plot) in state.setup.plots.iter().enumerate() {
        ui.horizontal(|ui: &mut Ui| {
            ui.label(format!("{}: {}", plot.kind, plot.axes.join(", ")));
            if ui.small_button("✖").clicked() {
                remove = Some(i);
            }
        });
    }
    if let Some(i) = remove {
        state.setup.plots.remove(i);
    }
    ui.separator();

    let columns = state.setup.plottable_columns();
    let draft = &mut state.setup.plot_draft;

    egui::ComboBox::from_id_salt("plot_kind")
        .selected_text(draft.kind.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in PlotKind::ALL {
                ui.selectable_value(&mut draft.kind, kind, kind.to_string());
            }
        });

    for axis in 0..draft.kind.axis_count() {
        let label = ["x", "y", "z"][axis];
        egui::ComboBox::from_id_salt(("plot_axis", axis))
            .selected_text(format!("{label}: {}", draft.axes[axis]))
            .show_ui(ui, |ui: &mut Ui| {
                for col in &columns {
                    ui.selectable_value(&mut draft.axes[axis], col.clone(), col.as_str());
                }
            });
    }

    if ui.button("Create a new plot").clicked() {
        if let Err(e) = state.add_plot() {
            state.status_message = Some(format!("{e:#}"));
        }
    }
}
