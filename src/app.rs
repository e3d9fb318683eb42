use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot, setup};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct AstroGlueApp {
    pub state: AppState,
}

impl AstroGlueApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for AstroGlueApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        if self.state.session.is_none() {
            // ---- Setup form ----
            egui::CentralPanel::default().show(ctx, |ui| {
                setup::setup_form(ui, &mut self.state);
            });
            return;
        }

        // ---- Left side panel: cluster selection ----
        egui::SidePanel::left("cluster_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: linked views ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::views_grid(ui, &mut self.state);
        });
    }
}
