use eframe::egui;

use crate::config::Config;
use crate::state::AppState;
use crate::ui::{grid, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct TabularViewerApp {
    pub state: AppState,
}

impl TabularViewerApp {
    pub fn new(config: Config) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for TabularViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: directory and files ----
        egui::SidePanel::left("files_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: metadata / data ----
        egui::CentralPanel::default().show(ctx, |ui| {
            grid::central_view(ui, &mut self.state);
        });
    }
}
