mod app;
mod cache;
mod config;
mod data;
mod spec;
mod state;
mod ui;

use app::TabularViewerApp;
use config::Config;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = Config::load().unwrap_or_else(|e| {
        log::error!("invalid configuration, using defaults: {e:#}");
        Config::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Tabular Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(TabularViewerApp::new(config)))),
    )
}
