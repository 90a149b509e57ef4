use std::path::PathBuf;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::state::{AppState, Listing};

// ---------------------------------------------------------------------------
// Left side panel – directory and file list
// ---------------------------------------------------------------------------

/// Render the left panel: data directory controls and the file list.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Data directory");
    ui.separator();

    let response = ui.add(
        egui::TextEdit::singleline(&mut state.dir_input)
            .hint_text("path to data")
            .desired_width(f32::INFINITY),
    );
    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
        let dir = PathBuf::from(state.dir_input.trim());
        state.set_data_dir(dir);
    }

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Browse…").clicked() {
            open_folder_dialog(state);
        }
        if ui.button("⟳ Refresh").clicked() {
            log::info!("refreshing {}", state.data_dir().display());
            state.refresh();
        }
    });
    ui.separator();

    let files = match &state.listing {
        Listing::Missing(message) => {
            ui.label(RichText::new(message).color(Color32::RED));
            return;
        }
        Listing::Empty => {
            ui.label(
                RichText::new("No files found in the directory.").color(Color32::YELLOW),
            );
            return;
        }
        Listing::Files(files) => files.clone(),
    };

    ui.strong("Files");
    let current = state.selection.as_ref().map(|s| s.file.clone());
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for name in &files {
                let selected = current.as_deref() == Some(name.as_str());
                if ui.selectable_label(selected, name).clicked() && !selected {
                    state.select_file(name);
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open folder…").clicked() {
                open_folder_dialog(state);
                ui.close_menu();
            }
            if ui.button("Refresh").clicked() {
                state.refresh();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(selection) = &state.selection {
            ui.label(&selection.file);
            if let Some(m) = &selection.spec_match {
                ui.separator();
                ui.label(format!("spec: {} ({})", m.source, m.rule));
            }
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Folder dialog
// ---------------------------------------------------------------------------

pub fn open_folder_dialog(state: &mut AppState) {
    let mut dialog = rfd::FileDialog::new().set_title("Select data directory");
    if state.data_dir().is_dir() {
        dialog = dialog.set_directory(state.data_dir());
    }

    if let Some(dir) = dialog.pick_folder() {
        state.set_data_dir(dir);
    }
}
