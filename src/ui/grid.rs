use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::{Column as GridColumn, TableBuilder};

use crate::cache::LoadOutcome;
use crate::data::model::Table;
use crate::spec::describe::MetadataRow;
use crate::state::{AppState, Listing, Tab};

const ROW_HEIGHT: f32 = 20.0;
const METADATA_HEADERS: [&str; 6] = ["№", "Variable", "Label", "Type", "Length", "Format"];

// ---------------------------------------------------------------------------
// Central panel – metadata / data tabs
// ---------------------------------------------------------------------------

/// Render the tab strip and the active tab for the selected file.
pub fn central_view(ui: &mut Ui, state: &mut AppState) {
    if !matches!(state.listing, Listing::Files(_)) {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Choose a data directory  (File → Open folder…)");
        });
        return;
    }

    ui.horizontal(|ui: &mut Ui| {
        ui.selectable_value(&mut state.tab, Tab::Metadata, "📋 Metadata");
        ui.selectable_value(&mut state.tab, Tab::Data, "📊 Data");
    });
    ui.separator();

    let Some(selection) = &state.selection else {
        ui.label("Select a file.");
        return;
    };

    let loaded = match &*selection.outcome {
        LoadOutcome::Loaded(loaded) => loaded,
        LoadOutcome::Unsupported => {
            ui.label(RichText::new("Unsupported file format.").color(Color32::YELLOW));
            return;
        }
        LoadOutcome::Failed(_) => {
            if let Some(msg) = &state.status_message {
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            return;
        }
    };

    match state.tab {
        Tab::Metadata => match &selection.metadata {
            Some(rows) => {
                if let Some(native) = &loaded.native {
                    let title: Vec<&str> = [native.table_name.as_deref(), native.file_label.as_deref()]
                        .into_iter()
                        .flatten()
                        .collect();
                    if !title.is_empty() {
                        ui.strong(title.join(" – "));
                    }
                }
                metadata_grid(ui, rows);
            }
            None => {
                ui.label("Native metadata not found.");
            }
        },
        Tab::Data => {
            ui.label(format!(
                "rows: {} | columns: {}",
                loaded.table.n_rows(),
                loaded.table.n_cols()
            ));
            data_grid(ui, &loaded.table);
        }
    }
}

// ---------------------------------------------------------------------------
// Grids
// ---------------------------------------------------------------------------

fn metadata_grid(ui: &mut Ui, rows: &[MetadataRow]) {
    ui.push_id("metadata_grid", |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(GridColumn::auto().at_least(32.0))
            .columns(GridColumn::auto().at_least(80.0).clip(true), 4)
            .column(GridColumn::remainder().at_least(80.0))
            .header(ROW_HEIGHT, |mut header| {
                for title in METADATA_HEADERS {
                    header.col(|ui: &mut Ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                    let r = &rows[row.index()];
                    let cells = [
                        r.number.to_string(),
                        r.variable.clone(),
                        r.label.clone(),
                        r.data_type.clone(),
                        r.length.clone(),
                        r.format.clone(),
                    ];
                    for text in cells {
                        row.col(|ui: &mut Ui| {
                            ui.label(text);
                        });
                    }
                });
            });
    });
}

fn data_grid(ui: &mut Ui, table: &Table) {
    if table.n_cols() == 0 {
        return;
    }
    egui::ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        ui.push_id("data_grid", |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                .columns(GridColumn::auto().at_least(60.0).clip(true), table.n_cols())
                .header(ROW_HEIGHT, |mut header| {
                    for name in table.column_names() {
                        header.col(|ui: &mut Ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(ROW_HEIGHT, table.n_rows(), |mut row| {
                        let i = row.index();
                        for c in 0..table.n_cols() {
                            row.col(|ui: &mut Ui| {
                                if let Some(value) = table.cell(i, c) {
                                    ui.label(value.to_string());
                                }
                            });
                        }
                    });
                });
        });
    });
}
