use std::path::PathBuf;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::export::{CSV_FILE_NAME, PATHOLOGY_FILE_NAME, RADIOLOGY_FILE_NAME};
use crate::radiology::HttpArchiveSearch;
use crate::state::{AppState, Status, FILTER_COLUMNS};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    if state.dataset.is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    // Clone what we need so we can mutate state inside the loop.
    let options = state.filter_options.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for col in FILTER_COLUMNS {
                let Some(values) = options.get(col) else {
                    continue;
                };
                if values.is_empty() {
                    continue;
                }

                let n_selected = state.filters.columns.get(col).map_or(0, |s| s.len());
                let header_text = if n_selected == 0 {
                    col.to_string()
                } else {
                    format!("{col}  ({n_selected}/{})", values.len())
                };

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(col)
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        if n_selected > 0 && ui.small_button("Clear").clicked() {
                            state.clear_filter(col);
                        }
                        for val in values {
                            let mut checked = state.is_selected(col, val);
                            if ui.checkbox(&mut checked, val.to_string()).changed() {
                                state.toggle_filter_value(col, val);
                            }
                        }
                    });
            }

            ui.separator();
            age_range(ui, state);
        });
}

/// Two sliders over `[0, max age]`. A zero minimum keeps cases with no age.
fn age_range(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Age at Baseline (years)");
    let (mut lo, mut hi) = state.age_range;
    let max = state.max_age;

    let lo_changed = ui
        .add(egui::Slider::new(&mut lo, 0.0..=max).step_by(0.1).text("min"))
        .changed();
    let hi_changed = ui
        .add(egui::Slider::new(&mut hi, 0.0..=max).step_by(0.1).text("max"))
        .changed();
    if lo_changed || hi_changed {
        state.set_age_range(lo, hi.max(lo));
    }

    ui.label(
        RichText::new("Set minimum to 0 to include records with no age data.")
            .small()
            .weak(),
    );
    if !state.is_default_age_range() && ui.small_button("Reset").clicked() {
        state.set_age_range(0.0, max);
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Reload data").clicked() {
                state.reload();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} cases loaded, {} match the filters",
                ds.len(),
                state.filtered.len()
            ));
        }

        ui.separator();

        match &state.status_message {
            Some(Status::Error(msg)) => {
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            Some(Status::Info(msg)) => {
                ui.label(RichText::new(msg).color(Color32::GREEN));
            }
            None => {}
        }
    });
}

// ---------------------------------------------------------------------------
// Export buttons
// ---------------------------------------------------------------------------

pub fn export_bar(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Download Clinical CSV").clicked() {
            if let Some(path) = save_dialog("Save filtered clinical data", CSV_FILE_NAME, "CSV", "csv") {
                state.status_message = Some(match state.export_csv(&path) {
                    Ok(()) => Status::Info(format!("Saved {}", path.display())),
                    Err(e) => Status::Error(format!("Error saving CSV: {e:#}")),
                });
            }
        }

        if ui.button("Generate Radiology Manifest").clicked() {
            if let Some(path) = save_dialog("Save radiology manifest", RADIOLOGY_FILE_NAME, "TCIA manifest", "tcia") {
                let search = HttpArchiveSearch::new(
                    state.settings.archive_search_url.clone(),
                    state.settings.archive_manifest_url.clone(),
                    state.settings.download.timeout(),
                );
                state.status_message = Some(match state.export_radiology_manifest(&search, &path) {
                    Ok(()) => Status::Info(format!("Manifest generated successfully: {}", path.display())),
                    Err(e) => {
                        log::error!("Error generating manifest: {e:#}");
                        Status::Error(format!("Error generating manifest: {e:#}"))
                    }
                });
            }
        }

        if ui.button("Generate Pathology Manifest").clicked() {
            if let Some(path) = save_dialog("Save pathology manifest", PATHOLOGY_FILE_NAME, "Excel", "xlsx") {
                state.status_message = Some(match state.export_pathology_manifest(&path) {
                    Ok(n) => Status::Info(format!(
                        "{n} pathology images written to {}. Use it with the pathology downloader.",
                        path.display()
                    )),
                    Err(e) => {
                        log::error!("Error generating pathology manifest: {e:#}");
                        Status::Error(format!("Error generating pathology manifest: {e:#}"))
                    }
                });
            }
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

fn save_dialog(title: &str, file_name: &str, filter: &str, ext: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .set_file_name(file_name)
        .add_filter(filter, &[ext])
        .save_file()
}
