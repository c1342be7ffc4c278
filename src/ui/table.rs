use eframe::egui::{self, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::columns::{AVAILABLE_IMAGES, CASE_ID};
use crate::data::model::{CellValue, Table};
use crate::state::{AppState, MAX_PAGE_SIZE};

/// Raw columns that add nothing once `Age at Baseline` exists.
pub const HIDDEN_COLUMNS: [&str; 3] = ["Age UOM", "Age at Diagnosis", "Age at Enrollment"];

/// Columns pinned to the left, in this order.
pub const LEADING_COLUMNS: [&str; 3] = ["Project Short Name", CASE_ID, AVAILABLE_IMAGES];

/// Drop the hidden columns and move the leading ones to the front.
pub fn display_columns(page: &Table) -> Table {
    let visible = page.drop_columns(&HIDDEN_COLUMNS);
    let mut order: Vec<&str> = LEADING_COLUMNS
        .iter()
        .copied()
        .filter(|c| visible.has_column(c))
        .collect();
    order.extend(
        visible
            .columns()
            .iter()
            .map(String::as_str)
            .filter(|c| !LEADING_COLUMNS.contains(c)),
    );
    visible.select(&order)
}

// ---------------------------------------------------------------------------
// Pagination controls
// ---------------------------------------------------------------------------

pub fn pagination(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        let mut size = state.page_size;
        ui.label("Page Size");
        if ui
            .add(egui::DragValue::new(&mut size).range(1..=MAX_PAGE_SIZE))
            .changed()
        {
            state.set_page_size(size);
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui: &mut Ui| {
            if ui.button("›").clicked() {
                state.next_page();
            }
            ui.label(format!("Page {} of {}", state.page + 1, state.max_page() + 1));
            if ui.button("‹").clicked() {
                state.prev_page();
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Data table
// ---------------------------------------------------------------------------

/// Render the current page. The first column is the row's position in the
/// filtered table.
pub fn data_table(ui: &mut Ui, state: &AppState) {
    let page = display_columns(&state.current_page());
    let offset = state.page * state.page_size;
    let avail_idx = page.column_index(AVAILABLE_IMAGES);
    let case_idx = page.column_index(CASE_ID);

    egui::ScrollArea::horizontal()
        .id_salt("data_table_scroll")
        .show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .vscroll(false)
                .column(Column::auto())
                .columns(Column::auto().at_least(60.0).clip(true), page.columns().len())
                .header(20.0, |mut header| {
                    header.col(|ui| {
                        ui.strong("");
                    });
                    for name in page.columns() {
                        header.col(|ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|mut body| {
                    for (i, row) in page.rows().iter().enumerate() {
                        body.row(18.0, |mut tr| {
                            tr.col(|ui| {
                                ui.label((offset + i).to_string());
                            });
                            for (c, cell) in row.iter().enumerate() {
                                tr.col(|ui| {
                                    if Some(c) == avail_idx {
                                        let case_id = case_idx.map(|k| row[k].to_field()).unwrap_or_default();
                                        available_images_cell(ui, cell, &state.settings.radiology_link(&case_id));
                                    } else if !cell.is_null() {
                                        ui.label(cell.to_string());
                                    }
                                });
                            }
                        });
                    }
                });
        });

    ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui: &mut Ui| {
        ui.label(format!("{} total records", state.filtered.len()));
    });
}

/// "Radiology" becomes a link to the archive viewer for the case.
fn available_images_cell(ui: &mut Ui, cell: &CellValue, link: &str) {
    let text = cell.to_field();
    if !text.contains("Radiology") {
        ui.label(text);
        return;
    }
    ui.horizontal(|ui: &mut Ui| {
        ui.hyperlink_to("Radiology", link);
        if text.contains("Pathology") {
            ui.label("/ Pathology");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_columns_dropped_and_leaders_first() {
        let t = Table::from_records(
            &["Race", "Age UOM", AVAILABLE_IMAGES, "Age at Diagnosis", CASE_ID, "Project Short Name", "Age at Surgery"],
            vec![],
        );
        let shown = display_columns(&t);
        assert_eq!(
            shown.columns(),
            &["Project Short Name", CASE_ID, AVAILABLE_IMAGES, "Race", "Age at Surgery"].map(String::from)
        );
    }

    #[test]
    fn leaders_missing_from_table_are_skipped() {
        let t = Table::from_records(&["Race", CASE_ID], vec![]);
        assert_eq!(display_columns(&t).columns(), &[CASE_ID, "Race"].map(String::from));
    }
}
