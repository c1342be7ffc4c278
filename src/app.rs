use eframe::egui::{self, ScrollArea, Ui};

use crate::config::Settings;
use crate::state::AppState;
use crate::ui::{charts, panels, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct CohortApp {
    pub state: AppState,
}

impl CohortApp {
    /// Build the dashboard and load the clinical table. The load blocks:
    /// nothing is interactive until the data is in.
    pub fn new(settings: Settings) -> Self {
        let mut state = AppState::new(settings);
        state.load_clinical();
        Self { state }
    }
}

impl eframe::App for CohortApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: table, exports, charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.dataset.is_none() {
                ui.centered_and_justified(|ui: &mut Ui| {
                    ui.heading("No clinical data loaded  (File → Reload data)");
                });
                return;
            }

            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui: &mut Ui| {
                    ui.label(
                        "Use the filters on the left to select your cohort. Then, export a CSV of \
                         the table or generate a TCIA manifest file to download the radiology data.",
                    );
                    ui.label(
                        "Images may also be viewed for specific subjects before downloading by \
                         clicking the links in the Available Images column.",
                    );
                    ui.add_space(6.0);

                    table::pagination(ui, &mut self.state);
                    table::data_table(ui, &self.state);
                    ui.add_space(6.0);
                    panels::export_bar(ui, &mut self.state);
                    ui.separator();
                    charts::charts(ui, &self.state.filtered);
                });
        });
    }
}
