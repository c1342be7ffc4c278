use cohort_builder::app::CohortApp;
use cohort_builder::config::Settings;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = Settings::load().unwrap_or_else(|e| {
        log::error!("Ignoring settings file: {e:#}");
        Settings::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "The Cancer Imaging Archive – Clinical Data Exploration",
        options,
        Box::new(|_cc| Ok(Box::new(CohortApp::new(settings)))),
    )
}
