use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use eframe::egui::{self, ProgressBar, ScrollArea, TextEdit, Ui};

use crate::config::DownloadSettings;
use crate::data::loader::load_asset_list;
use crate::fetch::{rows_from_table, spawn_download, DownloadHandle, FetchEvent, HttpDownloader};

/// Progress and log lines for one batch, fed by worker events.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DownloadLog {
    /// Whole percent, `0..=100`.
    pub percent: u8,
    pub lines: Vec<String>,
    pub finished: bool,
}

impl DownloadLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Fold one worker event into the log.
    pub fn apply(&mut self, event: &FetchEvent) {
        match event {
            FetchEvent::Downloading { .. } => {}
            FetchEvent::Progress(p) => {
                if p.total > 0 {
                    self.percent = (p.attempted * 100 / p.total).min(100) as u8;
                }
                self.push(p.message.clone());
            }
            FetchEvent::Complete { success } => {
                self.finished = true;
                self.push(if *success {
                    "Download process completed!"
                } else {
                    "Download process failed."
                });
            }
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Load the manifest and start the worker.
pub fn start_batch(manifest: &str, output: PathBuf, download: &DownloadSettings) -> Result<DownloadHandle> {
    let table = load_asset_list(manifest)?;
    let rows = rows_from_table(&table)?;
    log::info!("{} assets listed in {manifest}", rows.len());
    Ok(spawn_download(
        rows,
        output,
        download.asset_root_marker.clone(),
        HttpDownloader::new(download.timeout()),
    ))
}

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct DownloaderApp {
    pub manifest_path: String,
    pub output_dir: String,
    download: DownloadSettings,
    running: Option<DownloadHandle>,
    pub log: DownloadLog,
}

impl DownloaderApp {
    pub fn new(download: DownloadSettings) -> Self {
        Self {
            manifest_path: String::new(),
            output_dir: String::new(),
            download,
            running: None,
            log: DownloadLog::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn start(&mut self) {
        let manifest = self.manifest_path.trim().to_string();
        let output = self.output_dir.trim().to_string();
        if manifest.is_empty() || output.is_empty() {
            self.log.push("Please select both Excel file and download directory.");
            return;
        }

        match start_batch(&manifest, PathBuf::from(output), &self.download) {
            Ok(handle) => {
                self.log.clear();
                self.running = Some(handle);
            }
            Err(e) => {
                log::error!("Error: {e:#}");
                self.log.push(format!("Error: {e:#}"));
            }
        }
    }

    /// Pull pending worker events; drop the handle once the batch is over.
    fn poll(&mut self) {
        let Some(handle) = &self.running else {
            return;
        };
        for event in handle.drain() {
            self.log.apply(&event);
        }
        if self.log.finished && handle.is_finished() {
            self.running = None;
        }
    }

    fn path_row(ui: &mut Ui, value: &mut String, button: &str, pick: impl FnOnce() -> Option<PathBuf>) {
        ui.horizontal(|ui: &mut Ui| {
            let width = ui.available_width() - 200.0;
            ui.add(TextEdit::singleline(value).desired_width(width.max(120.0)));
            if ui.button(button).clicked() {
                if let Some(path) = pick() {
                    *value = path.display().to_string();
                }
            }
        });
    }
}

impl eframe::App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll();

        egui::CentralPanel::default().show(ctx, |ui| {
            let idle = !self.is_running();

            ui.add_enabled_ui(idle, |ui: &mut Ui| {
                Self::path_row(ui, &mut self.manifest_path, "Select Excel File", || {
                    rfd::FileDialog::new()
                        .set_title("Select Excel File")
                        .add_filter("Excel Files", &["xlsx", "xls"])
                        .pick_file()
                });
                Self::path_row(ui, &mut self.output_dir, "Select Download Directory", || {
                    rfd::FileDialog::new()
                        .set_title("Select Download Directory")
                        .pick_folder()
                });
                if ui.button("Start Download").clicked() {
                    self.start();
                }
            });

            ui.add(ProgressBar::new(f32::from(self.log.percent) / 100.0).show_percentage());
            ui.separator();

            ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui: &mut Ui| {
                    for line in &self.log.lines {
                        ui.label(line);
                    }
                });
        });

        if self.is_running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
