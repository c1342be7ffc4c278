use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use cohort_builder::config::{DownloadSettings, Settings};
use cohort_builder::downloader::{start_batch, DownloaderApp};
use cohort_builder::fetch::FetchEvent;
use eframe::egui;
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Download pathology images listed in a manifest spreadsheet.
///
/// Without arguments the window opens; with `--manifest` and `--output` the
/// batch runs in the terminal.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Manifest file or URL (xlsx, xls, csv, parquet, json)
    #[arg(short, long)]
    manifest: Option<String>,

    /// Directory the images are written under
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// URL segment after which the path is mirrored locally
    #[arg(long)]
    marker: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut download = Settings::load()
        .unwrap_or_else(|e| {
            log::error!("Ignoring settings file: {e:#}");
            Settings::default()
        })
        .download;
    if let Some(marker) = args.marker {
        download.asset_root_marker = marker;
    }
    if let Some(secs) = args.timeout {
        download.timeout_secs = secs;
    }

    match (args.manifest, args.output) {
        (Some(manifest), Some(output)) => run_headless(&manifest, output, &download),
        (None, None) => {
            let options = eframe::NativeOptions {
                viewport: egui::ViewportBuilder::default()
                    .with_inner_size([600.0, 500.0])
                    .with_min_inner_size([400.0, 300.0]),
                ..Default::default()
            };
            eframe::run_native(
                "TCIA Pathology Image Downloader",
                options,
                Box::new(move |_cc| Ok(Box::new(DownloaderApp::new(download)))),
            )
            .map_err(|e| anyhow!("{e}"))
        }
        _ => bail!("--manifest and --output must be given together"),
    }
}

fn run_headless(manifest: &str, output: PathBuf, download: &DownloadSettings) -> Result<()> {
    let handle = start_batch(manifest, output, download)?;

    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template(BAR_TEMPLATE)?.progress_chars("#>-"));

    for event in handle.events().iter() {
        match event {
            FetchEvent::Downloading { .. } => {}
            FetchEvent::Progress(p) => {
                pb.set_length(p.total as u64);
                pb.set_position(p.attempted as u64);
                pb.println(p.message);
            }
            FetchEvent::Complete { success } => {
                pb.finish_with_message(if success {
                    "Download process completed!"
                } else {
                    "Download process failed."
                });
            }
        }
    }

    if !handle.join() {
        bail!("download worker stopped unexpectedly");
    }
    Ok(())
}
