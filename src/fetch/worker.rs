use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver};

use super::http::HttpDownloader;
use super::path::asset_path;
use super::{AssetRow, FetchEvent, ProgressUpdate, RowState};

/// Download every row in order, reporting through `on_event`.
///
/// A failing row is logged and reported; it never stops the batch. The
/// return value (also sent as `Complete`) is always `true` once every row
/// has been attempted.
pub fn run_batch<F>(
    rows: &[AssetRow],
    root: &Path,
    marker: &str,
    downloader: &HttpDownloader,
    mut on_event: F,
) -> bool
where
    F: FnMut(FetchEvent),
{
    let total = rows.len();
    log::info!("Downloading {total} assets into {}", root.display());

    for (index, row) in rows.iter().enumerate() {
        on_event(FetchEvent::Downloading { index });
        log::debug!("[{}/{total}] {} ← {}", index + 1, row.case_id, row.url);

        let outcome = asset_path(&row.url, marker, root)
            .and_then(|dest| downloader.download(&row.url, &dest).map(|_| dest));

        let (message, state) = match outcome {
            Ok(dest) => (format!("Downloaded: {}", dest.display()), RowState::Saved(dest)),
            Err(e) => {
                let message = format!("Failed to download {}: {e}", row.case_id);
                log::error!("{message}");
                (message, RowState::Failed(e.to_string()))
            }
        };

        on_event(FetchEvent::Progress(ProgressUpdate {
            attempted: index + 1,
            total,
            message,
            state,
        }));
    }

    log::info!("Download batch finished ({total} rows attempted)");
    on_event(FetchEvent::Complete { success: true });
    true
}

/// A batch running on its own thread.
pub struct DownloadHandle {
    events: Receiver<FetchEvent>,
    thread: JoinHandle<bool>,
}

impl DownloadHandle {
    /// Blocking event stream; ends after `Complete`.
    pub fn events(&self) -> &Receiver<FetchEvent> {
        &self.events
    }

    /// Events queued since the last call, without blocking.
    pub fn drain(&self) -> Vec<FetchEvent> {
        self.events.try_iter().collect()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker. A panicked worker counts as a failed batch.
    pub fn join(self) -> bool {
        self.thread.join().unwrap_or(false)
    }
}

/// Hand the batch to a dedicated worker thread. There is no cancellation:
/// the batch runs until every row has been attempted.
pub fn spawn_download(
    rows: Vec<AssetRow>,
    root: PathBuf,
    marker: String,
    downloader: HttpDownloader,
) -> DownloadHandle {
    let (tx, rx) = unbounded();
    let thread = thread::spawn(move || {
        run_batch(&rows, &root, &marker, &downloader, |event| {
            // The receiver may be gone (window closed); keep downloading anyway.
            let _ = tx.send(event);
        })
    });
    DownloadHandle { events: rx, thread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bad_rows_fail_without_network_and_batch_completes() {
        let rows = vec![
            AssetRow {
                url: "https://host/no-marker/a.svs".into(),
                case_id: "A".into(),
            },
            AssetRow {
                url: "https://host/ross/../b.svs".into(),
                case_id: "B".into(),
            },
        ];
        let mut events = Vec::new();
        let ok = run_batch(
            &rows,
            Path::new("/nonexistent"),
            "/ross/",
            &HttpDownloader::new(Duration::from_secs(1)),
            |e| events.push(e),
        );
        assert!(ok);
        assert_eq!(events.len(), 5);
        match &events[1] {
            FetchEvent::Progress(p) => {
                assert_eq!((p.attempted, p.total), (1, 2));
                assert!(p.message.starts_with("Failed to download A: "));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events[4], FetchEvent::Complete { success: true });
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let handle = spawn_download(
            Vec::new(),
            PathBuf::from("/nonexistent"),
            "/ross/".into(),
            HttpDownloader::new(Duration::from_secs(1)),
        );
        let events: Vec<FetchEvent> = handle.events().iter().collect();
        assert_eq!(events, vec![FetchEvent::Complete { success: true }]);
        assert!(handle.join());
    }
}
