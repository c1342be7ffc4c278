/// Pathology asset fetcher.
///
/// ```text
///   AssetRow ─▶ path::asset_path ─▶ http::HttpDownloader ─▶ file on disk
///                          │
///                          ▼
///        worker: one thread, rows strictly in order,
///        FetchEvent stream (Downloading / Progress / Complete)
/// ```

pub mod http;
pub mod path;
pub mod worker;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::data::columns::{CASE_ID, IMAGE_URL};
use crate::data::model::Table;

pub use http::HttpDownloader;
pub use path::asset_path;
pub use worker::{run_batch, spawn_download, DownloadHandle};

/// One asset to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRow {
    pub url: String,
    /// Case identifier, used in progress messages.
    pub case_id: String,
}

/// Lifecycle of a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowState {
    Pending,
    Downloading,
    Saved(PathBuf),
    Failed(String),
}

/// Reported after every attempted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Rows attempted so far, including this one.
    pub attempted: usize,
    pub total: usize,
    pub message: String,
    pub state: RowState,
}

/// Messages sent from the download worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// Row `index` moved from pending to downloading.
    Downloading { index: usize },
    Progress(ProgressUpdate),
    /// Every row has been attempted.
    Complete { success: bool },
}

/// Turn a resolved `[imageUrl, Case ID]` table into download rows.
/// Rows without a URL are skipped.
pub fn rows_from_table(table: &Table) -> Result<Vec<AssetRow>> {
    let url_idx = table
        .column_index(IMAGE_URL)
        .with_context(|| format!("missing '{IMAGE_URL}' column"))?;
    let id_idx = table
        .column_index(CASE_ID)
        .with_context(|| format!("missing '{CASE_ID}' column"))?;

    Ok(table
        .rows()
        .iter()
        .filter(|row| !row[url_idx].is_null())
        .map(|row| AssetRow {
            url: row[url_idx].to_string(),
            case_id: row[id_idx].to_field(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    #[test]
    fn null_urls_are_skipped() {
        let t = Table::from_records(
            &[IMAGE_URL, CASE_ID],
            vec![
                vec![CellValue::text("https://h/ross/a.svs"), CellValue::text("A")],
                vec![CellValue::Null, CellValue::text("B")],
            ],
        );
        let rows = rows_from_table(&t).unwrap();
        assert_eq!(
            rows,
            vec![AssetRow {
                url: "https://h/ross/a.svs".into(),
                case_id: "A".into()
            }]
        );
    }
}
