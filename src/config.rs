use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::age::AgeColumns;

/// Environment variable naming a JSON settings file.
pub const CONFIG_ENV: &str = "COHORT_BUILDER_CONFIG";
/// Settings file picked up from the working directory when present.
pub const CONFIG_FILE: &str = "cohort-builder.json";

/// Runtime settings. Every field has a default, so an empty `{}` file (or
/// no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Clinical spreadsheet (path or URL).
    pub clinical_source: String,
    /// Pathology image metadata spreadsheet (path or URL).
    pub pathology_source: String,
    pub age_columns: AgeColumns,
    /// Loaded tables expire after this many seconds; `None` keeps them for
    /// the whole session.
    pub cache_ttl_secs: Option<u64>,
    pub page_size: usize,
    /// Archive-search endpoint queried for radiology manifests.
    pub archive_search_url: String,
    /// Endpoint that turns a list of series UIDs into manifest text.
    pub archive_manifest_url: String,
    /// Link shown for cases with radiology images; `{case_id}` is replaced.
    pub radiology_viewer_url: String,
    pub download: DownloadSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub timeout_secs: u64,
    /// Path segment after which the URL is mirrored under the output root.
    pub asset_root_marker: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clinical_source:
                "https://github.com/kirbyju/tcia-cohort-builder/raw/refs/heads/main/crdc-clinical.xlsx"
                    .into(),
            pathology_source:
                "https://github.com/kirbyju/tcia-cohort-builder/raw/refs/heads/main/pathology_image_metadata.xlsx"
                    .into(),
            age_columns: AgeColumns::default(),
            cache_ttl_secs: None,
            page_size: 10,
            archive_search_url:
                "https://services.cancerimagingarchive.net/nbia-api/services/getSimpleSearchWithModalityAndBodyPartPaged"
                    .into(),
            archive_manifest_url:
                "https://services.cancerimagingarchive.net/nbia-api/services/getManifestTextV2".into(),
            radiology_viewer_url:
                "https://nbia.cancerimagingarchive.net/nbia-search/?PatientCriteria={case_id}".into(),
            download: DownloadSettings::default(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            asset_root_marker: "/ross/".into(),
        }
    }
}

impl DownloadSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Load from `$COHORT_BUILDER_CONFIG`, else `./cohort-builder.json`, else
    /// defaults.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::from_file(&path),
            None => {
                log::debug!("No settings file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings = Self::from_json(&text)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn radiology_link(&self, case_id: &str) -> String {
        self.radiology_viewer_url.replace("{case_id}", case_id)
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    let local = PathBuf::from(CONFIG_FILE);
    local.exists().then_some(local)
}
