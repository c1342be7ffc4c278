use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

use crate::data::manifest::unique_case_ids;
use crate::data::model::Table;
use crate::error::UpstreamFormatError;

/// Output format requested from the archive search.
pub const MANIFEST_FORMAT: &str = "manifest_text";

/// What the archive search handed back.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestReply {
    /// Manifest text, ready to be saved as a `.tcia` file.
    Text(String),
    /// Anything else (series metadata, an empty list, an error object).
    Other(JsonValue),
}

/// The radiology archive-search service, treated as an opaque function of
/// (case ids, format).
pub trait ArchiveSearch {
    fn manifest(&self, patients: &[String], format: &str) -> Result<ManifestReply>;
}

/// Ask the archive search for a manifest covering every case in `filtered`.
pub fn generate_radiology_manifest(filtered: &Table, search: &dyn ArchiveSearch) -> Result<String> {
    let patients = unique_case_ids(filtered)?;
    log::info!("Requesting radiology manifest for {} cases", patients.len());
    match search.manifest(&patients, MANIFEST_FORMAT)? {
        ManifestReply::Text(text) => Ok(text),
        ManifestReply::Other(value) => {
            log::warn!("Archive search returned a non-manifest reply: {value}");
            Err(UpstreamFormatError("No radiology data found.".into()).into())
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Patients requested per search page.
pub const SEARCH_PAGE_SIZE: usize = 500;

/// Two-step NBIA client: a paged simple search for the cohort's patients,
/// then a manifest request for every series the search found.
///
/// A search that finds no series, or a format other than
/// [`MANIFEST_FORMAT`], yields [`ManifestReply::Other`] holding the raw
/// search pages.
pub struct HttpArchiveSearch {
    search_url: String,
    manifest_url: String,
    page_size: usize,
    agent: ureq::Agent,
}

impl HttpArchiveSearch {
    pub fn new(search_url: impl Into<String>, manifest_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            search_url: search_url.into(),
            manifest_url: manifest_url.into(),
            page_size: SEARCH_PAGE_SIZE,
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .build(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String> {
        let pairs: Vec<(&str, &str)> = form.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let response = self
            .agent
            .post(url)
            .send_form(&pairs)
            .with_context(|| format!("querying {url}"))?;
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .with_context(|| format!("reading response from {url}"))?;
        Ok(body)
    }

    /// Every search page for `patients`, in order.
    fn search(&self, patients: &[String]) -> Result<Vec<JsonValue>> {
        let mut pages = Vec::new();
        let mut start = 0;
        loop {
            let body = self.post_form(&self.search_url, &search_form(patients, start, self.page_size))?;
            let page: JsonValue = serde_json::from_str(&body).context("parsing archive-search reply")?;
            let returned = page["resultSet"].as_array().map_or(0, Vec::len);
            let total = page["totalPatients"].as_u64().unwrap_or(0) as usize;
            pages.push(page);
            start += returned;
            if returned == 0 || start >= total {
                return Ok(pages);
            }
        }
    }
}

impl ArchiveSearch for HttpArchiveSearch {
    fn manifest(&self, patients: &[String], format: &str) -> Result<ManifestReply> {
        let pages = self.search(patients)?;
        let series: Vec<String> = pages.iter().flat_map(series_uids).collect();
        log::info!("Archive search: {} series for {} cases", series.len(), patients.len());

        if format != MANIFEST_FORMAT || series.is_empty() {
            return Ok(ManifestReply::Other(JsonValue::Array(pages)));
        }

        let form = vec![
            ("list".to_string(), series.join(",")),
            ("includeAnnotation".to_string(), "true".to_string()),
        ];
        let text = self.post_form(&self.manifest_url, &form)?;
        if text.trim().is_empty() {
            return Ok(ManifestReply::Other(JsonValue::Null));
        }
        Ok(ManifestReply::Text(text))
    }
}

/// Search criteria for one page: all patients in a single `PatientCriteria`.
fn search_form(patients: &[String], start: usize, size: usize) -> Vec<(String, String)> {
    [
        ("criteriaType0", "PatientCriteria".to_string()),
        ("value0", patients.join(",")),
        ("sortField", "subject".to_string()),
        ("sortDirection", "ascending".to_string()),
        ("start", start.to_string()),
        ("size", size.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Series instance UIDs in one search page, in result order.
fn series_uids(page: &JsonValue) -> Vec<String> {
    page["resultSet"]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|patient| patient["studyIdentifiers"].as_array().into_iter().flatten())
        .flat_map(|study| study["seriesIdentifiers"].as_array().into_iter().flatten())
        .filter_map(|uid| uid.as_str().map(String::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;
    use crate::error::{SchemaError, UpstreamFormatError};
    use std::cell::RefCell;

    struct Canned {
        reply: ManifestReply,
        seen: RefCell<Vec<String>>,
    }

    impl ArchiveSearch for Canned {
        fn manifest(&self, patients: &[String], format: &str) -> Result<ManifestReply> {
            assert_eq!(format, MANIFEST_FORMAT);
            self.seen.borrow_mut().extend(patients.iter().cloned());
            Ok(self.reply.clone())
        }
    }

    fn cohort() -> Table {
        Table::from_records(
            &["Case ID"],
            vec![
                vec![CellValue::text("B")],
                vec![CellValue::text("A")],
                vec![CellValue::text("B")],
            ],
        )
    }

    #[test]
    fn text_reply_is_the_manifest() {
        let search = Canned {
            reply: ManifestReply::Text("downloadServerUrl=...".into()),
            seen: RefCell::default(),
        };
        let text = generate_radiology_manifest(&cohort(), &search).unwrap();
        assert_eq!(text, "downloadServerUrl=...");
        assert_eq!(*search.seen.borrow(), vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn non_text_reply_is_an_upstream_error() {
        let search = Canned {
            reply: ManifestReply::Other(JsonValue::Array(vec![])),
            seen: RefCell::default(),
        };
        let err = generate_radiology_manifest(&cohort(), &search).unwrap_err();
        let upstream = err.downcast_ref::<UpstreamFormatError>().unwrap();
        assert_eq!(upstream.to_string(), "No radiology data found.");
    }

    #[test]
    fn missing_case_id_is_a_schema_error() {
        let search = Canned {
            reply: ManifestReply::Text(String::new()),
            seen: RefCell::default(),
        };
        let err = generate_radiology_manifest(&Table::default(), &search).unwrap_err();
        assert!(err.downcast_ref::<SchemaError>().is_some());
    }

    #[test]
    fn series_are_collected_across_patients_and_studies() {
        let page = serde_json::json!({
            "totalPatients": 2,
            "resultSet": [
                { "subjectId": "A", "studyIdentifiers": [
                    { "seriesIdentifiers": ["1.1", "1.2"] },
                    { "seriesIdentifiers": ["1.3"] }
                ]},
                { "subjectId": "B", "studyIdentifiers": [] }
            ]
        });
        assert_eq!(series_uids(&page), vec!["1.1", "1.2", "1.3"]);
        assert!(series_uids(&serde_json::json!({ "resultSet": [] })).is_empty());
        assert!(series_uids(&serde_json::json!([])).is_empty());
    }

    #[test]
    fn search_form_carries_every_patient_in_one_criterion() {
        let form = search_form(&["A".into(), "B".into()], 500, 100);
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("criteriaType0"), Some("PatientCriteria"));
        assert_eq!(get("value0"), Some("A,B"));
        assert_eq!(get("start"), Some("500"));
        assert_eq!(get("size"), Some("100"));
    }
}
