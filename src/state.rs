use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::data::cache::TableCache;
use crate::data::export::{write_csv, write_radiology_manifest, write_xlsx, PATHOLOGY_SHEET};
use crate::data::filter::{apply_filter, FilterSpec};
use crate::data::loader::{load_source, prepare_clinical};
use crate::data::manifest::generate_pathology_manifest;
use crate::data::model::{CellValue, Table};
use crate::data::summary::{max_age, unique_sorted_values};
use crate::radiology::{generate_radiology_manifest, ArchiveSearch};

/// Columns offered as multi-select filters, in sidebar order.
pub const FILTER_COLUMNS: [&str; 7] = [
    "Available Images",
    "Project Short Name",
    "Race",
    "Ethnicity",
    "Sex at Birth",
    "Primary Diagnosis",
    "Primary Site",
];

pub const MAX_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Message shown in the top bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

/// The full dashboard state, independent of rendering.
pub struct AppState {
    pub settings: Settings,

    /// Session-owned cache of raw source tables.
    cache: TableCache,

    /// Prepared clinical table (None until loaded).
    pub dataset: Option<Arc<Table>>,

    /// Options for each filter widget: column → sorted distinct values.
    pub filter_options: BTreeMap<String, Vec<CellValue>>,

    /// Current filter selections (age range is kept separately).
    pub filters: FilterSpec,

    /// Slider position `(min, max)`; `max_age` is the full extent.
    pub age_range: (f64, f64),
    pub max_age: f64,

    /// Rows passing the current filters (cached).
    pub filtered: Table,

    pub page: usize,
    pub page_size: usize,

    pub status_message: Option<Status>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            cache: TableCache::new(settings.cache_ttl()),
            page_size: settings.page_size.clamp(1, MAX_PAGE_SIZE),
            settings,
            dataset: None,
            filter_options: BTreeMap::new(),
            filters: FilterSpec::default(),
            age_range: (0.0, 0.0),
            max_age: 0.0,
            filtered: Table::default(),
            page: 0,
            status_message: None,
        }
    }

    // -- loading ----------------------------------------------------------

    /// Load (or fetch from the cache) the clinical table and reset filters.
    pub fn load_clinical(&mut self) {
        let source = self.settings.clinical_source.clone();
        let ages = self.settings.age_columns.clone();
        let result = self
            .cache
            .get_or_load(&source, || load_source(&source))
            .map(|raw| prepare_clinical(&raw, &ages));

        match result {
            Ok(table) => {
                log::info!(
                    "Clinical data ready: {} cases, columns {:?}",
                    table.len(),
                    table.columns()
                );
                self.set_dataset(table);
            }
            Err(e) => {
                log::error!("Error loading data: {e:#}");
                self.status_message = Some(Status::Error(format!("Error loading data: {e:#}")));
            }
        }
    }

    /// Drop cached tables and load again.
    pub fn reload(&mut self) {
        self.cache.clear();
        self.load_clinical();
    }

    /// The pathology asset table, loaded on first use.
    pub fn pathology_table(&mut self) -> Result<Arc<Table>> {
        let source = self.settings.pathology_source.clone();
        self.cache.get_or_load(&source, || load_source(&source))
    }

    /// Ingest a newly prepared dataset and initialise filters.
    pub fn set_dataset(&mut self, dataset: Table) {
        self.filter_options = FILTER_COLUMNS
            .iter()
            .map(|c| (c.to_string(), unique_sorted_values(&dataset, c)))
            .collect();
        self.filters = FilterSpec::default();
        self.max_age = max_age(&dataset);
        self.age_range = (0.0, self.max_age);
        self.filtered = dataset.clone();
        self.page = 0;
        self.dataset = Some(Arc::new(dataset));
        self.status_message = None;
    }

    // -- filtering --------------------------------------------------------

    pub fn is_default_age_range(&self) -> bool {
        self.age_range.0 == 0.0 && self.age_range.1 == self.max_age
    }

    /// Recompute `filtered` after a filter change.
    pub fn refilter(&mut self) {
        let Some(ds) = &self.dataset else {
            return;
        };
        self.filters.age_range = Some(self.age_range);
        self.filters.is_default_age_range = self.is_default_age_range();
        self.filtered = apply_filter(ds, &self.filters);
        self.page = self.page.min(self.max_page());
    }

    /// Toggle a single value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &CellValue) {
        let selected = self.filters.columns.entry(column.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refilter();
    }

    /// Clear a column's selection (no constraint).
    pub fn clear_filter(&mut self, column: &str) {
        self.filters.columns.insert(column.to_string(), BTreeSet::new());
        self.refilter();
    }

    pub fn set_age_range(&mut self, min: f64, max: f64) {
        let min = min.clamp(0.0, self.max_age);
        let max = max.clamp(min, self.max_age);
        self.age_range = (min, max);
        self.refilter();
    }

    pub fn is_selected(&self, column: &str, value: &CellValue) -> bool {
        self.filters
            .columns
            .get(column)
            .is_some_and(|s| s.contains(value))
    }

    // -- pagination -------------------------------------------------------

    pub fn max_page(&self) -> usize {
        self.filtered.len().saturating_sub(1) / self.page_size.max(1)
    }

    pub fn set_page_size(&mut self, size: usize) {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self.page = self.page.min(self.max_page());
    }

    pub fn next_page(&mut self) {
        if self.page < self.max_page() {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    pub fn current_page(&self) -> Table {
        self.filtered.slice(self.page * self.page_size, self.page_size)
    }

    // -- exports ----------------------------------------------------------

    pub fn export_csv(&self, path: &Path) -> Result<()> {
        write_csv(&self.filtered, path)
    }

    pub fn export_pathology_manifest(&mut self, path: &Path) -> Result<usize> {
        let assets = self.pathology_table().context("loading pathology data")?;
        let manifest = generate_pathology_manifest(&self.filtered, &assets)?;
        write_xlsx(&manifest, path, PATHOLOGY_SHEET)?;
        Ok(manifest.len())
    }

    pub fn export_radiology_manifest(&self, search: &dyn ArchiveSearch, path: &Path) -> Result<()> {
        let text = generate_radiology_manifest(&self.filtered, search)?;
        write_radiology_manifest(&text, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::AGE_AT_BASELINE;

    fn s(v: &str) -> CellValue {
        CellValue::text(v)
    }

    fn state() -> AppState {
        let mut st = AppState::new(Settings::default());
        let rows = (0..25)
            .map(|i| {
                vec![
                    s(&format!("C{i:02}")),
                    s(if i % 2 == 0 { "Female" } else { "Male" }),
                    if i % 5 == 0 { CellValue::Null } else { CellValue::Float(i as f64 * 3.0) },
                ]
            })
            .collect();
        st.set_dataset(Table::from_records(&["Case ID", "Sex at Birth", AGE_AT_BASELINE], rows));
        st
    }

    #[test]
    fn initial_range_is_full_extent() {
        let st = state();
        assert_eq!(st.age_range, (0.0, 72.0));
        assert!(st.is_default_age_range());
        assert_eq!(st.filtered.len(), 25);
    }

    #[test]
    fn toggling_twice_restores_everything() {
        let mut st = state();
        st.toggle_filter_value("Sex at Birth", &s("Male"));
        assert_eq!(st.filtered.len(), 12);
        st.toggle_filter_value("Sex at Birth", &s("Male"));
        assert_eq!(st.filtered.len(), 25);
    }

    #[test]
    fn lowering_max_keeps_null_ages() {
        let mut st = state();
        st.set_age_range(0.0, 30.0);
        assert!(!st.is_default_age_range());
        // ages 3..=30 (i = 1..=10 minus i=5,10) plus 5 nulls
        assert_eq!(st.filtered.len(), 8 + 5);
    }

    #[test]
    fn paging_is_clamped() {
        let mut st = state();
        assert_eq!(st.max_page(), 2);
        for _ in 0..10 {
            st.next_page();
        }
        assert_eq!(st.page, 2);
        assert_eq!(st.current_page().len(), 5);
        st.set_page_size(100);
        assert_eq!(st.page, 0);
        st.prev_page();
        assert_eq!(st.page, 0);
    }
}
