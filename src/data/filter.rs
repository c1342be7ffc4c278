use std::collections::{BTreeMap, BTreeSet};

use super::columns::AGE_AT_BASELINE;
use super::model::{CellValue, Table};

// ---------------------------------------------------------------------------
// Filter specification
// ---------------------------------------------------------------------------

/// Per-column selection: column_name → set of accepted values.
/// An empty set means "no constraint" on that column.
pub type ColumnFilters = BTreeMap<String, BTreeSet<CellValue>>;

/// Everything the engine needs to derive a working subset.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub columns: ColumnFilters,
    /// Inclusive `(min, max)` over age at baseline.
    pub age_range: Option<(f64, f64)>,
    /// When set, the range is at its full extent and is not applied.
    pub is_default_age_range: bool,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            columns: ColumnFilters::new(),
            age_range: None,
            is_default_age_range: true,
        }
    }
}

impl FilterSpec {
    /// Whether applying this spec can drop any row.
    pub fn is_noop(&self) -> bool {
        self.columns.values().all(BTreeSet::is_empty) && !self.range_active()
    }

    fn range_active(&self) -> bool {
        self.age_range.is_some() && !self.is_default_age_range
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Return indices of rows that pass all active filters, in source order.
///
/// A row passes a column filter when:
/// * The accepted set for that column is empty → passes (no constraint)
/// * The row's value for that column is in the set → passes
/// * The table has no such column → fails
///
/// The age range, when active, keeps rows with `min <= age <= max`. A
/// minimum of exactly zero also keeps rows with no age at all.
pub fn filtered_indices(table: &Table, spec: &FilterSpec) -> Vec<usize> {
    let active: Vec<(Option<usize>, &BTreeSet<CellValue>)> = spec
        .columns
        .iter()
        .filter(|(_, accepted)| !accepted.is_empty())
        .map(|(col, accepted)| (table.column_index(col), accepted))
        .collect();

    let age_idx = table.column_index(AGE_AT_BASELINE);
    let range = match (spec.range_active(), age_idx) {
        (true, Some(idx)) => spec.age_range.map(|r| (idx, r)),
        _ => None,
    };

    table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            for (idx, accepted) in &active {
                match idx {
                    Some(i) => {
                        if !accepted.contains(&row[*i]) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            match range {
                Some((idx, (min, max))) => age_in_range(row[idx].as_f64(), min, max),
                None => true,
            }
        })
        .map(|(i, _)| i)
        .collect()
}

/// Derive the filtered table. The source is left untouched.
pub fn apply_filter(table: &Table, spec: &FilterSpec) -> Table {
    if spec.is_noop() {
        return table.clone();
    }
    table.take(&filtered_indices(table, spec))
}

fn age_in_range(age: Option<f64>, min: f64, max: f64) -> bool {
    if min == 0.0 {
        age.map_or(true, |a| a <= max)
    } else {
        age.is_some_and(|a| a >= min && a <= max)
    }
}
