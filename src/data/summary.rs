use std::collections::BTreeMap;

use super::columns::AGE_AT_BASELINE;
use super::model::{CellValue, Table};

// ---------------------------------------------------------------------------
// Chart inputs
// ---------------------------------------------------------------------------

/// Sorted distinct values of a column, for the filter widgets.
pub fn unique_sorted_values(table: &Table, column: &str) -> Vec<CellValue> {
    if !table.has_column(column) {
        log::warn!(
            "Column '{column}' not found. Available columns: {}",
            table.columns().join(", ")
        );
        return Vec::new();
    }
    table.unique_values(column).into_iter().collect()
}

/// Value frequencies, most frequent first (ties broken by value).
/// Nulls are not counted.
pub fn value_counts(table: &Table, column: &str) -> Vec<(CellValue, usize)> {
    let mut counts: BTreeMap<CellValue, usize> = BTreeMap::new();
    if let Some(values) = table.column_values(column) {
        for v in values.filter(|v| !v.is_null()) {
            *counts.entry(v.clone()).or_default() += 1;
        }
    }
    let mut out: Vec<(CellValue, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Row counts per (`outer`, `inner`) pair, e.g. race by ethnicity.
pub fn cross_counts(table: &Table, outer: &str, inner: &str) -> BTreeMap<(CellValue, CellValue), usize> {
    let mut out = BTreeMap::new();
    let (Some(o), Some(i)) = (table.column_index(outer), table.column_index(inner)) else {
        return out;
    };
    for row in table.rows() {
        if row[o].is_null() || row[i].is_null() {
            continue;
        }
        *out.entry((row[o].clone(), row[i].clone())).or_default() += 1;
    }
    out
}

/// Largest known age at baseline, or 0 when no row has one.
pub fn max_age(table: &Table) -> f64 {
    ages(table).fold(0.0, f64::max)
}

fn ages(table: &Table) -> impl Iterator<Item = f64> + '_ {
    table
        .column_values(AGE_AT_BASELINE)
        .into_iter()
        .flatten()
        .filter_map(CellValue::as_f64)
}

/// Equal-width histogram of known ages.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeHistogram {
    /// `(bin start, bin width, count)`
    pub bins: Vec<(f64, f64, usize)>,
    /// Rows left out because their age is unknown.
    pub missing: usize,
}

pub fn age_histogram(table: &Table, n_bins: usize) -> AgeHistogram {
    let known: Vec<f64> = ages(table).collect();
    let missing = table.len() - known.len();
    if known.is_empty() || n_bins == 0 {
        return AgeHistogram {
            bins: Vec::new(),
            missing,
        };
    }

    let lo = known.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = known.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    let width = if span.abs() < f64::EPSILON {
        1.0
    } else {
        span / n_bins as f64
    };

    let mut counts = vec![0usize; n_bins];
    for a in &known {
        let idx = (((a - lo) / width) as usize).min(n_bins - 1);
        counts[idx] += 1;
    }

    AgeHistogram {
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, c)| (lo + i as f64 * width, width, c))
            .collect(),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::text(v)
    }

    fn table() -> Table {
        Table::from_records(
            &["Race", "Ethnicity", AGE_AT_BASELINE],
            vec![
                vec![s("White"), s("Not Hispanic"), CellValue::Float(30.0)],
                vec![s("White"), s("Hispanic"), CellValue::Float(60.0)],
                vec![s("Asian"), s("Not Hispanic"), CellValue::Null],
                vec![s("White"), s("Not Hispanic"), CellValue::Float(45.0)],
            ],
        )
    }

    #[test]
    fn counts_are_sorted_by_frequency() {
        let counts = value_counts(&table(), "Race");
        assert_eq!(counts, vec![(s("White"), 3), (s("Asian"), 1)]);
    }

    #[test]
    fn cross_counts_group_pairs() {
        let c = cross_counts(&table(), "Race", "Ethnicity");
        assert_eq!(c.get(&(s("White"), s("Not Hispanic"))), Some(&2));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn histogram_reports_missing_ages() {
        let h = age_histogram(&table(), 30);
        assert_eq!(h.missing, 1);
        assert_eq!(h.bins.len(), 30);
        assert_eq!(h.bins.iter().map(|b| b.2).sum::<usize>(), 3);
        // the maximum lands in the last bin
        assert_eq!(h.bins[29].2, 1);
    }

    #[test]
    fn max_age_ignores_nulls() {
        assert_eq!(max_age(&table()), 60.0);
        assert_eq!(max_age(&Table::default()), 0.0);
    }

    #[test]
    fn unknown_column_has_no_values() {
        assert!(unique_sorted_values(&table(), "Primary Site").is_empty());
    }
}
