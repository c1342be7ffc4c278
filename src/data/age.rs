use serde::Deserialize;

use crate::error::ConversionError;

use super::columns::AGE_AT_BASELINE;
use super::model::{CellValue, Table};

// ---------------------------------------------------------------------------
// Unit-of-measure factors
// ---------------------------------------------------------------------------

pub const YEAR_FACTOR: f64 = 1.0;
pub const MONTH_FACTOR: f64 = 1.0 / 12.0;
pub const DAY_FACTOR: f64 = 1.0 / 365.25;

/// Which columns hold raw ages and which one holds their unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgeColumns {
    /// Raw age columns, in the order they are considered.
    pub raw: Vec<String>,
    /// Per-row unit string ("Year", "Month", "Day", ...).
    pub uom: String,
}

impl Default for AgeColumns {
    fn default() -> Self {
        Self {
            raw: vec![
                "Age at Diagnosis".into(),
                "Age at Surgery".into(),
                "Age at Enrollment".into(),
            ],
            uom: "Age UOM".into(),
        }
    }
}

/// Years per unit for a unit cell. Unknown or missing units count as years.
pub fn unit_factor(unit: Option<&CellValue>) -> f64 {
    let Some(unit) = unit else {
        return YEAR_FACTOR;
    };
    let text = unit.to_string().trim().to_lowercase();
    if text.contains("year") {
        YEAR_FACTOR
    } else if text.contains("month") {
        MONTH_FACTOR
    } else if text.contains("day") {
        DAY_FACTOR
    } else {
        YEAR_FACTOR
    }
}

/// Read a cell as a number. Nulls (and NaN) are `Ok(None)`.
pub fn parse_numeric(cell: &CellValue) -> Result<Option<f64>, ConversionError> {
    match cell {
        CellValue::Null => Ok(None),
        CellValue::Integer(i) => Ok(Some(*i as f64)),
        CellValue::Float(f) if f.is_nan() => Ok(None),
        CellValue::Float(f) => Ok(Some(*f)),
        CellValue::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<f64>()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .map_err(|_| ConversionError { raw: s.clone() })
        }
        other => Err(ConversionError {
            raw: other.to_string(),
        }),
    }
}

/// Round to one decimal place, ties to even (20.25 → 20.2, 20.35 → 20.4).
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Derive `Age at Baseline` for every row.
///
/// Each raw age column present in the table is coerced to numeric (bad
/// values become null) and converted to years with the row's unit factor.
/// The baseline is the smallest converted value, rounded to one decimal, or
/// null when the row has no usable age at all.
pub fn normalize_ages(table: &Table, columns: &AgeColumns) -> Table {
    let present: Vec<&String> = columns
        .raw
        .iter()
        .filter(|c| table.has_column(c))
        .collect();

    let coerced = table.map_columns(&present, |name, cell| match parse_numeric(&cell) {
        Ok(Some(v)) => CellValue::Float(v),
        Ok(None) => CellValue::Null,
        Err(e) => {
            log::trace!("{name}: {e}, treated as missing");
            CellValue::Null
        }
    });

    let baseline = (0..coerced.len())
        .map(|row| {
            let factor = unit_factor(coerced.cell(row, &columns.uom));
            present
                .iter()
                .filter_map(|col| coerced.cell(row, col).and_then(CellValue::as_f64))
                .map(|raw| raw * factor)
                .min_by(f64::total_cmp)
                .map(|years| CellValue::Float(round1(years)))
                .unwrap_or(CellValue::Null)
        })
        .collect();

    coerced.with_column(AGE_AT_BASELINE, baseline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::text(v)
    }

    fn clinical(rows: Vec<Vec<CellValue>>) -> Table {
        Table::from_records(
            &["Case ID", "Age at Diagnosis", "Age at Surgery", "Age UOM"],
            rows,
        )
    }

    #[test]
    fn months_convert_and_minimum_wins() {
        // 600 and 612 months: 50.0 and 51.0 years
        let t = clinical(vec![vec![s("A"), CellValue::Integer(600), CellValue::Integer(612), s("Month")]]);
        let out = normalize_ages(&t, &AgeColumns::default());
        assert_eq!(out.cell(0, AGE_AT_BASELINE), Some(&CellValue::Float(50.0)));

        let t = clinical(vec![vec![s("A"), CellValue::Integer(52), CellValue::Integer(51), s("Year")]]);
        let out = normalize_ages(&t, &AgeColumns::default());
        assert_eq!(out.cell(0, AGE_AT_BASELINE), Some(&CellValue::Float(51.0)));
    }

    #[test]
    fn non_numeric_everywhere_is_null_not_zero() {
        let t = clinical(vec![vec![s("A"), s("unknown"), CellValue::Null, s("Year")]]);
        let out = normalize_ages(&t, &AgeColumns::default());
        assert_eq!(out.cell(0, AGE_AT_BASELINE), Some(&CellValue::Null));
        assert_eq!(out.cell(0, "Age at Diagnosis"), Some(&CellValue::Null));
    }

    #[test]
    fn no_age_columns_at_all_gives_null() {
        let t = Table::from_records(&["Case ID"], vec![vec![s("A")]]);
        let out = normalize_ages(&t, &AgeColumns::default());
        assert_eq!(out.cell(0, AGE_AT_BASELINE), Some(&CellValue::Null));
    }

    #[test]
    fn days_are_rounded_to_one_decimal() {
        let t = clinical(vec![vec![s("A"), s("10000"), CellValue::Null, s(" DAYS ")]]);
        let out = normalize_ages(&t, &AgeColumns::default());
        // 10000 / 365.25 = 27.378...
        assert_eq!(out.cell(0, AGE_AT_BASELINE), Some(&CellValue::Float(27.4)));
    }

    #[test]
    fn exact_halves_round_to_even() {
        let t = clinical(vec![vec![s("A"), s("243"), CellValue::Null, s("Month")]]);
        let out = normalize_ages(&t, &AgeColumns::default());
        // 243 / 12 = 20.25 exactly
        assert_eq!(out.cell(0, AGE_AT_BASELINE), Some(&CellValue::Float(20.2)));
        assert_eq!(round1(20.75), 20.8);
    }

    #[test]
    fn unknown_or_missing_unit_defaults_to_years() {
        assert_eq!(unit_factor(Some(&s("fortnight"))), YEAR_FACTOR);
        assert_eq!(unit_factor(Some(&CellValue::Null)), YEAR_FACTOR);
        assert_eq!(unit_factor(None), YEAR_FACTOR);
        assert_eq!(unit_factor(Some(&s("Months"))), MONTH_FACTOR);
    }

    #[test]
    fn intermediate_columns_are_not_kept() {
        let t = clinical(vec![vec![s("A"), CellValue::Integer(40), CellValue::Null, s("Year")]]);
        let out = normalize_ages(&t, &AgeColumns::default());
        assert_eq!(out.columns().len(), t.columns().len() + 1);
    }

    #[test]
    fn parse_numeric_reports_conversion_errors() {
        assert_eq!(parse_numeric(&s(" 12.5 ")), Ok(Some(12.5)));
        assert_eq!(parse_numeric(&s("")), Ok(None));
        assert!(parse_numeric(&s("n/a")).is_err());
    }
}
