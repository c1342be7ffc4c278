use std::collections::{HashMap, HashSet};

use crate::error::SchemaError;

use super::columns::{missing_columns, AVAILABLE_IMAGES, CASE_ID};
use super::model::{CellValue, Table};

/// Asset columns every pathology manifest carries.
pub const PATHOLOGY_COLUMNS: [&str; 10] = [
    "Case ID",
    "imageId",
    "slideId",
    "imageHeight",
    "imagedWidth",
    "physicalPixelSizeX",
    "physicalPixelSizeY",
    "imageUrl",
    "created",
    "changed",
];

/// Substring that marks a case as having pathology imagery.
pub const PATHOLOGY_MARKER: &str = "Pathology";

// ---------------------------------------------------------------------------
// Case selection
// ---------------------------------------------------------------------------

/// Distinct case ids whose `Available Images` mentions pathology, in order
/// of first appearance. Rows without the column never match.
pub fn pathology_case_ids(filtered: &Table) -> Vec<CellValue> {
    let (Some(id_idx), Some(avail_idx)) = (
        filtered.column_index(CASE_ID),
        filtered.column_index(AVAILABLE_IMAGES),
    ) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    filtered
        .rows()
        .iter()
        .filter(|row| {
            row[avail_idx]
                .as_str()
                .is_some_and(|s| s.contains(PATHOLOGY_MARKER))
        })
        .map(|row| row[id_idx].clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Distinct case ids in order of first appearance.
pub fn unique_case_ids(table: &Table) -> Result<Vec<String>, SchemaError> {
    let values = table
        .column_values(CASE_ID)
        .ok_or_else(|| SchemaError::MissingColumns {
            table: "the filtered table".into(),
            columns: vec![CASE_ID.into()],
        })?;
    let mut seen = HashSet::new();
    Ok(values
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect())
}

// ---------------------------------------------------------------------------
// Pathology manifest
// ---------------------------------------------------------------------------

/// Join the filtered cohort against the pathology asset table.
///
/// Only cases flagged as having pathology images pull in asset rows. Each
/// clinical row expands into one output row per matching asset, so rows with
/// no pathology asset produce nothing. Clinical order is kept. Columns: all
/// clinical columns, then the asset columns except `Case ID`.
pub fn generate_pathology_manifest(filtered: &Table, assets: &Table) -> Result<Table, SchemaError> {
    let missing = missing_columns(filtered, &[CASE_ID, AVAILABLE_IMAGES]);
    let Some(case_idx) = filtered.column_index(CASE_ID).filter(|_| missing.is_empty()) else {
        return Err(SchemaError::MissingColumns {
            table: "the filtered table".into(),
            columns: missing.into_iter().map(String::from).collect(),
        });
    };
    if !assets.has_column(CASE_ID) {
        return Err(SchemaError::MissingColumns {
            table: "the pathology table".into(),
            columns: vec![CASE_ID.into()],
        });
    }
    let missing = missing_columns(assets, &PATHOLOGY_COLUMNS);
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns {
            table: "the pathology table".into(),
            columns: missing.into_iter().map(String::from).collect(),
        });
    }

    // ids compare as text: clinical ids are stringified, asset sheets may hold numbers
    let wanted: HashSet<CellValue> = pathology_case_ids(filtered)
        .into_iter()
        .map(CellValue::into_text)
        .collect();
    let restricted = assets.select(&PATHOLOGY_COLUMNS);
    let asset_id_idx = 0;

    // case id → restricted asset rows, preserving asset order
    let mut by_case: HashMap<CellValue, Vec<&Vec<CellValue>>> = HashMap::new();
    for row in restricted.rows() {
        let id = row[asset_id_idx].clone().into_text();
        if wanted.contains(&id) {
            by_case.entry(id).or_default().push(row);
        }
    }

    let extra: Vec<usize> = (0..PATHOLOGY_COLUMNS.len())
        .filter(|&i| i != asset_id_idx)
        .collect();
    let mut columns: Vec<String> = filtered.columns().to_vec();
    columns.extend(extra.iter().map(|&i| join_name(filtered, PATHOLOGY_COLUMNS[i])));

    let mut rows = Vec::new();
    for row in filtered.rows() {
        let Some(matches) = by_case.get(&row[case_idx].clone().into_text()) else {
            continue;
        };
        for asset in matches {
            let mut out = row.clone();
            out.extend(extra.iter().map(|&i| asset[i].clone()));
            rows.push(out);
        }
    }

    log::info!(
        "Pathology manifest: {} cases with pathology, {} rows",
        wanted.len(),
        rows.len()
    );
    Ok(Table::new(columns, rows))
}

/// Asset column name in the joined table; clashes get a `_y` suffix and the
/// clinical side keeps its name.
fn join_name(clinical: &Table, asset_col: &str) -> String {
    if clinical.has_column(asset_col) {
        format!("{asset_col}_y")
    } else {
        asset_col.to_string()
    }
}
