use std::collections::HashMap;

use crate::error::SchemaError;

use super::model::Table;

// ---------------------------------------------------------------------------
// Logical columns and their accepted spellings
// ---------------------------------------------------------------------------

pub const CASE_ID: &str = "Case ID";
pub const IMAGE_URL: &str = "imageUrl";
pub const AVAILABLE_IMAGES: &str = "Available Images";
pub const AGE_AT_BASELINE: &str = "Age at Baseline";

/// A column the code relies on, with the spellings seen in the wild.
#[derive(Debug, Clone, Copy)]
pub struct LogicalField {
    /// Human name used in error messages.
    pub label: &'static str,
    /// Name the column is renamed to once found.
    pub canonical: &'static str,
    /// Accepted spellings, highest priority first.
    pub aliases: &'static [&'static str],
}

pub const IMAGE_URL_FIELD: LogicalField = LogicalField {
    label: "image URL",
    canonical: IMAGE_URL,
    aliases: &["imageUrl", "image_url", "url", "Image URL"],
};

pub const CASE_ID_FIELD: LogicalField = LogicalField {
    label: "patient ID",
    canonical: CASE_ID,
    aliases: &["Case ID", "Patient ID", "case_id"],
};

/// First alias of `field` present in `table`.
pub fn find_alias(table: &Table, field: &LogicalField) -> Option<&'static str> {
    field
        .aliases
        .iter()
        .copied()
        .find(|alias| table.has_column(alias))
}

/// Rename the first matching alias of every field to its canonical name.
///
/// All fields are checked before anything is renamed, so a missing field
/// never leaves a half-resolved table behind.
pub fn resolve_columns(table: &Table, fields: &[LogicalField]) -> Result<Table, SchemaError> {
    let mut mapping = HashMap::new();
    for field in fields {
        let alias = find_alias(table, field).ok_or_else(|| SchemaError::MissingField {
            field: field.label.to_string(),
            tried: field.aliases.iter().map(|a| a.to_string()).collect(),
        })?;
        if alias != field.canonical {
            log::debug!("Column '{alias}' used as '{}'", field.canonical);
            mapping.insert(alias.to_string(), field.canonical.to_string());
        }
    }
    Ok(table.rename(&mapping))
}

/// Collect every name in `required` that `table` lacks.
pub fn missing_columns<'a>(table: &Table, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|c| !table.has_column(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    #[test]
    fn snake_case_url_resolves_to_canonical() {
        let t = Table::from_records(
            &["image_url", "Case ID"],
            vec![vec![CellValue::text("https://x/ross/a.svs"), CellValue::text("A")]],
        );
        let r = resolve_columns(&t, &[IMAGE_URL_FIELD, CASE_ID_FIELD]).unwrap();
        assert!(r.has_column("imageUrl"));
        assert!(!r.has_column("image_url"));
        assert_eq!(r.cell(0, "imageUrl"), Some(&CellValue::text("https://x/ross/a.svs")));
    }

    #[test]
    fn earlier_alias_wins() {
        let t = Table::from_records(&["url", "imageUrl", "Patient ID"], vec![]);
        let r = resolve_columns(&t, &[IMAGE_URL_FIELD, CASE_ID_FIELD]).unwrap();
        // "imageUrl" already canonical; "url" stays as-is
        assert_eq!(
            r.columns(),
            &["url".to_string(), "imageUrl".to_string(), "Case ID".to_string()]
        );
    }

    #[test]
    fn no_alias_is_a_schema_error() {
        let t = Table::from_records(&["link", "Case ID"], vec![]);
        let err = resolve_columns(&t, &[IMAGE_URL_FIELD, CASE_ID_FIELD]).unwrap_err();
        match err {
            SchemaError::MissingField { field, tried } => {
                assert_eq!(field, "image URL");
                assert_eq!(tried.len(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_columns_lists_all() {
        let t = Table::from_records(&["Case ID"], vec![]);
        assert_eq!(missing_columns(&t, &["Case ID", "imageId", "slideId"]), vec!["imageId", "slideId"]);
    }
}
