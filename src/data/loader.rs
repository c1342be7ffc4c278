use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::array_value_to_string;
use calamine::{Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::age::{normalize_ages, AgeColumns};
use super::columns::{resolve_columns, CASE_ID, CASE_ID_FIELD, IMAGE_URL, IMAGE_URL_FIELD};
use super::model::{CellValue, Table};

/// Spreadsheet downloads (not asset downloads) get a generous timeout.
const SOURCE_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from a local path or an `http(s)://` URL.
pub fn load_source(source: &str) -> Result<Table> {
    if is_remote(source) {
        load_remote(source)
    } else {
        load_file(Path::new(source))
    }
}

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xls` / `.xlsm` / `.ods` – first worksheet, first row is the header
/// * `.csv`     – header row with column names
/// * `.json`    – `[{ "Case ID": "...", ... }, ...]`
/// * `.parquet` – flat columns (strings, ints, floats, bools, dates)
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => {
            let workbook = calamine::open_workbook_auto(path)
                .with_context(|| format!("opening workbook {}", path.display()))?;
            load_workbook(workbook)?
        }
        "csv" => {
            let reader = csv::Reader::from_path(path)
                .with_context(|| format!("opening CSV {}", path.display()))?;
            load_csv(reader)?
        }
        "json" => {
            let text = std::fs::read_to_string(path).context("reading JSON file")?;
            load_json(&text)?
        }
        "parquet" | "pq" => {
            let file = std::fs::File::open(path).context("opening parquet file")?;
            load_parquet(file)?
        }
        other => bail!("Unsupported file extension: .{other}"),
    };

    log::info!(
        "Loaded {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

/// Load the clinical table: every non-age column becomes text, then
/// `Age at Baseline` is derived.
pub fn load_clinical(source: &str, ages: &AgeColumns) -> Result<Table> {
    let raw = load_source(source).context("loading clinical data")?;
    Ok(prepare_clinical(&raw, ages))
}

/// Text-coerce categorical columns and derive `Age at Baseline`.
pub fn prepare_clinical(raw: &Table, ages: &AgeColumns) -> Table {
    let categorical: Vec<&String> = raw
        .columns()
        .iter()
        .filter(|c| !ages.raw.iter().any(|a| a == *c))
        .collect();
    let texted = raw.map_columns(&categorical, |_, v| v.into_text());
    normalize_ages(&texted, ages)
}

/// Load the (url, case id) list the downloader works from.
///
/// Column names are resolved through their aliases before any row is
/// looked at; the result has exactly `imageUrl` and `Case ID`.
pub fn load_asset_list(source: &str) -> Result<Table> {
    let raw = load_source(source).context("loading pathology manifest")?;
    let resolved = resolve_columns(&raw, &[IMAGE_URL_FIELD, CASE_ID_FIELD])?;
    Ok(resolved.select(&[IMAGE_URL, CASE_ID]))
}

pub fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// ---------------------------------------------------------------------------
// Remote sources
// ---------------------------------------------------------------------------

fn load_remote(url: &str) -> Result<Table> {
    let path_part = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path_part
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    log::info!("Fetching {url}");
    let agent = ureq::AgentBuilder::new().timeout(SOURCE_TIMEOUT).build();
    let response = agent
        .get(url)
        .call()
        .with_context(|| format!("fetching {url}"))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .with_context(|| format!("reading body of {url}"))?;

    let table = match ext.as_str() {
        "csv" => load_csv(csv::Reader::from_reader(Cursor::new(bytes)))?,
        "json" => load_json(&String::from_utf8_lossy(&bytes))?,
        "parquet" | "pq" => load_parquet(bytes::Bytes::from(bytes))?,
        // Anything else is assumed to be a workbook; calamine sniffs the format.
        _ => {
            let workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
                .with_context(|| format!("opening workbook from {url}"))?;
            load_workbook(workbook)?
        }
    };

    log::info!(
        "Loaded {} rows x {} columns from {url}",
        table.len(),
        table.columns().len()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Workbook loader
// ---------------------------------------------------------------------------

fn load_workbook<RS>(mut workbook: calamine::Sheets<RS>) -> Result<Table>
where
    RS: std::io::Read + std::io::Seek,
{
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("reading first worksheet")?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("Unnamed: {i}"),
            other => other.to_string(),
        })
        .collect();

    let body = rows
        .map(|row| row.iter().map(excel_to_cell).collect())
        .collect();

    Ok(Table::new(columns, body))
}

fn excel_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Date(
            dt.as_datetime()
                .map(|d| d.to_string())
                .unwrap_or_else(|| dt.as_f64().to_string()),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Date(s.clone()),
        Data::Error(_) => CellValue::Null,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Cells are typed by content, except identifier columns (any case-id
/// spelling), which stay text so `0007` keeps its zeros.
fn load_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Table> {
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let is_id: Vec<bool> = columns
        .iter()
        .map(|c| CASE_ID_FIELD.aliases.contains(&c.as_str()))
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(
            record
                .iter()
                .zip(&is_id)
                .map(|(field, &id)| match (id, field.is_empty()) {
                    (true, false) => CellValue::String(field.to_string()),
                    _ => guess_cell_type(field),
                })
                .collect(),
        );
    }

    Ok(Table::new(columns, rows))
}

fn guess_cell_type(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// A JSON array of flat objects, one per row. Column order is the order of
/// first appearance.
fn load_json(text: &str) -> Result<Table> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok(Table::new(columns, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Flat Parquet table: one Arrow column per table column.
fn load_parquet<T>(source: T) -> Result<Table>
where
    T: parquet::file::reader::ChunkReader + 'static,
{
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(source).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_cell(col, row))
                    .collect(),
            );
        }
    }

    Ok(Table::new(columns, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            match array_value_to_string(col, row) {
                Ok(s) => CellValue::Date(s),
                Err(_) => CellValue::Null,
            }
        }
        _ => match array_value_to_string(col, row) {
            Ok(s) => CellValue::String(s),
            Err(_) => CellValue::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_cells_are_typed() {
        let data = "Case ID,Age at Diagnosis,Race\nA,600,White\nB,,Asian\n";
        let table = load_csv(csv::Reader::from_reader(data.as_bytes())).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, "Age at Diagnosis"), Some(&CellValue::Integer(600)));
        assert_eq!(table.cell(1, "Age at Diagnosis"), Some(&CellValue::Null));
        assert_eq!(table.cell(1, "Race"), Some(&CellValue::text("Asian")));
    }

    #[test]
    fn csv_case_ids_keep_leading_zeros() {
        let data = "Patient ID,imageHeight\n0007,512\n,1\n";
        let table = load_csv(csv::Reader::from_reader(data.as_bytes())).unwrap();
        assert_eq!(table.cell(0, "Patient ID"), Some(&CellValue::text("0007")));
        assert_eq!(table.cell(1, "Patient ID"), Some(&CellValue::Null));
        assert_eq!(table.cell(0, "imageHeight"), Some(&CellValue::Integer(512)));
    }

    #[test]
    fn json_columns_follow_first_appearance() {
        let table = load_json(r#"[{"b": 1, "a": "x"}, {"c": true}]"#).unwrap();
        assert_eq!(table.columns(), &["b".to_string(), "a".to_string(), "c".to_string()]);
        assert_eq!(table.cell(1, "b"), Some(&CellValue::Null));
        assert_eq!(table.cell(1, "c"), Some(&CellValue::Bool(true)));
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://github.com/x/raw/main/crdc-clinical.xlsx"));
        assert!(!is_remote("/data/crdc-clinical.xlsx"));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = load_file(Path::new("/tmp/does-not-matter.txt")).unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    #[test]
    fn clinical_preparation_texts_categoricals_and_derives_age() {
        let raw = Table::from_records(
            &["Case ID", "Age at Diagnosis", "Age UOM", "Project"],
            vec![vec![
                CellValue::text("A"),
                CellValue::Integer(600),
                CellValue::text("Month"),
                CellValue::Integer(7),
            ]],
        );
        let t = prepare_clinical(&raw, &AgeColumns::default());
        assert_eq!(t.cell(0, "Project"), Some(&CellValue::text("7")));
        assert_eq!(t.cell(0, "Age at Baseline"), Some(&CellValue::Float(50.0)));
    }
}
