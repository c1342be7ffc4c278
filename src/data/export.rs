use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;

use super::model::{CellValue, Table};

pub const CSV_FILE_NAME: &str = "filtered_cancer_imaging_data.csv";
pub const PATHOLOGY_FILE_NAME: &str = "tcia_pathology_manifest.xlsx";
pub const PATHOLOGY_SHEET: &str = "Pathology_Images";
pub const RADIOLOGY_FILE_NAME: &str = "radiology_manifest.tcia";

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Write the header and every row. No index column; nulls are empty fields.
pub fn write_csv_to<W: Write>(table: &Table, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(table.columns())
        .context("writing CSV header")?;
    for (i, row) in table.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(CellValue::to_field))
            .with_context(|| format!("writing CSV row {i}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_csv_to(table, file)?;
    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

pub fn to_csv_string(table: &Table) -> Result<String> {
    let mut buf = Vec::new();
    write_csv_to(table, &mut buf)?;
    String::from_utf8(buf).context("CSV output is not UTF-8")
}

// ---------------------------------------------------------------------------
// xlsx
// ---------------------------------------------------------------------------

/// Write the table to a single-sheet workbook. Numbers stay numeric.
pub fn write_xlsx(table: &Table, path: &Path, sheet: &str) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).context("naming worksheet")?;

    for (c, name) in table.columns().iter().enumerate() {
        worksheet
            .write_string(0, c as u16, name)
            .context("writing xlsx header")?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                CellValue::Null => continue,
                CellValue::Integer(i) => worksheet.write_number(r, c, *i as f64),
                CellValue::Float(f) => worksheet.write_number(r, c, *f),
                CellValue::Bool(b) => worksheet.write_boolean(r, c, *b),
                other => worksheet.write_string(r, c, other.to_string()),
            }
            .with_context(|| format!("writing xlsx cell ({r}, {c})"))?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("saving {}", path.display()))?;
    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Radiology manifest
// ---------------------------------------------------------------------------

/// The manifest body is opaque; it is written exactly as received.
pub fn write_radiology_manifest(text: &str, path: &Path) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote radiology manifest to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_no_index_and_empty_nulls() {
        let t = Table::from_records(
            &["Case ID", "Age at Baseline"],
            vec![
                vec![CellValue::text("A"), CellValue::Float(50.0)],
                vec![CellValue::text("B, jr"), CellValue::Null],
            ],
        );
        let text = to_csv_string(&t).unwrap();
        assert_eq!(text, "Case ID,Age at Baseline\nA,50.0\n\"B, jr\",\n");
    }
}
