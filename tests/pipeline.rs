use std::collections::BTreeSet;
use std::fs;

use cohort_builder::data::age::AgeColumns;
use cohort_builder::data::columns::{AGE_AT_BASELINE, CASE_ID, IMAGE_URL};
use cohort_builder::data::export::{to_csv_string, write_csv, write_xlsx, PATHOLOGY_SHEET};
use cohort_builder::data::filter::{apply_filter, FilterSpec};
use cohort_builder::data::loader::{load_asset_list, load_file, prepare_clinical};
use cohort_builder::data::manifest::generate_pathology_manifest;
use cohort_builder::data::model::CellValue;
use cohort_builder::fetch::rows_from_table;

const CLINICAL: &str = "\
Case ID,Available Images,Race,Sex at Birth,Age at Diagnosis,Age at Surgery,Age at Enrollment,Age UOM
A,\"Radiology, Pathology\",White,Female,600,612,,Month
B,Radiology,White,Male,52,51,,Year
C,Pathology,Asian,Female,,,,
D,Pathology,White,Male,18250,,,Day
";

const ASSETS: &str = "\
Case ID,imageId,slideId,imageHeight,imagedWidth,physicalPixelSizeX,physicalPixelSizeY,imageUrl,created,changed
A,1,s1,100,200,0.25,0.25,https://h/ross/A/1.svs,2023-01-01,2023-01-02
A,2,s2,100,200,0.25,0.25,https://h/ross/A/2.svs,2023-01-01,2023-01-02
B,3,s3,100,200,0.25,0.25,https://h/ross/B/3.svs,2023-01-01,2023-01-02
D,4,s4,100,200,0.25,0.25,https://h/ross/D/4.svs,2023-01-01,2023-01-02
";

fn s(v: &str) -> CellValue {
    CellValue::text(v)
}

fn white_only() -> FilterSpec {
    let mut spec = FilterSpec::default();
    spec.columns.insert("Race".into(), BTreeSet::from([s("White")]));
    spec
}

#[test]
fn clinical_csv_to_pathology_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let clinical_path = dir.path().join("clinical.csv");
    let assets_path = dir.path().join("assets.csv");
    fs::write(&clinical_path, CLINICAL).unwrap();
    fs::write(&assets_path, ASSETS).unwrap();

    let clinical = prepare_clinical(&load_file(&clinical_path).unwrap(), &AgeColumns::default());
    let ages: Vec<CellValue> = clinical.column_values(AGE_AT_BASELINE).unwrap().cloned().collect();
    assert_eq!(
        ages,
        vec![CellValue::Float(50.0), CellValue::Float(51.0), CellValue::Null, CellValue::Float(50.0)]
    );

    let filtered = apply_filter(&clinical, &white_only());
    assert_eq!(filtered.len(), 3);

    let assets = load_file(&assets_path).unwrap();
    let manifest = generate_pathology_manifest(&filtered, &assets).unwrap();
    let ids: Vec<String> = manifest.column_values(CASE_ID).unwrap().map(|v| v.to_string()).collect();
    assert_eq!(ids, ["A", "A", "D"]);
    assert!(manifest.has_column(IMAGE_URL));
    assert!(manifest.has_column(AGE_AT_BASELINE));
    assert_eq!(manifest.columns().len(), clinical.columns().len() + 9);

    let xlsx = dir.path().join("manifest.xlsx");
    write_xlsx(&manifest, &xlsx, PATHOLOGY_SHEET).unwrap();
    let assets_back = load_asset_list(xlsx.to_str().unwrap()).unwrap();
    let rows = rows_from_table(&assets_back).unwrap();
    let urls: Vec<&str> = rows.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, ["https://h/ross/A/1.svs", "https://h/ross/A/2.svs", "https://h/ross/D/4.svs"]);
}

#[test]
fn age_range_combines_with_column_filters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinical.csv");
    fs::write(&path, CLINICAL).unwrap();
    let clinical = prepare_clinical(&load_file(&path).unwrap(), &AgeColumns::default());

    let mut spec = white_only();
    spec.age_range = Some((0.0, 50.0));
    spec.is_default_age_range = false;
    let ids: Vec<String> = apply_filter(&clinical, &spec)
        .column_values(CASE_ID)
        .unwrap()
        .map(|v| v.to_string())
        .collect();
    assert_eq!(ids, ["A", "D"]);

    spec.age_range = Some((50.5, 60.0));
    assert_eq!(apply_filter(&clinical, &spec).len(), 1);
}

#[test]
fn csv_export_keeps_filtered_rows_and_blank_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinical.csv");
    fs::write(&path, CLINICAL).unwrap();
    let clinical = prepare_clinical(&load_file(&path).unwrap(), &AgeColumns::default());

    let out = dir.path().join("filtered.csv");
    write_csv(&apply_filter(&clinical, &white_only()), &out).unwrap();
    let reloaded = load_file(&out).unwrap();
    assert_eq!(reloaded.len(), 3);
    assert_eq!(reloaded.columns(), clinical.columns());

    let text = to_csv_string(&clinical).unwrap();
    let c_line = text.lines().find(|l| l.starts_with("C,")).unwrap();
    assert!(c_line.ends_with(','));
}

#[test]
fn downloader_manifest_columns_resolve_through_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("list.csv");
    fs::write(&path, "Patient ID,url,note\nP1,https://h/ross/x.svs,a\nP2,https://h/ross/y.svs,b\n").unwrap();

    let table = load_asset_list(path.to_str().unwrap()).unwrap();
    assert_eq!(table.columns(), &[IMAGE_URL, CASE_ID].map(String::from));
    let rows = rows_from_table(&table).unwrap();
    assert_eq!(rows[1].case_id, "P2");

    let bad = dir.path().join("bad.csv");
    fs::write(&bad, "Patient ID,link\nP1,https://h/ross/x.svs\n").unwrap();
    let err = load_asset_list(bad.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().starts_with("Could not find image URL column"));
}
