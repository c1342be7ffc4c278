use std::collections::{BTreeSet, HashMap};
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a spreadsheet column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring what a spreadsheet can hold.
/// Filter selections live in `BTreeSet`s, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Date/time rendered as ISO-8601 text.
    Date(String),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) | CellValue::Date(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{}", format_float(*v)),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

/// Whole floats keep one decimal (`50.0`), everything else uses the shortest
/// round-trip form.
fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the cell, without parsing text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) | CellValue::Date(s) => Some(s),
            _ => None,
        }
    }

    /// Text written to CSV / xlsx exports. Nulls become empty fields.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Stringify everything except nulls, which stay null.
    pub fn into_text(self) -> CellValue {
        match self {
            CellValue::Null | CellValue::String(_) => self,
            other => CellValue::String(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – one loaded sheet
// ---------------------------------------------------------------------------

/// An in-memory table: ordered column names and row-major cells.
///
/// Every transformation returns a new `Table`; callers never mutate a table
/// they did not build themselves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table, padding or truncating each row to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Table { columns, rows }
    }

    /// Convenience constructor used by tests and small fixtures.
    pub fn from_records<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<CellValue>>) -> Self {
        Self::new(
            columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows,
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (`row`, `column`), `None` if the column does not exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Iterate over every value of a column.
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Sorted set of distinct values in a column.
    pub fn unique_values(&self, name: &str) -> BTreeSet<CellValue> {
        self.column_values(name)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default()
    }

    /// Rename columns according to `mapping` (old → new).
    pub fn rename(&self, mapping: &HashMap<String, String>) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| mapping.get(c).cloned().unwrap_or_else(|| c.clone()))
            .collect();
        Table {
            columns,
            rows: self.rows.clone(),
        }
    }

    /// Project onto `names` in the given order. Unknown names are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Table {
        let picks: Vec<(String, usize)> = names
            .iter()
            .filter_map(|n| {
                let n = n.as_ref();
                self.column_index(n).map(|i| (n.to_string(), i))
            })
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|r| picks.iter().map(|(_, i)| r[*i].clone()).collect())
            .collect();
        Table {
            columns: picks.into_iter().map(|(n, _)| n).collect(),
            rows,
        }
    }

    /// Drop the named columns (unknown names are ignored).
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Table {
        let keep: Vec<&String> = self
            .columns
            .iter()
            .filter(|c| !names.iter().any(|n| n.as_ref() == c.as_str()))
            .collect();
        self.select(&keep)
    }

    /// Keep only the given source rows, in the given order.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Contiguous slice of rows, clamped to the table length.
    pub fn slice(&self, start: usize, len: usize) -> Table {
        let start = start.min(self.rows.len());
        let end = start.saturating_add(len).min(self.rows.len());
        Table {
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Add (or replace) a column with one value per row.
    pub fn with_column(&self, name: &str, values: Vec<CellValue>) -> Table {
        let mut out = self.clone();
        out.set_column(name, values);
        out
    }

    /// Apply `f` to every cell of the named columns.
    pub fn map_columns<S, F>(&self, names: &[S], f: F) -> Table
    where
        S: AsRef<str>,
        F: Fn(&str, CellValue) -> CellValue,
    {
        let targets: Vec<(usize, &str)> = names
            .iter()
            .filter_map(|n| self.column_index(n.as_ref()).map(|i| (i, n.as_ref())))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                for &(i, name) in &targets {
                    let cell = std::mem::replace(&mut row[i], CellValue::Null);
                    row[i] = f(name, cell);
                }
                row
            })
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    fn set_column(&mut self, name: &str, mut values: Vec<CellValue>) {
        values.resize(self.rows.len(), CellValue::Null);
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }
}
