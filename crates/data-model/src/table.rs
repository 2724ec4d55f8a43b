//! In-memory tables and workbooks.
//!
//! A [`Table`] is one sheet: a header row followed by data rows. Rows may
//! be ragged on load; missing trailing cells read as [`CellValue::Empty`].

use std::fmt;

use serde::Serialize;

use crate::workbook::TableError;

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Time of day or duration, in seconds.
    Time(f64),
}

impl CellValue {
    /// Numeric view of the cell. Text is parsed after trimming; NaN and
    /// infinities are not numbers here.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(v) | Self::Time(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Empty => None,
        };
        value.filter(|v: &f64| v.is_finite())
    }

    /// String view of the cell, as a spreadsheet user would read it.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Time(secs) => f.write_str(&format_clock(*secs)),
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Self::Empty, Self::Number)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Render seconds as `HH:MM:SS` with a `.fff` suffix when fractional.
pub fn format_clock(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    let (h, m, s) = (total_s / 3600, (total_s / 60) % 60, total_s % 60);
    if ms == 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{h:02}:{m:02}:{s:02}.{ms:03}")
    }
}

/// One sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from named columns of equal length.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(String, Vec<CellValue>)>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        let len = columns.first().map_or(0, |(_, c)| c.len());
        if let Some((header, col)) = columns.iter().find(|(_, c)| c.len() != len) {
            return Err(TableError::Shape {
                message: format!(
                    "column {header:?} has {} values, expected {len}",
                    col.len()
                ),
            });
        }

        let headers = columns.iter().map(|(h, _)| h.clone()).collect();
        let mut iters: Vec<_> = columns.into_iter().map(|(_, c)| c.into_iter()).collect();
        let rows = (0..len)
            .map(|_| {
                iters
                    .iter_mut()
                    .map(|it| it.next().unwrap_or(CellValue::Empty))
                    .collect()
            })
            .collect();

        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    /// Label of the first column, if any.
    pub fn first_header(&self) -> Option<&str> {
        self.headers.first().map(String::as_str)
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == header)
    }

    /// Like [`Table::column_index`], but a missing column is an error.
    pub fn require_column(&self, header: &str) -> Result<usize, TableError> {
        self.column_index(header)
            .ok_or_else(|| TableError::MissingColumn {
                column: header.to_string(),
                sheet: self.name.clone(),
            })
    }

    /// Cell at `(row, col)`; out-of-range cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(EMPTY)
    }

    /// All cells of a named column.
    pub fn column(&self, header: &str) -> Result<Vec<&CellValue>, TableError> {
        let col = self.require_column(header)?;
        Ok((0..self.rows.len()).map(|r| self.cell(r, col)).collect())
    }

    /// Numeric view of a named column; non-numeric cells become `None`.
    pub fn numeric_column(&self, header: &str) -> Result<Vec<Option<f64>>, TableError> {
        Ok(self
            .column(header)?
            .into_iter()
            .map(CellValue::as_f64)
            .collect())
    }

    /// String view of a named column.
    pub fn text_column(&self, header: &str) -> Result<Vec<String>, TableError> {
        Ok(self
            .column(header)?
            .into_iter()
            .map(CellValue::to_text)
            .collect())
    }

    /// Replace a column's values, appending the column if it is new.
    /// Rows are extended with empty cells as needed.
    pub fn set_column(&mut self, header: &str, values: Vec<CellValue>) {
        let col = match self.column_index(header) {
            Some(col) => col,
            None => {
                self.headers.push(header.to_string());
                self.headers.len() - 1
            }
        };
        while self.rows.len() < values.len() {
            self.rows.push(Vec::new());
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            if row.len() <= col {
                row.resize(col + 1, CellValue::Empty);
            }
            row[col] = value;
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Workbook {
    sheets: Vec<Table>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(table: Table) -> Self {
        Self {
            sheets: vec![table],
        }
    }

    pub fn sheets(&self) -> &[Table] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Like [`Workbook::sheet`], but a missing sheet is an error.
    pub fn require_sheet(&self, name: &str) -> Result<&Table, TableError> {
        self.sheet(name).ok_or_else(|| TableError::MissingSheet {
            sheet: name.to_string(),
            available: self.sheet_names().join(", "),
        })
    }

    /// Insert a sheet, replacing any existing sheet of the same name in place.
    pub fn upsert_sheet(&mut self, table: Table) {
        match self.sheets.iter_mut().find(|s| s.name == table.name) {
            Some(existing) => *existing = table,
            None => self.sheets.push(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new(
            "input_data",
            vec!["Time(Sec)".into(), "ε (%)".into(), "σ (MPa)".into()],
        );
        table.push_row(vec!["00:00:00".into(), CellValue::Number(0.1), CellValue::Number(10.0)]);
        table.push_row(vec!["00:00:05".into(), CellValue::Empty, CellValue::Number(12.0)]);
        table.push_row(vec!["00:00:10".into(), "0.3".into()]);
        table
    }

    #[test]
    fn test_numeric_column_parses_text_and_blanks() {
        let table = sample_table();
        assert_eq!(
            table.numeric_column("ε (%)").unwrap(),
            vec![Some(0.1), None, Some(0.3)]
        );
        assert_eq!(
            table.numeric_column("σ (MPa)").unwrap(),
            vec![Some(10.0), Some(12.0), None]
        );
    }

    #[test]
    fn test_non_finite_values_are_not_numeric() {
        for text in ["NaN", "nan", "inf", "-infinity", " Infinity "] {
            assert_eq!(CellValue::from(text).as_f64(), None, "{text:?}");
        }
        assert_eq!(CellValue::Number(f64::NAN).as_f64(), None);
        assert_eq!(CellValue::Number(f64::NEG_INFINITY).as_f64(), None);
        assert_eq!(CellValue::Time(f64::INFINITY).as_f64(), None);
        assert_eq!(CellValue::from("1e3").as_f64(), Some(1000.0));
    }

    #[test]
    fn test_missing_column_is_reported_with_sheet() {
        let table = sample_table();
        let err = table.require_column("File name").unwrap_err();
        assert!(err.to_string().contains("File name"));
        assert!(err.to_string().contains("input_data"));
    }

    #[test]
    fn test_set_column_appends_and_replaces() {
        let mut table = sample_table();
        table.set_column("y", vec![CellValue::Number(1.0), CellValue::Number(2.0), CellValue::Number(3.0)]);
        assert_eq!(table.headers.len(), 4);
        assert_eq!(table.cell(2, 3), &CellValue::Number(3.0));

        table.set_column("y", vec![CellValue::Number(9.0)]);
        assert_eq!(table.cell(0, 3), &CellValue::Number(9.0));
        assert_eq!(table.cell(1, 3), &CellValue::Number(2.0));
    }

    #[test]
    fn test_from_columns_rejects_ragged_input() {
        let result = Table::from_columns(
            "s",
            vec![
                ("a".into(), vec![CellValue::Number(1.0)]),
                ("b".into(), vec![CellValue::Number(1.0), CellValue::Number(2.0)]),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_time_cells_render_as_clock_strings() {
        assert_eq!(CellValue::Time(5.0).to_text(), "00:00:05");
        assert_eq!(CellValue::Time(3725.25).to_text(), "01:02:05.250");
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut wb = Workbook::new();
        wb.upsert_sheet(Table::new("a", vec![]));
        wb.upsert_sheet(Table::new("b", vec![]));
        wb.upsert_sheet(Table::new("a", vec!["x".into()]));
        assert_eq!(wb.sheet_names(), vec!["a", "b"]);
        assert_eq!(wb.sheet("a").unwrap().headers, vec!["x".to_string()]);
        assert!(wb.require_sheet("c").is_err());
    }
}
