//! Loading and saving workbooks.
//!
//! Spreadsheets (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read with
//! calamine and written as `.xlsx` with rust_xlsxwriter. CSV files are
//! treated as single-sheet workbooks.

use std::path::{Path, PathBuf};

use insitu_common::error::InsituError;

use crate::table::{CellValue, Table, Workbook};

/// Sheet name given to the single table of a CSV file.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Errors that can occur when reading or writing tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to open {}: {message}", path.display())]
    Open { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("Sheet {sheet:?} not found (available: {available})")]
    MissingSheet { sheet: String, available: String },

    #[error("Column {column:?} not found in sheet {sheet:?}")]
    MissingColumn { column: String, sheet: String },

    #[error("Malformed table: {message}")]
    Shape { message: String },

    #[error("Unsupported table format: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<TableError> for InsituError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::MissingColumn { .. } | TableError::MissingSheet { .. } => {
                InsituError::schema(err.to_string())
            }
            TableError::Io(io) => InsituError::Io(io),
            other => InsituError::table(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Spreadsheet,
    Csv,
}

fn detect_format(path: &Path) -> Result<TableFormat, TableError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(TableFormat::Spreadsheet),
        "csv" => Ok(TableFormat::Csv),
        other => Err(TableError::Unsupported {
            message: format!("{} (extension .{other})", path.display()),
        }),
    }
}

/// Load every sheet of a workbook. Dispatch by extension.
pub fn load_workbook(path: &Path) -> Result<Workbook, TableError> {
    match detect_format(path)? {
        TableFormat::Spreadsheet => load_spreadsheet(path),
        TableFormat::Csv => Ok(Workbook::with_sheet(load_csv(path)?)),
    }
}

/// Load one named sheet. For CSV input the single table is returned
/// whatever the requested name.
pub fn load_sheet(path: &Path, sheet: &str) -> Result<Table, TableError> {
    match detect_format(path)? {
        TableFormat::Spreadsheet => {
            let workbook = load_spreadsheet(path)?;
            let table = workbook.require_sheet(sheet)?.clone();
            Ok(table)
        }
        TableFormat::Csv => {
            tracing::debug!(path = %path.display(), sheet, "CSV input has a single table");
            let mut table = load_csv(path)?;
            table.name = sheet.to_string();
            Ok(table)
        }
    }
}

/// Save a workbook. `.xlsx` takes any number of sheets; `.csv` exactly one.
pub fn save_workbook(path: &Path, workbook: &Workbook) -> Result<(), TableError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "xlsx" => save_xlsx(path, workbook),
        "csv" => match workbook.sheets() {
            [table] => save_csv(path, table),
            sheets => Err(TableError::Unsupported {
                message: format!("CSV output holds one sheet, got {}", sheets.len()),
            }),
        },
        other => Err(TableError::Unsupported {
            message: format!("cannot write .{other} files"),
        }),
    }
}

/// Sibling path with `suffix` appended to the file stem.
///
/// CSV inputs keep their extension; every spreadsheet input maps to
/// `.xlsx`, the only spreadsheet format we write.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = match detect_format(path) {
        Ok(TableFormat::Csv) => "csv",
        _ => "xlsx",
    };
    path.with_file_name(format!("{stem}{suffix}.{ext}"))
}

fn load_spreadsheet(path: &Path) -> Result<Workbook, TableError> {
    use calamine::{open_workbook_auto, Reader};

    let mut source = open_workbook_auto(path).map_err(|e| TableError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut workbook = Workbook::new();
    for name in source.sheet_names() {
        let range = source
            .worksheet_range(&name)
            .map_err(|e| TableError::Open {
                path: path.to_path_buf(),
                message: format!("sheet {name:?}: {e}"),
            })?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| convert_cell(cell).to_text())
                    .collect()
            })
            .unwrap_or_default();

        let mut table = Table::new(name.clone(), headers);
        for row in rows {
            table.push_row(row.iter().map(convert_cell).collect());
        }
        tracing::debug!(sheet = %name, rows = table.len(), "Loaded sheet");
        workbook.upsert_sheet(table);
    }

    Ok(workbook)
}

fn convert_cell(cell: &calamine::Data) -> CellValue {
    use calamine::Data;

    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            CellValue::Text(s.clone())
        }
        Data::DateTime(dt) => {
            let days = dt.as_f64();
            let secs = if dt.is_duration() {
                days * 86_400.0
            } else {
                days.fract() * 86_400.0
            };
            CellValue::Time(secs)
        }
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
    }
}

fn load_csv(path: &Path) -> Result<Table, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| TableError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = Table::new(CSV_SHEET_NAME, headers);

    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(parse_csv_cell).collect());
    }

    Ok(table)
}

fn parse_csv_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => CellValue::Number(v),
        _ => CellValue::Text(raw.to_string()),
    }
}

fn save_csv(path: &Path, table: &Table) -> Result<(), TableError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    let width = table.headers.len();
    for row in &table.rows {
        let mut record: Vec<String> = row.iter().map(CellValue::to_text).collect();
        if record.len() < width {
            record.resize(width, String::new());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn save_xlsx(path: &Path, workbook: &Workbook) -> Result<(), TableError> {
    use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

    let write_err = |e: rust_xlsxwriter::XlsxError| TableError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let time_format = Format::new().set_num_format("hh:mm:ss.000");
    let mut book = XlsxWorkbook::new();

    for table in workbook.sheets() {
        let sheet = book.add_worksheet();
        sheet.set_name(&table.name).map_err(write_err)?;

        for (col, header) in table.headers.iter().enumerate() {
            sheet
                .write_string(0, col as u16, header.as_str())
                .map_err(write_err)?;
        }

        for (r, row) in table.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    CellValue::Empty => {}
                    CellValue::Number(v) if v.is_finite() => {
                        sheet.write_number(r, c, *v).map_err(write_err)?;
                    }
                    CellValue::Number(_) => {}
                    CellValue::Text(s) => {
                        sheet.write_string(r, c, s.as_str()).map_err(write_err)?;
                    }
                    CellValue::Bool(b) => {
                        sheet.write_boolean(r, c, *b).map_err(write_err)?;
                    }
                    CellValue::Time(secs) => {
                        sheet
                            .write_number_with_format(r, c, secs / 86_400.0, &time_format)
                            .map_err(write_err)?;
                    }
                }
            }
        }
    }

    book.save(path).map_err(write_err)?;
    tracing::debug!(path = %path.display(), sheets = workbook.sheets().len(), "Saved workbook");
    Ok(())
}
