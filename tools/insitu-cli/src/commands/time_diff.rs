//! Offsets of logged `Time(Sec)` readings against the first reading.

use std::path::{Path, PathBuf};

use insitu_data_model::table::Workbook;
use insitu_data_model::workbook::{load_sheet, save_workbook};
use insitu_processing_core::time_tables::logged_time_table;

pub const TIME_DIFF_SHEET: &str = "Time Differences";

pub fn write_time_diff_table(input: &Path, sheet: &str, output: &Path) -> anyhow::Result<usize> {
    let table = load_sheet(input, sheet)?;
    let result = logged_time_table(&table, TIME_DIFF_SHEET)?;
    let rows = result.len();
    save_workbook(output, &Workbook::with_sheet(result))?;
    Ok(rows)
}

pub fn run(input: PathBuf, sheet: String, output: PathBuf) -> anyhow::Result<()> {
    println!("Reading {} (sheet {sheet:?})", input.display());
    let rows = write_time_diff_table(&input, &sheet, &output)?;
    println!("Time differences written: {} ({rows} rows)", output.display());
    Ok(())
}
