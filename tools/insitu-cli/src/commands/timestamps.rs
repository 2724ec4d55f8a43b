//! Build the image timestamp table for a folder of frames.

use std::path::{Path, PathBuf};

use insitu_data_model::table::Workbook;
use insitu_data_model::workbook::save_workbook;
use insitu_processing_core::time_tables::image_timestamp_table;
use insitu_render_engine::image_sequence::list_file_names;

pub const TIMESTAMP_SHEET: &str = "Image Timestamps";

pub fn write_timestamp_table(folder: &Path, output: &Path) -> anyhow::Result<usize> {
    let names = list_file_names(folder)?;
    let table = image_timestamp_table(TIMESTAMP_SHEET, &names)?;
    let rows = table.len();
    save_workbook(output, &Workbook::with_sheet(table))?;
    Ok(rows)
}

pub fn run(folder: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    println!("Scanning images in: {}", folder.display());
    let rows = write_timestamp_table(&folder, &output)?;
    println!("Timestamp table written: {} ({rows} images)", output.display());
    Ok(())
}
