//! In-situ Data Model
//!
//! Defines the core data contracts for the in-situ tools:
//! - **Samples:** One input row (time field, strain, stress)
//! - **Time series:** Retained samples with elapsed and playback times
//! - **Smoothed curves:** Output of the smoothing pass
//! - **Tables/Workbooks:** In-memory sheets loaded from and saved to
//!   spreadsheet or CSV files

pub mod sample;
pub mod table;
pub mod workbook;

pub use sample::*;
pub use table::*;
pub use workbook::*;
