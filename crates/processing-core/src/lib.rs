//! In-situ Processing Core
//!
//! Turns loaded tables into analysis-ready series:
//! - **Time sources:** Parse duration strings and timestamped image names
//! - **Normalization:** Elapsed seconds and playback timestamps per sample
//! - **Smoothing:** Savitzky-Golay filtering of strain/stress columns
//! - **Fitting:** Least-squares polynomial fit and evaluation
//! - **Time tables:** Offsets of image timestamps and logged durations
//!
//! This crate is pure computation with no file or process I/O.
//! All inputs are data; all outputs are data.

pub mod linalg;
pub mod normalize;
pub mod polyfit;
pub mod savgol;
pub mod time_source;
pub mod time_tables;

pub use normalize::{normalize_table, NormalizedSeries};
pub use polyfit::PolynomialFit;
pub use savgol::{SavitzkyGolay, SmoothingConfig};
pub use time_source::TimeSource;
