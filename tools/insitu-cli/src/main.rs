//! In-situ CLI: curve videos, time tables, polynomial fits, and video merging.
//!
//! Usage:
//!   insitu curve-video <INPUT> -o <VIDEO>     Animate a stress-strain curve
//!   insitu timestamps <FOLDER> -o <XLSX>      Time offsets from image file names
//!   insitu time-diff <INPUT> -o <XLSX>        Offsets of logged Time(Sec) values
//!   insitu image-video <FOLDER> -o <VIDEO>    Assemble .jpg images into videos
//!   insitu polyfit <WORKBOOK>                 Fit and fill a calculation sheet
//!   insitu merge ...                          Overlay a curve video on an image video
//!   insitu check                              Check external tools and fonts

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use insitu_common::config::{config_file_path, AppConfig};
use insitu_common::error::InsituError;

mod commands;

#[derive(Parser)]
#[command(
    name = "insitu",
    about = "In-situ TEM mechanical-testing toolkit",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/insitu/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the animated stress-strain video for a test run
    CurveVideo(commands::curve_video::CurveVideoArgs),

    /// Build the image timestamp table for a folder of frames
    Timestamps {
        /// Folder holding image-*.jpg files
        folder: PathBuf,

        /// Output spreadsheet
        #[arg(short, long, default_value = "image_timestamps.xlsx")]
        output: PathBuf,
    },

    /// Compute time differences for logged Time(Sec) values
    TimeDiff {
        /// Input spreadsheet or CSV
        input: PathBuf,

        /// Sheet holding the Time(Sec) column
        #[arg(long, default_value = "raw")]
        sheet: String,

        /// Output spreadsheet
        #[arg(short, long, default_value = "time_differences.xlsx")]
        output: PathBuf,
    },

    /// Assemble a folder of .jpg images into plain and labeled videos
    ImageVideo(commands::image_video::ImageVideoArgs),

    /// Fit a polynomial to "fitting data" and fill "calculation data"
    Polyfit(commands::polyfit::PolyfitArgs),

    /// Overlay a curve video onto an image-sequence video
    Merge(commands::merge::MergeArgs),

    /// Check ffmpeg, ffprobe, and font availability
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config_file_path);
    let (config, config_error) = load_config(&config_path);

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    insitu_common::logging::init_logging(&logging);
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "Using default configuration");
    }

    let result = match cli.command {
        Commands::CurveVideo(args) => commands::curve_video::run(args, &config),
        Commands::Timestamps { folder, output } => commands::timestamps::run(folder, output),
        Commands::TimeDiff {
            input,
            sheet,
            output,
        } => commands::time_diff::run(input, sheet, output),
        Commands::ImageVideo(args) => commands::image_video::run(args, &config),
        Commands::Polyfit(args) => commands::polyfit::run(args, &config),
        Commands::Merge(args) => commands::merge::run(args, &config),
        Commands::Check => commands::check::run(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Config for this run. Load failures fall back to the defaults and are
/// handed back so they can be logged once the subscriber exists.
fn load_config(path: &Path) -> (AppConfig, Option<InsituError>) {
    match AppConfig::load_from(path) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_curve_video_flags_parse() {
        let cli = Cli::try_parse_from([
            "insitu",
            "curve-video",
            "run.xlsx",
            "-o",
            "run.avi",
            "--xlim",
            "0,12.5",
            "--window",
            "21",
            "--shrink-window",
        ])
        .unwrap();
        match cli.command {
            Commands::CurveVideo(args) => {
                assert_eq!(args.xlim, Some(commands::AxisPair(0.0, 12.5)));
                assert_eq!(args.window, Some(21));
                assert!(args.shrink_window);
                assert!(args.ylim.is_none());
            }
            _ => panic!("expected curve-video"),
        }
    }

    #[test]
    fn test_time_diff_defaults_to_raw_sheet() {
        let cli = Cli::try_parse_from(["insitu", "time-diff", "log.xlsx"]).unwrap();
        match cli.command {
            Commands::TimeDiff { sheet, output, .. } => {
                assert_eq!(sheet, "raw");
                assert_eq!(output, PathBuf::from("time_differences.xlsx"));
            }
            _ => panic!("expected time-diff"),
        }
    }

    #[test]
    fn test_global_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["insitu", "check", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_malformed_config_error_is_returned_for_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "video": { "fps": "fast" } }"#).unwrap();

        let (config, err) = load_config(&path);
        assert_eq!(config.video.fps, 24);
        let err = err.unwrap();
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_absent_config_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, err) = load_config(&dir.path().join("config.json"));
        assert!(err.is_none());
        assert_eq!(config.curve.sheet, "input_data");
    }
}
