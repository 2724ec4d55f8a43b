//! Check external tools and fonts.

use insitu_common::config::AppConfig;
use insitu_render_engine::font::find_font_path;
use insitu_render_engine::video::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("In-situ System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for (tool, purpose) in [
        ("ffmpeg", "video encoding and compositing"),
        ("ffprobe", "video probing for merge"),
    ] {
        if command_exists(tool) {
            println!("[OK] {tool}: found ({purpose})");
        } else {
            println!("[FAIL] {tool}: not found on PATH ({purpose})");
            all_ok = false;
        }
    }

    match find_font_path(config.curve.font.as_deref()) {
        Some(path) => println!("[OK] Font: {}", path.display()),
        None => println!("[WARN] Font: none found, frames will be rendered without text"),
    }

    println!();
    if all_ok {
        println!("All required tools are available.");
    } else {
        println!("Some required tools are missing. Install ffmpeg to render videos.");
    }

    Ok(())
}
