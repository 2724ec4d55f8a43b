//! Font discovery for chart and frame labels.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;

use insitu_common::error::{InsituError, InsituResult};

/// Well-known system font locations, tried in order.
///
/// The first entries cover Greek glyphs (`ε`, `σ`).
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Resolve the font file to use: the configured path when it exists,
/// otherwise the first installed candidate.
pub fn find_font_path(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "Configured font not found, searching system fonts");
    }

    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

/// Load a TrueType/OpenType font from disk.
pub fn load_font_file(path: &Path) -> InsituResult<FontVec> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InsituError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            InsituError::Io(e)
        }
    })?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| InsituError::render(format!("invalid font {}: {e}", path.display())))
}

/// Load the best available font; `None` means text is left out.
pub fn load_font(configured: Option<&Path>) -> Option<FontVec> {
    let Some(path) = find_font_path(configured) else {
        tracing::warn!("No usable font found; text will not be drawn");
        return None;
    };

    match load_font_file(&path) {
        Ok(font) => {
            tracing::debug!(path = %path.display(), "Loaded font");
            Some(font)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load font; text will not be drawn");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configured_font_falls_back() {
        let found = find_font_path(Some(Path::new("/nonexistent/font.ttf")));
        if let Some(path) = found {
            assert!(FONT_CANDIDATES.iter().any(|c| Path::new(c) == path));
        }
    }

    #[test]
    fn test_invalid_font_bytes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(load_font_file(&path).is_err());
        assert!(matches!(
            load_font_file(&dir.path().join("absent.ttf")),
            Err(InsituError::FileNotFound { .. })
        ));
    }
}
