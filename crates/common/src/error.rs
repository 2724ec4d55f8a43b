//! Error types shared across the in-situ crates.

use std::path::PathBuf;

/// Top-level error type for in-situ operations.
///
/// Every variant except `Io`/`Json`/`Other` is fatal for a pipeline run:
/// the run aborts and a single message is reported at the top level.
/// Per-row parse failures are not represented here; they are returned as
/// plain values and only reduce the effective sample set.
#[derive(Debug, thiserror::Error)]
pub enum InsituError {
    #[error("Schema error: {message}")]
    Schema { message: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Table error: {message}")]
    Table { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Video error: {message}")]
    Video { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using InsituError.
pub type InsituResult<T> = Result<T, InsituError>;

impl InsituError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: msg.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    pub fn table(msg: impl Into<String>) -> Self {
        Self::Table {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn video(msg: impl Into<String>) -> Self {
        Self::Video {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the error belongs to the schema class (bad column layout).
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Whether the error belongs to the insufficient-data class.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_class_prefix() {
        let err = InsituError::insufficient_data("no valid rows");
        assert_eq!(err.to_string(), "Insufficient data: no valid rows");
        assert!(err.is_insufficient_data());
        assert!(!err.is_schema());
    }

    #[test]
    fn test_io_error_converts_transparently() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: InsituError = io.into();
        assert_eq!(err.to_string(), "gone");
    }
}
