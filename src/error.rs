//! Error types for the shoe pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ShoecutError>;

/// Error taxonomy shared by all pipeline entry points
#[derive(Error, Debug)]
pub enum ShoecutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP fetch or download errors
    #[error("Network error: {0}")]
    Network(String),

    /// HTML or model-output parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Mask generation, compositing or cropping errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ShoecutError {
    /// Create a new network error with operation context
    pub fn network<S: Into<String>>(operation: S, err: &reqwest::Error) -> Self {
        Self::Network(format!("{}: {}", operation.into(), err))
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = ShoecutError::invalid_config("bad threshold");
        assert!(matches!(err, ShoecutError::InvalidConfig(_)));

        let err = ShoecutError::model("weights file missing");
        assert!(matches!(err, ShoecutError::Model(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ShoecutError::parse("no <img> tags in document");
        assert_eq!(err.to_string(), "Parse error: no <img> tags in document");

        let err = ShoecutError::inference("session not initialized");
        assert_eq!(err.to_string(), "Inference error: session not initialized");
    }

    #[test]
    fn test_file_io_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ShoecutError::file_io_error("read image", Path::new("Shoes/0.jpg"), io_error);
        let text = err.to_string();
        assert!(text.contains("read image"));
        assert!(text.contains("Shoes/0.jpg"));
    }
}
