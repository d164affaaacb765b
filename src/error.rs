use thiserror::Error;

/// Main error type for blogconv
#[derive(Error, Debug)]
pub enum BlogconvError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sidecar metadata parse errors
    #[error("Metadata parse error: {0}")]
    Metadata(String),

    /// Cache database errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Code highlighting errors (local or remote)
    #[error("Highlight error: {0}")]
    Highlight(String),

    /// Header composition errors
    #[error("Header error: {0}")]
    Header(String),
}

/// Convenient Result type using BlogconvError
pub type Result<T> = std::result::Result<T, BlogconvError>;
