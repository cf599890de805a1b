/// Error types for part object-model operations.
use thiserror::Error;

/// Result type for part operations.
pub type Result<T> = std::result::Result<T, PartError>;

/// Error types for part open/commit and tree operations.
#[derive(Error, Debug)]
pub enum PartError {
    /// The part's bytes do not parse as the expected schema.
    ///
    /// Fatal for the part: a part that fails to open stays empty and must be
    /// re-constructed before use. The caller decides whether to abort opening
    /// the whole document or to skip the part.
    #[error("Corrupt part content: {0}")]
    CorruptContent(String),

    /// XML error outside the open path (e.g. while scanning a note body)
    #[error("XML error: {0}")]
    Xml(String),

    /// Invalid format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// IO error, propagated unchanged from the stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for PartError {
    fn from(err: quick_xml::Error) -> Self {
        PartError::Xml(err.to_string())
    }
}
