//! Error types for the engine.
//!
//! Every stage returns a [`Result`] whose error names the failure kind: parse
//! failures, unsupported (encrypted) documents, copy failures, configuration
//! mistakes and serializer invariant violations are all distinct variants.

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while parsing, copying or writing documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural parse failure at a byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    Parse {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for the parse failure
        reason: String,
    },

    /// Document structure is broken (missing header, unresolvable root, cyclic page tree, ...)
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Document uses a feature the engine refuses to handle (encryption)
    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    /// Page copy failure
    #[error(transparent)]
    Copy(#[from] CopyError),

    /// Unrecognized configuration key or value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violated while writing output
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Raster image could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Operation was cancelled through its cancellation flag
    #[error("Operation cancelled")]
    Cancelled,

    /// A failure attributed to one named input
    #[error("{name}: {source}")]
    Source {
        /// Display name supplied by the caller
        name: String,
        /// Underlying failure
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the closure copier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CopyError {
    /// Requested page index is not below the page count
    #[error("Page index {index} out of range (document has {page_count} pages)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Page count of the source document
        page_count: usize,
    },

    /// A required reference could not be resolved during closure traversal
    #[error("Source document is corrupt: {0}")]
    SourceCorrupt(String),
}

impl Error {
    /// Shorthand for a parse error with a formatted reason.
    pub(crate) fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Attach a caller-supplied display name to this error.
    ///
    /// Errors that already carry a name are returned unchanged.
    pub fn with_source_name(self, name: impl Into<String>) -> Self {
        match self {
            Error::Source { .. } => self,
            other => Error::Source {
                name: name.into(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the input this error was attributed to, if any.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Error::Source { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether the failure is confined to a single input document.
    ///
    /// Callers merging several documents use this to report "file X could not
    /// be read" and decide for themselves whether to continue with the rest.
    pub fn is_per_source(&self) -> bool {
        match self {
            Error::Source { source, .. } => source.is_per_source(),
            Error::Parse { .. }
            | Error::MalformedDocument(_)
            | Error::UnsupportedDocument(_)
            | Error::Image(_)
            | Error::Copy(CopyError::SourceCorrupt(_)) => true,
            _ => false,
        }
    }
}
