//! Error types for the revision engine.
//!
//! Every fatal condition is its own variant so callers can match on the
//! exact failure. Errors are local to the operation in progress;
//! already-committed revisions are never touched by a failing call.

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building, parsing, or serializing
/// a revision.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parse error at a specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    Parse {
        /// Byte offset where the error occurred
        offset: u64,
        /// Reason for the parse failure
        reason: String,
    },

    /// Cross-reference stream /W array does not have exactly 3 entries
    #[error("Invalid /W array: expected 3 field widths, found {0}")]
    InvalidWidths(usize),

    /// Cross-reference stream payload shorter than entries * entry size
    #[error("Truncated cross-reference stream: need {expected} bytes, have {actual}")]
    TruncatedPayload {
        /// Bytes required by the declared entry count
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Entry type byte outside {0, 1, 2}
    #[error("Unknown cross-reference entry type: {0}")]
    UnknownEntryType(u64),

    /// Trailer is missing the /Size entry
    #[error("Missing /Size in trailer")]
    MissingSize,

    /// A revision's /Prev would point at itself or share its own offset
    #[error("Circular /Prev link at offset {0}")]
    CircularPrev(u64),

    /// Declared /Prev offset matches no known cross-reference section
    #[error("No cross-reference section found at /Prev offset {0}")]
    UnresolvedPrev(u64),

    /// Dereferencing an object reference with no resolver attached
    #[error("Cannot resolve {0} {1} R: no resolver attached")]
    NoResolver(u32, u16),

    /// Object-stream members must have generation number zero
    #[error("Object {0} has generation {1}: object-stream members must use generation 0")]
    CompressedGeneration(u32, u16),

    /// Object streams may not contain other object streams
    #[error("Object {0} is an object stream: nesting is not allowed")]
    NestedObjectStream(u32),

    /// Mutation attempted on an immutable object
    #[error("Object {0} {1} is immutable")]
    Immutable(i64, u16),

    /// Indirect object numbers are -1 (placeholder) or >= 1
    #[error("Invalid object number: {0}")]
    InvalidObjectNumber(i64),

    /// Object has the wrong type for the requested operation
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: &'static str,
        /// Actual object type found
        found: &'static str,
    },

    /// Invalid structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Encryption collaborator error
    #[error("Security handler error: {0}")]
    Security(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
