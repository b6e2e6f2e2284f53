//! Error types for metadata enrichment.

use thiserror::Error;

/// Errors that can occur while resolving title metadata.
#[derive(Debug, Error)]
pub enum MetadataSearchError {
    /// Network communication error occurred during lookup.
    #[error("Network error: {reason}")]
    NetworkError {
        /// The reason for the network error
        reason: String,
    },

    /// Failed to parse a provider response.
    #[error("Parse error: {reason}")]
    ParseError {
        /// The reason for the parse error
        reason: String,
    },

    /// Provider answered but reported no match or an API-level error.
    #[error("Metadata fetch failed: {reason}")]
    MetadataFetchFailed {
        /// The reason for the metadata fetch failure
        reason: String,
    },
}
