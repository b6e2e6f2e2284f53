//! Ebbtide Search - Title metadata enrichment

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! Resolves completed torrent names to title metadata (title, year, IMDb id,
//! poster) through the OMDb API, with a deterministic demo provider for
//! development mode. Providers plug into the reconciler through the
//! [`ebbtide_core::MetadataLookup`] seam.

pub mod errors;
pub mod metadata;
pub mod service;

// Re-export main types
pub use errors::MetadataSearchError;
pub use metadata::{OmdbMetadata, OmdbResponse};
pub use service::{DemoMetadata, MetadataService};

/// Convenience type alias for Results with MetadataSearchError.
pub type Result<T> = std::result::Result<T, MetadataSearchError>;
