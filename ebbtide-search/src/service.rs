//! Metadata service and the demo provider for development mode.

use std::sync::Arc;

use async_trait::async_trait;

use ebbtide_core::completion::{MetadataLookup, TitleIds, TitleMetadata};
use ebbtide_core::config::RuntimeMode;

use crate::metadata::OmdbMetadata;

/// Mode-selected metadata service handed to the reconciler.
///
/// Wraps the provider matching the runtime mode: OMDb in production, the
/// deterministic demo provider in development.
#[derive(Clone)]
pub struct MetadataService {
    provider: Arc<dyn MetadataLookup>,
}

impl MetadataService {
    /// Selects the provider for the given runtime mode.
    pub fn from_runtime_mode(mode: RuntimeMode) -> Self {
        let provider: Arc<dyn MetadataLookup> = if mode.is_development() {
            Arc::new(DemoMetadata::new())
        } else {
            Arc::new(OmdbMetadata::new())
        };
        Self { provider }
    }
}

#[async_trait]
impl MetadataLookup for MetadataService {
    async fn search(&self, query: &str, year: Option<u16>) -> Option<TitleMetadata> {
        self.provider.search(query, year).await
    }

    async fn poster_url(&self, ids: &TitleIds) -> Option<String> {
        self.provider.poster_url(ids).await
    }
}

/// Deterministic metadata provider for development and demos.
///
/// Answers every query with plausible metadata built from the query itself,
/// so the full enrichment path can be exercised without network access or an
/// API key.
#[derive(Debug, Clone, Default)]
pub struct DemoMetadata;

impl DemoMetadata {
    /// Creates the demo provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataLookup for DemoMetadata {
    async fn search(&self, query: &str, year: Option<u16>) -> Option<TitleMetadata> {
        if query.trim().is_empty() {
            return None;
        }
        Some(TitleMetadata {
            title: query.trim().to_string(),
            year: year.or(Some(2024)),
            ids: TitleIds {
                imdb: Some(format!("tt{:07}", query.len())),
            },
            overview: Some(format!("Demo metadata for '{}'.", query.trim())),
        })
    }

    async fn poster_url(&self, ids: &TitleIds) -> Option<String> {
        ids.imdb
            .as_ref()
            .map(|id| format!("https://demo.example/posters/{id}.jpg"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_query_with_year_hint() {
        let provider = DemoMetadata::new();
        let metadata = provider.search("Some Film", Some(2019)).await.unwrap();
        assert_eq!(metadata.title, "Some Film");
        assert_eq!(metadata.year, Some(2019));
        assert!(metadata.ids.imdb.is_some());
    }

    #[tokio::test]
    async fn empty_query_yields_none() {
        let provider = DemoMetadata::new();
        assert!(provider.search("   ", None).await.is_none());
    }

    #[tokio::test]
    async fn poster_derived_from_imdb_id() {
        let provider = DemoMetadata::new();
        let ids = TitleIds {
            imdb: Some("tt0000009".to_string()),
        };
        let url = provider.poster_url(&ids).await.unwrap();
        assert!(url.contains("tt0000009"));
    }
}
