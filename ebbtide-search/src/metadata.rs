//! Title metadata fetching using the OMDb API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ebbtide_core::completion::{MetadataLookup, TitleIds, TitleMetadata};

use crate::errors::MetadataSearchError;

const OMDB_BASE_URL: &str = "http://www.omdbapi.com/";

/// OMDb-backed metadata provider for movie and TV show information.
#[derive(Debug, Clone)]
pub struct OmdbMetadata {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

/// Response from OMDb API for title details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmdbResponse {
    /// Title of the media item
    #[serde(rename = "Title")]
    pub title: Option<String>,
    /// Release year as string
    #[serde(rename = "Year")]
    pub year: Option<String>,
    /// Plot summary or description
    #[serde(rename = "Plot")]
    pub plot: Option<String>,
    /// URL to poster image
    #[serde(rename = "Poster")]
    pub poster: Option<String>,
    /// IMDb identifier
    #[serde(rename = "imdbID")]
    pub imdb_id: Option<String>,
    /// API response status
    #[serde(rename = "Response")]
    pub response: Option<String>,
    /// Error message if request failed
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

impl OmdbMetadata {
    /// Create new OMDb metadata provider.
    ///
    /// For production use, set OMDB_API_KEY environment variable.
    pub fn new() -> Self {
        Self::with_api_key(std::env::var("OMDB_API_KEY").ok())
    }

    /// Create OMDb metadata provider with explicit API key.
    ///
    /// Allows configuration-driven API key instead of environment variable.
    pub fn with_api_key(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OMDB_BASE_URL.to_string(),
        }
    }

    /// Points the provider at a different endpoint. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search for metadata by title and optional year.
    ///
    /// # Errors
    ///
    /// - `MetadataSearchError::NetworkError` - HTTP request failed
    /// - `MetadataSearchError::ParseError` - Response was not valid OMDb JSON
    /// - `MetadataSearchError::MetadataFetchFailed` - API reported no match
    pub async fn search_by_title(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> Result<TitleMetadata, MetadataSearchError> {
        let mut url = format!("{}?t={}", self.base_url, urlencoding::encode(title));
        if let Some(year) = year {
            url.push_str(&format!("&y={year}"));
        }
        if let Some(ref api_key) = self.api_key {
            url.push_str(&format!("&apikey={api_key}"));
        }

        let omdb_data = self.fetch(&url).await?;
        Ok(parse_omdb_response(omdb_data))
    }

    /// Fetch metadata by IMDb ID.
    ///
    /// # Errors
    ///
    /// - `MetadataSearchError::NetworkError` - HTTP request failed
    /// - `MetadataSearchError::ParseError` - Response was not valid OMDb JSON
    /// - `MetadataSearchError::MetadataFetchFailed` - API reported no match
    pub async fn fetch_by_imdb_id(
        &self,
        imdb_id: &str,
    ) -> Result<OmdbResponse, MetadataSearchError> {
        let mut url = format!("{}?i={imdb_id}", self.base_url);
        if let Some(ref api_key) = self.api_key {
            url.push_str(&format!("&apikey={api_key}"));
        }
        self.fetch(&url).await
    }

    async fn fetch(&self, url: &str) -> Result<OmdbResponse, MetadataSearchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            MetadataSearchError::NetworkError {
                reason: format!("HTTP request failed: {e}"),
            }
        })?;

        let omdb_data: OmdbResponse =
            response
                .json()
                .await
                .map_err(|e| MetadataSearchError::ParseError {
                    reason: format!("JSON parsing failed: {e}"),
                })?;

        if omdb_data.response == Some("False".to_string()) {
            return Err(MetadataSearchError::MetadataFetchFailed {
                reason: omdb_data.error.unwrap_or_else(|| "Not found".to_string()),
            });
        }

        Ok(omdb_data)
    }
}

impl Default for OmdbMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an OMDb API response into reconciler-facing metadata.
fn parse_omdb_response(omdb: OmdbResponse) -> TitleMetadata {
    let year = omdb.year.and_then(|y| {
        // Handle year ranges like "2019-2021" for TV series
        y.split('-')
            .next()
            .and_then(|year_str| year_str.parse().ok())
    });

    TitleMetadata {
        title: omdb.title.unwrap_or_else(|| "Unknown".to_string()),
        year,
        ids: TitleIds {
            imdb: omdb.imdb_id,
        },
        overview: omdb.plot.filter(|p| p != "N/A"),
    }
}

/// Best-effort adapter: reconciler-side lookups never fail, they answer
/// `None` and leave retry policy to the caller.
#[async_trait]
impl MetadataLookup for OmdbMetadata {
    async fn search(&self, query: &str, year: Option<u16>) -> Option<TitleMetadata> {
        match self.search_by_title(query, year).await {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                tracing::debug!(query, error = %err, "metadata search yielded nothing");
                None
            }
        }
    }

    async fn poster_url(&self, ids: &TitleIds) -> Option<String> {
        let imdb_id = ids.imdb.as_deref()?;
        match self.fetch_by_imdb_id(imdb_id).await {
            Ok(response) => response.poster.filter(|p| p != "N/A"),
            Err(err) => {
                tracing::debug!(imdb_id, error = %err, "poster lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> OmdbResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_full_response() {
        let omdb = raw(
            r#"{"Title":"Some Film","Year":"2019","Plot":"A plot.",
                "Poster":"http://img.example/p.jpg","imdbID":"tt0111161",
                "Response":"True"}"#,
        );
        let metadata = parse_omdb_response(omdb);
        assert_eq!(metadata.title, "Some Film");
        assert_eq!(metadata.year, Some(2019));
        assert_eq!(metadata.ids.imdb.as_deref(), Some("tt0111161"));
        assert_eq!(metadata.overview.as_deref(), Some("A plot."));
    }

    #[test]
    fn series_year_range_takes_first_year() {
        let omdb = raw(r#"{"Title":"Some Show","Year":"2019-2021","Response":"True"}"#);
        assert_eq!(parse_omdb_response(omdb).year, Some(2019));
    }

    #[test]
    fn not_available_plot_becomes_none() {
        let omdb = raw(r#"{"Title":"Bare","Plot":"N/A","Response":"True"}"#);
        assert_eq!(parse_omdb_response(omdb).overview, None);
    }
}
